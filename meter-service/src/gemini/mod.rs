//! Client for a Gemini-style `generateContent` API.
//!
//! Both the photo extraction and the email drafting go through the
//! [`ContentGenerator`] trait so they can be exercised without the network.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::GeminiConfig;

#[derive(thiserror::Error, Debug)]
pub enum GeminiError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Gemini {model} error {status}: {body}")]
    Status {
        model: String,
        status: u16,
        body: String,
    },
    #[error("Gemini returned empty response")]
    EmptyResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Part {
    Text(String),
    InlineData(InlineData),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Content {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Role::User,
            parts,
        }
    }
}

#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Text of the model's first candidate reply.
    async fn generate(&self, api_key: &str, contents: &[Content]) -> Result<String, GeminiError>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: &'a [Content],
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateResponse {
    fn into_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
            .filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    primary_model: String,
    fallback_model: String,
}

impl GeminiClient {
    pub fn new(cfg: &GeminiConfig) -> Result<Self, GeminiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            primary_model: cfg.primary_model.clone(),
            fallback_model: cfg.fallback_model.clone(),
        })
    }

    async fn call_model(
        &self,
        model: &str,
        api_key: &str,
        contents: &[Content],
    ) -> Result<String, GeminiError> {
        let url = format!("{}/{}:generateContent?key={}", self.base_url, model, api_key);

        let response = self
            .http
            .post(&url)
            .json(&GenerateRequest { contents })
            .send()
            .await
            .map_err(redact)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GeminiError::Status {
                model: model.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response.json().await.map_err(redact)?;
        parsed.into_text().ok_or(GeminiError::EmptyResponse)
    }
}

/// The request URL carries the API key.
fn redact(e: reqwest::Error) -> GeminiError {
    GeminiError::Http(e.without_url())
}

#[async_trait]
impl ContentGenerator for GeminiClient {
    async fn generate(&self, api_key: &str, contents: &[Content]) -> Result<String, GeminiError> {
        match self.call_model(&self.primary_model, api_key, contents).await {
            Ok(text) => Ok(text),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    primary = %self.primary_model,
                    fallback = %self.fallback_model,
                    "primary model failed, falling back"
                );
                self.call_model(&self.fallback_model, api_key, contents).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_body_matches_wire_shape() {
        let contents = [Content::user(vec![
            Part::InlineData(InlineData {
                mime_type: "image/jpeg".to_string(),
                data: "AAAA".to_string(),
            }),
            Part::Text("read the meter".to_string()),
        ])];

        let body = serde_json::to_value(GenerateRequest { contents: &contents }).unwrap();

        assert_eq!(
            body,
            json!({
                "contents": [{
                    "role": "user",
                    "parts": [
                        { "inlineData": { "mimeType": "image/jpeg", "data": "AAAA" } },
                        { "text": "read the meter" }
                    ]
                }]
            })
        );
    }

    #[test]
    fn first_candidate_text_is_extracted() {
        let resp: GenerateResponse = serde_json::from_value(json!({
            "candidates": [
                { "content": { "parts": [{ "text": "hello" }, { "text": "ignored" }] } },
                { "content": { "parts": [{ "text": "second" }] } }
            ]
        }))
        .unwrap();
        assert_eq!(resp.into_text().as_deref(), Some("hello"));
    }

    #[test]
    fn missing_or_blank_text_is_empty() {
        for body in [
            json!({}),
            json!({ "candidates": [] }),
            json!({ "candidates": [{ "content": { "parts": [] } }] }),
            json!({ "candidates": [{ "content": { "parts": [{ "text": "" }] } }] }),
            json!({ "candidates": [{ "finishReason": "SAFETY" }] }),
        ] {
            let resp: GenerateResponse = serde_json::from_value(body).unwrap();
            assert!(resp.into_text().is_none());
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::{
        collections::VecDeque,
        sync::{Mutex, PoisonError},
    };

    use super::*;

    /// Replays canned replies in order and records every request.
    #[derive(Default)]
    pub(crate) struct ScriptedGenerator {
        replies: Mutex<VecDeque<Result<String, GeminiError>>>,
        requests: Mutex<Vec<Vec<Content>>>,
    }

    impl ScriptedGenerator {
        pub(crate) fn new(replies: Vec<Result<String, GeminiError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::default(),
            }
        }

        pub(crate) fn requests(&self) -> Vec<Vec<Content>> {
            self.requests
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }
    }

    #[async_trait]
    impl ContentGenerator for ScriptedGenerator {
        async fn generate(&self, _api_key: &str, contents: &[Content]) -> Result<String, GeminiError> {
            self.requests
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(contents.to_vec());
            self.replies
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front()
                .unwrap_or(Err(GeminiError::EmptyResponse))
        }
    }
}
