//! Model-backed helpers. Both need the caller's Gemini key.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    Json,
};
use meter_client::db::SchemaRegistry;
use serde::{Deserialize, Serialize};

use super::{ApiError, AppState};
use crate::{
    drafting::{draft_letter, LetterRequest},
    extraction::{extract_reading, ExtractionResult, ImagePayload, DEFAULT_IMAGE_MIME},
};

pub const API_KEY_HEADER: &str = "x-gemini-key";

fn api_key(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or(ApiError::MissingApiKey)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ExtractRequest {
    image_base64: String,
    meter_type_id: String,
    #[serde(default)]
    mime_type: Option<String>,
}

pub(super) async fn extract(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<ExtractRequest>, JsonRejection>,
) -> Result<Json<ExtractionResult>, ApiError> {
    let key = api_key(&headers)?;
    let Json(req) = body?;
    if req.image_base64.is_empty() || req.meter_type_id.is_empty() {
        return Err(ApiError::Validation("imageBase64 and meterTypeId are required".to_string()));
    }

    // base64 carries 3 bytes per 4 chars
    let estimated_bytes = req.image_base64.len() as f64 * 0.75;
    if estimated_bytes > state.max_image_bytes as f64 {
        return Err(ApiError::ImageTooLarge(state.max_image_bytes));
    }

    let meter_type = state
        .store
        .find_meter_type_by_id(&req.meter_type_id)
        .await?
        .ok_or(ApiError::NotFound("Meter type"))?;

    let image = ImagePayload {
        base64: &req.image_base64,
        mime_type: req.mime_type.as_deref().unwrap_or(DEFAULT_IMAGE_MIME),
    };
    let result = extract_reading(&*state.generator, key, &meter_type, image)
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;

    tracing::info!(
        meter_type_id = %meter_type.id,
        confidence = result.confidence,
        "reading extracted from photo"
    );
    Ok(Json(result))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct LetterResponse {
    email_text: String,
}

pub(super) async fn generate_email(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<LetterRequest>, JsonRejection>,
) -> Result<Json<LetterResponse>, ApiError> {
    let key = api_key(&headers)?;
    let Json(req) = body?;

    let email_text = draft_letter(&*state.generator, key, &req, &state.letter_language)
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;
    Ok(Json(LetterResponse { email_text }))
}
