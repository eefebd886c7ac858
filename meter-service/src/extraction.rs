//! Photo → candidate values, via a vision-capable model.
//!
//! The model is asked for a flat JSON object with one member per schema field
//! plus `confidence`. A reply that fails to parse or has the wrong shape is
//! retried exactly once.

use meter_client::domain::{FieldSchema, FieldValue, MeterType, ReadingValues};
use serde::Serialize;

use crate::gemini::{Content, ContentGenerator, GeminiError, InlineData, Part};

pub const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionResult {
    pub values: ReadingValues,
    pub confidence: f64,
}

#[derive(thiserror::Error, Debug)]
pub enum ExtractionError {
    #[error(transparent)]
    Model(#[from] GeminiError),
    #[error("unreadable extraction reply: {0}")]
    Format(String),
}

#[derive(Debug, Clone, Copy)]
pub struct ImagePayload<'a> {
    pub base64: &'a str,
    pub mime_type: &'a str,
}

pub fn build_prompt(schema: &FieldSchema) -> String {
    let fields = schema
        .iter()
        .map(|f| {
            let hint = if f.required {
                "(required)"
            } else {
                "(optional, null if not visible)"
            };
            format!("  \"{}\": number {}", f.name, hint)
        })
        .collect::<Vec<_>>()
        .join(",\n");

    format!(
        r#"You are a meter reading extraction engine. Analyze the meter display in this image.

Return ONLY valid JSON with this exact structure:
{{
{fields},
  "confidence": number between 0 and 1
}}

Rules:
- Extract numeric values shown on the meter display
- If a value is not visible or unclear, return null for optional fields
- confidence: your certainty (0.0 = uncertain, 1.0 = certain)
- Return ONLY the JSON, no explanation, no markdown"#
    )
}

/// Parse a model reply, tolerating markdown code fences around the JSON.
pub fn parse_reply(text: &str) -> Result<ExtractionResult, ExtractionError> {
    let cleaned = text.replace("```json", "").replace("```", "");
    let parsed: serde_json::Value = serde_json::from_str(cleaned.trim())
        .map_err(|e| ExtractionError::Format(format!("invalid JSON: {e}")))?;

    let serde_json::Value::Object(mut members) = parsed else {
        return Err(ExtractionError::Format("expected a JSON object".to_string()));
    };

    let confidence = members
        .remove("confidence")
        .and_then(|v| v.as_f64())
        .ok_or_else(|| ExtractionError::Format("confidence must be a number".to_string()))?;
    if !(0.0..=1.0).contains(&confidence) {
        return Err(ExtractionError::Format(format!(
            "confidence must be between 0 and 1, got {confidence}"
        )));
    }

    let mut values = ReadingValues::new();
    for (name, value) in members {
        let value = match value {
            serde_json::Value::Null => FieldValue::Absent,
            serde_json::Value::Number(n) => n.as_f64().map_or(FieldValue::Absent, FieldValue::Present),
            other => {
                return Err(ExtractionError::Format(format!(
                    "value for {name:?} must be a number or null, got {other}"
                )))
            }
        };
        values.insert(name, value);
    }

    Ok(ExtractionResult { values, confidence })
}

async fn attempt<G>(generator: &G, api_key: &str, contents: &[Content]) -> Result<ExtractionResult, ExtractionError>
where
    G: ContentGenerator + ?Sized,
{
    let text = generator.generate(api_key, contents).await?;
    parse_reply(&text)
}

pub async fn extract_reading<G>(
    generator: &G,
    api_key: &str,
    meter_type: &MeterType,
    image: ImagePayload<'_>,
) -> Result<ExtractionResult, ExtractionError>
where
    G: ContentGenerator + ?Sized,
{
    let contents = [Content::user(vec![
        Part::InlineData(InlineData {
            mime_type: image.mime_type.to_string(),
            data: image.base64.to_string(),
        }),
        Part::Text(build_prompt(&meter_type.fields)),
    ])];

    match attempt(generator, api_key, &contents).await {
        Ok(result) => {
            metrics::counter!("extraction_attempts_total", "outcome" => "ok").increment(1);
            Ok(result)
        }
        Err(first) => {
            tracing::warn!(error = %first, meter_type_id = %meter_type.id, "extraction failed, retrying once");
            metrics::counter!("extraction_attempts_total", "outcome" => "retry").increment(1);
            attempt(generator, api_key, &contents).await.inspect_err(|e| {
                tracing::error!(error = %e, meter_type_id = %meter_type.id, "extraction failed after retry");
                metrics::counter!("extraction_attempts_total", "outcome" => "failed").increment(1);
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::testing::ScriptedGenerator;
    use meter_client::domain::{FieldKind, MeterField};

    fn water() -> MeterType {
        MeterType {
            id: "mt-water".to_string(),
            name: "Cold water".to_string(),
            unit: "m3".to_string(),
            fields: FieldSchema::new(vec![
                MeterField {
                    name: "total_m3".to_string(),
                    label: "Total m3".to_string(),
                    kind: FieldKind::Number,
                    required: true,
                    unit: None,
                },
                MeterField {
                    name: "litres".to_string(),
                    label: "Litres".to_string(),
                    kind: FieldKind::Number,
                    required: false,
                    unit: None,
                },
            ]),
        }
    }

    const IMAGE: ImagePayload<'static> = ImagePayload {
        base64: "AAAA",
        mime_type: DEFAULT_IMAGE_MIME,
    };

    #[test]
    fn prompt_describes_every_field() {
        let prompt = build_prompt(&water().fields);
        assert!(prompt.contains("  \"total_m3\": number (required),\n"));
        assert!(prompt.contains("  \"litres\": number (optional, null if not visible),\n"));
        assert!(prompt.contains("\"confidence\": number between 0 and 1"));
    }

    #[test]
    fn fenced_reply_is_parsed() {
        let result = parse_reply("```json\n{\"total_m3\": 185, \"litres\": null, \"confidence\": 0.9}\n```").unwrap();
        assert_eq!(result.confidence, 0.9);
        assert_eq!(result.values["total_m3"], FieldValue::Present(185.0));
        assert_eq!(result.values["litres"], FieldValue::Absent);
        assert!(!result.values.contains_key("confidence"));
    }

    #[test]
    fn malformed_replies_are_format_errors() {
        for reply in [
            "the meter shows 185",
            "[1, 2]",
            r#"{"total_m3": 185}"#,
            r#"{"total_m3": 185, "confidence": 1.5}"#,
            r#"{"total_m3": "185", "confidence": 0.5}"#,
        ] {
            assert!(
                matches!(parse_reply(reply), Err(ExtractionError::Format(_))),
                "{reply} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn bad_first_reply_is_retried_once() {
        let generator = ScriptedGenerator::new(vec![
            Ok("not json".to_string()),
            Ok(r#"{"total_m3": 74, "litres": 120, "confidence": 0.8}"#.to_string()),
        ]);

        let result = extract_reading(&generator, "key", &water(), IMAGE).await.unwrap();

        assert_eq!(result.values["litres"], FieldValue::Present(120.0));
        let requests = generator.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0], requests[1]);
        assert!(matches!(
            &requests[0][0].parts[0],
            Part::InlineData(InlineData { mime_type, .. }) if mime_type == "image/jpeg"
        ));
    }

    #[tokio::test]
    async fn second_failure_is_propagated() {
        let generator = ScriptedGenerator::new(vec![
            Err(GeminiError::EmptyResponse),
            Ok("{}".to_string()),
            Ok(r#"{"total_m3": 1, "confidence": 1}"#.to_string()),
        ]);

        let err = extract_reading(&generator, "key", &water(), IMAGE).await.unwrap_err();

        assert!(matches!(err, ExtractionError::Format(_)));
        assert_eq!(generator.requests().len(), 2);
    }
}
