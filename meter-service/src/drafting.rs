//! Reading → notification letter, via a text model. Pure rendering: values
//! are passed through whether or not they were validated.

use meter_client::domain::ReadingValues;
use serde::Deserialize;

use crate::gemini::{Content, ContentGenerator, GeminiError, Part};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LetterRequest {
    pub object_name: String,
    pub address: String,
    pub date: String,
    pub meter_type_name: String,
    pub meter_type_unit: String,
    pub values: ReadingValues,
}

fn values_block(req: &LetterRequest) -> String {
    req.values
        .iter()
        .filter_map(|(name, v)| v.as_number().map(|n| format!("{name}: {n} {}", req.meter_type_unit)))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_prompt(req: &LetterRequest, language: &str) -> String {
    format!(
        "Write a business letter in {language} to the landlord passing on meter readings.

Details:
- Property address: {address}
- Property name: {object_name}
- Meter type: {meter_type}
- Reading date: {date}
- Readings:
{values}

Requirements:
- Formal business style
- Brief and clear
- Include every reading listed
- State the date
- No lengthy introduction
- Ready to send (no [brackets] or placeholders)",
        address = req.address,
        object_name = req.object_name,
        meter_type = req.meter_type_name,
        date = req.date,
        values = values_block(req),
    )
}

pub async fn draft_letter<G>(
    generator: &G,
    api_key: &str,
    req: &LetterRequest,
    language: &str,
) -> Result<String, GeminiError>
where
    G: ContentGenerator + ?Sized,
{
    let contents = [Content::user(vec![Part::Text(build_prompt(req, language))])];
    let text = generator.generate(api_key, &contents).await?;
    Ok(text.trim().to_string())
}
