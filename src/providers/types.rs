//! Wire types for the Gemini `generateContent` REST endpoint

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize)]
pub(super) struct GenerateContentRequest {
    pub(super) contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) system_instruction: Option<Content>,
    #[serde(rename = "generationConfig")]
    pub(super) generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
pub(super) struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) role: Option<String>,
    pub(super) parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
pub(super) struct Part {
    pub(super) text: String,
}

#[derive(Debug, Serialize)]
pub(super) struct GenerationConfig {
    pub(super) temperature: f64,
    #[serde(rename = "maxOutputTokens")]
    pub(super) max_output_tokens: u32,
    #[serde(rename = "responseMimeType", skip_serializing_if = "Option::is_none")]
    pub(super) response_mime_type: Option<String>,
    #[serde(rename = "responseSchema", skip_serializing_if = "Option::is_none")]
    pub(super) response_schema: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub(super) struct GenerateContentResponse {
    pub(super) candidates: Option<Vec<Candidate>>,
    pub(super) error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
pub(super) struct Candidate {
    pub(super) content: CandidateContent,
}

#[derive(Debug, Deserialize)]
pub(super) struct CandidateContent {
    pub(super) parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ResponsePart {
    pub(super) text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ApiError {
    pub(super) message: String,
}
