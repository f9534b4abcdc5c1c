//! Gemini REST API client.
//!
//! Talks to the `generateContent` endpoint directly over HTTP. Text
//! generation requests a JSON response constrained by a `responseSchema`;
//! image generation requests an `IMAGE` modality and yields a base64
//! payload. Errors carry the upstream status so callers can classify them
//! as transient (worth retrying) or permanent.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{instrument, warn};

use crate::config::Config;
use crate::retry::Transient;
use crate::utils::truncate_for_log;

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Model used for long-form article generation.
pub const TEXT_MODEL: &str = "gemini-2.5-flash";
/// Model used for featured-image generation.
pub const IMAGE_MODEL: &str = "gemini-2.0-flash-preview-image-generation";

/// Long-form generation can legitimately take minutes.
const GENERATION_TIMEOUT: Duration = Duration::from_secs(300);

/// A failed call to the generative backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("response carried no usable payload")]
    EmptyResponse,
}

impl Transient for BackendError {
    fn is_transient(&self) -> bool {
        match self {
            // Timeouts surface as transport errors and are retried the same way.
            BackendError::Transport(_) => true,
            BackendError::Status { status, .. } => {
                matches!(*status, 429 | 500 | 502 | 503 | 504)
            }
            BackendError::EmptyResponse => true,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<TextPart<'a>>,
}

impl<'a> Content<'a> {
    fn text(text: &'a str) -> Self {
        Self {
            parts: vec![TextPart { text }],
        }
    }
}

#[derive(Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<&'static str>>,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    inline_data: Option<InlineImage>,
}

/// Base64 image payload as returned by the backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String,
}

/// Client for the Gemini REST API.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Self {
        let http = reqwest::Client::builder()
            .timeout(GENERATION_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");
        Self {
            http,
            api_key: config.gemini_api_key.clone(),
            base_url: BASE_URL.to_string(),
        }
    }

    /// Generate text, optionally constrained to a JSON schema.
    ///
    /// Returns the first candidate's text verbatim; the caller owns any
    /// cleanup and parsing of the payload.
    #[instrument(level = "info", skip_all, fields(model = %model))]
    pub async fn generate_text(
        &self,
        model: &str,
        system: &str,
        user: &str,
        schema: Option<Value>,
    ) -> Result<String, BackendError> {
        let request = GenerateContentRequest {
            system_instruction: Some(Content::text(system)),
            contents: vec![Content::text(user)],
            generation_config: Some(GenerationConfig {
                response_mime_type: Some("application/json"),
                response_schema: schema,
                response_modalities: None,
            }),
        };

        let response = self.dispatch(model, &request).await?;
        response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().find_map(|p| p.text))
            .filter(|text| !text.trim().is_empty())
            .ok_or(BackendError::EmptyResponse)
    }

    /// Generate an image, returned as a base64 payload with its MIME type.
    #[instrument(level = "info", skip_all, fields(model = %model))]
    pub async fn generate_image(
        &self,
        model: &str,
        prompt: &str,
    ) -> Result<InlineImage, BackendError> {
        let request = GenerateContentRequest {
            system_instruction: None,
            contents: vec![Content::text(prompt)],
            generation_config: Some(GenerationConfig {
                response_mime_type: None,
                response_schema: None,
                response_modalities: Some(vec!["TEXT", "IMAGE"]),
            }),
        };

        let response = self.dispatch(model, &request).await?;
        response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().find_map(|p| p.inline_data))
            .ok_or(BackendError::EmptyResponse)
    }

    async fn dispatch(
        &self,
        model: &str,
        request: &GenerateContentRequest<'_>,
    ) -> Result<GenerateContentResponse, BackendError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        );

        let response = self.http.post(&url).json(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %truncate_for_log(&body, 300), "backend call failed");
            return Err(BackendError::Status {
                status: status.as_u16(),
                body: truncate_for_log(&body, 300),
            });
        }

        Ok(response.json::<GenerateContentResponse>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_and_server_errors_are_transient() {
        for status in [429, 500, 502, 503, 504] {
            let e = BackendError::Status {
                status,
                body: String::new(),
            };
            assert!(e.is_transient(), "status {status} should be transient");
        }
    }

    #[test]
    fn client_errors_are_permanent() {
        for status in [400, 401, 403, 404] {
            let e = BackendError::Status {
                status,
                body: String::new(),
            };
            assert!(!e.is_transient(), "status {status} should be permanent");
        }
    }

    #[test]
    fn text_request_serializes_schema_hint() {
        let request = GenerateContentRequest {
            system_instruction: Some(Content::text("system")),
            contents: vec![Content::text("user")],
            generation_config: Some(GenerationConfig {
                response_mime_type: Some("application/json"),
                response_schema: Some(serde_json::json!({"type": "OBJECT"})),
                response_modalities: None,
            }),
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["systemInstruction"]["parts"][0]["text"], "system");
        assert_eq!(value["contents"][0]["parts"][0]["text"], "user");
        assert_eq!(
            value["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert!(value["generationConfig"].get("responseModalities").is_none());
    }

    #[test]
    fn image_response_deserializes_inline_payload() {
        let raw = r#"{
            "candidates": [{
                "content": {
                    "parts": [
                        {"text": "here is your image"},
                        {"inlineData": {"mimeType": "image/png", "data": "aGVsbG8="}}
                    ]
                }
            }]
        }"#;

        let response: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        let image = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().find_map(|p| p.inline_data))
            .unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.data, "aGVsbG8=");
    }
}
