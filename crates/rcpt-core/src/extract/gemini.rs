//! Google Gemini `generateContent` provider.

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::response::{parse_record, read_body, transport_error};
use super::{ExtractionClient, RECEIPT_PROMPT, Result};
use crate::error::{ExtractionError, RcptError};
use crate::models::config::ProviderConfig;
use crate::models::receipt::ExtractedRecord;

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub(crate) const GEMINI_DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Gemini multimodal provider.
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    Inline { inline_data: InlineData<'a> },
}

#[derive(Debug, Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Debug, Deserialize)]
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
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GeminiClient {
    /// Create a Gemini client from provider configuration.
    pub fn new(config: &ProviderConfig) -> std::result::Result<Self, RcptError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                RcptError::Config(
                    "Gemini API key not found. Set GEMINI_API_KEY or provider.api_key in the config."
                        .to_string(),
                )
            })?;

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| RcptError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            model: config
                .model
                .clone()
                .unwrap_or_else(|| GEMINI_DEFAULT_MODEL.to_string()),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| GEMINI_API_URL.to_string()),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

#[async_trait]
impl ExtractionClient for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn extract(&self, bytes: &[u8], mime_type: &str) -> Result<ExtractedRecord> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text { text: RECEIPT_PROMPT },
                    Part::Inline {
                        inline_data: InlineData {
                            mime_type,
                            data: STANDARD.encode(bytes),
                        },
                    },
                ],
            }],
        };

        debug!("gemini request: model={} bytes={}", self.model, bytes.len());

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let body = read_body(self.name(), response).await?;
        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| ExtractionError::MalformedResponse(format!("unexpected Gemini payload: {}", e)))?;

        let text: String = parsed
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .filter_map(|p| p.text)
            .collect::<Vec<_>>()
            .join("\n");

        if text.trim().is_empty() {
            return Err(ExtractionError::MalformedResponse(
                "Gemini returned no text candidates".to_string(),
            ));
        }

        parse_record(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_api_key() {
        let config = ProviderConfig::default();
        assert!(matches!(GeminiClient::new(&config), Err(RcptError::Config(_))));
    }

    #[test]
    fn test_endpoint_uses_model() {
        let config = ProviderConfig {
            api_key: Some("k".into()),
            base_url: Some("http://localhost:9000/".into()),
            ..Default::default()
        };
        let client = GeminiClient::new(&config).unwrap();
        assert_eq!(
            client.endpoint(),
            "http://localhost:9000/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn test_request_shape() {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text { text: "hi" },
                    Part::Inline {
                        inline_data: InlineData {
                            mime_type: "application/pdf",
                            data: STANDARD.encode(b"%PDF"),
                        },
                    },
                ],
            }],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(
            value["contents"][0]["parts"][1]["inline_data"]["mime_type"],
            "application/pdf"
        );
        assert_eq!(value["contents"][0]["parts"][1]["inline_data"]["data"], "JVBERg==");
    }

    #[test]
    fn test_response_text_is_collected() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"```json\n{\"place\":\"Cafe\"}\n```"}]}}]}"#;
        let parsed: GenerateResponse = serde_json::from_str(body).unwrap();
        let text = parsed.candidates[0].content.as_ref().unwrap().parts[0].text.clone().unwrap();
        assert_eq!(parse_record(&text).unwrap().place.as_deref(), Some("Cafe"));
    }
}
