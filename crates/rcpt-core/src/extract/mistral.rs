//! Mistral chat completions provider with document input.

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use super::response::{parse_record, read_body, transport_error};
use super::{ExtractionClient, RECEIPT_PROMPT, Result};
use crate::error::{ExtractionError, RcptError};
use crate::models::config::ProviderConfig;
use crate::models::receipt::ExtractedRecord;

const MISTRAL_API_URL: &str = "https://api.mistral.ai/v1";
pub(crate) const MISTRAL_DEFAULT_MODEL: &str = "mistral-small-latest";

/// Mistral provider.
pub struct MistralClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<serde_json::Value>,
    response_format: serde_json::Value,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl MistralClient {
    /// Create a Mistral client from provider configuration.
    pub fn new(config: &ProviderConfig) -> std::result::Result<Self, RcptError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                RcptError::Config(
                    "Mistral API key not found. Set MISTRAL_API_KEY or provider.api_key in the config."
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
                .unwrap_or_else(|| MISTRAL_DEFAULT_MODEL.to_string()),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| MISTRAL_API_URL.to_string()),
        })
    }

    fn build_request(&self, bytes: &[u8], mime_type: &str) -> ChatRequest {
        let data_url = format!("data:{};base64,{}", mime_type, STANDARD.encode(bytes));

        // PDFs go in as documents, raster images as image_url.
        let attachment = if mime_type == "application/pdf" {
            json!({ "type": "document_url", "document_url": data_url })
        } else {
            json!({ "type": "image_url", "image_url": data_url })
        };

        ChatRequest {
            model: self.model.clone(),
            messages: vec![json!({
                "role": "user",
                "content": [
                    { "type": "text", "text": RECEIPT_PROMPT },
                    attachment,
                ],
            })],
            response_format: json!({ "type": "json_object" }),
            temperature: 0.0,
        }
    }
}

#[async_trait]
impl ExtractionClient for MistralClient {
    fn name(&self) -> &str {
        "mistral"
    }

    async fn extract(&self, bytes: &[u8], mime_type: &str) -> Result<ExtractedRecord> {
        let request = self.build_request(bytes, mime_type);
        debug!("mistral request: model={} bytes={}", self.model, bytes.len());

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url.trim_end_matches('/')))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let body = read_body(self.name(), response).await?;
        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| ExtractionError::MalformedResponse(format!("unexpected Mistral payload: {}", e)))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ExtractionError::MalformedResponse("Mistral returned no choices".to_string()))?;

        parse_record(&text)
    }
}
