//! Naver CLOVA receipt OCR provider.

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::response::{read_body, transport_error};
use super::{ExtractionClient, Result};
use crate::error::{ExtractionError, RcptError};
use crate::models::config::ProviderConfig;
use crate::models::receipt::{ExtractedRecord, is_absent_token};
use crate::normalize::normalize_amount;

/// CLOVA receipt-domain OCR client.
///
/// Unlike the LLM providers this returns structured fields directly; only the
/// merchant name, payment date and total price are kept.
pub struct ClovaReceiptClient {
    client: Client,
    secret: String,
    invoke_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OcrRequest<'a> {
    version: &'static str,
    request_id: String,
    timestamp: i64,
    images: Vec<OcrImage<'a>>,
}

#[derive(Debug, Serialize)]
struct OcrImage<'a> {
    format: &'a str,
    name: &'static str,
    data: String,
}

#[derive(Debug, Deserialize)]
struct OcrResponse {
    #[serde(default)]
    images: Vec<ImageResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageResult {
    #[serde(default)]
    infer_result: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    receipt: Option<ReceiptResult>,
}

#[derive(Debug, Deserialize)]
struct ReceiptResult {
    result: Option<ReceiptFields>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReceiptFields {
    #[serde(default)]
    store_info: Option<StoreInfo>,
    #[serde(default)]
    payment_info: Option<PaymentInfo>,
    #[serde(default)]
    sub_results: Vec<SubResult>,
}

#[derive(Debug, Deserialize)]
struct SubResult {
    #[serde(default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    price: Option<PriceField>,
}

#[derive(Debug, Deserialize)]
struct StoreInfo {
    name: Option<TextField>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentInfo {
    date: Option<TextField>,
    total_price: Option<PriceField>,
}

/// `{"price": {"text": ...}}`, used for the total and for line items.
#[derive(Debug, Deserialize)]
struct PriceField {
    price: Option<TextField>,
}

#[derive(Debug, Deserialize)]
struct TextField {
    text: Option<String>,
}

impl ClovaReceiptClient {
    /// Create a CLOVA client. Needs both the OCR secret and the invoke URL.
    pub fn new(config: &ProviderConfig) -> std::result::Result<Self, RcptError> {
        let secret = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                RcptError::Config(
                    "CLOVA OCR secret not found. Set CLOVA_OCR_SECRET or provider.api_key in the config."
                        .to_string(),
                )
            })?;

        let invoke_url = config
            .clova_invoke_url
            .clone()
            .or_else(|| config.base_url.clone())
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| {
                RcptError::Config(
                    "CLOVA invoke URL not found. Set CLOVA_OCR_URL or provider.clova_invoke_url in the config."
                        .to_string(),
                )
            })?;

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| RcptError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            secret,
            invoke_url,
        })
    }
}

fn image_format(mime_type: &str) -> &str {
    match mime_type {
        "application/pdf" => "pdf",
        "image/png" => "png",
        "image/tiff" => "tiff",
        _ => "jpg",
    }
}

fn text_of(field: Option<TextField>) -> Option<String> {
    field.and_then(|f| f.text).filter(|t| !is_absent_token(t))
}

/// Sum of the line-item prices. `None` when no item has a usable price.
fn items_total(sub_results: Vec<SubResult>) -> Option<String> {
    let prices: Vec<_> = sub_results
        .into_iter()
        .flat_map(|s| s.items)
        .filter_map(|item| text_of(item.price.and_then(|p| p.price)))
        .filter_map(|text| normalize_amount(&text))
        .collect();

    if prices.is_empty() {
        return None;
    }
    let total: Decimal = prices.into_iter().sum();
    Some(total.normalize().to_string())
}

/// Map a CLOVA response body to a record.
fn parse_response(body: &str) -> Result<ExtractedRecord> {
    let parsed: OcrResponse = serde_json::from_str(body)
        .map_err(|e| ExtractionError::MalformedResponse(format!("unexpected CLOVA payload: {}", e)))?;

    let image = parsed
        .images
        .into_iter()
        .next()
        .ok_or_else(|| ExtractionError::MalformedResponse("CLOVA returned no images".to_string()))?;

    match image.infer_result.as_deref() {
        Some("SUCCESS") | None => {}
        Some(result) => {
            return Err(ExtractionError::MalformedResponse(format!(
                "CLOVA inference {}: {}",
                result,
                image.message.unwrap_or_default()
            )));
        }
    }

    let fields = image.receipt.and_then(|r| r.result).unwrap_or_default();
    let payment = fields.payment_info;

    let (date, amount) = match payment {
        Some(p) => (text_of(p.date), text_of(p.total_price.and_then(|t| t.price))),
        None => (None, None),
    };
    let amount = match amount {
        Some(amount) => Some(amount),
        None => {
            let total = items_total(fields.sub_results);
            if let Some(total) = &total {
                debug!("clova total missing, using item sum {}", total);
            }
            total
        }
    };

    Ok(ExtractedRecord {
        date,
        place: text_of(fields.store_info.and_then(|s| s.name)),
        amount,
        currency: None,
        raw_text: None,
    }
    .with_raw_text(body))
}

#[async_trait]
impl ExtractionClient for ClovaReceiptClient {
    fn name(&self) -> &str {
        "clova"
    }

    async fn extract(&self, bytes: &[u8], mime_type: &str) -> Result<ExtractedRecord> {
        let now = chrono::Utc::now().timestamp_millis();
        let request = OcrRequest {
            version: "V2",
            request_id: format!("rcpt_{}", now),
            timestamp: now,
            images: vec![OcrImage {
                format: image_format(mime_type),
                name: "receipt",
                data: STANDARD.encode(bytes),
            }],
        };

        debug!("clova request: bytes={}", bytes.len());

        let response = self
            .client
            .post(&self.invoke_url)
            .header("X-OCR-SECRET", &self.secret)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let body = read_body(self.name(), response).await?;
        parse_response(&body)
    }
}
