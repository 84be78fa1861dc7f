//! Extraction providers: file bytes in, best-effort receipt fields out.

mod clova;
mod factory;
mod gemini;
mod mistral;
pub mod response;
mod scripted;

pub use clova::ClovaReceiptClient;
pub use factory::create_client;
pub use gemini::GeminiClient;
pub use mistral::MistralClient;
pub use scripted::ScriptedClient;

use async_trait::async_trait;

use crate::error::ExtractionError;
use crate::models::receipt::ExtractedRecord;

/// Result type for extraction calls.
pub type Result<T> = std::result::Result<T, ExtractionError>;

/// One upstream OCR/LLM provider.
///
/// Implementations perform the network call only; they never touch local
/// files. Quota signals must surface as [`ExtractionError::RateLimited`] so the
/// retry scheduler can back off, and credential problems as
/// [`ExtractionError::Auth`].
#[async_trait]
pub trait ExtractionClient: Send + Sync {
    /// Short provider name for logs and artifacts.
    fn name(&self) -> &str;

    /// Extract receipt fields from a document.
    async fn extract(&self, bytes: &[u8], mime_type: &str) -> Result<ExtractedRecord>;
}

/// Instruction sent to the LLM providers.
pub(crate) const RECEIPT_PROMPT: &str = r#"Extract the following fields from this receipt.

1. date: the transaction date (labels such as 거래일시, 승인일자, 판매일, Date, Transaction Date).
   Return it as YYYYMMDD, e.g. 20230516.
2. place: the merchant or store name (labels such as 가맹점명, 상호, 상점명, Merchant, Store, Seller).
3. amount: the total paid (labels such as 합계, 결제금액, 총결제금액, 승인금액, Total, Amount).
   Never use tax lines such as 과세, 면세, 부가세, VAT or Tax. Return digits only, no symbols.
4. currency: the ISO code of the amount. Use KRW for Korean receipts when nothing else is shown.

Use null for any field you cannot find.
Respond with only this JSON object and nothing else:
{"date": "YYYYMMDD", "place": "store name", "amount": 6500, "currency": "KRW"}"#;

/// MIME type for a file extension (lower-case, without the dot).
pub fn mime_for_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "pdf" => "application/pdf",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "tif" | "tiff" => "image/tiff",
        _ => "application/octet-stream",
    }
}
