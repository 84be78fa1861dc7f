//! Provider construction from configuration.

use std::sync::Arc;

use tracing::info;

use super::{ClovaReceiptClient, ExtractionClient, GeminiClient, MistralClient};
use crate::error::Result;
use crate::models::config::{ProviderConfig, ProviderKind};

/// Build the configured provider.
pub fn create_client(config: &ProviderConfig) -> Result<Arc<dyn ExtractionClient>> {
    let client: Arc<dyn ExtractionClient> = match config.kind {
        ProviderKind::Gemini => Arc::new(GeminiClient::new(config)?),
        ProviderKind::Mistral => Arc::new(MistralClient::new(config)?),
        ProviderKind::Clova => Arc::new(ClovaReceiptClient::new(config)?),
    };
    info!("Using extraction provider: {}", client.name());
    Ok(client)
}
