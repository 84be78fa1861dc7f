//! Configuration structures for the receipt pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Main configuration for the rcpt pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RcptConfig {
    /// Extraction provider configuration.
    pub provider: ProviderConfig,

    /// Rate-limit retry and pacing configuration.
    pub retry: RetryConfig,

    /// Directory run configuration.
    pub batch: BatchConfig,

    /// Field normalization configuration.
    pub normalize: NormalizeConfig,
}

/// Supported extraction providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Google Gemini generateContent.
    #[default]
    Gemini,
    /// Mistral chat completions with document input.
    Mistral,
    /// Naver CLOVA receipt OCR.
    Clova,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::Mistral => "mistral",
            ProviderKind::Clova => "clova",
        }
    }

    /// Environment variable holding this provider's credential.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "GEMINI_API_KEY",
            ProviderKind::Mistral => "MISTRAL_API_KEY",
            ProviderKind::Clova => "CLOVA_OCR_SECRET",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(ProviderKind::Gemini),
            "mistral" => Ok(ProviderKind::Mistral),
            "clova" | "naver" => Ok(ProviderKind::Clova),
            other => Err(format!("unknown provider: {}", other)),
        }
    }
}

/// Extraction provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Which provider to call.
    pub kind: ProviderKind,

    /// API key or OCR secret. Filled from the environment by the CLI when empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model name (provider default when unset).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Override for the provider's API base URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// CLOVA invoke URL for the receipt domain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clova_invoke_url: Option<String>,

    /// HTTP request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Gemini,
            api_key: None,
            model: None,
            base_url: None,
            clova_invoke_url: None,
            timeout_secs: 60,
        }
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Rate-limit retry and pacing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum extraction attempts per file.
    pub max_retries: u32,

    /// First backoff delay; doubles on each further rate-limited attempt.
    pub initial_delay_ms: u64,

    /// How often a backoff wait checks for a stop request.
    pub poll_interval_ms: u64,

    /// Fixed delay after every file, success or failure.
    pub pacing_delay_ms: u64,

    /// Retry malformed provider responses like rate limits.
    pub retry_malformed: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay_ms: 2000,
            poll_interval_ms: 100,
            pacing_delay_ms: 1000,
            retry_malformed: false,
        }
    }
}

/// Directory run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Copy renamed files here instead of renaming in place.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,

    /// Name of the working directory created inside the input directory.
    pub temp_dir_name: String,

    /// Rename (or copy) the source once extraction succeeds.
    pub rename_on_success: bool,

    /// Re-extract files whose output JSON already exists.
    pub force: bool,

    /// Send every PDF page instead of only the first.
    pub process_all_pages: bool,

    /// Convert raster images to PDF before extraction.
    pub convert_images: bool,

    /// Accept .tif/.tiff inputs.
    pub include_tiff: bool,

    /// Write the raw provider response next to the JSON artifact.
    pub write_text_dump: bool,

    /// Write summary.csv at the end of a directory run.
    pub write_summary: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            temp_dir_name: "temp_ocr_processing".to_string(),
            rename_on_success: true,
            force: false,
            process_all_pages: false,
            convert_images: true,
            include_tiff: true,
            write_text_dump: true,
            write_summary: false,
        }
    }
}

/// Field normalization configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    /// Currency assumed when the provider returns none. `None` keeps it missing.
    pub default_currency: Option<String>,

    /// Maximum characters kept from the merchant name.
    pub place_max_chars: usize,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            default_currency: Some("KRW".to_string()),
            place_max_chars: 30,
        }
    }
}

impl RcptConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RcptConfig::default();
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.initial_delay_ms, 2000);
        assert_eq!(config.retry.pacing_delay_ms, 1000);
        assert!(!config.retry.retry_malformed);
        assert!(config.batch.rename_on_success);
        assert!(!config.batch.force);
        assert_eq!(config.normalize.default_currency.as_deref(), Some("KRW"));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: RcptConfig =
            serde_json::from_str(r#"{"provider": {"kind": "mistral"}, "retry": {"max_retries": 2}}"#)
                .unwrap();
        assert_eq!(config.provider.kind, ProviderKind::Mistral);
        assert_eq!(config.provider.timeout_secs, 60);
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.retry.poll_interval_ms, 100);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = RcptConfig::default();
        config.batch.force = true;
        config.normalize.default_currency = None;
        config.save(&path).unwrap();

        let loaded = RcptConfig::from_file(&path).unwrap();
        assert!(loaded.batch.force);
        assert_eq!(loaded.normalize.default_currency, None);
    }

    #[test]
    fn test_provider_kind_parse() {
        assert_eq!("Gemini".parse::<ProviderKind>(), Ok(ProviderKind::Gemini));
        assert_eq!("naver".parse::<ProviderKind>(), Ok(ProviderKind::Clova));
        assert!("openai".parse::<ProviderKind>().is_err());
    }
}
