//! Configuration loading shared by the subcommands.

use std::path::{Path, PathBuf};

use clap::Args;
use tracing::debug;

use rcpt_core::models::config::{ProviderKind, RcptConfig};

/// Options shared by `process` and `batch`.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Extraction provider (gemini, mistral, clova)
    #[arg(short, long)]
    provider: Option<ProviderKind>,

    /// Provider model name
    #[arg(short, long)]
    model: Option<String>,

    /// Copy renamed files here instead of renaming in place
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Extract and save JSON without renaming
    #[arg(long)]
    no_rename: bool,

    /// Re-extract files that already have output JSON
    #[arg(long)]
    force: bool,

    /// Send every PDF page instead of only the first
    #[arg(long)]
    all_pages: bool,

    /// Maximum attempts per file when rate limited
    #[arg(long)]
    max_retries: Option<u32>,
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rcpt")
        .join("config.json")
}

/// Path in use: `--config` when given, otherwise the default location.
pub fn config_path(explicit: Option<&str>) -> PathBuf {
    explicit.map(PathBuf::from).unwrap_or_else(default_config_path)
}

/// Load the config file, falling back to defaults when there is none.
pub fn load_config(explicit: Option<&str>) -> anyhow::Result<RcptConfig> {
    let path = config_path(explicit);
    if explicit.is_some() || path.exists() {
        debug!("Loading config from {}", path.display());
        return read_config(&path);
    }
    Ok(RcptConfig::default())
}

fn read_config(path: &Path) -> anyhow::Result<RcptConfig> {
    RcptConfig::from_file(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))
}

/// Fill credentials from the environment.
pub fn apply_env(config: &mut RcptConfig) {
    let provider = &mut config.provider;
    if provider.api_key.is_none() {
        provider.api_key = std::env::var(provider.kind.api_key_env())
            .ok()
            .filter(|v| !v.trim().is_empty());
    }
    if provider.kind == ProviderKind::Clova && provider.clova_invoke_url.is_none() {
        provider.clova_invoke_url = std::env::var("CLOVA_OCR_URL").ok();
    }
}

impl RunArgs {
    /// Apply command-line overrides on top of the loaded config.
    pub fn apply(&self, config: &mut RcptConfig) {
        if let Some(kind) = self.provider {
            if kind != config.provider.kind {
                // A key from the file belongs to the previous provider.
                config.provider.api_key = None;
                config.provider.model = None;
            }
            config.provider.kind = kind;
        }
        if let Some(model) = &self.model {
            config.provider.model = Some(model.clone());
        }
        if let Some(dir) = &self.output_dir {
            config.batch.output_dir = Some(dir.clone());
        }
        if self.no_rename {
            config.batch.rename_on_success = false;
        }
        if self.force {
            config.batch.force = true;
        }
        if self.all_pages {
            config.batch.process_all_pages = true;
        }
        if let Some(max) = self.max_retries {
            config.retry.max_retries = max;
        }
    }
}

/// Config file, then flags, then environment credentials.
pub fn resolve(explicit: Option<&str>, args: &RunArgs) -> anyhow::Result<RcptConfig> {
    let mut config = load_config(explicit)?;
    args.apply(&mut config);
    apply_env(&mut config);
    Ok(config)
}
