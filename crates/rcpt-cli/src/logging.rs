//! Log output for the CLI: stderr, level from `-v`, `RUST_LOG` wins when set.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Level for a `-v` count.
pub fn level_for(verbose: u8) -> Level {
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Filter used when `RUST_LOG` is unset. Dependencies stay at warn so `-vv`
/// shows our own debug output, not HTTP internals.
fn default_filter(verbose: u8) -> String {
    let level = level_for(verbose);
    format!("warn,rcpt={level},rcpt_core={level}")
}

pub fn init(verbose: u8) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set up logging: {}", e))
}
