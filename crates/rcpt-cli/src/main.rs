//! CLI application for renaming receipt scans from their extracted fields.

mod commands;
mod logging;

use clap::{Parser, Subcommand};

use commands::{batch, config, process, rename};

/// Receipt renamer - name receipt scans by date, merchant and amount
#[derive(Parser)]
#[command(name = "rcpt")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract fields from one receipt and rename it
    Process(process::ProcessArgs),

    /// Rename every receipt in a directory
    Batch(batch::BatchArgs),

    /// Rename receipts from JSON saved by an earlier run, without extracting again
    Rename(rename::RenameArgs),

    /// Manage configuration
    Config(config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    logging::init(cli.verbose)?;

    match cli.command {
        Commands::Process(args) => process::run(args, cli.config.as_deref()).await,
        Commands::Batch(args) => batch::run(args, cli.config.as_deref()).await,
        Commands::Rename(args) => rename::run(args, cli.config.as_deref()).await,
        Commands::Config(args) => config::run(args, cli.config.as_deref()).await,
    }
}
