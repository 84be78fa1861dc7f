//! Rename command - apply saved JSON files without extracting again.

use std::path::PathBuf;

use clap::Args;
use console::style;

use rcpt_core::rename_from_artifacts;

use super::batch::outcome_line;
use super::settings::load_config;

/// Arguments for the rename command.
#[derive(Args)]
pub struct RenameArgs {
    /// Directory processed earlier (its working directory holds the JSON files)
    #[arg(required = true)]
    input: PathBuf,

    /// Copy renamed files here instead of renaming in place
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

pub async fn run(args: RenameArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    if args.output_dir.is_some() {
        config.batch.output_dir = args.output_dir;
    }

    if !args.input.is_dir() {
        anyhow::bail!("Input directory not found: {}", args.input.display());
    }

    let summary = rename_from_artifacts(&args.input, &config.batch).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    if summary.total == 0 {
        println!(
            "{} No JSON files found in {}",
            style("ℹ").blue(),
            args.input.join(&config.batch.temp_dir_name).display()
        );
        return Ok(());
    }

    for outcome in &summary.outcomes {
        println!("{}", outcome_line(outcome));
    }
    println!();
    println!(
        "{} Renamed {} of {} files ({} failed, {} skipped)",
        style("✓").green(),
        summary.processed,
        summary.total,
        style(summary.failed).red(),
        style(summary.skipped).dim()
    );

    Ok(())
}
