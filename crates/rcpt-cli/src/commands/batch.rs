//! Batch command - rename every receipt in a directory.

use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};

use rcpt_core::{BatchEvent, BatchProcessor, BatchSummary, FileOutcome, create_client};

use super::settings::{RunArgs, resolve};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Directory containing receipts
    #[arg(required = true)]
    input: PathBuf,

    /// Also write summary.csv
    #[arg(long)]
    summary: bool,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    run: RunArgs,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = resolve(config_path, &args.run)?;
    if args.summary {
        config.batch.write_summary = true;
    }

    if !args.input.is_dir() {
        anyhow::bail!("Input directory not found: {}", args.input.display());
    }

    let client = create_client(&config.provider)?;
    let processor = BatchProcessor::new(client, &config);
    let mut task = processor.spawn_directory(args.input.clone());

    let stop = task.stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Stop requested, finishing the current file");
            stop.stop();
        }
    });

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=>-"),
    );

    while let Some(event) = task.events.recv().await {
        match event {
            BatchEvent::Started { total } => {
                if total == 0 {
                    pb.println(format!("{} No supported files found", style("ℹ").blue()));
                }
                pb.set_length(total as u64);
            }
            BatchEvent::FileStarted { path, .. } => {
                let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
                pb.set_message(name);
            }
            BatchEvent::RateLimited {
                attempt,
                max_retries,
                wait,
                ..
            } => {
                pb.set_message(format!(
                    "rate limited, retry {}/{} in {:.0}s",
                    attempt,
                    max_retries,
                    wait.as_secs_f64()
                ));
            }
            BatchEvent::FileFinished { outcome, .. } => {
                pb.println(outcome_line(&outcome));
                pb.inc(1);
            }
            BatchEvent::Paused { delay } => debug!("pacing {:?}", delay),
            BatchEvent::Cancelled { remaining } => {
                pb.println(format!(
                    "{} Stopped, {} files left unprocessed",
                    style("!").yellow(),
                    remaining
                ));
            }
            BatchEvent::Completed { .. } => pb.finish_and_clear(),
        }
    }

    let summary = task.handle.await??;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary, start);
    }

    Ok(())
}

pub(super) fn outcome_line(outcome: &FileOutcome) -> String {
    let name = outcome.source().display();
    match outcome {
        FileOutcome::Processed { final_path: Some(path), .. } => {
            format!("{} {} → {}", style("✓").green(), name, path.display())
        }
        FileOutcome::Processed { .. } => format!("{} {}", style("✓").green(), name),
        FileOutcome::Skipped { reason, .. } => format!("{} {} ({})", style("-").dim(), name, reason),
        FileOutcome::Failed { reason, .. } => format!("{} {}: {}", style("✗").red(), name, reason),
    }
}

fn print_summary(summary: &BatchSummary, start: Instant) {
    println!();
    println!(
        "{} Processed {} of {} files in {:?}",
        style("✓").green(),
        summary.processed,
        summary.total,
        start.elapsed()
    );
    println!(
        "   {} failed, {} skipped",
        style(summary.failed).red(),
        style(summary.skipped).dim()
    );

    let failed = summary.failed_files();
    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for (path, reason) in failed {
            println!("  - {}: {}", path.display(), reason);
        }
    }

    let incomplete = summary.files_with_missing();
    if incomplete.is_empty() {
        if summary.processed > 0 {
            println!();
            println!("All processed files have all key information extracted.");
        }
        return;
    }

    println!();
    println!("{}", style("Missing fields:").yellow());
    for (field, count) in summary.missing.iter().filter(|(_, n)| **n > 0) {
        println!("  - {}: {} files", field, count);
    }
    for (path, fields) in incomplete {
        let names: Vec<&str> = fields.iter().map(|f| f.as_str()).collect();
        println!("  - {}: missing {}", path.display(), names.join(", "));
    }
}
