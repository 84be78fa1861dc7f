//! Process command - extract fields from a single receipt and rename it.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use rcpt_core::{BatchProcessor, FieldName, FileOutcome, create_client};

use super::settings::{RunArgs, resolve};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input file (PDF or image)
    #[arg(required = true)]
    input: PathBuf,

    /// Print the outcome as JSON
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    run: RunArgs,
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let config = resolve(config_path, &args.run)?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let client = create_client(&config.provider)?;
    let processor = BatchProcessor::new(client, &config);

    info!("Processing file: {}", args.input.display());

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.set_message(format!("Extracting {}", args.input.display()));
    pb.enable_steady_tick(Duration::from_millis(120));

    let outcome = processor.process_file(&args.input).await;
    pb.finish_and_clear();
    let outcome = outcome?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }

    if let FileOutcome::Failed { reason, .. } = &outcome {
        anyhow::bail!("Processing failed: {}", reason);
    }

    info!("Finished in {:?}", start.elapsed());
    Ok(())
}

fn print_outcome(outcome: &FileOutcome) {
    match outcome {
        FileOutcome::Processed {
            source,
            final_path,
            record,
        } => {
            println!("{} {}", style("✓").green(), source.display());
            for field in FieldName::ALL {
                let value = record.display_field(field);
                let value = if record.has(field) {
                    style(value).bold()
                } else {
                    style(value).yellow()
                };
                println!("   {:<9} {}", format!("{}:", field), value);
            }
            match final_path {
                Some(path) => println!("   {} {}", style("→").green(), path.display()),
                None => println!("   {}", style("(not renamed)").dim()),
            }
        }
        FileOutcome::Skipped { source, reason } => {
            println!(
                "{} {} skipped: {} (use --force to re-extract)",
                style("ℹ").blue(),
                source.display(),
                reason
            );
        }
        // Reported by the caller as the command error.
        FileOutcome::Failed { .. } => {}
    }
}
