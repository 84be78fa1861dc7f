//! Sequential directory runs: extract, normalize, persist, rename.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::artifacts::{
    ArtifactRecord, RenamedTargets, artifact_keys, file_stem, json_artifact_path, remove_if_empty,
    text_artifact_path, write_json, write_summary_csv, write_text,
};
use super::discovery::{discover_files, supported_extension};
use super::events::BatchEvent;
use super::outcome::{BatchSummary, FileOutcome};
use super::relocate::{move_file, replace_with};
use crate::error::{ConversionError, ExtractionError, InputError, RcptError, Result};
use crate::extract::{ExtractionClient, mime_for_extension};
use crate::filename::{FilenameBuilder, resolve_collision};
use crate::models::config::{BatchConfig, RcptConfig};
use crate::normalize::FieldNormalizer;
use crate::pdf::{DocumentConverter, LopdfConverter, first_page_or_original, is_image_extension};
use crate::retry::{RateLimitNotice, RetryError, RetryPolicy, RetryScheduler, StopHandle};

type Events<'a> = Option<&'a UnboundedSender<BatchEvent>>;

fn emit(events: Events<'_>, event: BatchEvent) {
    if let Some(tx) = events {
        // A dropped receiver only means nobody is watching.
        let _ = tx.send(event);
    }
}

/// A directory run on a background task.
pub struct BatchTask {
    pub events: UnboundedReceiver<BatchEvent>,
    pub stop: StopHandle,
    pub handle: JoinHandle<Result<BatchSummary>>,
}

/// Drives one provider over the files of a directory, strictly one at a time.
///
/// Files share one upstream rate limit, so there is a single worker. A failed
/// file is recorded and the run moves on; only directory-level I/O errors
/// abort a run.
pub struct BatchProcessor {
    client: Arc<dyn ExtractionClient>,
    converter: Arc<dyn DocumentConverter>,
    normalizer: FieldNormalizer,
    scheduler: RetryScheduler,
    config: BatchConfig,
}

/// What gets sent to the provider and what ends up renamed.
struct Prepared {
    payload: Vec<u8>,
    mime_type: &'static str,
    extension: String,
    /// PDF converted from an image; replaces the source on rename.
    converted: Option<Vec<u8>>,
}

impl BatchProcessor {
    pub fn new(client: Arc<dyn ExtractionClient>, config: &RcptConfig) -> Self {
        Self {
            client,
            converter: Arc::new(LopdfConverter::new()),
            normalizer: FieldNormalizer::from_config(&config.normalize),
            scheduler: RetryScheduler::new(RetryPolicy::from_config(&config.retry), StopHandle::new()),
            config: config.batch.clone(),
        }
    }

    pub fn with_converter(mut self, converter: Arc<dyn DocumentConverter>) -> Self {
        self.converter = converter;
        self
    }

    /// Share an existing stop flag with this processor.
    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.scheduler = RetryScheduler::new(self.scheduler.policy().clone(), stop);
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.scheduler.stop_handle().clone()
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Process every supported file in `dir`.
    pub async fn process_directory(&self, dir: &Path) -> Result<BatchSummary> {
        self.run_directory(dir, None).await
    }

    /// [`process_directory`](Self::process_directory), reporting progress on `events`.
    pub async fn process_directory_with_events(
        &self,
        dir: &Path,
        events: UnboundedSender<BatchEvent>,
    ) -> Result<BatchSummary> {
        self.run_directory(dir, Some(&events)).await
    }

    /// Run a directory on a background task.
    pub fn spawn_directory(self, dir: PathBuf) -> BatchTask {
        let (tx, rx) = mpsc::unbounded_channel();
        let stop = self.stop_handle();
        let handle = tokio::spawn(async move { self.run_directory(&dir, Some(&tx)).await });
        BatchTask {
            events: rx,
            stop,
            handle,
        }
    }

    /// Process a single file, using a working directory next to it.
    pub async fn process_file(&self, path: &Path) -> Result<FileOutcome> {
        if !path.is_file() {
            return Err(InputError::NotFound(path.to_path_buf()).into());
        }
        if supported_extension(path, self.config.include_tiff).is_none() {
            return Err(InputError::UnsupportedExtension(path.to_path_buf()).into());
        }

        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        let temp_dir = parent.join(&self.config.temp_dir_name);
        tokio::fs::create_dir_all(&temp_dir).await?;
        self.ensure_output_dir().await?;

        let key = file_stem(path);
        let done = json_artifact_path(&temp_dir, &key).exists()
            || RenamedTargets::load(&temp_dir).contains(path);
        let outcome = if done && !self.config.force {
            already_processed(path)
        } else {
            self.process_one(path, &temp_dir, &key, None).await
        };

        remove_if_empty(&temp_dir);
        Ok(outcome)
    }

    async fn ensure_output_dir(&self) -> Result<()> {
        if let Some(output_dir) = &self.config.output_dir {
            tokio::fs::create_dir_all(output_dir).await?;
        }
        Ok(())
    }

    async fn run_directory(&self, dir: &Path, events: Events<'_>) -> Result<BatchSummary> {
        let files = discover_files(dir, &self.config.temp_dir_name, self.config.include_tiff)?;
        let total = files.len();
        info!("Processing {} files in {}", total, dir.display());

        let temp_dir = dir.join(&self.config.temp_dir_name);
        tokio::fs::create_dir_all(&temp_dir).await?;
        self.ensure_output_dir().await?;

        // Snapshot before the run: sources with an artifact, and files an
        // earlier run renamed sources to.
        let keys = artifact_keys(&files);
        let renamed = RenamedTargets::load(&temp_dir);
        let done_before: Vec<bool> = files
            .iter()
            .zip(&keys)
            .map(|(f, key)| json_artifact_path(&temp_dir, key).exists() || renamed.contains(f))
            .collect();

        emit(events, BatchEvent::Started { total });
        let mut summary = BatchSummary::new(total);
        let stop = self.scheduler.stop_handle();

        for (i, path) in files.iter().enumerate() {
            if stop.is_stopped() {
                info!("Stop requested, {} files left unprocessed", total - i);
                emit(events, BatchEvent::Cancelled { remaining: total - i });
                summary.cancelled = true;
                break;
            }

            let index = i + 1;
            info!("[{}/{}] Processing file: {}", index, total, path.display());
            emit(
                events,
                BatchEvent::FileStarted {
                    index,
                    total,
                    path: path.clone(),
                },
            );

            let outcome = if done_before[i] && !self.config.force {
                already_processed(path)
            } else {
                self.process_one(path, &temp_dir, &keys[i], events).await
            };
            let attempted = !matches!(outcome, FileOutcome::Skipped { .. });
            let cancelled = outcome.is_cancelled();

            emit(
                events,
                BatchEvent::FileFinished {
                    index,
                    outcome: outcome.clone(),
                },
            );
            summary.record(outcome);

            if cancelled {
                info!("Stop requested, {} files left unprocessed", total - index);
                emit(events, BatchEvent::Cancelled { remaining: total - index });
                break;
            }

            if attempted && index < total && !stop.is_stopped() {
                let delay = self.scheduler.policy().pacing_delay;
                emit(events, BatchEvent::Paused { delay });
                self.scheduler.pace().await;
            }
        }

        remove_if_empty(&temp_dir);

        if self.config.write_summary {
            let summary_dir = self.config.output_dir.as_deref().unwrap_or(dir);
            let summary_path = summary_dir.join("summary.csv");
            match write_summary_csv(&summary_path, &summary) {
                Ok(()) => info!("Summary written to {}", summary_path.display()),
                Err(e) => warn!("{}", e),
            }
        }

        log_summary(&summary);
        emit(
            events,
            BatchEvent::Completed {
                summary: summary.clone(),
            },
        );
        Ok(summary)
    }

    async fn prepare(&self, path: &Path, bytes: Vec<u8>) -> std::result::Result<Prepared, RcptError> {
        let extension = supported_extension(path, true)
            .ok_or_else(|| InputError::UnsupportedExtension(path.to_path_buf()))?;

        if is_image_extension(&extension) && self.config.convert_images {
            info!("Converting image to PDF: {}", path.display());
            let converter = Arc::clone(&self.converter);
            let pdf = tokio::task::spawn_blocking(move || converter.to_pdf(&bytes))
                .await
                .map_err(|e| ConversionError::Pdf(e.to_string()))??;
            return Ok(Prepared {
                payload: pdf.clone(),
                mime_type: "application/pdf",
                extension: "pdf".to_string(),
                converted: Some(pdf),
            });
        }

        let payload = if extension == "pdf" && !self.config.process_all_pages {
            first_page_or_original(&bytes)
        } else {
            bytes
        };

        Ok(Prepared {
            payload,
            mime_type: mime_for_extension(&extension),
            extension,
            converted: None,
        })
    }

    async fn process_one(&self, path: &Path, temp_dir: &Path, key: &str, events: Events<'_>) -> FileOutcome {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(source) => {
                let err = InputError::Unreadable {
                    path: path.to_path_buf(),
                    source,
                };
                return failed(path, err);
            }
        };

        let prepared = match self.prepare(path, bytes).await {
            Ok(prepared) => prepared,
            Err(e) => return failed(path, e),
        };

        let on_rate_limit = |notice: RateLimitNotice| {
            emit(
                events,
                BatchEvent::RateLimited {
                    path: path.to_path_buf(),
                    attempt: notice.attempt,
                    max_retries: notice.max_attempts,
                    wait: notice.delay,
                },
            );
        };

        let extracted = match self
            .scheduler
            .call_with_retry(self.client.as_ref(), &prepared.payload, prepared.mime_type, on_rate_limit)
            .await
        {
            Ok(record) => record,
            Err(RetryError::Cancelled) => return FileOutcome::cancelled(path),
            Err(RetryError::Extraction(err @ ExtractionError::Auth(_))) => {
                error!("{}: the remaining files will likely fail the same way", err);
                return failed(path, err);
            }
            Err(e) => return failed(path, e),
        };

        let record = self.normalizer.normalize(&extracted);
        let file_name = FilenameBuilder::new()
            .with_extension(&prepared.extension)
            .build(&record, &file_stem(path));
        info!("Generated filename: {}", file_name);

        let target = if self.config.rename_on_success {
            let target_dir = match &self.config.output_dir {
                Some(dir) => dir.as_path(),
                None => path.parent().unwrap_or_else(|| Path::new(".")),
            };
            Some(resolve_collision(target_dir, &file_name, Some(path)))
        } else {
            None
        };

        // Artifacts go first; the rename is the last step.
        let json_path = json_artifact_path(temp_dir, key);
        let artifact = ArtifactRecord::new(&record, path, self.client.name()).with_final_path(target.as_deref());
        if let Err(e) = write_json(&json_path, &artifact).await {
            warn!("{}", e);
        }
        if self.config.write_text_dump {
            if let Some(raw) = &extracted.raw_text {
                if let Err(e) = write_text(&text_artifact_path(temp_dir, key), raw).await {
                    warn!("{}", e);
                }
            }
        }

        let final_path = match target {
            Some(target) => {
                let copy_mode = self.config.output_dir.is_some();
                let moved = match (&prepared.converted, copy_mode) {
                    (Some(pdf), false) => replace_with(path, &target, pdf).await,
                    (Some(pdf), true) => tokio::fs::write(&target, pdf).await,
                    (None, false) => move_file(path, &target).await,
                    (None, true) => tokio::fs::copy(path, &target).await.map(|_| ()),
                };
                if let Err(e) = moved {
                    // Without the rename the artifact would mark the file as done.
                    let _ = tokio::fs::remove_file(&json_path).await;
                    return failed(
                        path,
                        format!("failed to move to {}: {}", target.display(), e),
                    );
                }
                info!("File renamed to: {}", target.display());
                Some(target)
            }
            None => None,
        };

        if !record.missing_fields.is_empty() {
            debug!("{} missing {:?}", path.display(), record.missing_fields);
        }

        FileOutcome::Processed {
            source: path.to_path_buf(),
            final_path,
            record,
        }
    }
}

pub(super) fn failed(path: &Path, reason: impl Display) -> FileOutcome {
    error!("Failed to process {}: {}", path.display(), reason);
    FileOutcome::Failed {
        source: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn already_processed(path: &Path) -> FileOutcome {
    info!("Skipping {}: already processed", path.display());
    FileOutcome::Skipped {
        source: path.to_path_buf(),
        reason: "already processed".to_string(),
    }
}

pub(super) fn log_summary(summary: &BatchSummary) {
    info!("=== Processing Summary ===");
    info!("Processed files: {}", summary.processed);
    if summary.skipped > 0 {
        info!("Skipped files: {}", summary.skipped);
    }
    if summary.failed > 0 {
        warn!("Failed files: {}", summary.failed);
        for (path, reason) in summary.failed_files() {
            warn!("- {}: {}", path.display(), reason);
        }
    }

    let incomplete = summary.files_with_missing();
    if incomplete.is_empty() {
        info!("All processed files have all key information extracted.");
        return;
    }
    warn!("Some files are missing key information:");
    for (path, fields) in incomplete {
        let names: Vec<&str> = fields.iter().map(|f| f.as_str()).collect();
        warn!("- {}: missing {}", path.display(), names.join(", "));
    }
    for (field, count) in summary.missing.iter().filter(|(_, n)| **n > 0) {
        warn!("- {}: {} files", field, count);
    }
}
