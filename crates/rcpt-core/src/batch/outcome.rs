//! Per-file outcomes and the run summary.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::models::receipt::{FieldName, NormalizedRecord};

/// Result of one input file.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FileOutcome {
    /// Extracted and normalized; renamed or copied unless renaming is off.
    Processed {
        source: PathBuf,
        final_path: Option<PathBuf>,
        record: NormalizedRecord,
    },
    /// Terminal failure for this file. The run continues.
    Failed { source: PathBuf, reason: String },
    /// Not attempted (already processed, or the run was stopped).
    Skipped { source: PathBuf, reason: String },
}

/// Skip reason for a file interrupted by a stop request.
const CANCELLED: &str = "cancelled";

impl FileOutcome {
    /// A file whose extraction was interrupted by a stop request.
    pub fn cancelled(source: &Path) -> Self {
        FileOutcome::Skipped {
            source: source.to_path_buf(),
            reason: CANCELLED.to_string(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, FileOutcome::Skipped { reason, .. } if reason == CANCELLED)
    }

    pub fn source(&self) -> &Path {
        match self {
            FileOutcome::Processed { source, .. }
            | FileOutcome::Failed { source, .. }
            | FileOutcome::Skipped { source, .. } => source,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            FileOutcome::Processed { .. } => "processed",
            FileOutcome::Failed { .. } => "failed",
            FileOutcome::Skipped { .. } => "skipped",
        }
    }

    pub fn is_processed(&self) -> bool {
        matches!(self, FileOutcome::Processed { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, FileOutcome::Failed { .. })
    }

    pub fn final_path(&self) -> Option<&Path> {
        match self {
            FileOutcome::Processed { final_path, .. } => final_path.as_deref(),
            _ => None,
        }
    }

    /// Missing fields of a processed file; empty otherwise.
    pub fn missing_fields(&self) -> BTreeSet<FieldName> {
        match self {
            FileOutcome::Processed { record, .. } => record.missing_fields.clone(),
            _ => BTreeSet::new(),
        }
    }

    /// Failure or skip reason.
    pub fn reason(&self) -> Option<&str> {
        match self {
            FileOutcome::Failed { reason, .. } | FileOutcome::Skipped { reason, .. } => Some(reason),
            FileOutcome::Processed { .. } => None,
        }
    }
}

/// Aggregate over one directory run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    /// Supported files discovered.
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Processed files lacking each field.
    pub missing: BTreeMap<FieldName, usize>,
    /// True when the run ended on a stop request.
    pub cancelled: bool,
    pub outcomes: Vec<FileOutcome>,
}

impl BatchSummary {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            processed: 0,
            failed: 0,
            skipped: 0,
            missing: FieldName::ALL.iter().map(|f| (*f, 0)).collect(),
            cancelled: false,
            outcomes: Vec::with_capacity(total),
        }
    }

    /// Fold one outcome into the counters.
    pub fn record(&mut self, outcome: FileOutcome) {
        match &outcome {
            FileOutcome::Processed { record, .. } => {
                self.processed += 1;
                for field in &record.missing_fields {
                    *self.missing.entry(*field).or_insert(0) += 1;
                }
            }
            FileOutcome::Failed { .. } => self.failed += 1,
            FileOutcome::Skipped { .. } => self.skipped += 1,
        }
        if outcome.is_cancelled() {
            self.cancelled = true;
        }
        self.outcomes.push(outcome);
    }

    pub fn missing_count(&self, field: FieldName) -> usize {
        self.missing.get(&field).copied().unwrap_or(0)
    }

    /// Files that failed, with their reasons.
    pub fn failed_files(&self) -> Vec<(&Path, &str)> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                FileOutcome::Failed { source, reason } => Some((source.as_path(), reason.as_str())),
                _ => None,
            })
            .collect()
    }

    /// Processed files with at least one missing field.
    pub fn files_with_missing(&self) -> Vec<(&Path, &BTreeSet<FieldName>)> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                FileOutcome::Processed { source, record, .. } if !record.missing_fields.is_empty() => {
                    Some((source.as_path(), &record.missing_fields))
                }
                _ => None,
            })
            .collect()
    }

    pub fn all_complete(&self) -> bool {
        self.missing.values().all(|&n| n == 0)
    }
}
