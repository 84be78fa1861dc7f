//! Intermediate JSON/text artifacts and the CSV run summary.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::outcome::BatchSummary;
use crate::error::PersistenceError;
use crate::models::receipt::{ExtractedRecord, FieldName, NormalizedRecord, ReceiptDate};
use crate::normalize::{normalize_amount, normalize_currency};

/// Contents of `<key>.json` in the working directory.
#[derive(Debug, Serialize)]
pub struct ArtifactRecord<'a> {
    #[serde(flatten)]
    pub record: &'a NormalizedRecord,
    /// Eight-digit date when a century is known.
    pub date_full: Option<&'a str>,
    pub final_path: Option<&'a Path>,
    pub source: &'a Path,
    pub provider: &'a str,
    pub processed_at: DateTime<Utc>,
}

impl<'a> ArtifactRecord<'a> {
    pub fn new(record: &'a NormalizedRecord, source: &'a Path, provider: &'a str) -> Self {
        Self {
            record,
            date_full: record
                .date
                .as_ref()
                .filter(|d| d.has_century())
                .map(|d| d.canonical()),
            final_path: None,
            source,
            provider,
            processed_at: Utc::now(),
        }
    }

    pub fn with_final_path(mut self, final_path: Option<&'a Path>) -> Self {
        self.final_path = final_path;
        self
    }
}

/// A record read back from a JSON artifact.
#[derive(Debug, Clone, Deserialize)]
pub struct StoredArtifact {
    #[serde(flatten)]
    pub fields: ExtractedRecord,
    #[serde(default)]
    pub final_path: Option<PathBuf>,
    pub source: PathBuf,
    #[serde(default)]
    pub provider: Option<String>,
}

impl StoredArtifact {
    /// Rebuild the normalized record. Stored values are already canonical,
    /// so no default currency is applied.
    pub fn record(&self) -> NormalizedRecord {
        let mut record = NormalizedRecord {
            date: self.fields.date.as_deref().and_then(ReceiptDate::from_digits),
            place: self.fields.place.clone(),
            amount: self.fields.amount.as_deref().and_then(normalize_amount),
            currency: normalize_currency(self.fields.currency.as_deref(), None),
            ..Default::default()
        };
        record.refresh_missing();
        record
    }
}

/// Artifact base names for the files of one run, in order.
///
/// A file keeps its stem unless an earlier file already took it; then the
/// full file name is used (`a.jpg`, `a.pdf` give `a`, `a.pdf`).
pub fn artifact_keys(files: &[PathBuf]) -> Vec<String> {
    let mut taken = HashSet::new();
    files
        .iter()
        .map(|file| {
            let stem = file_stem(file);
            if taken.insert(stem.clone()) {
                return stem;
            }
            let name = file_name(file);
            taken.insert(name.clone());
            name
        })
        .collect()
}

/// Path of the JSON artifact for an artifact key.
pub fn json_artifact_path(temp_dir: &Path, key: &str) -> PathBuf {
    temp_dir.join(format!("{}.json", key))
}

/// Path of the text dump for an artifact key.
pub fn text_artifact_path(temp_dir: &Path, key: &str) -> PathBuf {
    temp_dir.join(format!("{}.txt", key))
}

pub(crate) fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// JSON artifacts in `temp_dir`, sorted. Empty when the directory is missing.
pub fn list_artifacts(temp_dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(temp_dir) else {
        return Vec::new();
    };
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .map(|e| e.eq_ignore_ascii_case("json"))
                    .unwrap_or(false)
        })
        .collect();
    paths.sort();
    paths
}

pub fn read_artifact(path: &Path) -> Result<StoredArtifact, PersistenceError> {
    let content = std::fs::read_to_string(path).map_err(|e| persistence_error(path, e))?;
    serde_json::from_str(&content).map_err(|e| persistence_error(path, e))
}

/// Point an existing artifact at the file it was renamed to.
pub async fn set_final_path(path: &Path, final_path: &Path) -> Result<(), PersistenceError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| persistence_error(path, e))?;
    let mut value: serde_json::Value =
        serde_json::from_str(&content).map_err(|e| persistence_error(path, e))?;
    if let Some(map) = value.as_object_mut() {
        map.insert(
            "final_path".to_string(),
            serde_json::Value::String(final_path.display().to_string()),
        );
    }
    let content = serde_json::to_string_pretty(&value).map_err(|e| persistence_error(path, e))?;
    tokio::fs::write(path, content)
        .await
        .map_err(|e| persistence_error(path, e))
}

/// Files that earlier runs renamed sources to, as recorded in `final_path`.
///
/// A rerun finds these files under their new names; they are skipped like
/// sources with an artifact.
#[derive(Debug, Default)]
pub struct RenamedTargets {
    paths: HashSet<PathBuf>,
}

impl RenamedTargets {
    pub fn load(temp_dir: &Path) -> Self {
        let paths = list_artifacts(temp_dir)
            .iter()
            .filter_map(|p| match read_artifact(p) {
                Ok(artifact) => artifact.final_path,
                Err(e) => {
                    debug!("ignoring {}", e);
                    None
                }
            })
            .map(|p| path_key(&p))
            .collect();
        Self { paths }
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(&path_key(path))
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

fn path_key(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

fn persistence_error(path: &Path, reason: impl ToString) -> PersistenceError {
    PersistenceError {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

pub async fn write_json(path: &Path, artifact: &ArtifactRecord<'_>) -> Result<(), PersistenceError> {
    let content = serde_json::to_string_pretty(artifact).map_err(|e| persistence_error(path, e))?;
    tokio::fs::write(path, content)
        .await
        .map_err(|e| persistence_error(path, e))?;
    debug!("wrote {}", path.display());
    Ok(())
}

pub async fn write_text(path: &Path, text: &str) -> Result<(), PersistenceError> {
    tokio::fs::write(path, text)
        .await
        .map_err(|e| persistence_error(path, e))?;
    debug!("wrote {}", path.display());
    Ok(())
}

/// Remove the working directory if nothing was left in it.
pub fn remove_if_empty(dir: &Path) {
    let empty = match std::fs::read_dir(dir) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => return,
    };
    if !empty {
        return;
    }
    match std::fs::remove_dir(dir) {
        Ok(()) => debug!("Removed empty temp directory: {}", dir.display()),
        Err(e) => warn!("Failed to clean up temp directory {}: {}", dir.display(), e),
    }
}

/// Write one CSV row per file.
pub fn write_summary_csv(path: &Path, summary: &BatchSummary) -> Result<(), PersistenceError> {
    let mut wtr = csv::Writer::from_path(path).map_err(|e| persistence_error(path, e))?;

    let mut header = vec!["filename", "status", "final_path"];
    header.extend(FieldName::ALL.iter().map(|f| f.as_str()));
    header.extend(["missing_fields", "error"]);
    wtr.write_record(&header).map_err(|e| persistence_error(path, e))?;

    for outcome in &summary.outcomes {
        let filename = outcome
            .source()
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let final_path = outcome
            .final_path()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let missing = outcome
            .missing_fields()
            .iter()
            .map(|f| f.as_str())
            .collect::<Vec<_>>()
            .join(";");

        let mut row = vec![filename, outcome.status().to_string(), final_path];
        match outcome {
            super::FileOutcome::Processed { record, .. } => {
                row.extend(FieldName::ALL.iter().map(|f| record.display_field(*f)));
            }
            _ => row.extend(FieldName::ALL.iter().map(|_| String::new())),
        }
        row.push(missing);
        row.push(outcome.reason().unwrap_or("").to_string());

        wtr.write_record(&row).map_err(|e| persistence_error(path, e))?;
    }

    wtr.flush().map_err(|e| persistence_error(path, e))?;
    debug!("wrote summary {}", path.display());
    Ok(())
}
