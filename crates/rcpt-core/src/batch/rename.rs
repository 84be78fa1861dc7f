//! Renaming from JSON artifacts left by earlier runs, without calling a provider.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::artifacts::{StoredArtifact, file_stem, list_artifacts, read_artifact, set_final_path};
use super::outcome::{BatchSummary, FileOutcome};
use super::processor::{failed, log_summary};
use super::relocate::move_file;
use crate::error::{InputError, Result};
use crate::filename::{FilenameBuilder, resolve_collision};
use crate::models::config::BatchConfig;

/// Apply every artifact in `dir`'s working directory to its source file.
///
/// Each artifact's fields are turned back into a filename, and the source is
/// renamed (or copied into `output_dir`). The artifact's `final_path` is
/// updated so later runs skip the renamed file. Artifacts whose recorded
/// target already exists are skipped.
pub async fn rename_from_artifacts(dir: &Path, config: &BatchConfig) -> Result<BatchSummary> {
    if !dir.exists() {
        return Err(InputError::NotFound(dir.to_path_buf()).into());
    }
    if !dir.is_dir() {
        return Err(InputError::NotADirectory(dir.to_path_buf()).into());
    }

    let temp_dir = dir.join(&config.temp_dir_name);
    let artifacts = list_artifacts(&temp_dir);
    info!("Found {} JSON files in {}", artifacts.len(), temp_dir.display());

    if let Some(output_dir) = &config.output_dir {
        tokio::fs::create_dir_all(output_dir).await?;
    }

    let mut summary = BatchSummary::new(artifacts.len());
    for json in &artifacts {
        let outcome = match read_artifact(json) {
            Ok(stored) => rename_one(dir, json, stored, config).await,
            Err(e) => failed(json, e),
        };
        summary.record(outcome);
    }

    log_summary(&summary);
    Ok(summary)
}

/// The recorded source, or a file of the same name in `dir` when the
/// recorded path no longer resolves (e.g. a relative path from another cwd).
fn locate_source(dir: &Path, recorded: &Path) -> Option<PathBuf> {
    if recorded.is_file() {
        return Some(recorded.to_path_buf());
    }
    let local = dir.join(recorded.file_name()?);
    local.is_file().then_some(local)
}

async fn rename_one(dir: &Path, json: &Path, stored: StoredArtifact, config: &BatchConfig) -> FileOutcome {
    if let Some(done) = stored.final_path.as_deref().filter(|p| p.exists()) {
        info!("Skipping {}: already renamed to {}", stored.source.display(), done.display());
        return FileOutcome::Skipped {
            source: stored.source.clone(),
            reason: "already renamed".to_string(),
        };
    }

    let Some(source) = locate_source(dir, &stored.source) else {
        warn!("No matching file found for {}", json.display());
        return failed(&stored.source, "source file not found");
    };

    let record = stored.record();
    let extension = source
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "pdf".to_string());
    let file_name = FilenameBuilder::new()
        .with_extension(&extension)
        .build(&record, &file_stem(&source));

    let target_dir = match &config.output_dir {
        Some(out) => out.clone(),
        None => source.parent().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf()),
    };
    let target = resolve_collision(&target_dir, &file_name, Some(&source));

    if target != source {
        let moved = match config.output_dir {
            Some(_) => tokio::fs::copy(&source, &target).await.map(|_| ()),
            None => move_file(&source, &target).await,
        };
        if let Err(e) = moved {
            return failed(&source, format!("failed to move to {}: {}", target.display(), e));
        }
        info!("Renamed {} -> {}", source.display(), target.display());
    }

    if let Err(e) = set_final_path(json, &target).await {
        warn!("{}", e);
    }

    FileOutcome::Processed {
        source,
        final_path: Some(target),
        record,
    }
}
