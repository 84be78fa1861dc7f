//! Deterministic filename derivation from normalized receipt fields.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::models::receipt::{NA, NormalizedRecord};

/// Builds `{date6}_{place}_{amount}_{currency}.{ext}` filenames.
#[derive(Debug, Clone)]
pub struct FilenameBuilder {
    extension: String,
}

impl FilenameBuilder {
    /// Builder producing `.pdf` names.
    pub fn new() -> Self {
        Self {
            extension: "pdf".to_string(),
        }
    }

    /// Use another extension (given with or without the leading dot).
    pub fn with_extension(mut self, extension: &str) -> Self {
        let ext = extension.trim_start_matches('.');
        if !ext.is_empty() {
            self.extension = ext.to_ascii_lowercase();
        }
        self
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Ordered filename segments before joining.
    ///
    /// A missing date is written as `NA`; a missing place is omitted; the
    /// amount is followed by its currency only when both are known.
    pub fn parts(&self, record: &NormalizedRecord) -> Vec<String> {
        let mut parts = Vec::with_capacity(4);

        match &record.date {
            Some(date) => parts.push(date.filename_view().to_string()),
            None => parts.push(NA.to_string()),
        }

        if let Some(place) = &record.place {
            parts.push(place.clone());
        }

        match (&record.amount, &record.currency) {
            (Some(amount), Some(currency)) => parts.push(format!("{}_{}", amount, currency)),
            (Some(amount), None) => parts.push(amount.to_string()),
            _ => {}
        }

        parts
    }

    /// Build the filename. Never empty: with nothing usable it falls back to
    /// `{original_stem}_receipt.{ext}`.
    pub fn build(&self, record: &NormalizedRecord, original_stem: &str) -> String {
        let parts = self.parts(record);

        let name = if parts.iter().any(|p| p != NA) {
            format!("{}.{}", parts.join("_"), self.extension)
        } else {
            let stem = if original_stem.is_empty() { "document" } else { original_stem };
            format!("{}_receipt.{}", stem, self.extension)
        };

        debug!("built filename {}", name);
        name
    }
}

impl Default for FilenameBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Pick a free name for `file_name`, appending `_1`, `_2`, … before the extension.
///
/// `taken` reports whether a candidate is already used by another file.
/// With N taken names sharing the stem this returns after at most N+1 probes.
pub fn disambiguate<F>(file_name: &str, mut taken: F) -> String
where
    F: FnMut(&str) -> bool,
{
    if !taken(file_name) {
        return file_name.to_string();
    }

    let (stem, ext) = match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (file_name, None),
    };

    let mut n = 1usize;
    loop {
        let candidate = match ext {
            Some(ext) => format!("{}_{}.{}", stem, n, ext),
            None => format!("{}_{}", stem, n),
        };
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Resolve `file_name` inside `dir` against existing files.
///
/// A candidate that already is `source` (the file being renamed) counts as
/// free, so re-running on an already-named file keeps its name.
pub fn resolve_collision(dir: &Path, file_name: &str, source: Option<&Path>) -> PathBuf {
    let source = source.and_then(|s| s.canonicalize().ok());

    let name = disambiguate(file_name, |candidate| {
        let path = dir.join(candidate);
        if !path.exists() {
            return false;
        }
        match (&source, path.canonicalize().ok()) {
            (Some(src), Some(existing)) => *src != existing,
            _ => true,
        }
    });

    if name != file_name {
        debug!("{} exists in {}, using {}", file_name, dir.display(), name);
    }

    dir.join(name)
}
