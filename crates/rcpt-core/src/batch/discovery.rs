//! Input file discovery.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::InputError;

/// Extensions always accepted.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "jpg", "jpeg", "png"];

/// Extensions accepted when TIFF input is enabled.
pub const TIFF_EXTENSIONS: &[&str] = &["tif", "tiff"];

/// Lower-cased extension of `path` if it is a supported input.
pub fn supported_extension(path: &Path, include_tiff: bool) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let supported = SUPPORTED_EXTENSIONS.contains(&ext.as_str())
        || (include_tiff && TIFF_EXTENSIONS.contains(&ext.as_str()));
    supported.then_some(ext)
}

/// List supported files directly inside `dir`, sorted by path.
///
/// Hidden entries, subdirectories (including the working directory named
/// `temp_dir_name`) and unsupported extensions are skipped.
pub fn discover_files(dir: &Path, temp_dir_name: &str, include_tiff: bool) -> Result<Vec<PathBuf>, InputError> {
    if !dir.exists() {
        return Err(InputError::NotFound(dir.to_path_buf()));
    }
    if !dir.is_dir() {
        return Err(InputError::NotADirectory(dir.to_path_buf()));
    }

    let entries = fs::read_dir(dir).map_err(|source| InputError::Unreadable {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();

        if name.starts_with('.') || name == temp_dir_name {
            trace!("skipping {}", name);
            continue;
        }
        if !path.is_file() {
            continue;
        }
        if supported_extension(&path, include_tiff).is_some() {
            files.push(path);
        }
    }

    files.sort();
    debug!("found {} supported files in {}", files.len(), dir.display());
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_discovery_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.PDF", "a.jpg", "c.png", "d.tiff", "notes.txt", ".hidden.pdf"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("temp_ocr_processing")).unwrap();
        fs::write(dir.path().join("temp_ocr_processing/e.pdf"), b"x").unwrap();

        let names = |files: Vec<PathBuf>| -> Vec<String> {
            files
                .iter()
                .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
                .collect()
        };

        let files = discover_files(dir.path(), "temp_ocr_processing", false).unwrap();
        assert_eq!(names(files), vec!["a.jpg", "b.PDF", "c.png"]);

        let files = discover_files(dir.path(), "temp_ocr_processing", true).unwrap();
        assert_eq!(names(files), vec!["a.jpg", "b.PDF", "c.png", "d.tiff"]);
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            discover_files(&missing, "tmp", true),
            Err(InputError::NotFound(_))
        ));

        let file = dir.path().join("file.pdf");
        fs::write(&file, b"x").unwrap();
        assert!(matches!(
            discover_files(&file, "tmp", true),
            Err(InputError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_supported_extension() {
        assert_eq!(supported_extension(Path::new("x.JPEG"), false).as_deref(), Some("jpeg"));
        assert_eq!(supported_extension(Path::new("x.tif"), false), None);
        assert_eq!(supported_extension(Path::new("x.tif"), true).as_deref(), Some("tif"));
        assert_eq!(supported_extension(Path::new("README"), true), None);
    }
}
