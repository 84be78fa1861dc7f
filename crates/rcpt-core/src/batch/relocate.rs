//! Moving and copying finished files.

use std::io;
use std::path::Path;

use tracing::{debug, warn};

/// Rename `from` to `to`, falling back to copy and delete when a plain
/// rename fails (e.g. across filesystems).
pub async fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match tokio::fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            debug!(
                "rename {} -> {} failed ({}), trying copy",
                from.display(),
                to.display(),
                rename_err
            );
            if let Err(copy_err) = tokio::fs::copy(from, to).await {
                warn!("copy fallback failed: {}", copy_err);
                return Err(rename_err);
            }
            tokio::fs::remove_file(from).await
        }
    }
}

/// Write `bytes` to `to` and remove `original`.
///
/// Used when the artifact of record is a PDF converted from an image, so
/// the image never survives next to its renamed PDF.
pub async fn replace_with(original: &Path, to: &Path, bytes: &[u8]) -> io::Result<()> {
    tokio::fs::write(to, bytes).await?;
    if let Err(e) = tokio::fs::remove_file(original).await {
        let _ = tokio::fs::remove_file(to).await;
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_move_file() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("a.pdf");
        let to = dir.path().join("b.pdf");
        std::fs::write(&from, b"data").unwrap();

        move_file(&from, &to).await.unwrap();
        assert!(!from.exists());
        assert_eq!(std::fs::read(&to).unwrap(), b"data");
    }

    #[tokio::test]
    async fn test_move_missing_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = move_file(&dir.path().join("none.pdf"), &dir.path().join("b.pdf")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_replace_with_removes_original() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("scan.jpg");
        let pdf = dir.path().join("230516_Cafe.pdf");
        std::fs::write(&image, b"jpeg").unwrap();

        replace_with(&image, &pdf, b"%PDF").await.unwrap();
        assert!(!image.exists());
        assert_eq!(std::fs::read(&pdf).unwrap(), b"%PDF");
    }
}
