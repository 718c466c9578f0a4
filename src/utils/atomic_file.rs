//! Write-temp-then-rename helper shared by every on-disk store (album-year
//! cache, API-response cache, generic cache, pending-verification store).
//!
//! A write failure leaves the previously persisted file untouched: we only
//! ever rename over the destination once the temp file is fully flushed.

use std::io;
use std::path::Path;

/// Writes `contents` to a sibling temp file in `path`'s directory, then
/// renames it over `path`. The rename is atomic on the same filesystem,
/// which every caller here satisfies by placing the temp file alongside the
/// target.
pub async fn write_atomic(path: &Path, contents: &str) -> io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    tokio::fs::create_dir_all(dir).await?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "tmp".to_string());
    let tmp_path = dir.join(format!(".{file_name}.tmp"));

    tokio::fs::write(&tmp_path, contents).await?;
    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}

/// Reads `path` if it exists; returns `Ok(None)` (not an error) when the file
/// is simply absent, since "nothing persisted yet" is a normal cold-start
/// state for every store in this crate.
pub async fn read_if_exists(path: &Path) -> io::Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => Ok(Some(contents)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn write_then_read_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.csv");

        write_atomic(&path, "artist,album\n").await.unwrap();
        let contents = read_if_exists(&path).await.unwrap();
        assert_eq!(contents.as_deref(), Some("artist,album\n"));
    }

    #[tokio::test]
    async fn missing_file_is_none_not_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.csv");
        assert!(read_if_exists(&path).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn previous_version_survives_a_failed_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.csv");
        write_atomic(&path, "v1").await.unwrap();

        // Simulate a crash mid-write: the temp file is left behind, but the
        // destination must still hold the last fully written version.
        let tmp_path = dir.path().join(".store.csv.tmp");
        tokio::fs::write(&tmp_path, "partial").await.unwrap();

        let contents = read_if_exists(&path).await.unwrap();
        assert_eq!(contents.as_deref(), Some("v1"));
    }
}
