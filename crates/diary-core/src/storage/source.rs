//! Resolution of local image references to bytes.

use std::path::PathBuf;

use crate::{Error, Result};

/// Read the bytes behind a local source reference.
///
/// Accepts plain filesystem paths and `file://` URIs. Any failure to
/// resolve the reference is reported as [`Error::SourceUnavailable`].
pub async fn read_local_source(local_source: &str) -> Result<Vec<u8>> {
    let path = source_path(local_source)?;
    tokio::fs::read(&path).await.map_err(|error| {
        Error::SourceUnavailable(format!("{}: {error}", path.display()))
    })
}

fn source_path(local_source: &str) -> Result<PathBuf> {
    let trimmed = local_source.trim();
    let path = trimmed.strip_prefix("file://").unwrap_or(trimmed);
    if path.is_empty() {
        return Err(Error::SourceUnavailable(
            "local source reference is empty".to_string(),
        ));
    }
    Ok(PathBuf::from(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test(flavor = "multi_thread")]
    async fn reads_plain_paths_and_file_uris() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("photo.jpg");
        std::fs::write(&path, b"jpeg").unwrap();

        let plain = read_local_source(path.to_str().unwrap()).await.unwrap();
        let uri = read_local_source(&format!("file://{}", path.display()))
            .await
            .unwrap();

        assert_eq!(plain, b"jpeg");
        assert_eq!(uri, b"jpeg");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_file_is_source_unavailable() {
        let tmp = tempdir().unwrap();
        let missing = tmp.path().join("gone.jpg");

        let err = read_local_source(missing.to_str().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SourceUnavailable(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn empty_reference_is_source_unavailable() {
        let err = read_local_source("  ").await.unwrap_err();
        assert!(matches!(err, Error::SourceUnavailable(_)));
    }
}
