//! Atomic file output.
//!
//! Every file the library produces (exported figures, cached catalog
//! resources, CSV tables, records JSON) goes through these helpers: bytes
//! are written to a temporary file in the destination directory and then
//! renamed over the target, so readers only ever see the previous complete
//! file or the new complete file.

use crate::error::ScienceHelperError;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

fn write_failed(path: &Path) -> impl Fn(std::io::Error) -> ScienceHelperError + '_ {
    move |source| ScienceHelperError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Write `bytes` to `path` atomically, creating parent directories.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ScienceHelperError> {
    let dir = parent_dir(path);
    std::fs::create_dir_all(&dir).map_err(write_failed(path))?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(write_failed(path))?;
    tmp.write_all(bytes).map_err(write_failed(path))?;
    tmp.as_file().sync_all().map_err(write_failed(path))?;
    // On error the temp file is removed when `PersistError` is dropped.
    tmp.persist(path).map_err(|e| write_failed(path)(e.error))?;

    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

/// Async variant of [`write_atomic`] for use inside the retrieval pipeline.
pub async fn write_atomic_async(path: &Path, bytes: Vec<u8>) -> Result<(), ScienceHelperError> {
    let target = path.to_path_buf();
    tokio::task::spawn_blocking(move || write_atomic(&target, &bytes))
        .await
        .map_err(|e| ScienceHelperError::Internal(format!("Write task panicked: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_parents_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/out.txt");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"second");

        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();
        assert_eq!(leftovers.len(), 1, "temp files must not remain");
    }

    #[test]
    fn failure_is_output_write_failed() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        // a regular file cannot be used as a directory
        let err = write_atomic(&blocker.join("out.png"), b"data").unwrap_err();
        assert!(matches!(err, ScienceHelperError::OutputWriteFailed { .. }));
    }

    #[tokio::test]
    async fn async_variant_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.bin");
        write_atomic_async(&path, vec![1, 2, 3]).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), [1, 2, 3]);
    }
}
