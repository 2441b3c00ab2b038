//! Local filesystem backend.

use super::{ensure_within, ObjectStore, StorageLocation};
use crate::error::StorageError;
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Reads and writes `file://` locations, optionally relative to a root.
#[derive(Debug, Clone, Default)]
pub struct LocalStore {
    root: Option<PathBuf>,
}

impl LocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative paths against `root` instead of the working directory.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, location: &StorageLocation) -> Result<PathBuf, StorageError> {
        let path = location.as_path().ok_or_else(|| StorageError::Unsupported {
            scheme: location.scheme().to_string(),
        })?;
        Ok(match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        })
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn get(&self, location: &StorageLocation) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(location)?;
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| StorageError::from_io(location.to_string(), e))?;
        debug!(path = %path.display(), bytes = bytes.len(), "Read local object");
        Ok(bytes)
    }

    async fn get_bounded(
        &self,
        location: &StorageLocation,
        max_bytes: u64,
    ) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(location)?;
        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|e| StorageError::from_io(location.to_string(), e))?;
        ensure_within(location, meta.len(), max_bytes)?;
        let bytes = self.get(location).await?;
        // The file may have grown between the two calls.
        ensure_within(location, bytes.len() as u64, max_bytes)?;
        Ok(bytes)
    }

    async fn put(
        &self,
        location: &StorageLocation,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        let path = self.resolve(location)?;
        let loc = location.to_string();
        let len = bytes.len();
        tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
            .await
            .map_err(|e| StorageError::Transient {
                location: loc.clone(),
                detail: format!("write task failed: {e}"),
            })?
            .map_err(|e| StorageError::from_io(loc.clone(), e))?;
        debug!(location = %loc, bytes = len, "Wrote local object");
        Ok(())
    }
}

/// Write to a temp file in the destination directory, then rename over the
/// target. Readers never observe a partial file.
fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
