//! In-process backend for `mem://` locations. Used by tests and embedders
//! that already hold the PDF bytes.

use super::{ObjectStore, StorageLocation};
use crate::error::StorageError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone)]
struct Object {
    bytes: Vec<u8>,
    content_type: String,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, Object>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object directly.
    pub fn insert(&self, location: &StorageLocation, bytes: impl Into<Vec<u8>>) {
        self.lock().insert(
            location.to_string(),
            Object {
                bytes: bytes.into(),
                content_type: "application/octet-stream".into(),
            },
        );
    }

    pub fn object(&self, location: &StorageLocation) -> Option<Vec<u8>> {
        self.lock().get(&location.to_string()).map(|o| o.bytes.clone())
    }

    pub fn content_type(&self, location: &StorageLocation) -> Option<String> {
        self.lock()
            .get(&location.to_string())
            .map(|o| o.content_type.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Object>> {
        // A poisoned map still holds consistent entries; keep serving it.
        self.objects.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, location: &StorageLocation) -> Result<Vec<u8>, StorageError> {
        self.object(location).ok_or_else(|| StorageError::NotFound {
            location: location.to_string(),
        })
    }

    async fn put(
        &self,
        location: &StorageLocation,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.lock().insert(
            location.to_string(),
            Object {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seeded_objects_are_readable() {
        let store = MemoryStore::new();
        let loc = StorageLocation::parse("mem://in/a.pdf").unwrap();
        assert!(store.is_empty());
        store.insert(&loc, b"%PDF-1.7".to_vec());
        assert_eq!(store.get(&loc).await.unwrap(), b"%PDF-1.7");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn missing_object_is_not_found() {
        let store = MemoryStore::new();
        let loc = StorageLocation::parse("mem://in/none.pdf").unwrap();
        assert!(matches!(
            tokio_test::block_on(store.get(&loc)),
            Err(StorageError::NotFound { .. })
        ));
    }

    #[test]
    fn put_overwrites_and_records_content_type() {
        let store = MemoryStore::new();
        let loc = StorageLocation::parse("mem://out/a.md").unwrap();
        tokio_test::block_on(store.put(&loc, b"one".to_vec(), "text/plain")).unwrap();
        tokio_test::block_on(store.put(&loc, b"two".to_vec(), "text/markdown")).unwrap();
        assert_eq!(store.object(&loc).unwrap(), b"two");
        assert_eq!(store.content_type(&loc).as_deref(), Some("text/markdown"));
        assert_eq!(store.len(), 1);
    }
}
