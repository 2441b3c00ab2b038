//! Object storage: where source documents come from and artefacts go.
//!
//! ```text
//!   s3://bucket/key      → S3Store     (feature `s3`)
//!   mem://bucket/key     → MemoryStore
//!   http(s)://host/path  → HttpStore   (read-only)
//!   /path, file:///path  → LocalStore
//! ```
//!
//! [`StoreRouter`] dispatches a [`StorageLocation`] to the backend registered
//! for its scheme, so the orchestrator only ever sees one [`ObjectStore`].

mod http;
mod local;
mod memory;
#[cfg(feature = "s3")]
mod s3;

pub use http::{HttpStore, DEFAULT_HTTP_TIMEOUT};
pub use local::LocalStore;
pub use memory::MemoryStore;
#[cfg(feature = "s3")]
pub use s3::{S3Config, S3Store};

use crate::error::{Doc2MdError, StorageError};
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Longest object key accepted (S3's own limit).
pub const MAX_KEY_LEN: usize = 1024;

pub const CONTENT_TYPE_MARKDOWN: &str = "text/markdown; charset=utf-8";
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// A parsed, validated storage address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StorageLocation {
    File(PathBuf),
    Http(String),
    S3 { bucket: String, key: String },
    Memory { bucket: String, key: String },
}

impl StorageLocation {
    pub fn parse(raw: &str) -> Result<Self, Doc2MdError> {
        let invalid = |reason: &str| Doc2MdError::InvalidLocation {
            location: raw.to_string(),
            reason: reason.to_string(),
        };
        let raw_trimmed = raw.trim();
        if raw_trimmed.is_empty() {
            return Err(invalid("location is empty"));
        }

        if let Some(rest) = raw_trimmed.strip_prefix("s3://") {
            let (bucket, key) = split_bucket_key(rest).map_err(|r| invalid(&r))?;
            return Ok(Self::S3 { bucket, key });
        }
        if let Some(rest) = raw_trimmed.strip_prefix("mem://") {
            let (bucket, key) = split_bucket_key(rest).map_err(|r| invalid(&r))?;
            return Ok(Self::Memory { bucket, key });
        }
        if let Some(rest) = raw_trimmed
            .strip_prefix("http://")
            .or_else(|| raw_trimmed.strip_prefix("https://"))
        {
            let host = rest.split('/').next().unwrap_or_default();
            if host.is_empty() {
                return Err(invalid("URL has no host"));
            }
            return Ok(Self::Http(raw_trimmed.to_string()));
        }
        if let Some((scheme, _)) = raw_trimmed.split_once("://") {
            if scheme != "file" {
                return Err(invalid(&format!("unsupported scheme '{scheme}'")));
            }
        }

        let path = raw_trimmed.strip_prefix("file://").unwrap_or(raw_trimmed);
        if path.is_empty() || path.ends_with('/') {
            return Err(invalid("path does not name a file"));
        }
        Ok(Self::File(PathBuf::from(path)))
    }

    pub fn scheme(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::Http(url) if url.starts_with("https://") => "https",
            Self::Http(_) => "http",
            Self::S3 { .. } => "s3",
            Self::Memory { .. } => "mem",
        }
    }

    /// HTTP sources cannot receive artefacts.
    pub fn is_writable(&self) -> bool {
        !matches!(self, Self::Http(_))
    }

    /// File name without directories (the last key segment).
    pub fn file_name(&self) -> &str {
        let full: &str = match self {
            Self::File(p) => return p.file_name().and_then(|n| n.to_str()).unwrap_or_default(),
            Self::Http(url) => url.split(['?', '#']).next().unwrap_or(url),
            Self::S3 { key, .. } | Self::Memory { key, .. } => key,
        };
        full.rsplit('/').next().unwrap_or(full)
    }

    /// File name with its extension removed.
    pub fn stem(&self) -> &str {
        let name = self.file_name();
        match name.rfind('.') {
            Some(0) | None => name,
            Some(i) => &name[..i],
        }
    }

    /// Same location with the file extension replaced by `ext` (e.g. `.md`).
    /// A name without an extension gets `ext` appended.
    pub fn with_extension(&self, ext: &str) -> Result<Self, Doc2MdError> {
        let swap = |s: &str| -> String {
            let name_start = s.rfind('/').map(|i| i + 1).unwrap_or(0);
            let name = &s[name_start..];
            match name.rfind('.') {
                Some(i) if i > 0 => format!("{}{ext}", &s[..name_start + i]),
                _ => format!("{s}{ext}"),
            }
        };
        match self {
            Self::File(p) => {
                let s = p.to_string_lossy();
                Ok(Self::File(PathBuf::from(swap(&*s))))
            }
            Self::Http(url) => Self::parse(&swap(url.as_str())),
            Self::S3 { bucket, key } => {
                let key = swap(key.as_str());
                validate_key(&key).map_err(|reason| Doc2MdError::InvalidLocation {
                    location: format!("s3://{bucket}/{key}"),
                    reason,
                })?;
                Ok(Self::S3 {
                    bucket: bucket.clone(),
                    key,
                })
            }
            Self::Memory { bucket, key } => {
                let key = swap(key.as_str());
                validate_key(&key).map_err(|reason| Doc2MdError::InvalidLocation {
                    location: format!("mem://{bucket}/{key}"),
                    reason,
                })?;
                Ok(Self::Memory {
                    bucket: bucket.clone(),
                    key,
                })
            }
        }
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Self::File(p) => Some(p),
            _ => None,
        }
    }
}

impl fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(p) => write!(f, "{}", p.display()),
            Self::Http(url) => f.write_str(url),
            Self::S3 { bucket, key } => write!(f, "s3://{bucket}/{key}"),
            Self::Memory { bucket, key } => write!(f, "mem://{bucket}/{key}"),
        }
    }
}

fn split_bucket_key(rest: &str) -> Result<(String, String), String> {
    let (bucket, key) = rest
        .split_once('/')
        .ok_or_else(|| "expected <bucket>/<key>".to_string())?;
    if bucket.is_empty() {
        return Err("bucket name is empty".into());
    }
    validate_key(key)?;
    Ok((bucket.to_string(), key.to_string()))
}

/// Object keys must be non-empty, at most [`MAX_KEY_LEN`] characters, free of
/// `//`, and neither start nor end with `/`.
pub fn validate_key(key: &str) -> Result<(), String> {
    if key.is_empty() {
        return Err("key is empty".into());
    }
    if key.chars().count() > MAX_KEY_LEN {
        return Err(format!("key is longer than {MAX_KEY_LEN} characters"));
    }
    if key.contains("//") {
        return Err("key contains '//'".into());
    }
    if key.starts_with('/') || key.ends_with('/') {
        return Err("key starts or ends with '/'".into());
    }
    Ok(())
}

/// Minimal get/put contract every backend implements.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    async fn get(&self, location: &StorageLocation) -> Result<Vec<u8>, StorageError>;

    /// Like [`get`](Self::get), but fails with [`StorageError::TooLarge`]
    /// when the object holds more than `max_bytes`. Backends that learn the
    /// size before reading the body override this so an oversized object is
    /// never buffered.
    async fn get_bounded(
        &self,
        location: &StorageLocation,
        max_bytes: u64,
    ) -> Result<Vec<u8>, StorageError> {
        let bytes = self.get(location).await?;
        ensure_within(location, bytes.len() as u64, max_bytes)?;
        Ok(bytes)
    }

    async fn put(
        &self,
        location: &StorageLocation,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError>;
}

/// `Err(TooLarge)` when `size` exceeds `max_bytes`.
pub(crate) fn ensure_within(
    location: &StorageLocation,
    size: u64,
    max_bytes: u64,
) -> Result<(), StorageError> {
    if size > max_bytes {
        return Err(StorageError::TooLarge {
            location: location.to_string(),
            limit: max_bytes,
        });
    }
    Ok(())
}

/// Dispatches each location to the backend registered for its scheme.
#[derive(Default, Clone)]
pub struct StoreRouter {
    file: Option<Arc<dyn ObjectStore>>,
    http: Option<Arc<dyn ObjectStore>>,
    s3: Option<Arc<dyn ObjectStore>>,
    memory: Option<Arc<dyn ObjectStore>>,
}

impl fmt::Debug for StoreRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = |s: &Option<Arc<dyn ObjectStore>>| s.as_ref().map(|s| s.name().to_string());
        f.debug_struct("StoreRouter")
            .field("file", &name(&self.file))
            .field("http", &name(&self.http))
            .field("s3", &name(&self.s3))
            .field("memory", &name(&self.memory))
            .finish()
    }
}

impl StoreRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.file = Some(store);
        self
    }

    pub fn with_http(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.http = Some(store);
        self
    }

    pub fn with_s3(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.s3 = Some(store);
        self
    }

    pub fn with_memory(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.memory = Some(store);
        self
    }

    fn backend(&self, location: &StorageLocation) -> Result<&Arc<dyn ObjectStore>, StorageError> {
        let slot = match location {
            StorageLocation::File(_) => &self.file,
            StorageLocation::Http(_) => &self.http,
            StorageLocation::S3 { .. } => &self.s3,
            StorageLocation::Memory { .. } => &self.memory,
        };
        slot.as_ref().ok_or_else(|| StorageError::Unsupported {
            scheme: location.scheme().to_string(),
        })
    }
}

#[async_trait]
impl ObjectStore for StoreRouter {
    fn name(&self) -> &str {
        "router"
    }

    async fn get(&self, location: &StorageLocation) -> Result<Vec<u8>, StorageError> {
        self.backend(location)?.get(location).await
    }

    async fn get_bounded(
        &self,
        location: &StorageLocation,
        max_bytes: u64,
    ) -> Result<Vec<u8>, StorageError> {
        self.backend(location)?.get_bounded(location, max_bytes).await
    }

    async fn put(
        &self,
        location: &StorageLocation,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.backend(location)?.put(location, bytes, content_type).await
    }
}
