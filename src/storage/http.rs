//! Read-only HTTP(S) backend for public source URLs.

use super::{ensure_within, ObjectStore, StorageLocation};
use crate::error::StorageError;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::info;

/// Default request timeout for source downloads.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct HttpStore {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpStore {
    pub fn new(timeout: Duration) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StorageError::Transient {
                location: "http".into(),
                detail: format!("could not build HTTP client: {e}"),
            })?;
        Ok(Self { client, timeout })
    }

    /// Wrap a caller-configured client (proxies, TLS roots). `timeout` is
    /// only used in error messages; the client's own timeout applies.
    pub fn with_client(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// GET the URL. With a limit, a declared `Content-Length` above it fails
    /// before the body is read, and the body is read chunk by chunk so an
    /// undeclared oversized body stops at the first chunk past the limit.
    async fn download(
        &self,
        location: &StorageLocation,
        max_bytes: Option<u64>,
    ) -> Result<Vec<u8>, StorageError> {
        let StorageLocation::Http(url) = location else {
            return Err(StorageError::Unsupported {
                scheme: location.scheme().to_string(),
            });
        };
        info!(url = %url, "Downloading source");

        let transport = |e: reqwest::Error| {
            let detail = if e.is_timeout() {
                format!("timed out after {}s", self.timeout.as_secs())
            } else {
                e.to_string()
            };
            StorageError::Transient {
                location: url.clone(),
                detail,
            }
        };

        let mut response = self.client.get(url).send().await.map_err(transport)?;
        if !response.status().is_success() {
            return Err(status_error(url, response.status()));
        }

        let Some(limit) = max_bytes else {
            let bytes = response.bytes().await.map_err(transport)?;
            return Ok(bytes.to_vec());
        };
        if let Some(declared) = response.content_length() {
            ensure_within(location, declared, limit)?;
        }
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(transport)? {
            ensure_within(location, (body.len() + chunk.len()) as u64, limit)?;
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

fn status_error(location: &str, status: StatusCode) -> StorageError {
    let location = location.to_string();
    match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => StorageError::NotFound { location },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StorageError::AccessDenied {
            location,
            detail: format!("HTTP {status}"),
        },
        _ => StorageError::Transient {
            location,
            detail: format!("HTTP {status}"),
        },
    }
}

#[async_trait]
impl ObjectStore for HttpStore {
    fn name(&self) -> &str {
        "http"
    }

    async fn get(&self, location: &StorageLocation) -> Result<Vec<u8>, StorageError> {
        self.download(location, None).await
    }

    async fn get_bounded(
        &self,
        location: &StorageLocation,
        max_bytes: u64,
    ) -> Result<Vec<u8>, StorageError> {
        self.download(location, Some(max_bytes)).await
    }

    async fn put(
        &self,
        location: &StorageLocation,
        _bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        Err(StorageError::ReadOnly {
            location: location.to_string(),
        })
    }
}
