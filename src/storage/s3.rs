//! S3 / S3-compatible (MinIO) backend for `s3://bucket/key` locations.

use super::{ensure_within, ObjectStore, StorageLocation};
use crate::error::StorageError;
use async_trait::async_trait;
use aws_sdk_s3::{
    config::{Credentials, Region},
    primitives::ByteStream,
    Client,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Connection settings. Bucket names come from each location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    pub region: String,
    /// Custom endpoint for MinIO and friends; `None` targets AWS.
    pub endpoint: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            region: std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            endpoint: std::env::var("DOC2MD_S3_ENDPOINT").ok(),
            access_key_id: std::env::var("AWS_ACCESS_KEY_ID").unwrap_or_default(),
            secret_access_key: std::env::var("AWS_SECRET_ACCESS_KEY").unwrap_or_default(),
        }
    }
}

pub struct S3Store {
    client: Client,
}

impl std::fmt::Debug for S3Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Store").finish_non_exhaustive()
    }
}

impl S3Store {
    pub fn new(config: S3Config) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "doc2md",
        );

        let mut builder = aws_sdk_s3::Config::builder()
            .credentials_provider(credentials)
            .region(Region::new(config.region))
            .behavior_version_latest();

        if let Some(endpoint) = config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            client: Client::from_conf(builder.build()),
        }
    }

    fn parts(location: &StorageLocation) -> Result<(&str, &str), StorageError> {
        match location {
            StorageLocation::S3 { bucket, key } => Ok((bucket, key)),
            other => Err(StorageError::Unsupported {
                scheme: other.scheme().to_string(),
            }),
        }
    }

    /// GetObject, refusing the body when the reported length exceeds `max_bytes`.
    async fn fetch(
        &self,
        location: &StorageLocation,
        max_bytes: Option<u64>,
    ) -> Result<Vec<u8>, StorageError> {
        let (bucket, key) = Self::parts(location)?;
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    StorageError::NotFound {
                        location: location.to_string(),
                    }
                } else {
                    classify(location, format!("{e:?}"))
                }
            })?;

        if let (Some(limit), Some(len)) = (max_bytes, response.content_length()) {
            ensure_within(location, u64::try_from(len).unwrap_or(0), limit)?;
        }
        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| classify(location, e.to_string()))?
            .into_bytes();
        if let Some(limit) = max_bytes {
            ensure_within(location, bytes.len() as u64, limit)?;
        }
        debug!(%location, bytes = bytes.len(), "Fetched S3 object");
        Ok(bytes.to_vec())
    }
}

/// Classify an SDK failure by its rendered message.
fn classify(location: &StorageLocation, message: String) -> StorageError {
    let location = location.to_string();
    if message.contains("NoSuchKey") || message.contains("NoSuchBucket") {
        StorageError::NotFound { location }
    } else if message.contains("AccessDenied") || message.contains("Forbidden") {
        StorageError::AccessDenied {
            location,
            detail: message,
        }
    } else {
        StorageError::Transient {
            location,
            detail: message,
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn name(&self) -> &str {
        "s3"
    }

    async fn get(&self, location: &StorageLocation) -> Result<Vec<u8>, StorageError> {
        self.fetch(location, None).await
    }

    async fn get_bounded(
        &self,
        location: &StorageLocation,
        max_bytes: u64,
    ) -> Result<Vec<u8>, StorageError> {
        self.fetch(location, Some(max_bytes)).await
    }

    async fn put(
        &self,
        location: &StorageLocation,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let (bucket, key) = Self::parts(location)?;
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| classify(location, format!("{e:?}")))?;
        debug!(%location, "Stored S3 object");
        Ok(())
    }
}
