//! Blob store abstraction.
//!
//! Objects live in named buckets under `/`-separated keys. Keys are always
//! owner-scoped by the callers (`{owner}/...`).

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::error::{ApiError, internal_error, not_found, validation_error};

pub mod local;
pub mod signing;

pub use local::LocalBlobStore;
pub use signing::{SignedAccess, UrlSigner};

/// Storage buckets used by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    SourceVideos,
    Reactions,
}

impl Bucket {
    pub const fn as_str(self) -> &'static str {
        match self {
            Bucket::SourceVideos => "source-videos",
            Bucket::Reactions => "reactions",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "source-videos" => Some(Bucket::SourceVideos),
            "reactions" => Some(Bucket::Reactions),
            _ => None,
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("invalid storage path: {0}")]
    InvalidPath(String),

    #[error("upload failed: {0}")]
    UploadFailed(String),

    #[error("download failed: {0}")]
    DownloadFailed(String),

    #[error("storage is misconfigured: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StorageError> for ApiError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::NotFound(_) => not_found(Some("Object not found")),
            StorageError::InvalidPath(path) => validation_error(
                "Invalid storage path",
                serde_json::json!({ "storage_path": path }),
            ),
            other => {
                tracing::error!(error = %other, "Blob store failure");
                internal_error()
            }
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Blob store operations consumed by the core.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` at `path`, replacing any existing object. Returns the path.
    async fn upload(
        &self,
        bucket: Bucket,
        path: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<String>;

    async fn download(&self, bucket: Bucket, path: &str) -> StorageResult<Vec<u8>>;

    /// Remove an object. Missing objects are not an error.
    async fn delete(&self, bucket: Bucket, path: &str) -> StorageResult<()>;

    async fn exists(&self, bucket: Bucket, path: &str) -> StorageResult<bool>;

    fn public_url(&self, bucket: Bucket, path: &str) -> StorageResult<String>;

    /// Time-limited read URL.
    fn signed_url(&self, bucket: Bucket, path: &str, ttl: Duration) -> StorageResult<String>;

    /// Time-limited write URL a client can `PUT` bytes to.
    fn signed_upload_url(
        &self,
        bucket: Bucket,
        path: &str,
        ttl: Duration,
    ) -> StorageResult<String>;
}

/// Validate a `/`-separated object path.
///
/// Rejects empty segments, `.`/`..`, absolute paths and backslashes.
pub fn validate_path(path: &str) -> StorageResult<()> {
    let invalid = path.is_empty()
        || path.starts_with('/')
        || path.contains('\\')
        || path.contains('\0')
        || path
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if invalid {
        return Err(StorageError::InvalidPath(path.to_string()));
    }
    Ok(())
}
