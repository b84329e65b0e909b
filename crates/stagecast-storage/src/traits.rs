//! Storage abstraction trait

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;
use tokio::io::AsyncRead;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Upload offset mismatch: expected {expected}, got {actual}")]
    OffsetMismatch { expected: u64, actual: u64 },

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl StorageError {
    /// Failures that are worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StorageError::UploadFailed(_)
                | StorageError::DownloadFailed(_)
                | StorageError::DeleteFailed(_)
                | StorageError::BackendError(_)
                | StorageError::IoError(_)
        )
    }
}

impl From<StorageError> for stagecast_core::AppError {
    fn from(err: StorageError) -> Self {
        use stagecast_core::AppError;
        match err {
            StorageError::NotFound(name) => AppError::media_not_found(name),
            StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
            StorageError::OffsetMismatch { .. } => AppError::Conflict(err.to_string()),
            StorageError::ConfigError(msg) => AppError::Internal(msg),
            other => AppError::Storage(other.to_string()),
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// Byte storage addressed by media name.
///
/// Exactly one implementation is selected at process start and shared as
/// `Arc<dyn Storage>`.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Write a whole object, replacing any previous content.
    async fn upload(&self, media_name: &str, data: Bytes) -> StorageResult<()>;

    /// Write an object from a reader; returns the number of bytes stored.
    async fn upload_stream(
        &self,
        media_name: &str,
        content_length: Option<u64>,
        reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
    ) -> StorageResult<u64>;

    async fn download(&self, media_name: &str) -> StorageResult<Bytes>;

    async fn download_stream(&self, media_name: &str) -> StorageResult<ByteStream>;

    /// Remove an object. Removing an absent object succeeds.
    async fn delete(&self, media_name: &str) -> StorageResult<()>;

    async fn exists(&self, media_name: &str) -> StorageResult<bool>;

    async fn content_length(&self, media_name: &str) -> StorageResult<u64>;

    fn backend_type(&self) -> StorageBackend;

    /// URL clients use to fetch the object.
    fn public_url(&self, media_name: &str) -> String;
}
