//! Media backend abstraction
//!
//! This module defines the MediaBackend trait that every remote or local media
//! store implements, plus the value types that cross it.

use async_trait::async_trait;
use bytes::Bytes;
use qbank_core::AppError;
use thiserror::Error;

/// Media backend operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Move failed: {0}")]
    MoveFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid object id: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for media backend operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Storage(err.to_string())
    }
}

/// A validated file waiting to be pushed to provisional storage
#[derive(Debug, Clone)]
pub struct ProvisionalFile {
    pub filename: String,
    /// Sniffed content type
    pub content_type: String,
    pub data: Bytes,
}

impl ProvisionalFile {
    pub fn new(filename: impl Into<String>, content_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            data,
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// An object the backend accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub object_id: String,
    pub url: String,
}

/// Where a provisional object ends up once its record is finalized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermanentTarget {
    pub object_id: String,
    pub tags: Vec<String>,
}

impl PermanentTarget {
    /// Target for `provisional_id` under the record `record_id`.
    pub fn for_record(record_id: &str, provisional_id: &str) -> Self {
        Self {
            object_id: crate::keys::permanent_object_id(record_id, provisional_id),
            tags: crate::keys::permanent_tags(record_id),
        }
    }
}

/// Media backend abstraction
///
/// Implementations must be safe to call from many tasks at once; the upload and
/// migration pools call them concurrently.
#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Store a file under `folder` with `tags`, returning its object ID and URL.
    async fn upload(
        &self,
        file: ProvisionalFile,
        folder: &str,
        tags: &[String],
    ) -> StorageResult<StoredObject>;

    /// Relocate a provisional object to its permanent ID and return the new URL.
    ///
    /// The provisional copy is removed on a best-effort basis; failing to remove it
    /// does not fail the move.
    async fn move_to_permanent(
        &self,
        object_id: &str,
        target: &PermanentTarget,
    ) -> StorageResult<String>;

    /// Delete an object. Deleting a missing object is not an error.
    async fn delete(&self, object_id: &str) -> StorageResult<()>;

    /// Backend name for logs
    fn backend_name(&self) -> &'static str;
}
