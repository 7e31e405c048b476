//! QBank Storage Library
//!
//! Media backend abstraction for the upload subsystem and a local filesystem
//! implementation.
//!
//! # Object ID format
//!
//! - **Provisional**: `qb_temp_uploads/{uuid}`
//! - **Permanent**: `qb_questions/{record_id}/{basename}`, where `basename` is the
//!   last segment of the provisional ID
//!
//! IDs must not contain `..` or a leading `/`. ID generation is centralized in the
//! `keys` module so every backend produces the same layout.

pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod traits;

// Re-export commonly used types
#[cfg(feature = "storage-local")]
pub use local::LocalMediaBackend;
pub use traits::{
    MediaBackend, PermanentTarget, ProvisionalFile, StorageError, StorageResult, StoredObject,
};
