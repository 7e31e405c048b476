//! QBank Core Library
//!
//! Domain models, error types and configuration shared by every crate of the
//! upload-orchestration subsystem.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::{ManifestMatch, UploadConfig};
pub use error::{AppError, ErrorMetadata, ErrorResponse, LogLevel};
