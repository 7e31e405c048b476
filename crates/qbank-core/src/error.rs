//! Error types module
//!
//! All errors raised by the upload subsystem are unified under the `AppError` enum.
//! Each variant describes its own HTTP presentation through [`ErrorMetadata`], so the
//! routing layer can render it without knowing the variant set.
//!
//! The `Database` variant carries a `sqlx::Error` when the `sqlx` feature is enabled
//! and a plain message otherwise.

use std::io;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like rate limiting
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "RATE_LIMIT_EXCEEDED")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Network connectivity issue: {}", .0.join("; "))]
    NetworkFailure(Vec<String>),

    #[error("File upload failed: {}", .0.join("; "))]
    UploadFailed(Vec<String>),

    #[error("Some files uploaded successfully, others failed ({successful_uploads}/{total_files})")]
    PartialUpload {
        network_errors: Vec<String>,
        upload_errors: Vec<String>,
        successful_uploads: usize,
        total_files: usize,
    },

    #[error("Invalid or expired upload request")]
    ExpiredOrInvalidSession,

    #[error("Rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Validation(format!("JSON parsing error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Static metadata for each variant:
/// (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::Database(_) => (
            500,
            "DATABASE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Validation(_) => (
            400,
            "VALIDATION_ERROR",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::Storage(_) => (
            500,
            "STORAGE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::NetworkFailure(_) => (
            503,
            "NETWORK_ERROR",
            true,
            Some("Check connectivity and retry the upload"),
            false,
            LogLevel::Warn,
        ),
        AppError::UploadFailed(_) => (
            500,
            "UPLOAD_FAILED",
            false,
            Some("Check the files and try a different upload"),
            false,
            LogLevel::Error,
        ),
        AppError::PartialUpload { .. } => (
            207,
            "PARTIAL_UPLOAD",
            true,
            Some("Retry only the files listed as failed"),
            false,
            LogLevel::Warn,
        ),
        AppError::ExpiredOrInvalidSession => (
            400,
            "INVALID_UPLOAD_SESSION",
            false,
            Some("Upload the files again to obtain a new session"),
            false,
            LogLevel::Debug,
        ),
        AppError::RateLimited { .. } => (
            429,
            "RATE_LIMIT_EXCEEDED",
            true,
            Some("Wait for the rate limit window to reset"),
            false,
            LogLevel::Warn,
        ),
        AppError::Conflict(_) => (
            409,
            "CONFLICT",
            false,
            Some("Use a different identifier"),
            false,
            LogLevel::Debug,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "A database error occurred".to_string(),
            AppError::Storage(_) => "A storage error occurred".to_string(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
            AppError::Validation(msg) => msg.clone(),
            AppError::NetworkFailure(_) => "Network connectivity issue".to_string(),
            AppError::UploadFailed(_) => "File upload failed".to_string(),
            AppError::PartialUpload { .. } => {
                "Some files uploaded successfully, others failed".to_string()
            }
            AppError::ExpiredOrInvalidSession => "Invalid or expired upload request".to_string(),
            AppError::RateLimited { .. } => {
                "Rate limit exceeded. Please try again later.".to_string()
            }
            AppError::Conflict(msg) => msg.clone(),
        }
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }
}

impl AppError {
    /// Structured details for the response body, when the variant carries any.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::NetworkFailure(errors) | AppError::UploadFailed(errors) => {
                Some(serde_json::json!(errors))
            }
            AppError::PartialUpload {
                network_errors,
                upload_errors,
                successful_uploads,
                total_files,
            } => {
                let mut details = serde_json::Map::new();
                if !network_errors.is_empty() {
                    details.insert("network_errors".into(), serde_json::json!(network_errors));
                }
                if !upload_errors.is_empty() {
                    details.insert("upload_errors".into(), serde_json::json!(upload_errors));
                }
                details.insert(
                    "successful_uploads".into(),
                    serde_json::json!(successful_uploads),
                );
                details.insert("total_files".into(), serde_json::json!(total_files));
                Some(serde_json::Value::Object(details))
            }
            AppError::RateLimited { retry_after_secs } => {
                Some(serde_json::json!({ "retry_after_secs": retry_after_secs }))
            }
            _ => None,
        }
    }
}

/// Standard error response format for HTTP APIs
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub error: String,
    pub error_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&AppError> for ErrorResponse {
    fn from(err: &AppError) -> Self {
        Self {
            code: err.http_status_code(),
            error: err.client_message(),
            error_type: err.error_code(),
            details: err.details(),
        }
    }
}
