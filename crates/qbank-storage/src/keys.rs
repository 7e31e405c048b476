//! Shared object ID and tag generation for media backends.

use qbank_core::constants::{PERMANENT_FOLDER, PERMANENT_TAG, TEMP_UPLOAD_TAG};
use qbank_core::models::basename;
use uuid::Uuid;

/// Fresh provisional object ID inside `folder`.
pub fn provisional_object_id(folder: &str) -> String {
    format!("{}/{}", folder.trim_end_matches('/'), Uuid::new_v4().simple())
}

/// Permanent object ID for a provisional object owned by `record_id`.
pub fn permanent_object_id(record_id: &str, provisional_id: &str) -> String {
    format!("{}/{}/{}", PERMANENT_FOLDER, record_id, basename(provisional_id))
}

/// Tags attached to a provisional object: `temp_upload`, `req_{session}`, `expires_{unix}`.
pub fn provisional_tags(session_id: &str, expires_at_unix: i64) -> Vec<String> {
    vec![
        TEMP_UPLOAD_TAG.to_string(),
        format!("req_{}", session_id),
        format!("expires_{}", expires_at_unix),
    ]
}

/// Tags attached to a permanent object: `permanent`, `question_{record_id}`.
pub fn permanent_tags(record_id: &str) -> Vec<String> {
    vec![PERMANENT_TAG.to_string(), format!("question_{}", record_id)]
}
