use serde::{Deserialize, Serialize};
use validator::Validate;

/// A per-file outcome the result analyzer can classify.
pub trait OutcomeRecord {
    /// Name reported next to a failure
    fn filename(&self) -> &str;

    /// Failure message, `None` on success
    fn error(&self) -> Option<&str>;
}

/// Result of pushing one file to provisional storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub original_filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadResult {
    pub fn stored(original_filename: impl Into<String>, public_id: impl Into<String>) -> Self {
        Self {
            original_filename: original_filename.into(),
            public_id: Some(public_id.into()),
            error: None,
        }
    }

    pub fn failed(original_filename: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            original_filename: original_filename.into(),
            public_id: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.public_id.is_some()
    }
}

impl OutcomeRecord for UploadResult {
    fn filename(&self) -> &str {
        &self.original_filename
    }

    fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// Response of a provisional batch upload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Session token the client must present on finalize
    #[serde(rename = "requestId")]
    pub session_id: String,
    pub results: Vec<UploadResult>,
    pub success: bool,
}

impl UploadResponse {
    /// Object IDs of the files that reached provisional storage, in upload order.
    pub fn stored_object_ids(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|r| r.is_success())
            .filter_map(|r| r.public_id.clone())
            .collect()
    }
}

/// Finalize request: the session token and the manifest it was issued for
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeRequest {
    #[serde(rename = "requestId")]
    #[validate(length(min = 1, max = 128, message = "Session id must be 1-128 characters"))]
    pub session_id: String,
    #[validate(length(max = 5, message = "Too many objects in manifest"))]
    pub object_ids: Vec<String>,
}

impl FinalizeRequest {
    pub fn new(session_id: impl Into<String>, object_ids: Vec<String>) -> Self {
        Self {
            session_id: session_id.into(),
            object_ids,
        }
    }
}

impl From<&UploadResponse> for FinalizeRequest {
    fn from(response: &UploadResponse) -> Self {
        Self::new(response.session_id.clone(), response.stored_object_ids())
    }
}
