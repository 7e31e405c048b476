//! Classification of per-file upload and migration failures
//!
//! Failures are split into transient network problems and permanent upload
//! errors by substring heuristics on the error message. The split is advisory:
//! it picks the error class reported to the client, nothing retries on it.

use qbank_core::models::OutcomeRecord;
use qbank_core::AppError;
use serde::Serialize;

const NETWORK_KEYWORDS: [&str; 8] = [
    "tls handshake timeout",
    "timeout",
    "network",
    "connection",
    "dial tcp",
    "no such host",
    "connection refused",
    "connection reset",
];

/// Whether an error message looks like a transient network failure.
pub fn is_network_error(message: &str) -> bool {
    let message = message.to_lowercase();
    NETWORK_KEYWORDS.iter().any(|k| message.contains(k))
}

/// Failure breakdown of one batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadAnalysis {
    pub has_errors: bool,
    /// `"{filename}: {error}"` for each network failure, in input order
    pub network_errors: Vec<String>,
    /// `"{filename}: {error}"` for each other failure, in input order
    pub upload_errors: Vec<String>,
    pub success_count: usize,
    pub total: usize,
}

/// How a batch should be reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Success,
    Partial,
    NetworkFailure,
    UploadFailure,
}

/// Bucket every failure in `results`.
pub fn analyze<R: OutcomeRecord>(results: &[R]) -> UploadAnalysis {
    let mut analysis = UploadAnalysis {
        total: results.len(),
        ..UploadAnalysis::default()
    };

    for result in results {
        match result.error() {
            Some(error) => {
                analysis.has_errors = true;
                let line = format!("{}: {}", result.filename(), error);
                if is_network_error(error) {
                    analysis.network_errors.push(line);
                } else {
                    analysis.upload_errors.push(line);
                }
            }
            None => analysis.success_count += 1,
        }
    }

    analysis
}

impl UploadAnalysis {
    pub fn failure_count(&self) -> usize {
        self.network_errors.len() + self.upload_errors.len()
    }

    /// Total failures are classified by the dominant type: network when any
    /// network error is present.
    pub fn verdict(&self) -> Verdict {
        if !self.has_errors {
            Verdict::Success
        } else if self.success_count > 0 {
            Verdict::Partial
        } else if !self.network_errors.is_empty() {
            Verdict::NetworkFailure
        } else {
            Verdict::UploadFailure
        }
    }

    /// Map the verdict onto the error the client should see.
    pub fn into_result(self) -> Result<(), AppError> {
        match self.verdict() {
            Verdict::Success => Ok(()),
            Verdict::Partial => Err(AppError::PartialUpload {
                network_errors: self.network_errors,
                upload_errors: self.upload_errors,
                successful_uploads: self.success_count,
                total_files: self.total,
            }),
            Verdict::NetworkFailure => Err(AppError::NetworkFailure(self.network_errors)),
            Verdict::UploadFailure => Err(AppError::UploadFailed(self.upload_errors)),
        }
    }
}
