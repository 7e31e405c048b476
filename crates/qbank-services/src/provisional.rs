//! Provisional batch upload
//!
//! Validates a batch of files, pushes them to the provisional folder under a
//! bounded worker pool and registers the ones that landed under a fresh session.

use std::sync::Arc;

use chrono::Utc;
use qbank_core::constants::{MAX_FILES_PER_BATCH, TEMP_UPLOAD_FOLDER};
use qbank_core::models::{UploadResponse, UploadResult};
use qbank_core::{AppError, UploadConfig};
use qbank_storage::keys::provisional_tags;
use qbank_storage::{MediaBackend, ProvisionalFile};
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::analysis::{analyze, UploadAnalysis};
use crate::session::UploadSessionTracker;
use crate::validation::{FileValidator, IncomingFile};

/// Everything a batch upload produced
#[derive(Debug, Clone)]
pub struct BatchUploadOutcome {
    pub response: UploadResponse,
    pub analysis: UploadAnalysis,
    /// Non-fatal problems, such as failing to persist the session
    pub warnings: Vec<String>,
}

pub struct ProvisionalUploadService {
    backend: Arc<dyn MediaBackend>,
    tracker: Arc<UploadSessionTracker>,
    validator: FileValidator,
    concurrency: usize,
}

impl ProvisionalUploadService {
    pub fn new(
        backend: Arc<dyn MediaBackend>,
        tracker: Arc<UploadSessionTracker>,
        validator: FileValidator,
        concurrency: usize,
    ) -> Self {
        Self {
            backend,
            tracker,
            validator,
            concurrency: concurrency.max(1),
        }
    }

    pub fn from_config(
        backend: Arc<dyn MediaBackend>,
        tracker: Arc<UploadSessionTracker>,
        config: &UploadConfig,
    ) -> Self {
        Self::new(
            backend,
            tracker,
            FileValidator::from_config(config),
            config.upload_concurrency,
        )
    }

    /// Upload a batch of files to provisional storage.
    ///
    /// The batch is rejected up front when it is empty, holds more than
    /// [`MAX_FILES_PER_BATCH`] files, or contains any invalid file. After that,
    /// per-file failures are reported in the response and never abort the batch.
    #[tracing::instrument(skip(self, files), fields(file_count = files.len()))]
    pub async fn upload_batch(
        &self,
        files: Vec<IncomingFile>,
    ) -> Result<BatchUploadOutcome, AppError> {
        if files.is_empty() {
            return Err(AppError::Validation("No files provided".to_string()));
        }
        if files.len() > MAX_FILES_PER_BATCH {
            return Err(AppError::Validation(format!(
                "Maximum {} files allowed per request",
                MAX_FILES_PER_BATCH
            )));
        }

        let mut prepared = Vec::with_capacity(files.len());
        for file in files {
            let filename = file.filename.clone();
            let ready = self.validator.prepare(file).map_err(|e| {
                AppError::Validation(format!("Invalid file '{}': {}", filename, e))
            })?;
            prepared.push(ready);
        }

        let session_id = Uuid::new_v4().to_string();
        let expires_at = self.tracker.expires_at_from(Utc::now());
        let tags = Arc::new(provisional_tags(&session_id, expires_at.timestamp()));

        let results = self.upload_all(prepared, tags).await;

        let stored_ids: Vec<String> = results
            .iter()
            .filter(|r| r.is_success())
            .filter_map(|r| r.public_id.clone())
            .collect();

        let mut warnings = Vec::new();
        if !stored_ids.is_empty() {
            if let Err(e) = self.tracker.register(&session_id, stored_ids.clone()).await {
                tracing::warn!(
                    session_id = %session_id,
                    error = %e,
                    "Failed to store upload session"
                );
                warnings.push(format!("Failed to store upload session: {}", e));
            }
        }

        let analysis = analyze(&results);
        let response = UploadResponse {
            success: !analysis.has_errors && !stored_ids.is_empty(),
            session_id,
            results,
        };

        tracing::info!(
            session_id = %response.session_id,
            succeeded = analysis.success_count,
            failed = analysis.failure_count(),
            "Provisional batch upload finished"
        );

        Ok(BatchUploadOutcome {
            response,
            analysis,
            warnings,
        })
    }

    async fn upload_all(
        &self,
        files: Vec<ProvisionalFile>,
        tags: Arc<Vec<String>>,
    ) -> Vec<UploadResult> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(files.len());
        let filenames: Vec<String> = files.iter().map(|f| f.filename.clone()).collect();

        for file in files {
            let backend = self.backend.clone();
            let semaphore = semaphore.clone();
            let tags = tags.clone();

            handles.push(tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return UploadResult::failed(file.filename, "upload pool closed"),
                };

                let filename = file.filename.clone();
                match backend.upload(file, TEMP_UPLOAD_FOLDER, &tags).await {
                    Ok(stored) => UploadResult::stored(filename, stored.object_id),
                    Err(e) => {
                        tracing::warn!(
                            filename = %filename,
                            error = %e,
                            "Provisional upload failed"
                        );
                        UploadResult::failed(filename, e.to_string())
                    }
                }
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (handle, filename) in handles.into_iter().zip(filenames) {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(
                        filename = %filename,
                        error = %e,
                        "Upload task did not complete"
                    );
                    UploadResult::failed(filename, "upload task failed")
                }
            };
            results.push(result);
        }
        results
    }
}
