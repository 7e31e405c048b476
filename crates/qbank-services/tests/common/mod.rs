#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use qbank_core::models::UploadSession;
use qbank_core::{AppError, ManifestMatch, UploadConfig};
use qbank_db::{InMemorySessionStore, SessionStore};
use qbank_services::{IncomingFile, UploadSessionTracker};
use qbank_storage::keys::provisional_object_id;
use qbank_storage::{
    MediaBackend, PermanentTarget, ProvisionalFile, StorageError, StorageResult, StoredObject,
};

pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR-test-image";

pub fn png(name: &str) -> IncomingFile {
    IncomingFile::new(name, Bytes::from_static(PNG_BYTES))
}

pub fn ids(prefix: &str, n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("{}{}", prefix, i)).collect()
}

/// Counts concurrent calls and records the highest concurrency seen.
struct InFlight<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self { counter }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// In-memory media backend with scripted failures and latency
#[derive(Default)]
pub struct MockBackend {
    latency: Duration,
    move_failures: HashMap<String, String>,
    move_panics: HashSet<String>,
    upload_failures: HashMap<String, String>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    upload_calls: AtomicUsize,
    move_calls: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Moving `object_id` fails with `error`
    pub fn fail_move(mut self, object_id: &str, error: &str) -> Self {
        self.move_failures
            .insert(object_id.to_string(), error.to_string());
        self
    }

    /// Moving `object_id` panics inside the backend
    pub fn panic_on_move(mut self, object_id: &str) -> Self {
        self.move_panics.insert(object_id.to_string());
        self
    }

    /// Uploading a file named `filename` fails with `error`
    pub fn fail_upload(mut self, filename: &str, error: &str) -> Self {
        self.upload_failures
            .insert(filename.to_string(), error.to_string());
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub fn move_calls(&self) -> usize {
        self.move_calls.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl MediaBackend for MockBackend {
    async fn upload(
        &self,
        file: ProvisionalFile,
        folder: &str,
        _tags: &[String],
    ) -> StorageResult<StoredObject> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        let _guard = InFlight::enter(&self.in_flight, &self.peak_in_flight);
        self.pause().await;

        if let Some(error) = self.upload_failures.get(&file.filename) {
            return Err(StorageError::BackendError(error.clone()));
        }
        let object_id = provisional_object_id(folder);
        Ok(StoredObject {
            url: format!("https://media.test/{}", object_id),
            object_id,
        })
    }

    async fn move_to_permanent(
        &self,
        object_id: &str,
        target: &PermanentTarget,
    ) -> StorageResult<String> {
        self.move_calls.fetch_add(1, Ordering::SeqCst);
        let _guard = InFlight::enter(&self.in_flight, &self.peak_in_flight);
        self.pause().await;

        if self.move_panics.contains(object_id) {
            panic!("backend exploded on {}", object_id);
        }
        if let Some(error) = self.move_failures.get(object_id) {
            return Err(StorageError::MoveFailed(error.clone()));
        }
        Ok(format!("https://media.test/{}", target.object_id))
    }

    async fn delete(&self, _object_id: &str) -> StorageResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "mock"
    }
}

/// Session store whose every operation fails
pub struct FailingStore;

#[async_trait]
impl SessionStore for FailingStore {
    async fn insert(&self, _session: &UploadSession) -> Result<(), AppError> {
        Err(AppError::Internal("store unavailable".to_string()))
    }

    async fn get(&self, _session_id: &str) -> Result<Option<UploadSession>, AppError> {
        Err(AppError::Internal("store unavailable".to_string()))
    }

    async fn delete(&self, _session_id: &str) -> Result<bool, AppError> {
        Err(AppError::Internal("store unavailable".to_string()))
    }

    async fn delete_expired(&self, _now: DateTime<Utc>) -> Result<u64, AppError> {
        Err(AppError::Internal("store unavailable".to_string()))
    }

    async fn count_active(&self, _now: DateTime<Utc>) -> Result<u64, AppError> {
        Err(AppError::Internal("store unavailable".to_string()))
    }
}

pub fn memory_tracker(
    manifest_match: ManifestMatch,
) -> (Arc<InMemorySessionStore>, Arc<UploadSessionTracker>) {
    let store = Arc::new(InMemorySessionStore::new());
    let tracker = UploadSessionTracker::new(
        store.clone(),
        UploadConfig::default().session_ttl,
        manifest_match,
    )
    .expect("valid tracker");
    (store, Arc::new(tracker))
}
