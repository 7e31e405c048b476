//! Upload session tracking
//!
//! A session links a token handed to the client at upload time with the exact
//! provisional objects it may later finalize. Consumption is exactly-once: the
//! store's delete decides the winner when several finalizers race.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use qbank_core::models::UploadSession;
use qbank_core::{AppError, ManifestMatch, UploadConfig};
use qbank_db::SessionStore;
use qbank_infra::spawn_periodic;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub struct UploadSessionTracker {
    store: Arc<dyn SessionStore>,
    ttl: chrono::Duration,
    manifest_match: ManifestMatch,
}

impl UploadSessionTracker {
    pub fn new(
        store: Arc<dyn SessionStore>,
        ttl: Duration,
        manifest_match: ManifestMatch,
    ) -> Result<Self, AppError> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| AppError::Validation(format!("Invalid session TTL: {}", e)))?;
        Ok(Self {
            store,
            ttl,
            manifest_match,
        })
    }

    pub fn from_config(
        store: Arc<dyn SessionStore>,
        config: &UploadConfig,
    ) -> Result<Self, AppError> {
        Self::new(store, config.session_ttl, config.manifest_match)
    }

    /// Deadline for a session created at `now`
    pub fn expires_at_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.ttl
    }

    /// Persist `object_ids` under a fresh token and return the token.
    pub async fn create_session(&self, object_ids: Vec<String>) -> Result<String, AppError> {
        let session_id = Uuid::new_v4().to_string();
        self.register(&session_id, object_ids).await?;
        Ok(session_id)
    }

    /// Persist `object_ids` under a token the caller already minted.
    #[tracing::instrument(skip(self, object_ids), fields(object_count = object_ids.len()))]
    pub async fn register(
        &self,
        session_id: &str,
        object_ids: Vec<String>,
    ) -> Result<(), AppError> {
        let now = Utc::now();
        let session = UploadSession::new(session_id, object_ids, now, self.expires_at_from(now));
        self.store.insert(&session).await?;

        tracing::debug!(
            session_id = %session_id,
            expires_at = %session.expires_at,
            "Upload session registered"
        );
        Ok(())
    }

    /// Check `object_ids` against the stored manifest and consume the session.
    ///
    /// Returns `false` for an unknown session, an expired one (which is deleted),
    /// a manifest mismatch (the session is kept), a lost consume race, or a store
    /// failure.
    #[tracing::instrument(skip(self, object_ids), fields(object_count = object_ids.len()))]
    pub async fn validate_and_consume(&self, session_id: &str, object_ids: &[String]) -> bool {
        let session = match self.store.get(session_id).await {
            Ok(Some(session)) => session,
            Ok(None) => {
                tracing::debug!(session_id = %session_id, "Upload session not found");
                return false;
            }
            Err(e) => {
                tracing::error!(
                    session_id = %session_id,
                    error = %e,
                    "Failed to load upload session"
                );
                return false;
            }
        };

        if session.is_expired_at(Utc::now()) {
            if let Err(e) = self.store.delete(session_id).await {
                tracing::warn!(
                    session_id = %session_id,
                    error = %e,
                    "Failed to delete expired upload session"
                );
            }
            tracing::debug!(session_id = %session_id, "Upload session expired");
            return false;
        }

        if !self.manifest_matches(session.object_ids(), object_ids) {
            tracing::debug!(session_id = %session_id, "Upload session manifest mismatch");
            return false;
        }

        match self.store.delete(session_id).await {
            Ok(true) => {
                tracing::debug!(session_id = %session_id, "Upload session consumed");
                true
            }
            Ok(false) => {
                tracing::debug!(session_id = %session_id, "Upload session already consumed");
                false
            }
            Err(e) => {
                tracing::error!(
                    session_id = %session_id,
                    error = %e,
                    "Failed to consume upload session"
                );
                false
            }
        }
    }

    fn manifest_matches(&self, stored: &[String], presented: &[String]) -> bool {
        match self.manifest_match {
            ManifestMatch::Ordered => stored == presented,
            ManifestMatch::Unordered => {
                if stored.len() != presented.len() {
                    return false;
                }
                let mut stored = stored.to_vec();
                let mut presented = presented.to_vec();
                stored.sort_unstable();
                presented.sort_unstable();
                stored == presented
            }
        }
    }

    /// Look up an unexpired session without consuming it.
    pub async fn peek(&self, session_id: &str) -> Result<Option<UploadSession>, AppError> {
        let now = Utc::now();
        Ok(self
            .store
            .get(session_id)
            .await?
            .filter(|s| !s.is_expired_at(now)))
    }

    /// Number of sessions that can still be finalized
    pub async fn active_count(&self) -> Result<u64, AppError> {
        self.store.count_active(Utc::now()).await
    }

    /// Delete every expired session.
    pub async fn reap_expired(&self) -> Result<u64, AppError> {
        let removed = self.store.delete_expired(Utc::now()).await?;
        if removed > 0 {
            tracing::info!(sessions_removed = removed, "Reaped expired upload sessions");
        }
        Ok(removed)
    }

    /// Run [`reap_expired`](Self::reap_expired) every `every` until `cancel` fires.
    pub fn start_reaper(
        self: Arc<Self>,
        every: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        spawn_periodic("upload_session_reaper", every, cancel, move || {
            let tracker = self.clone();
            async move {
                if let Err(e) = tracker.reap_expired().await {
                    tracing::error!(error = %e, "Failed to reap expired upload sessions");
                }
            }
        })
    }
}
