//! Finalize: consume an upload session and migrate its objects
//!
//! PendingProvisional -> Validated -> Migrating -> Processed | Partial | Failed.
//! Every terminal state hands back whatever URLs succeeded; already-migrated
//! objects are never rolled back.

use std::sync::Arc;

use qbank_core::models::{AggregateOutcome, FinalizeRequest, LifecycleState, MigrationItem};
use qbank_core::AppError;
use tokio_util::sync::CancellationToken;
use validator::Validate;

use crate::analysis::{analyze, UploadAnalysis};
use crate::migration::{ConcurrentMediaMigrator, Destination};
use crate::session::UploadSessionTracker;

/// Result of a finalize call
#[derive(Debug, Clone)]
pub struct FinalizeOutcome {
    pub state: LifecycleState,
    pub outcome: AggregateOutcome,
    /// Permanent URLs of the objects that moved, in manifest order
    pub urls: Vec<String>,
    pub items: Vec<MigrationItem>,
    pub analysis: UploadAnalysis,
}

impl FinalizeOutcome {
    fn nothing_to_migrate() -> Self {
        Self {
            state: LifecycleState::Processed,
            outcome: AggregateOutcome::Processed,
            urls: Vec::new(),
            items: Vec::new(),
            analysis: UploadAnalysis::default(),
        }
    }
}

pub struct FinalizeService {
    tracker: Arc<UploadSessionTracker>,
    migrator: Arc<ConcurrentMediaMigrator>,
}

impl FinalizeService {
    pub fn new(
        tracker: Arc<UploadSessionTracker>,
        migrator: Arc<ConcurrentMediaMigrator>,
    ) -> Self {
        Self { tracker, migrator }
    }

    /// Validate and consume the session named in `request`, then migrate its
    /// objects under `destination`.
    ///
    /// An empty manifest skips session validation entirely.
    #[tracing::instrument(
        skip(self, request, cancel),
        fields(session_id = %request.session_id, record_id = %destination.record_id)
    )]
    pub async fn finalize(
        &self,
        request: FinalizeRequest,
        destination: Destination,
        cancel: &CancellationToken,
    ) -> Result<FinalizeOutcome, AppError> {
        if request.object_ids.is_empty() {
            return Ok(FinalizeOutcome::nothing_to_migrate());
        }
        request.validate()?;

        if !self
            .tracker
            .validate_and_consume(&request.session_id, &request.object_ids)
            .await
        {
            return Err(AppError::ExpiredOrInvalidSession);
        }
        let state = transition(LifecycleState::PendingProvisional, LifecycleState::Validated);
        let state = transition(state, LifecycleState::Migrating);

        let report = self
            .migrator
            .migrate_all(&request.object_ids, &destination, cancel)
            .await;
        let analysis = analyze(&report.items);
        let state = transition(state, LifecycleState::from(report.outcome));

        Ok(FinalizeOutcome {
            state,
            outcome: report.outcome,
            urls: report.urls,
            items: report.items,
            analysis,
        })
    }
}

fn transition(from: LifecycleState, to: LifecycleState) -> LifecycleState {
    tracing::debug!(from = ?from, to = ?to, "Finalize state transition");
    to
}
