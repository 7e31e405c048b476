//! Bounded-concurrency migration of provisional objects to permanent storage
//!
//! Every object gets its own task; a semaphore caps how many remote calls are in
//! flight. One failure never aborts its siblings, and results come back in input
//! order regardless of completion order.

use std::sync::Arc;

use qbank_core::models::{AggregateOutcome, MigrationItem};
use qbank_storage::{MediaBackend, PermanentTarget};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

const CANCELLED: &str = "migration cancelled";
const POOL_CLOSED: &str = "migration pool closed";

/// The record that will own the migrated objects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub record_id: String,
}

impl Destination {
    pub fn new(record_id: impl Into<String>) -> Self {
        Self {
            record_id: record_id.into(),
        }
    }

    pub fn target_for(&self, provisional_id: &str) -> PermanentTarget {
        PermanentTarget::for_record(&self.record_id, provisional_id)
    }
}

/// Per-item results of one batch, in input order, plus the batch outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub items: Vec<MigrationItem>,
    /// URLs of the successful items, in input order
    pub urls: Vec<String>,
    pub outcome: AggregateOutcome,
}

impl MigrationReport {
    pub fn from_items(items: Vec<MigrationItem>) -> Self {
        let urls: Vec<String> = items
            .iter()
            .filter_map(|item| item.url().map(str::to_string))
            .collect();
        let outcome = AggregateOutcome::from_counts(urls.len(), items.len());
        Self {
            items,
            urls,
            outcome,
        }
    }

    pub fn empty() -> Self {
        Self::from_items(Vec::new())
    }

    pub fn success_count(&self) -> usize {
        self.urls.len()
    }

    pub fn failures(&self) -> impl Iterator<Item = &MigrationItem> {
        self.items.iter().filter(|item| !item.is_success())
    }
}

pub struct ConcurrentMediaMigrator {
    backend: Arc<dyn MediaBackend>,
    concurrency: usize,
}

impl ConcurrentMediaMigrator {
    pub fn new(backend: Arc<dyn MediaBackend>, concurrency: usize) -> Self {
        Self {
            backend,
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Move every provisional object to its permanent location under `destination`.
    ///
    /// Always returns exactly one item per input ID. Cancellation turns every item
    /// that has not finished into a `"migration cancelled"` failure. Dropping the
    /// returned future before it completes cancels the remaining moves.
    #[tracing::instrument(
        skip(self, provisional_ids, cancel),
        fields(record_id = %destination.record_id, total = provisional_ids.len())
    )]
    pub async fn migrate_all(
        &self,
        provisional_ids: &[String],
        destination: &Destination,
        cancel: &CancellationToken,
    ) -> MigrationReport {
        if provisional_ids.is_empty() {
            return MigrationReport::empty();
        }

        // Dropping this future cancels every task it spawned.
        let cancel = cancel.child_token();
        let _cancel_on_drop = cancel.clone().drop_guard();

        let start = std::time::Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(provisional_ids.len());

        for (index, provisional_id) in provisional_ids.iter().enumerate() {
            let backend = self.backend.clone();
            let semaphore = semaphore.clone();
            let cancel = cancel.clone();
            let provisional_id = provisional_id.clone();
            let target = destination.target_for(&provisional_id);
            let concurrency = self.concurrency;

            let handle = tokio::spawn(async move {
                let permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        return MigrationItem::failed(index, provisional_id, CANCELLED);
                    }
                    permit = semaphore.clone().acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => {
                            return MigrationItem::failed(index, provisional_id, POOL_CLOSED);
                        }
                    },
                };

                tracing::debug!(
                    index,
                    object_id = %provisional_id,
                    in_flight = concurrency - semaphore.available_permits(),
                    "Migrating object"
                );

                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(CANCELLED.to_string()),
                    moved = backend.move_to_permanent(&provisional_id, &target) => {
                        moved.map_err(|e| e.to_string())
                    }
                };
                drop(permit);

                match result {
                    Ok(url) => MigrationItem::moved(index, provisional_id, url),
                    Err(error) => {
                        tracing::warn!(
                            index,
                            object_id = %provisional_id,
                            error = %error,
                            "Failed to move object to permanent location"
                        );
                        MigrationItem::failed(index, provisional_id, error)
                    }
                }
            });

            handles.push(handle);
        }

        let mut slots: Vec<Option<MigrationItem>> = vec![None; provisional_ids.len()];
        for (index, handle) in handles.into_iter().enumerate() {
            let item = match handle.await {
                Ok(item) => item,
                Err(e) => {
                    let reason = if e.is_panic() {
                        "migration task panicked"
                    } else {
                        CANCELLED
                    };
                    tracing::error!(index, error = %e, "Migration task did not complete");
                    MigrationItem::failed(index, provisional_ids[index].clone(), reason)
                }
            };
            let slot = item.index;
            slots[slot] = Some(item);
        }

        let items = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| {
                    MigrationItem::failed(index, provisional_ids[index].clone(), "missing result")
                })
            })
            .collect();
        let report = MigrationReport::from_items(items);

        tracing::info!(
            outcome = %report.outcome,
            succeeded = report.success_count(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Migration batch finished"
        );
        report
    }
}
