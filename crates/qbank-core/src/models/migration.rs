use serde::{Deserialize, Serialize};
use std::fmt;

use super::upload::OutcomeRecord;

/// Batch-level classification of a migration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateOutcome {
    /// Every item succeeded (also the outcome of an empty batch)
    Processed,
    /// Some, but not all, items succeeded
    Partial,
    /// No item succeeded
    Failed,
}

impl AggregateOutcome {
    /// Classify a batch from its success count and size.
    pub fn from_counts(successes: usize, total: usize) -> Self {
        if successes == total {
            AggregateOutcome::Processed
        } else if successes > 0 {
            AggregateOutcome::Partial
        } else {
            AggregateOutcome::Failed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateOutcome::Processed => "processed",
            AggregateOutcome::Partial => "partial",
            AggregateOutcome::Failed => "failed",
        }
    }
}

impl fmt::Display for AggregateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to one object during migration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ItemOutcome {
    Moved { url: String },
    Failed { error: String },
}

/// One object's migration result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationItem {
    /// Position of the object in the batch input
    pub index: usize,
    pub provisional_id: String,
    pub filename: String,
    #[serde(flatten)]
    pub outcome: ItemOutcome,
}

impl MigrationItem {
    pub fn moved(index: usize, provisional_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self::with_outcome(index, provisional_id.into(), ItemOutcome::Moved { url: url.into() })
    }

    pub fn failed(
        index: usize,
        provisional_id: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self::with_outcome(
            index,
            provisional_id.into(),
            ItemOutcome::Failed {
                error: error.into(),
            },
        )
    }

    fn with_outcome(index: usize, provisional_id: String, outcome: ItemOutcome) -> Self {
        let filename = basename(&provisional_id).to_string();
        Self {
            index,
            provisional_id,
            filename,
            outcome,
        }
    }

    pub fn url(&self) -> Option<&str> {
        match &self.outcome {
            ItemOutcome::Moved { url } => Some(url),
            ItemOutcome::Failed { .. } => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ItemOutcome::Moved { .. })
    }
}

impl OutcomeRecord for MigrationItem {
    fn filename(&self) -> &str {
        &self.filename
    }

    fn error(&self) -> Option<&str> {
        match &self.outcome {
            ItemOutcome::Moved { .. } => None,
            ItemOutcome::Failed { error } => Some(error),
        }
    }
}

/// Last path segment of an object ID (`qb_temp_uploads/abc` -> `abc`).
pub fn basename(object_id: &str) -> &str {
    object_id.rsplit('/').next().unwrap_or(object_id)
}

/// Stages of one upload-to-record lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    PendingProvisional,
    Validated,
    Migrating,
    Processed,
    Partial,
    Failed,
}

impl From<AggregateOutcome> for LifecycleState {
    fn from(outcome: AggregateOutcome) -> Self {
        match outcome {
            AggregateOutcome::Processed => LifecycleState::Processed,
            AggregateOutcome::Partial => LifecycleState::Partial,
            AggregateOutcome::Failed => LifecycleState::Failed,
        }
    }
}

impl LifecycleState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LifecycleState::Processed | LifecycleState::Partial | LifecycleState::Failed
        )
    }
}
