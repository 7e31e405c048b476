use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ephemeral link between a session token and the provisional objects it may finalize.
///
/// The object-ID sequence is fixed at creation; there is no mutator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct UploadSession {
    pub session_id: String,
    object_ids: Vec<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl UploadSession {
    pub fn new(
        session_id: impl Into<String>,
        object_ids: Vec<String>,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            object_ids,
            expires_at,
            created_at,
        }
    }

    pub fn object_ids(&self) -> &[String] {
        &self.object_ids
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}
