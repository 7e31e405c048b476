use async_trait::async_trait;
use chrono::{DateTime, Utc};
use qbank_core::models::UploadSession;
use qbank_core::AppError;

/// Storage contract for upload sessions
///
/// `delete` is the consume point: it must report `true` for exactly one caller when
/// several race to delete the same session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a new session. A duplicate `session_id` is an `AppError::Conflict`.
    async fn insert(&self, session: &UploadSession) -> Result<(), AppError>;

    /// Fetch a session regardless of expiry
    async fn get(&self, session_id: &str) -> Result<Option<UploadSession>, AppError>;

    /// Remove a session, returning whether this call removed it
    async fn delete(&self, session_id: &str) -> Result<bool, AppError>;

    /// Remove every session whose deadline is before `now`
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError>;

    /// Count sessions still valid at `now`
    async fn count_active(&self, now: DateTime<Utc>) -> Result<u64, AppError>;
}
