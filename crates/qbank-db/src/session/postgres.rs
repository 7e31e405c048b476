use async_trait::async_trait;
use chrono::{DateTime, Utc};
use qbank_core::models::UploadSession;
use qbank_core::AppError;
use sqlx::PgPool;

use super::SessionStore;

/// Postgres-backed session store on the `temporary_uploads` table
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn insert(&self, session: &UploadSession) -> Result<(), AppError> {
        // Runtime queries avoid requiring DATABASE_URL at build time
        let result = sqlx::query(
            r#"
            INSERT INTO temporary_uploads (session_id, object_ids, expires_at, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (session_id) DO NOTHING
            "#,
        )
        .bind(&session.session_id)
        .bind(session.object_ids())
        .bind(session.expires_at)
        .bind(session.created_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "Upload session {} already exists",
                session.session_id
            )));
        }
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Option<UploadSession>, AppError> {
        let row = sqlx::query_as::<_, UploadSession>(
            r#"
            SELECT session_id, object_ids, expires_at, created_at
            FROM temporary_uploads
            WHERE session_id = $1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn delete(&self, session_id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM temporary_uploads WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM temporary_uploads WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn count_active(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM temporary_uploads WHERE expires_at >= $1")
                .bind(now)
                .fetch_one(&self.pool)
                .await?;

        Ok(count.max(0) as u64)
    }
}
