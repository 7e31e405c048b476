use std::collections::hash_map::Entry;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use qbank_core::models::UploadSession;
use qbank_core::AppError;
use tokio::sync::RwLock;

use super::SessionStore;

/// Process-local session store
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, UploadSession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn insert(&self, session: &UploadSession) -> Result<(), AppError> {
        let mut sessions = self.sessions.write().await;
        match sessions.entry(session.session_id.clone()) {
            Entry::Occupied(_) => Err(AppError::Conflict(format!(
                "Upload session {} already exists",
                session.session_id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(session.clone());
                Ok(())
            }
        }
    }

    async fn get(&self, session_id: &str) -> Result<Option<UploadSession>, AppError> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }

    async fn delete(&self, session_id: &str) -> Result<bool, AppError> {
        Ok(self.sessions.write().await.remove(session_id).is_some())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired_at(now));
        Ok((before - sessions.len()) as u64)
    }

    async fn count_active(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.values().filter(|s| !s.is_expired_at(now)).count() as u64)
    }
}
