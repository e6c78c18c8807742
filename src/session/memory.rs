//! Instance-local session tier.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::{Session, SessionBackend, StoreResult};
use crate::error::store::StoreError;

/// Session records held in a mutex-guarded map.
#[derive(Debug, Default)]
pub struct MemorySessionBackend {
    sessions: Mutex<HashMap<String, Session>>,
}

impl MemorySessionBackend {
    /// Creates an empty tier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held, expired ones included.
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Returns true when no records are held.
    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}

#[async_trait]
impl SessionBackend for MemorySessionBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn insert(&self, session: &Session) -> StoreResult<()> {
        let mut sessions = self.sessions.lock();
        if sessions.contains_key(&session.id) {
            return Err(StoreError::Query(format!(
                "session {} already exists",
                session.id
            )));
        }
        sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn fetch(&self, id: &str) -> StoreResult<Option<Session>> {
        Ok(self.sessions.lock().get(id).cloned())
    }

    async fn extend(&self, id: &str, expires_at: DateTime<Utc>) -> StoreResult<bool> {
        Ok(match self.sessions.lock().get_mut(id) {
            Some(session) => {
                session.expires_at = expires_at;
                true
            }
            None => false,
        })
    }

    async fn remove(&self, id: &str) -> StoreResult<bool> {
        Ok(self.sessions.lock().remove(id).is_some())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<usize> {
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired_at(now));
        Ok(before - sessions.len())
    }
}
