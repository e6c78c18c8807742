// Copyright (c) 2025 Nalu MCP Authors
//
// Licensed under dual license:
// - MIT License (LICENSE-MIT or https://opensource.org/licenses/MIT)
// - Apache License, Version 2.0 (LICENSE-APACHE or https://www.apache.org/licenses/LICENSE-2.0)

//! Session persistence.
//!
//! A session turns independent HTTP invocations into one conversation. The
//! [`SessionStore`] facade owns id generation and expiry; records live in a
//! [`SessionBackend`]. Two tiers are used: a durable SQLite table and an
//! instance-local memory map. Durable failures are logged and the same
//! operation is retried on the memory tier, so callers only ever see
//! [`StoreError::Unavailable`] when both tiers fail.
//!
//! The memory tier is not shared between server instances. A session created
//! while the durable tier was down is only visible to the instance that
//! created it.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::session::SessionConfig;
use crate::error::store::StoreError;

pub mod durable;
pub mod memory;

pub use durable::SqliteSessionBackend;
pub use memory::MemorySessionBackend;

/// Result type for session operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// A negotiated client session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque unique token sent in the `mcp-session-id` header
    pub id: String,

    /// Creation time
    pub created_at: DateTime<Utc>,

    /// The session is gone once this instant has passed
    pub expires_at: DateTime<Utc>,

    /// Protocol version agreed during `initialize`
    pub protocol_version: String,

    /// `clientInfo` sent by the client
    pub client_info: Value,

    /// `capabilities` sent by the client
    pub client_capabilities: Value,
}

impl Session {
    /// Returns true when the session has expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Fields supplied by `initialize` when creating a session.
#[derive(Debug, Clone, Default)]
pub struct NewSession {
    /// Protocol version agreed with the client
    pub protocol_version: String,
    /// `clientInfo` from the request
    pub client_info: Value,
    /// Client `capabilities` from the request
    pub client_capabilities: Value,
}

/// Storage tier for session records.
///
/// Backends store and return records verbatim; expiry is decided by the
/// [`SessionStore`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Short tier name used in logs.
    fn name(&self) -> &'static str;

    /// Stores a new record. Fails if the id already exists.
    async fn insert(&self, session: &Session) -> StoreResult<()>;

    /// Loads a record by id.
    async fn fetch(&self, id: &str) -> StoreResult<Option<Session>>;

    /// Moves the expiry of an existing record. Returns false if absent.
    async fn extend(&self, id: &str, expires_at: DateTime<Utc>) -> StoreResult<bool>;

    /// Deletes a record. Returns false if absent.
    async fn remove(&self, id: &str) -> StoreResult<bool>;

    /// Deletes every record that has expired at `now`. Returns the number removed.
    async fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<usize>;
}

/// Current time truncated to milliseconds, the precision of stored records.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Session store facade combining an optional durable tier with the memory tier.
pub struct SessionStore {
    durable: Option<Arc<dyn SessionBackend>>,
    memory: Arc<MemorySessionBackend>,
    ttl: chrono::Duration,
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("durable", &self.durable.as_ref().map(|b| b.name()))
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl SessionStore {
    /// Creates a store backed by the memory tier alone.
    pub fn memory_only(ttl: Duration) -> Self {
        Self {
            durable: None,
            memory: Arc::new(MemorySessionBackend::new()),
            ttl: to_chrono(ttl),
        }
    }

    /// Creates a store with `durable` as the first tier and memory as fallback.
    pub fn tiered(durable: Arc<dyn SessionBackend>, ttl: Duration) -> Self {
        Self {
            durable: Some(durable),
            memory: Arc::new(MemorySessionBackend::new()),
            ttl: to_chrono(ttl),
        }
    }

    /// Builds the store described by the configuration.
    pub fn from_config(config: &SessionConfig) -> Self {
        match &config.durable_path {
            Some(path) => {
                let backend = SqliteSessionBackend::new(
                    path.clone(),
                    config.table_name.clone(),
                    config.auto_create_schema,
                    config.durable_timeout(),
                );
                Self::tiered(Arc::new(backend), config.ttl())
            }
            None => Self::memory_only(config.ttl()),
        }
    }

    /// Returns true when a durable tier is configured.
    pub fn has_durable_tier(&self) -> bool {
        self.durable.is_some()
    }

    /// Creates and persists a new session with a fresh id.
    pub async fn create(&self, new: NewSession) -> StoreResult<Session> {
        let created_at = now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            created_at,
            expires_at: created_at + self.ttl,
            protocol_version: new.protocol_version,
            client_info: new.client_info,
            client_capabilities: new.client_capabilities,
        };

        if let Some(durable) = &self.durable {
            match durable.insert(&session).await {
                Ok(()) => {
                    debug!(session_id = %session.id, tier = durable.name(), "Session created");
                    return Ok(session);
                }
                Err(e) => warn!(
                    error = %e,
                    tier = durable.name(),
                    "Durable session insert failed, using memory tier"
                ),
            }
        }

        self.memory
            .insert(&session)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        debug!(session_id = %session.id, tier = self.memory.name(), "Session created");
        Ok(session)
    }

    /// Loads a live session. Expired sessions are deleted and reported as absent.
    pub async fn get(&self, id: &str) -> StoreResult<Option<Session>> {
        let mut durable_failure = None;

        let mut found = None;
        if let Some(durable) = &self.durable {
            match durable.fetch(id).await {
                Ok(record) => found = record,
                Err(e) => {
                    warn!(error = %e, tier = durable.name(), "Durable session lookup failed");
                    durable_failure = Some(e);
                }
            }
        }

        if found.is_none() {
            found = match self.memory.fetch(id).await {
                Ok(record) => record,
                Err(e) => {
                    return match durable_failure {
                        Some(first) => Err(StoreError::Unavailable(format!("{first}; {e}"))),
                        None => Err(StoreError::Unavailable(e.to_string())),
                    };
                }
            };
        }

        match found {
            Some(session) if session.is_expired_at(now()) => {
                debug!(session_id = %id, "Session expired");
                self.delete(id).await.ok();
                Ok(None)
            }
            other => Ok(other),
        }
    }

    /// Extends the expiry of a session by one TTL from now.
    pub async fn touch(&self, id: &str) -> StoreResult<bool> {
        let expires_at = now() + self.ttl;

        if let Some(durable) = &self.durable {
            match durable.extend(id, expires_at).await {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(e) => warn!(error = %e, tier = durable.name(), "Durable session touch failed"),
            }
        }

        self.memory
            .extend(id, expires_at)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    /// Deletes a session from every tier.
    pub async fn delete(&self, id: &str) -> StoreResult<bool> {
        let mut removed = false;
        let mut durable_failure = None;

        if let Some(durable) = &self.durable {
            match durable.remove(id).await {
                Ok(hit) => removed |= hit,
                Err(e) => {
                    warn!(error = %e, tier = durable.name(), "Durable session delete failed");
                    durable_failure = Some(e);
                }
            }
        }

        match self.memory.remove(id).await {
            Ok(hit) => Ok(removed || hit),
            Err(e) => match durable_failure {
                Some(first) => Err(StoreError::Unavailable(format!("{first}; {e}"))),
                None => Ok(removed),
            },
        }
    }
}

impl SessionStore {
    /// Removes expired records from both tiers. Returns the number removed.
    ///
    /// A durable failure is logged and only the memory tier is swept.
    pub async fn purge_expired(&self) -> usize {
        let now = now();
        let mut purged = self.memory.purge_expired(now).await.unwrap_or_default();

        if let Some(durable) = &self.durable {
            match durable.purge_expired(now).await {
                Ok(removed) => purged += removed,
                Err(e) => warn!(error = %e, tier = durable.name(), "Durable session sweep failed"),
            }
        }
        purged
    }

    /// Starts a task sweeping expired sessions every `every`.
    ///
    /// The task ends by itself once the store is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let store = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticks = tokio::time::interval(every);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticks.tick().await;
            loop {
                ticks.tick().await;
                let Some(store) = store.upgrade() else { break };
                let purged = store.purge_expired().await;
                if purged > 0 {
                    info!(purged, "Expired sessions removed");
                }
            }
        })
    }
}

fn to_chrono(ttl: Duration) -> chrono::Duration {
    chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(365 * 100))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn new_session() -> NewSession {
        NewSession {
            protocol_version: "2025-06-18".to_string(),
            client_info: json!({"name": "test-client", "version": "1.0"}),
            client_capabilities: json!({}),
        }
    }

    fn failing_backend() -> MockSessionBackend {
        let mut backend = MockSessionBackend::new();
        backend.expect_name().return_const("mock");
        backend
            .expect_insert()
            .returning(|_| Err(StoreError::Open("unreachable".to_string())));
        backend
            .expect_fetch()
            .returning(|_| Err(StoreError::Query("no such table".to_string())));
        backend
            .expect_extend()
            .returning(|_, _| Err(StoreError::Timeout(Duration::from_millis(5))));
        backend
            .expect_remove()
            .returning(|_| Err(StoreError::Query("no such table".to_string())));
        backend
    }

    /// Ids are unique and the record round-trips through the store.
    #[tokio::test]
    async fn test_create_and_get() {
        let store = SessionStore::memory_only(Duration::from_secs(60));
        let a = store.create(new_session()).await.unwrap();
        let b = store.create(new_session()).await.unwrap();
        assert_ne!(a.id, b.id);

        let loaded = store.get(&a.id).await.unwrap().unwrap();
        assert_eq!(loaded, a);
        assert!(store.get("missing").await.unwrap().is_none());
    }

    /// A session past its expiry behaves exactly like a missing one.
    #[tokio::test]
    async fn test_expired_session_is_absent() {
        let store = SessionStore::memory_only(Duration::ZERO);
        let session = store.create(new_session()).await.unwrap();

        assert!(store.get(&session.id).await.unwrap().is_none());
        // The expired record was removed, so a second delete misses.
        assert!(!store.delete(&session.id).await.unwrap());
    }

    /// Sub-second lifetimes are honoured.
    #[tokio::test]
    async fn test_short_ttl_expires() {
        let store = SessionStore::memory_only(Duration::from_millis(50));
        let session = store.create(new_session()).await.unwrap();
        assert!(store.get(&session.id).await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(store.get(&session.id).await.unwrap().is_none());
    }

    /// Sessions nobody asks for again are still removed by a sweep.
    #[tokio::test]
    async fn test_purge_removes_abandoned_sessions() {
        let store = SessionStore::memory_only(Duration::from_millis(50));
        for _ in 0..100 {
            store.create(new_session()).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(120)).await;
        let live = store.create(new_session()).await.unwrap();

        assert_eq!(store.purge_expired().await, 100);
        assert_eq!(store.memory.len(), 1);
        assert!(store.get(&live.id).await.unwrap().is_some());
    }

    /// The background sweeper empties the memory tier without any lookups.
    #[tokio::test]
    async fn test_sweeper_runs_periodically() {
        let store = Arc::new(SessionStore::memory_only(Duration::from_millis(20)));
        for _ in 0..10 {
            store.create(new_session()).await.unwrap();
        }
        let sweeper = store.spawn_sweeper(Duration::from_millis(25));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(store.memory.is_empty());

        drop(store);
        tokio::time::timeout(Duration::from_secs(1), sweeper)
            .await
            .unwrap()
            .unwrap();
    }

    /// A failing durable sweep still clears the memory tier.
    #[tokio::test]
    async fn test_purge_survives_durable_failure() {
        let mut backend = failing_backend();
        backend
            .expect_purge_expired()
            .returning(|_| Err(StoreError::Timeout(Duration::from_millis(5))));
        let store = SessionStore::tiered(Arc::new(backend), Duration::ZERO);

        store.create(new_session()).await.unwrap();
        assert_eq!(store.memory.len(), 1);
        assert_eq!(store.purge_expired().await, 1);
        assert!(store.memory.is_empty());
    }

    /// Touch extends the expiry of live sessions only.
    #[tokio::test]
    async fn test_touch() {
        let store = SessionStore::memory_only(Duration::from_secs(60));
        let session = store.create(new_session()).await.unwrap();

        assert!(store.touch(&session.id).await.unwrap());
        assert!(!store.touch("missing").await.unwrap());

        let loaded = store.get(&session.id).await.unwrap().unwrap();
        assert!(loaded.expires_at >= session.expires_at);
    }

    /// Deleted sessions are gone for good.
    #[tokio::test]
    async fn test_delete() {
        let store = SessionStore::memory_only(Duration::from_secs(60));
        let session = store.create(new_session()).await.unwrap();

        assert!(store.delete(&session.id).await.unwrap());
        assert!(store.get(&session.id).await.unwrap().is_none());
        assert!(!store.delete(&session.id).await.unwrap());
    }

    /// Every durable failure is masked by the memory tier.
    #[tokio::test]
    async fn test_durable_failure_falls_back_to_memory() {
        let store = SessionStore::tiered(Arc::new(failing_backend()), Duration::from_secs(60));
        assert!(store.has_durable_tier());

        let session = store.create(new_session()).await.unwrap();
        let loaded = store.get(&session.id).await.unwrap();
        assert_eq!(loaded.as_ref().map(|s| s.id.as_str()), Some(session.id.as_str()));
        assert!(store.touch(&session.id).await.unwrap());
        assert!(store.delete(&session.id).await.unwrap());
        assert!(store.get(&session.id).await.unwrap().is_none());
    }

    /// A durable miss still consults the memory tier.
    #[tokio::test]
    async fn test_durable_miss_checks_memory() {
        let mut backend = MockSessionBackend::new();
        backend.expect_name().return_const("mock");
        backend.expect_fetch().returning(|_| Ok(None));
        backend.expect_remove().returning(|_| Ok(false));

        let store = SessionStore::tiered(Arc::new(backend), Duration::from_secs(60));
        let session = Session {
            id: "outage-session".to_string(),
            created_at: now(),
            expires_at: now() + chrono::Duration::seconds(60),
            protocol_version: "2024-11-05".to_string(),
            client_info: json!({}),
            client_capabilities: json!({}),
        };
        store.memory.insert(&session).await.unwrap();

        assert_eq!(store.get("outage-session").await.unwrap(), Some(session));
    }

    /// Durable hits are served without touching the memory tier.
    #[tokio::test]
    async fn test_durable_hit() {
        let stored = Session {
            id: "durable-session".to_string(),
            created_at: now(),
            expires_at: now() + chrono::Duration::seconds(60),
            protocol_version: "2025-03-26".to_string(),
            client_info: json!({"name": "c"}),
            client_capabilities: json!({}),
        };
        let returned = stored.clone();

        let mut backend = MockSessionBackend::new();
        backend.expect_name().return_const("mock");
        backend
            .expect_fetch()
            .withf(|id| id == "durable-session")
            .times(1)
            .returning(move |_| Ok(Some(returned.clone())));

        let store = SessionStore::tiered(Arc::new(backend), Duration::from_secs(60));
        assert_eq!(store.get("durable-session").await.unwrap(), Some(stored));
    }
}
