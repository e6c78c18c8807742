// Copyright (c) 2025 Nalu MCP Authors
//
// Licensed under dual license:
// - MIT License (LICENSE-MIT or https://opensource.org/licenses/MIT)
// - Apache License, Version 2.0 (LICENSE-APACHE or https://www.apache.org/licenses/LICENSE-2.0)

//! Durable session tier backed by a SQLite table.
//!
//! Each operation opens its own connection on the blocking pool, so
//! concurrent requests for different sessions never share a lock in this
//! process; SQLite's WAL mode and busy timeout handle the file itself.
//! Timestamps are stored as unix milliseconds, client data as JSON text.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};

use super::{Session, SessionBackend, StoreResult};
use crate::error::store::StoreError;

/// SQLite-backed session records.
#[derive(Debug, Clone)]
pub struct SqliteSessionBackend {
    path: PathBuf,
    table: String,
    auto_create_schema: bool,
    timeout: Duration,
    schema_ready: Arc<AtomicBool>,
}

impl SqliteSessionBackend {
    /// Creates a backend for `table` inside the database file at `path`.
    ///
    /// Nothing is opened until the first operation.
    pub fn new(path: PathBuf, table: String, auto_create_schema: bool, timeout: Duration) -> Self {
        Self {
            path,
            table,
            auto_create_schema,
            timeout,
            schema_ready: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Runs `op` against a fresh connection on the blocking pool, bounded by the tier timeout.
    async fn run<T, F>(&self, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection, &str) -> StoreResult<T> + Send + 'static,
    {
        let path = self.path.clone();
        let table = self.table.clone();
        let auto_create = self.auto_create_schema;
        let schema_ready = Arc::clone(&self.schema_ready);

        let task = tokio::task::spawn_blocking(move || {
            let conn = open_connection(&path)?;
            if !schema_ready.load(Ordering::Acquire) {
                ensure_schema(&conn, &table, auto_create)?;
                schema_ready.store(true, Ordering::Release);
            }
            op(&conn, &table)
        });

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(StoreError::Worker(join_error.to_string())),
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        }
    }
}

fn open_connection(path: &Path) -> StoreResult<Connection> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| StoreError::Open(format!("{}: {e}", path.display())))?;

    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=1000;")
        .map_err(|e| StoreError::Open(format!("{}: {e}", path.display())))?;
    Ok(conn)
}

fn ensure_schema(conn: &Connection, table: &str, auto_create: bool) -> StoreResult<()> {
    if auto_create {
        conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                session_id TEXT PRIMARY KEY,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                protocol_version TEXT NOT NULL,
                client_info TEXT NOT NULL,
                client_capabilities TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_{table}_expires_at ON {table}(expires_at);
            "#
        ))?;
        return Ok(());
    }

    let exists = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    if exists {
        Ok(())
    } else {
        Err(StoreError::MissingSchema(table.to_string()))
    }
}

fn timestamp(millis: i64, id: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| StoreError::Corrupt {
        id: id.to_string(),
        message: format!("timestamp {millis} out of range"),
    })
}

fn row_to_session(row: &Row<'_>) -> StoreResult<Session> {
    let id: String = row.get(0)?;
    let created_at: i64 = row.get(1)?;
    let expires_at: i64 = row.get(2)?;
    let protocol_version: String = row.get(3)?;
    let client_info: String = row.get(4)?;
    let client_capabilities: String = row.get(5)?;

    let decode = |text: &str| {
        serde_json::from_str(text).map_err(|e| StoreError::Corrupt {
            id: id.clone(),
            message: e.to_string(),
        })
    };

    Ok(Session {
        created_at: timestamp(created_at, &id)?,
        expires_at: timestamp(expires_at, &id)?,
        protocol_version,
        client_info: decode(&client_info)?,
        client_capabilities: decode(&client_capabilities)?,
        id,
    })
}

#[async_trait]
impl SessionBackend for SqliteSessionBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn insert(&self, session: &Session) -> StoreResult<()> {
        let session = session.clone();
        self.run(move |conn, table| {
            conn.execute(
                &format!(
                    "INSERT INTO {table} (session_id, created_at, expires_at, protocol_version, \
                     client_info, client_capabilities) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
                ),
                params![
                    session.id,
                    session.created_at.timestamp_millis(),
                    session.expires_at.timestamp_millis(),
                    session.protocol_version,
                    session.client_info.to_string(),
                    session.client_capabilities.to_string(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn fetch(&self, id: &str) -> StoreResult<Option<Session>> {
        let id = id.to_string();
        self.run(move |conn, table| {
            let mut stmt = conn.prepare(&format!(
                "SELECT session_id, created_at, expires_at, protocol_version, client_info, \
                 client_capabilities FROM {table} WHERE session_id = ?1"
            ))?;
            let mut rows = stmt.query(params![id])?;
            match rows.next()? {
                Some(row) => row_to_session(row).map(Some),
                None => Ok(None),
            }
        })
        .await
    }

    async fn extend(&self, id: &str, expires_at: DateTime<Utc>) -> StoreResult<bool> {
        let id = id.to_string();
        let expires_at = expires_at.timestamp_millis();
        self.run(move |conn, table| {
            let updated = conn.execute(
                &format!("UPDATE {table} SET expires_at = ?1 WHERE session_id = ?2"),
                params![expires_at, id],
            )?;
            Ok(updated > 0)
        })
        .await
    }

    async fn remove(&self, id: &str) -> StoreResult<bool> {
        let id = id.to_string();
        self.run(move |conn, table| {
            let removed = conn.execute(
                &format!("DELETE FROM {table} WHERE session_id = ?1"),
                params![id],
            )?;
            Ok(removed > 0)
        })
        .await
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<usize> {
        let now = now.timestamp_millis();
        self.run(move |conn, table| {
            let removed = conn.execute(
                &format!("DELETE FROM {table} WHERE expires_at <= ?1"),
                params![now],
            )?;
            Ok(removed)
        })
        .await
    }
}
