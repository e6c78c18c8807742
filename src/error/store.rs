//! Session store error module.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur inside a session backend.
///
/// Backend errors are masked by the fallback tier; only `Unavailable`
/// escapes the [`crate::session::SessionStore`] facade.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The durable database could not be opened.
    #[error("Failed to open session database: {0}")]
    Open(String),

    /// The session table does not exist and schema creation is disabled.
    #[error("Session table {0} does not exist")]
    MissingSchema(String),

    /// A query against the durable tier failed.
    #[error("Session query failed: {0}")]
    Query(String),

    /// A stored record could not be decoded.
    #[error("Corrupt session record {id}: {message}")]
    Corrupt {
        /// Session id of the bad record
        id: String,
        /// Decode failure
        message: String,
    },

    /// The durable tier did not answer in time.
    #[error("Session backend timed out after {0:?}")]
    Timeout(Duration),

    /// The blocking worker running a durable operation failed.
    #[error("Session worker failed: {0}")]
    Worker(String),

    /// Every tier failed for this operation.
    #[error("Session store unavailable: {0}")]
    Unavailable(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Query(err.to_string())
    }
}
