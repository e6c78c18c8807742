//! Protocol error module.
//!
//! Internal protocol failures. The engine converts these into JSON-RPC
//! error objects before anything reaches the wire.

use thiserror::Error;

/// Errors that can occur during protocol operations.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Error when the JSON-RPC message is invalid.
    #[error("Invalid JSON-RPC message: {0}")]
    InvalidMessage(String),

    /// Error when the JSON-RPC request has invalid parameters.
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// Error when the protocol version is unsupported.
    #[error("Unsupported protocol version: {0}")]
    UnsupportedVersion(String),

    /// Error when the message exceeds the maximum allowed size.
    #[error("Message size exceeds maximum allowed: {size} > {max_size}")]
    MessageTooLarge {
        /// The actual size of the message in bytes
        size: usize,
        /// The maximum allowed size in bytes
        max_size: usize,
    },

    /// Error when a session is required but cannot be resolved.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Error when the engine does not answer within the request budget.
    #[error("Request timed out after {0} milliseconds")]
    Timeout(u64),

    /// Other protocol errors.
    #[error("Protocol error: {0}")]
    Other(String),
}
