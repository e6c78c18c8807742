//! Transport error module.
//!
//! Errors raised by the HTTP transport while binding and serving.

use std::io;
use std::net::SocketAddr;
use thiserror::Error;

/// Errors that can occur during transport operations.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The listener could not be bound.
    #[error("Failed to bind {address}: {source}")]
    Bind {
        /// Address we tried to bind
        address: SocketAddr,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// The server loop terminated with an error.
    #[error("Server error: {0}")]
    Serve(#[from] io::Error),

    /// A header value could not be encoded in a response.
    #[error("Invalid header value for {0}")]
    InvalidHeader(String),

    /// Other transport errors.
    #[error("Transport error: {0}")]
    Other(String),
}
