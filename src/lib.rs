//! Nalu MCP Server Library
//!
//! This library contains the core components of the Nalu MCP Server: an MCP
//! endpoint over streamable HTTP that exposes a web search tool which scrapes
//! the result pages and optionally ranks their passages against the query.
//! The binary crate wires these components together; they can also be
//! embedded by other projects.
//!
//! # Architecture
//!
//! - [`transport`] accepts HTTP requests and hands them to the engine
//! - [`protocol`] validates JSON-RPC envelopes and runs the session state machine
//! - [`session`] stores sessions in a durable tier with an in-memory fallback
//! - [`tools`] holds the tool registry and the built-in tools
//! - [`retrieval`] implements search, scraping, chunking and ranking
//! - [`server`] builds all of the above from a [`config::NaluConfig`]

pub mod config;
pub mod error;
pub mod protocol;
pub mod retrieval;
pub mod server;
pub mod session;
pub mod tools;
pub mod transport;

// Internal modules that are not part of the public API
#[cfg(test)]
pub(crate) mod tests;

use std::sync::Arc;

/// Version information for the Nalu MCP Server.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library initialization function.
///
/// Installs the tracing-backed error reporter. Returns `false` when a reporter
/// was already installed.
pub fn init() -> bool {
    error::set_error_reporter(Arc::new(error::TracingErrorReporter))
}
