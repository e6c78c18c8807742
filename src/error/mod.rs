//! Error module for the Nalu MCP Server.
//!
//! Every subsystem owns a `thiserror` enum; `NaluError` aggregates them for
//! the composition layer and the binary. Wire-level JSON-RPC errors live in
//! [`crate::protocol::jsonrpc::error`] and tool failures never reach this type.

use once_cell::sync::OnceCell;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use thiserror::Error;

pub mod config;
pub mod http;
pub mod protocol;
pub mod store;
pub mod transport;

/// Result type alias used throughout the Nalu MCP Server.
pub type NaluResult<T> = Result<T, NaluError>;

/// Core error enum for the Nalu MCP Server.
#[derive(Error, Debug)]
pub enum NaluError {
    /// Errors occurring during configuration loading or validation.
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Errors related to the MCP protocol handling.
    #[error("Protocol error: {0}")]
    Protocol(#[from] protocol::ProtocolError),

    /// Errors raised while binding or serving the HTTP transport.
    #[error("Transport error: {0}")]
    Transport(#[from] transport::TransportError),

    /// Errors related to outbound HTTP (search, page fetch, embeddings).
    #[error("HTTP client error: {0}")]
    Http(#[from] http::HttpError),

    /// Session store errors that escaped both tiers.
    #[error("Session store error: {0}")]
    Store(#[from] store::StoreError),

    /// IO errors that may occur during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/Deserialization errors.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Custom error with message for cases where specific error types are not defined.
    #[error("{0}")]
    Custom(String),
}

/// Error reporting structure to provide context and debugging information.
#[derive(Debug)]
pub struct ErrorContext {
    /// The original error that occurred.
    pub error: NaluError,

    /// The component where the error occurred.
    pub component: String,

    /// Additional context information to help with debugging.
    pub details: Option<String>,

    /// Stack trace information if available.
    pub trace: Option<String>,
}

impl ErrorContext {
    /// Creates a new error context with the given error and component.
    pub fn new<S: Into<String>>(error: NaluError, component: S) -> Self {
        Self {
            error,
            component: component.into(),
            details: None,
            trace: None,
        }
    }

    /// Adds detail information to the error context.
    pub fn with_details<S: Into<String>>(mut self, details: S) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Adds stack trace information to the error context.
    pub fn with_trace<S: Into<String>>(mut self, trace: S) -> Self {
        self.trace = Some(trace.into());
        self
    }
}

impl Display for ErrorContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Error in {}: {}", self.component, self.error)?;
        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }
        Ok(())
    }
}

/// Error reporter trait for reporting errors to various sinks.
pub trait ErrorReporter: Send + Sync + std::fmt::Debug {
    /// Report an error with context.
    fn report(&self, context: ErrorContext);
}

/// A simple error reporter implementation that logs errors using the tracing framework.
#[derive(Default, Debug)]
pub struct TracingErrorReporter;

impl ErrorReporter for TracingErrorReporter {
    fn report(&self, context: ErrorContext) {
        tracing::error!(
            error = %context.error,
            component = %context.component,
            details = context.details.as_deref().unwrap_or("None"),
            trace = context.trace.as_deref().unwrap_or("None"),
            "Error reported"
        );
    }
}

/// Global error reporter accessor.
#[derive(Debug, Default)]
pub struct ErrorReporting {
    reporter: Option<Arc<dyn ErrorReporter>>,
}

impl ErrorReporting {
    /// Report an error with context.
    pub fn report(&self, context: ErrorContext) {
        if let Some(reporter) = &self.reporter {
            reporter.report(context);
        } else {
            // No reporter installed yet: write straight to stderr.
            eprintln!("Error: {context}");
        }
    }

    /// Returns true when a reporter has been installed.
    pub fn is_configured(&self) -> bool {
        self.reporter.is_some()
    }
}

static ERROR_REPORTING: OnceCell<ErrorReporting> = OnceCell::new();
static UNCONFIGURED: ErrorReporting = ErrorReporting { reporter: None };

/// Get the global error reporting instance.
pub fn get_error_reporting() -> &'static ErrorReporting {
    ERROR_REPORTING.get().unwrap_or(&UNCONFIGURED)
}

/// Install the global error reporter.
///
/// The reporter can only be installed once per process; later calls return
/// `false` and leave the first reporter in place.
pub fn set_error_reporter(reporter: Arc<dyn ErrorReporter>) -> bool {
    ERROR_REPORTING
        .set(ErrorReporting {
            reporter: Some(reporter),
        })
        .is_ok()
}
