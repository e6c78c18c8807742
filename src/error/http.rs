//! Outbound HTTP error module.
//!
//! Errors produced by the search provider, the page fetchers and the
//! embedding backend. The retrieval layer classifies these into tool-level
//! messages; they never become JSON-RPC errors.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during outbound HTTP operations.
#[derive(Error, Debug)]
pub enum HttpError {
    /// The shared HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    /// Error when a request fails due to a timeout.
    #[error("Request timed out after {0:?}")]
    RequestTimeout(Duration),

    /// The upstream service rejected the supplied credentials.
    #[error("Authentication rejected: {0}")]
    Unauthorized(String),

    /// No credentials were available for a service that needs them.
    #[error("Missing credentials: {0}")]
    CredentialsMissing(String),

    /// Error when the upstream service throttles the request.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Error when a request results in an HTTP error status code.
    #[error("HTTP error status: {status} - {message}")]
    HttpStatus {
        /// The HTTP status code
        status: u16,
        /// The error message
        message: String,
    },

    /// Error when a response cannot be decoded.
    #[error("Response decode error: {0}")]
    ResponseDecodeError(String),

    /// Error when a response carries content we cannot extract text from.
    #[error("Unsupported content type: {0}")]
    UnsupportedContent(String),

    /// Error when the URL is invalid or uses a scheme we do not fetch.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Error when a required upstream endpoint has not been configured.
    #[error("Endpoint not configured: {0}")]
    NotConfigured(String),

    /// Other HTTP client errors.
    #[error("HTTP client error: {0}")]
    Other(String),
}

impl HttpError {
    /// Returns true when the failure is caused by missing or rejected credentials.
    pub fn is_credential_failure(&self) -> bool {
        matches!(self, Self::Unauthorized(_) | Self::CredentialsMissing(_))
    }
}

impl From<reqwest::Error> for HttpError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::RequestTimeout(Duration::ZERO);
        }
        if err.is_decode() {
            return Self::ResponseDecodeError(err.to_string());
        }
        if let Some(status) = err.status() {
            return Self::HttpStatus {
                status: status.as_u16(),
                message: err.to_string(),
            };
        }
        Self::Other(err.to_string())
    }
}
