//! Shared outbound HTTP client construction and error mapping.

use std::time::Duration;

use reqwest::{redirect, Client, StatusCode};

use crate::config::http::HttpConfig;
use crate::error::http::HttpError;

/// Builds the client shared by search, fetch and embedding calls.
pub fn build_client(config: &HttpConfig) -> Result<Client, HttpError> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .connect_timeout(config.connect_timeout())
        .redirect(redirect::Policy::limited(config.max_redirects))
        .pool_idle_timeout(Duration::from_secs(90))
        .build()
        .map_err(|e| HttpError::ClientBuild(e.to_string()))
}

/// Maps a transport-level send failure, keeping the budget that was exceeded.
pub fn send_error(err: reqwest::Error, timeout: Duration) -> HttpError {
    if err.is_timeout() {
        HttpError::RequestTimeout(timeout)
    } else {
        HttpError::from(err)
    }
}

/// Generic classification of a non-success status.
pub fn status_error(status: StatusCode, message: String) -> HttpError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => HttpError::Unauthorized(message),
        StatusCode::TOO_MANY_REQUESTS => HttpError::RateLimited(message),
        _ => HttpError::HttpStatus {
            status: status.as_u16(),
            message,
        },
    }
}

/// Shortens an error body for logs and messages.
pub fn excerpt(body: &str) -> String {
    const LIMIT: usize = 200;
    let trimmed = body.trim();
    if trimmed.chars().count() <= LIMIT {
        trimmed.to_string()
    } else {
        let mut cut: String = trimmed.chars().take(LIMIT).collect();
        cut.push_str("...");
        cut
    }
}
