// Copyright (c) 2025 Nalu MCP Authors
//
// Licensed under dual license:
// - MIT License (LICENSE-MIT or https://opensource.org/licenses/MIT)
// - Apache License, Version 2.0 (LICENSE-APACHE or https://www.apache.org/licenses/LICENSE-2.0)

//! Web search collaborator.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::client::{excerpt, send_error, status_error};
use crate::config::search::SearchConfig;
use crate::error::http::HttpError;
use crate::tools::CredentialOverrides;

/// Most results the Custom Search API returns for one request.
pub const MAX_RESULTS_PER_QUERY: usize = 10;

/// One ranked search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Result URL
    pub url: String,
    /// Page title
    pub title: String,
    /// Snippet shown by the search engine
    pub snippet: String,
}

/// Credentials used for one search call.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SearchCredentials {
    /// API key
    pub api_key: Option<String>,
    /// Search engine id
    pub engine_id: Option<String>,
}

impl fmt::Debug for SearchCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchCredentials")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("engine_id", &self.engine_id)
            .finish()
    }
}

impl SearchCredentials {
    /// Per-call overrides first, then the configured defaults, field by field.
    pub fn resolve(overrides: &CredentialOverrides, defaults: &SearchConfig) -> Self {
        Self {
            api_key: overrides
                .search_api_key
                .clone()
                .or_else(|| defaults.api_key.clone()),
            engine_id: overrides
                .search_engine_id
                .clone()
                .or_else(|| defaults.engine_id.clone()),
        }
    }
}

/// Returns ranked hits for a query.
#[async_trait]
pub trait SearchProvider: Send + Sync + fmt::Debug {
    /// Searches for `query`, returning at most `count` hits in rank order.
    async fn search(
        &self,
        query: &str,
        count: usize,
        credentials: &SearchCredentials,
    ) -> Result<Vec<SearchHit>, HttpError>;
}

/// Client for the Custom Search JSON API.
#[derive(Debug, Clone)]
pub struct GoogleSearchProvider {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    title: String,
    link: String,
    #[serde(default)]
    snippet: String,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: ErrorBody,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    errors: Vec<ErrorReason>,
}

#[derive(Debug, Deserialize)]
struct ErrorReason {
    #[serde(default)]
    reason: String,
}

impl GoogleSearchProvider {
    /// Creates a provider from the search configuration.
    pub fn new(client: Client, config: &SearchConfig) -> Self {
        Self {
            client,
            endpoint: config.endpoint.clone(),
            timeout: config.timeout(),
        }
    }
}

/// Turns an error response into an [`HttpError`], recognising rejected keys.
fn classify_failure(status: StatusCode, body: &str) -> HttpError {
    let envelope: ErrorEnvelope = serde_json::from_str(body).unwrap_or_default();
    let error = envelope.error;
    let message = if error.message.is_empty() {
        excerpt(body)
    } else {
        error.message.clone()
    };

    let rejected_key = matches!(error.status.as_str(), "PERMISSION_DENIED" | "UNAUTHENTICATED")
        || error
            .errors
            .iter()
            .any(|e| matches!(e.reason.as_str(), "keyInvalid" | "forbidden" | "accessNotConfigured"))
        || message.contains("API key not valid");
    if rejected_key {
        return HttpError::Unauthorized(message);
    }
    status_error(status, message)
}

#[async_trait]
impl SearchProvider for GoogleSearchProvider {
    async fn search(
        &self,
        query: &str,
        count: usize,
        credentials: &SearchCredentials,
    ) -> Result<Vec<SearchHit>, HttpError> {
        let (Some(api_key), Some(engine_id)) = (&credentials.api_key, &credentials.engine_id)
        else {
            return Err(HttpError::CredentialsMissing(
                "search API key and engine id are required".to_string(),
            ));
        };
        let count = count.clamp(1, MAX_RESULTS_PER_QUERY);

        let response = self
            .client
            .get(&self.endpoint)
            .timeout(self.timeout)
            .query(&[
                ("key", api_key.as_str()),
                ("cx", engine_id.as_str()),
                ("q", query),
                ("num", &count.to_string()),
            ])
            .send()
            .await
            .map_err(|e| send_error(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, &body));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| HttpError::ResponseDecodeError(e.to_string()))?;

        Ok(parsed
            .items
            .into_iter()
            .take(count)
            .map(|item| SearchHit {
                url: item.link,
                title: item.title,
                snippet: item.snippet,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn credentials() -> SearchCredentials {
        SearchCredentials {
            api_key: Some("test-key".to_string()),
            engine_id: Some("test-cx".to_string()),
        }
    }

    fn provider(server: &mockito::Server) -> GoogleSearchProvider {
        let config = SearchConfig {
            endpoint: format!("{}/customsearch/v1", server.url()),
            ..SearchConfig::default()
        };
        GoogleSearchProvider::new(Client::new(), &config)
    }

    #[test]
    fn test_overrides_win_field_by_field() {
        let defaults = SearchConfig {
            api_key: Some("default-key".to_string()),
            engine_id: Some("default-cx".to_string()),
            ..SearchConfig::default()
        };
        let overrides = CredentialOverrides {
            search_api_key: Some("call-key".to_string()),
            search_engine_id: None,
        };
        let resolved = SearchCredentials::resolve(&overrides, &defaults);
        assert_eq!(resolved.api_key.as_deref(), Some("call-key"));
        assert_eq!(resolved.engine_id.as_deref(), Some("default-cx"));
        assert!(!format!("{resolved:?}").contains("call-key"));
    }

    #[tokio::test]
    async fn test_search_returns_ranked_hits() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/customsearch/v1")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("key".into(), "test-key".into()),
                Matcher::UrlEncoded("cx".into(), "test-cx".into()),
                Matcher::UrlEncoded("q".into(), "rust async".into()),
                Matcher::UrlEncoded("num".into(), "2".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"items":[
                    {"title":"First","link":"https://a.example/","snippet":"one"},
                    {"title":"Second","link":"https://b.example/","snippet":"two"}
                ]}"#,
            )
            .create_async()
            .await;

        let hits = provider(&server)
            .search("rust async", 2, &credentials())
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].url, "https://a.example/");
        assert_eq!(hits[1].title, "Second");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_no_items_is_empty() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/customsearch/v1")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"searchInformation":{"totalResults":"0"}}"#)
            .create_async()
            .await;

        let hits = provider(&server).search("zzz", 3, &credentials()).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_key_is_credential_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/customsearch/v1")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(
                r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.",
                    "errors":[{"reason":"badRequest"}],"status":"INVALID_ARGUMENT"}}"#,
            )
            .create_async()
            .await;

        let err = provider(&server).search("q", 3, &credentials()).await.unwrap_err();
        assert!(err.is_credential_failure(), "{err:?}");
    }

    #[tokio::test]
    async fn test_rate_limit_is_classified() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/customsearch/v1")
            .match_query(Matcher::Any)
            .with_status(429)
            .with_body(r#"{"error":{"code":429,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#)
            .create_async()
            .await;

        let err = provider(&server).search("q", 3, &credentials()).await.unwrap_err();
        assert!(matches!(err, HttpError::RateLimited(m) if m == "Quota exceeded"));
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_before_calling_out() {
        let server = mockito::Server::new_async().await;
        let err = provider(&server)
            .search("q", 3, &SearchCredentials::default())
            .await
            .unwrap_err();
        assert!(matches!(err, HttpError::CredentialsMissing(_)));
    }
}
