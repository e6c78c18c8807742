// Copyright (c) 2025 Nalu MCP Authors
//
// Licensed under dual license:
// - MIT License (LICENSE-MIT or https://opensource.org/licenses/MIT)
// - Apache License, Version 2.0 (LICENSE-APACHE or https://www.apache.org/licenses/LICENSE-2.0)

//! Page fetchers and text extraction.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};
use scraper::{Html, Node, Selector};
use serde::Serialize;
use serde_json::json;
use url::Url;

use super::client::{excerpt, send_error, status_error};
use crate::config::http::HttpConfig;
use crate::error::http::HttpError;

/// How a document's text was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapingMethod {
    /// Plain HTTP GET
    Static,
    /// Headless rendering service
    Rendered,
    /// Fetch or extraction failed; the text is empty
    Failed,
}

impl fmt::Display for ScrapingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Static => "static",
            Self::Rendered => "rendered",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Retrieves the readable text of a page.
#[async_trait]
pub trait PageFetcher: Send + Sync + fmt::Debug {
    /// The method recorded for documents this fetcher produces.
    fn method(&self) -> ScrapingMethod;

    /// Fetches `url` and returns its visible text.
    async fn fetch(&self, url: &str) -> Result<String, HttpError>;
}

/// Parses `raw` and rejects anything that is not http or https.
pub fn validate_url(raw: &str) -> Result<Url, HttpError> {
    let url = Url::parse(raw).map_err(|e| HttpError::InvalidUrl(format!("{raw}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(HttpError::InvalidUrl(format!(
            "{raw}: scheme {other} is not fetched"
        ))),
    }
}

const SKIPPED_ELEMENTS: [&str; 5] = ["script", "style", "noscript", "template", "head"];

/// Visible text of an HTML document with whitespace collapsed.
pub fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let root = Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .unwrap_or_else(|| document.root_element());

    let mut words: Vec<&str> = Vec::new();
    for node in root.descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|element| SKIPPED_ELEMENTS.contains(&element.name()))
        });
        if !hidden {
            words.extend(text.split_whitespace());
        }
    }
    words.join(" ")
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Reads at most `limit` bytes of the body.
async fn read_capped(mut response: Response, limit: usize) -> Result<String, HttpError> {
    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        let room = limit.saturating_sub(body.len());
        if chunk.len() >= room {
            body.extend_from_slice(&chunk[..room]);
            break;
        }
        body.extend_from_slice(&chunk);
    }
    Ok(String::from_utf8_lossy(&body).into_owned())
}

/// Turns a response body into text according to its content type.
fn body_to_text(content_type: &str, body: &str) -> Result<String, HttpError> {
    let content_type = content_type.to_ascii_lowercase();
    if content_type.is_empty() || content_type.contains("html") || content_type.contains("xml") {
        Ok(extract_text(body))
    } else if content_type.starts_with("text/") || content_type.contains("json") {
        Ok(normalize_whitespace(body))
    } else {
        Err(HttpError::UnsupportedContent(content_type))
    }
}

fn content_type(response: &Response) -> String {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Fetches pages with a plain GET.
#[derive(Debug, Clone)]
pub struct StaticFetcher {
    client: Client,
    timeout: Duration,
    max_page_bytes: usize,
}

impl StaticFetcher {
    /// Creates a fetcher using the shared client.
    pub fn new(client: Client, config: &HttpConfig) -> Self {
        Self {
            client,
            timeout: config.fetch_timeout(),
            max_page_bytes: config.max_page_bytes,
        }
    }
}

#[async_trait]
impl PageFetcher for StaticFetcher {
    fn method(&self) -> ScrapingMethod {
        ScrapingMethod::Static
    }

    async fn fetch(&self, url: &str) -> Result<String, HttpError> {
        let url = validate_url(url)?;
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| send_error(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, format!("fetching page returned {status}")));
        }

        let content_type = content_type(&response);
        let body = read_capped(response, self.max_page_bytes).await?;
        body_to_text(&content_type, &body)
    }
}

/// Fetches pages through a headless rendering service.
///
/// The service receives `{"url": ...}` and answers with the rendered HTML.
#[derive(Debug, Clone)]
pub struct RenderedFetcher {
    client: Client,
    endpoint: String,
    token: Option<String>,
    timeout: Duration,
    max_page_bytes: usize,
}

impl RenderedFetcher {
    /// Creates a fetcher for `endpoint`.
    pub fn new(client: Client, endpoint: String, config: &HttpConfig) -> Self {
        Self {
            client,
            endpoint,
            token: config.render_token.clone(),
            timeout: config.fetch_timeout(),
            max_page_bytes: config.max_page_bytes,
        }
    }

    /// Creates a fetcher when a render endpoint is configured.
    pub fn from_config(client: Client, config: &HttpConfig) -> Option<Self> {
        config
            .render_endpoint
            .clone()
            .map(|endpoint| Self::new(client, endpoint, config))
    }
}

#[async_trait]
impl PageFetcher for RenderedFetcher {
    fn method(&self) -> ScrapingMethod {
        ScrapingMethod::Rendered
    }

    async fn fetch(&self, url: &str) -> Result<String, HttpError> {
        let url = validate_url(url)?;
        let mut request = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&json!({ "url": url.as_str() }));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| send_error(e, self.timeout))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, excerpt(&body)));
        }

        let content_type = content_type(&response);
        let body = read_capped(response, self.max_page_bytes).await?;
        body_to_text(&content_type, &body)
    }
}
