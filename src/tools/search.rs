//! `search` tool: web search with scraping and optional chunk ranking.

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use super::{
    saturating_integer, CallContext, CallToolResult, SchemaViolation, ToolArguments,
    ToolDescriptor, ToolError, ToolHandler,
};
use crate::config::search::SearchConfig;
use crate::error::http::HttpError;
use crate::retrieval::chunk::{clamp_chunk_size, DEFAULT_CHUNK_SIZE};
use crate::retrieval::search::SearchCredentials;
use crate::retrieval::{
    clamp_num_results, FetchStrategy, RetrievalError, RetrievalPipeline, RetrievalRequest,
    DEFAULT_NUM_RESULTS,
};

/// Arguments of the `search` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SearchArgs {
    /// The search query
    #[schemars(length(min = 1))]
    pub query: String,

    /// Number of results to fetch, clamped to 1-10
    #[serde(default = "default_num_results", deserialize_with = "saturating_integer")]
    #[schemars(with = "i64")]
    pub num_results: i64,

    /// Render pages in a headless browser before extracting text
    #[serde(default)]
    pub use_playwright: bool,

    /// Chunk the scraped text and rank it against the query
    #[serde(default)]
    pub use_rag: bool,

    /// Chunk size in characters, at least 50
    #[serde(default = "default_chunk_size", deserialize_with = "saturating_integer")]
    #[schemars(with = "i64")]
    pub chunk_size: i64,
}

fn default_num_results() -> i64 {
    DEFAULT_NUM_RESULTS as i64
}

fn default_chunk_size() -> i64 {
    DEFAULT_CHUNK_SIZE as i64
}

impl ToolArguments for SearchArgs {
    fn check(&self) -> Result<(), SchemaViolation> {
        if self.query.trim().is_empty() {
            return Err(SchemaViolation::new("arguments.query", "must not be blank"));
        }
        Ok(())
    }
}

/// Runs the retrieval pipeline for a query.
#[derive(Debug, Clone)]
pub struct SearchTool {
    pipeline: Arc<RetrievalPipeline>,
    defaults: SearchConfig,
    max_content_chars: usize,
}

impl SearchTool {
    /// Creates the tool.
    ///
    /// `defaults` supplies credentials when a call carries no override.
    pub fn new(
        pipeline: Arc<RetrievalPipeline>,
        defaults: SearchConfig,
        max_content_chars: usize,
    ) -> Self {
        Self {
            pipeline,
            defaults,
            max_content_chars,
        }
    }

    /// Registry entry for this tool.
    pub fn descriptor(self) -> ToolDescriptor {
        ToolDescriptor::new(
            "search",
            "Search the web, scrape the top results and optionally rank the most relevant passages.",
            self,
        )
    }

    fn request(&self, args: SearchArgs, ctx: &CallContext) -> RetrievalRequest {
        RetrievalRequest {
            query: args.query.trim().to_string(),
            num_results: clamp_num_results(args.num_results),
            strategy: if args.use_playwright {
                FetchStrategy::Rendered
            } else {
                FetchStrategy::Static
            },
            use_rag: args.use_rag,
            chunk_size: clamp_chunk_size(args.chunk_size),
            credentials: SearchCredentials::resolve(&ctx.overrides, &self.defaults),
        }
    }
}

impl From<RetrievalError> for ToolError {
    fn from(err: RetrievalError) -> Self {
        match err {
            RetrievalError::Search(HttpError::CredentialsMissing(_)) => ToolError::Credentials(
                "Search API credentials not configured. Provide an API key and search engine id \
                 in the configuration or with the x-search-api-key and x-search-engine-id headers."
                    .to_string(),
            ),
            RetrievalError::Search(HttpError::Unauthorized(message)) => {
                ToolError::Credentials(format!("Search authentication failed: {message}"))
            }
            RetrievalError::Search(HttpError::RateLimited(message)) => {
                ToolError::Upstream(format!("Search rate limit exceeded: {message}"))
            }
            RetrievalError::SearchTimeout(after) | RetrievalError::Search(HttpError::RequestTimeout(after)) => {
                ToolError::Upstream(format!("Search timed out after {}ms", after.as_millis()))
            }
            RetrievalError::Search(other) => ToolError::Upstream(format!("Search failed: {other}")),
        }
    }
}

#[async_trait]
impl ToolHandler for SearchTool {
    type Args = SearchArgs;

    async fn call(&self, args: SearchArgs, ctx: &CallContext) -> Result<CallToolResult, ToolError> {
        let request = self.request(args, ctx);
        let output = self.pipeline.run(&request).await?;
        Ok(CallToolResult::json(&output.to_json(self.max_content_chars)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::fetch::{PageFetcher, ScrapingMethod};
    use crate::retrieval::search::{SearchHit, SearchProvider};
    use crate::retrieval::PipelineSettings;
    use crate::tools::{parse_arguments, CredentialOverrides};
    use serde_json::{json, Value};
    use test_case::test_case;
    use std::time::Duration;

    /// Answers with two hits only when the expected key is supplied.
    #[derive(Debug)]
    struct KeyedSearch {
        key: &'static str,
    }

    #[async_trait]
    impl SearchProvider for KeyedSearch {
        async fn search(
            &self,
            _query: &str,
            count: usize,
            credentials: &SearchCredentials,
        ) -> Result<Vec<SearchHit>, HttpError> {
            match credentials.api_key.as_deref() {
                None => Err(HttpError::CredentialsMissing("no key".to_string())),
                Some(key) if key == self.key => Ok((1..=2)
                    .take(count)
                    .map(|n| SearchHit {
                        url: format!("https://site{n}.example/"),
                        title: format!("Site {n}"),
                        snippet: String::new(),
                    })
                    .collect()),
                Some(_) => Err(HttpError::Unauthorized("API key not valid".to_string())),
            }
        }
    }

    #[derive(Debug)]
    struct EchoFetcher;

    #[async_trait]
    impl PageFetcher for EchoFetcher {
        fn method(&self) -> ScrapingMethod {
            ScrapingMethod::Static
        }

        async fn fetch(&self, url: &str) -> Result<String, HttpError> {
            Ok(format!("content of {url}"))
        }
    }

    fn tool(default_key: Option<&str>) -> SearchTool {
        let pipeline = RetrievalPipeline::new(
            Arc::new(KeyedSearch { key: "good" }),
            Arc::new(EchoFetcher),
            PipelineSettings {
                search_timeout: Duration::from_secs(1),
                fetch_timeout: Duration::from_secs(1),
                deadline: Duration::from_secs(2),
                top_k_chunks: 5,
            },
        );
        let defaults = SearchConfig {
            api_key: default_key.map(str::to_string),
            engine_id: Some("cx".to_string()),
            ..SearchConfig::default()
        };
        SearchTool::new(Arc::new(pipeline), defaults, 2000)
    }

    fn args(value: Value) -> SearchArgs {
        parse_arguments(Some(&value)).unwrap()
    }

    #[tokio::test]
    async fn test_returns_ordered_results() {
        let result = tool(Some("good"))
            .call(args(json!({"query": "rust"})), &CallContext::default())
            .await
            .unwrap();
        let payload: Value = serde_json::from_str(&result.joined_text()).unwrap();
        assert_eq!(payload["total_results"], 2);
        assert_eq!(payload["results"][0]["rank"], 1);
        assert_eq!(payload["results"][1]["url"], "https://site2.example/");
        assert_eq!(payload["results"][1]["scraping_method"], "static");
    }

    #[tokio::test]
    async fn test_override_key_used_for_one_call() {
        let tool = tool(Some("bad"));
        let ctx = CallContext {
            session_id: "s".to_string(),
            overrides: CredentialOverrides {
                search_api_key: Some("good".to_string()),
                search_engine_id: None,
            },
        };
        assert!(tool.call(args(json!({"query": "q"})), &ctx).await.is_ok());

        let err = tool
            .call(args(json!({"query": "q"})), &CallContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Credentials(m) if m.starts_with("Search authentication failed")));
    }

    #[tokio::test]
    async fn test_missing_credentials_message() {
        let err = tool(None)
            .call(args(json!({"query": "q"})), &CallContext::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("credentials not configured"));
    }

    #[test_case(json!({"query": "   "}) ; "whitespace only")]
    #[test_case(json!({"query": ""}) ; "empty")]
    #[test_case(json!({"query": "\t\n"}) ; "control whitespace")]
    fn test_blank_query_is_a_schema_violation(arguments: Value) {
        let err = parse_arguments::<SearchArgs>(Some(&arguments)).unwrap_err();
        assert_eq!(err.field, "arguments.query");
    }

    #[test]
    fn test_schema_advertises_arguments() {
        let descriptor = tool(Some("good")).descriptor();
        let schema = descriptor.input_schema();
        assert_eq!(schema["required"], json!(["query"]));
        assert_eq!(schema["properties"]["query"]["minLength"], 1);
        for name in ["num_results", "chunk_size"] {
            assert_eq!(schema["properties"][name]["type"], "integer");
        }
        for name in ["use_playwright", "use_rag"] {
            assert_eq!(schema["properties"][name]["type"], "boolean");
        }
        assert_eq!(schema["additionalProperties"], false);
    }

    #[test]
    fn test_request_uses_defaults() {
        let request = tool(Some("good")).request(args(json!({"query": "  q  "})), &CallContext::default());
        assert_eq!(request.query, "q");
        assert_eq!(request.num_results, DEFAULT_NUM_RESULTS);
        assert_eq!(request.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(request.strategy, FetchStrategy::Static);
    }

    #[test]
    fn test_request_clamps_arguments() {
        let tool = tool(Some("good"));
        let request = tool.request(
            args(json!({"query": "q", "num_results": 15, "chunk_size": 10, "use_playwright": true})),
            &CallContext::default(),
        );
        assert_eq!(request.num_results, 10);
        assert_eq!(request.chunk_size, 50);
        assert_eq!(request.strategy, FetchStrategy::Rendered);
        assert!(!request.use_rag);

        let request = tool.request(args(json!({"query": "q", "num_results": 0})), &CallContext::default());
        assert_eq!(request.num_results, 1);
    }

    #[test_case(json!(18446744073709551615u64), 10 ; "beyond i64")]
    #[test_case(json!(1e20), 10 ; "huge float")]
    #[test_case(json!(-1e20), 1 ; "huge negative float")]
    #[test_case(json!(7.0), 7 ; "integral float")]
    fn test_out_of_range_num_results_are_clamped(num_results: Value, expected: usize) {
        let request = tool(Some("good")).request(
            args(json!({"query": "q", "num_results": num_results})),
            &CallContext::default(),
        );
        assert_eq!(request.num_results, expected);
    }

    #[test]
    fn test_error_classification() {
        let timeout: ToolError = RetrievalError::SearchTimeout(Duration::from_millis(1500)).into();
        assert_eq!(timeout.to_string(), "Search timed out after 1500ms");
        let limited: ToolError =
            RetrievalError::Search(HttpError::RateLimited("quota".to_string())).into();
        assert_eq!(limited.to_string(), "Search rate limit exceeded: quota");
        let other: ToolError = RetrievalError::Search(HttpError::HttpStatus {
            status: 500,
            message: "boom".to_string(),
        })
        .into();
        assert!(other.to_string().starts_with("Search failed:"));
    }
}
