// Copyright (c) 2025 Nalu MCP Authors
//
// Licensed under dual license:
// - MIT License (LICENSE-MIT or https://opensource.org/licenses/MIT)
// - Apache License, Version 2.0 (LICENSE-APACHE or https://www.apache.org/licenses/LICENSE-2.0)

//! Search, scrape and rank pipeline behind the `search` tool.
//!
//! A call runs in three stages:
//!
//! 1. ask the [`SearchProvider`] for up to `num_results` hits;
//! 2. fetch every hit concurrently, keeping search rank order, with each page
//!    bounded by its own timeout and by the pipeline deadline;
//! 3. optionally chunk the scraped text and rank the chunks against the query.
//!
//! A page that cannot be fetched is kept at its rank with method `failed`
//! rather than failing the call. Only the search stage can fail the call.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, warn};

pub mod chunk;
pub mod client;
pub mod fetch;
pub mod rank;
pub mod search;

use crate::config::NaluConfig;
use crate::error::http::HttpError;
use chunk::{chunk_text, Chunk};
use fetch::{PageFetcher, RenderedFetcher, ScrapingMethod, StaticFetcher};
use rank::{
    embedding_scores, lexical_scores, rank_chunks, EmbeddingBackend, HttpEmbeddingBackend,
    ScoringMethod,
};
use search::{GoogleSearchProvider, SearchCredentials, SearchHit, SearchProvider};

/// Fewest results a call asks for.
pub const MIN_NUM_RESULTS: usize = 1;

/// Most results a call asks for.
pub const MAX_NUM_RESULTS: usize = 10;

/// Results requested when the caller does not say.
pub const DEFAULT_NUM_RESULTS: usize = 3;

/// Clamps a requested result count to [`MIN_NUM_RESULTS`]..=[`MAX_NUM_RESULTS`].
pub fn clamp_num_results(requested: i64) -> usize {
    usize::try_from(requested)
        .unwrap_or(MIN_NUM_RESULTS)
        .clamp(MIN_NUM_RESULTS, MAX_NUM_RESULTS)
}

/// How pages are fetched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchStrategy {
    /// Plain HTTP GET
    #[default]
    Static,
    /// Headless rendering service, for script-heavy pages
    Rendered,
}

/// One pipeline invocation.
#[derive(Debug, Clone)]
pub struct RetrievalRequest {
    /// Search query
    pub query: String,
    /// Number of hits to fetch, already clamped
    pub num_results: usize,
    /// Fetch strategy
    pub strategy: FetchStrategy,
    /// Chunk and rank the scraped text
    pub use_rag: bool,
    /// Chunk size in characters, already clamped
    pub chunk_size: usize,
    /// Credentials for the search call
    pub credentials: SearchCredentials,
}

/// A search hit together with its scraped text.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapedDocument {
    /// 1-based search rank
    pub rank: usize,
    /// Page URL
    pub url: String,
    /// Page title from the search engine
    pub title: String,
    /// Search snippet
    pub snippet: String,
    /// Full extracted text; empty when the fetch failed
    pub text: String,
    /// How the text was obtained
    pub method: ScrapingMethod,
}

/// A ranked chunk as reported to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedChunk {
    /// Search rank of the source document
    pub rank: usize,
    /// Source URL
    pub url: String,
    /// Source title
    pub title: String,
    /// Character offset inside the document
    pub offset: usize,
    /// Chunk text
    pub text: String,
    /// Relevance score
    pub score: f64,
}

/// Outcome of the ranking stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RagStatus {
    /// Ranked with the preferred scorer
    Success,
    /// The embedding backend failed; ranked lexically
    Fallback,
    /// Nothing was scraped, so there was nothing to rank
    NoContent,
}

/// Ranking results attached to the output when RAG is requested.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RagAnalysis {
    /// Outcome
    pub status: RagStatus,
    /// Scorer used for every chunk of this call
    pub scoring: ScoringMethod,
    /// Chunk size used
    pub chunk_size: usize,
    /// Chunks scored
    pub total_chunks: usize,
    /// Chunks with a positive score
    pub relevant_chunks: usize,
    /// Best chunks, best first
    pub top_chunks: Vec<RankedChunk>,
}

/// Result of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalOutput {
    /// The query that was searched
    pub query: String,
    /// Documents in search rank order
    pub documents: Vec<ScrapedDocument>,
    /// Ranking results, when requested
    pub rag: Option<RagAnalysis>,
}

/// Truncates to `max_chars` characters, marking the cut with `...`.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

impl RetrievalOutput {
    /// JSON payload returned by the `search` tool.
    pub fn to_json(&self, max_content_chars: usize) -> Value {
        let results: Vec<Value> = self
            .documents
            .iter()
            .map(|doc| {
                json!({
                    "rank": doc.rank,
                    "url": doc.url,
                    "title": doc.title,
                    "snippet": doc.snippet,
                    "scraped_content": truncate_chars(&doc.text, max_content_chars),
                    "scraping_method": doc.method,
                    "length": doc.text.chars().count(),
                })
            })
            .collect();

        let mut payload = Map::new();
        payload.insert("query".to_string(), json!(self.query));
        payload.insert("total_results".to_string(), json!(self.documents.len()));
        payload.insert("results".to_string(), Value::Array(results));
        if let Some(rag) = &self.rag {
            payload.insert("rag_analysis".to_string(), json!(rag));
        }
        Value::Object(payload)
    }
}

/// Failures that abort a pipeline run.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The search call failed
    #[error("Search failed: {0}")]
    Search(#[from] HttpError),

    /// The search call did not finish in time
    #[error("Search timed out after {0:?}")]
    SearchTimeout(Duration),
}

/// Time budgets and limits of the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Budget of the search call
    pub search_timeout: Duration,
    /// Budget of one page fetch
    pub fetch_timeout: Duration,
    /// Budget of the whole run, measured from its start
    pub deadline: Duration,
    /// Chunks returned by the ranking stage
    pub top_k_chunks: usize,
}

impl PipelineSettings {
    /// Settings taken from the loaded configuration.
    pub fn from_config(config: &NaluConfig) -> Self {
        Self {
            search_timeout: config.search.timeout(),
            fetch_timeout: config.http.fetch_timeout(),
            deadline: config.retrieval.pipeline_deadline(),
            top_k_chunks: config.retrieval.top_k_chunks,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&NaluConfig::default())
    }
}

/// The search, scrape and rank pipeline.
#[derive(Debug, Clone)]
pub struct RetrievalPipeline {
    search: Arc<dyn SearchProvider>,
    static_fetcher: Arc<dyn PageFetcher>,
    rendered_fetcher: Option<Arc<dyn PageFetcher>>,
    embeddings: Option<Arc<dyn EmbeddingBackend>>,
    settings: PipelineSettings,
}

impl RetrievalPipeline {
    /// Creates a pipeline with only the static fetcher and lexical scoring.
    pub fn new(
        search: Arc<dyn SearchProvider>,
        static_fetcher: Arc<dyn PageFetcher>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            search,
            static_fetcher,
            rendered_fetcher: None,
            embeddings: None,
            settings,
        }
    }

    /// Adds a fetcher for the rendered strategy.
    pub fn with_rendered_fetcher(mut self, fetcher: Arc<dyn PageFetcher>) -> Self {
        self.rendered_fetcher = Some(fetcher);
        self
    }

    /// Adds an embedding backend, making embedding the preferred scorer.
    pub fn with_embeddings(mut self, backend: Arc<dyn EmbeddingBackend>) -> Self {
        self.embeddings = Some(backend);
        self
    }

    /// Wires the production collaborators from configuration.
    pub fn from_config(config: &NaluConfig) -> Result<Self, HttpError> {
        let client = client::build_client(&config.http)?;
        let mut pipeline = Self::new(
            Arc::new(GoogleSearchProvider::new(client.clone(), &config.search)),
            Arc::new(StaticFetcher::new(client.clone(), &config.http)),
            PipelineSettings::from_config(config),
        );
        if let Some(rendered) = RenderedFetcher::from_config(client.clone(), &config.http) {
            pipeline = pipeline.with_rendered_fetcher(Arc::new(rendered));
        }
        if let Some(backend) = HttpEmbeddingBackend::from_config(client, &config.retrieval.embedding)
        {
            pipeline = pipeline.with_embeddings(Arc::new(backend));
        }
        Ok(pipeline)
    }

    /// Settings in use.
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    fn fetcher_for(&self, strategy: FetchStrategy) -> &dyn PageFetcher {
        match (strategy, self.rendered_fetcher.as_deref()) {
            (FetchStrategy::Rendered, Some(rendered)) => rendered,
            (FetchStrategy::Rendered, None) => {
                debug!("No render endpoint configured, using static fetch");
                self.static_fetcher.as_ref()
            }
            (FetchStrategy::Static, _) => self.static_fetcher.as_ref(),
        }
    }

    /// Runs the pipeline for one request.
    pub async fn run(&self, request: &RetrievalRequest) -> Result<RetrievalOutput, RetrievalError> {
        let deadline = Instant::now() + self.settings.deadline;

        let hits = timeout(
            self.settings.search_timeout,
            self.search
                .search(&request.query, request.num_results, &request.credentials),
        )
        .await
        .map_err(|_| RetrievalError::SearchTimeout(self.settings.search_timeout))??;
        info!(query = %request.query, hits = hits.len(), "Search completed");

        let fetcher = self.fetcher_for(request.strategy);
        let documents: Vec<ScrapedDocument> = stream::iter(
            hits.into_iter()
                .enumerate()
                .map(|(i, hit)| self.scrape(fetcher, i + 1, hit, deadline)),
        )
        .buffered(request.num_results.max(MIN_NUM_RESULTS))
        .collect()
        .await;

        let rag = if request.use_rag {
            Some(self.analyse(&request.query, &documents, request.chunk_size).await)
        } else {
            None
        };

        Ok(RetrievalOutput {
            query: request.query.clone(),
            documents,
            rag,
        })
    }

    async fn scrape(
        &self,
        fetcher: &dyn PageFetcher,
        rank: usize,
        hit: SearchHit,
        deadline: Instant,
    ) -> ScrapedDocument {
        let limit = deadline.min(Instant::now() + self.settings.fetch_timeout);
        let (text, method) = match timeout_at(limit, fetcher.fetch(&hit.url)).await {
            Ok(Ok(text)) => (text, fetcher.method()),
            Ok(Err(e)) => {
                warn!(url = %hit.url, error = %e, "Page fetch failed");
                (String::new(), ScrapingMethod::Failed)
            }
            Err(_) => {
                warn!(url = %hit.url, "Page fetch timed out");
                (String::new(), ScrapingMethod::Failed)
            }
        };

        ScrapedDocument {
            rank,
            url: hit.url,
            title: hit.title,
            snippet: hit.snippet,
            text,
            method,
        }
    }

    async fn analyse(
        &self,
        query: &str,
        documents: &[ScrapedDocument],
        chunk_size: usize,
    ) -> RagAnalysis {
        let chunks: Vec<Chunk> = documents
            .iter()
            .filter(|doc| doc.method != ScrapingMethod::Failed)
            .flat_map(|doc| chunk_text(doc.rank, &doc.text, chunk_size))
            .collect();

        let preferred = if self.embeddings.is_some() {
            ScoringMethod::Embedding
        } else {
            ScoringMethod::Lexical
        };
        if chunks.is_empty() {
            return RagAnalysis {
                status: RagStatus::NoContent,
                scoring: preferred,
                chunk_size,
                total_chunks: 0,
                relevant_chunks: 0,
                top_chunks: Vec::new(),
            };
        }

        let (scores, scoring, status) = match &self.embeddings {
            Some(backend) => match embedding_scores(backend.as_ref(), query, &chunks).await {
                Ok(scores) => (scores, ScoringMethod::Embedding, RagStatus::Success),
                Err(e) => {
                    warn!(error = %e, "Embedding scoring failed, ranking lexically");
                    (
                        lexical_scores(query, &chunks),
                        ScoringMethod::Lexical,
                        RagStatus::Fallback,
                    )
                }
            },
            None => (
                lexical_scores(query, &chunks),
                ScoringMethod::Lexical,
                RagStatus::Success,
            ),
        };

        let total_chunks = chunks.len();
        let relevant_chunks = scores.iter().filter(|s| **s > 0.0).count();
        let top_chunks = rank_chunks(chunks, scores, self.settings.top_k_chunks)
            .into_iter()
            .map(|scored| {
                let source = documents.get(scored.chunk.doc_rank.saturating_sub(1));
                RankedChunk {
                    rank: scored.chunk.doc_rank,
                    url: source.map(|d| d.url.clone()).unwrap_or_default(),
                    title: source.map(|d| d.title.clone()).unwrap_or_default(),
                    offset: scored.chunk.offset,
                    text: scored.chunk.text,
                    score: scored.score,
                }
            })
            .collect();

        RagAnalysis {
            status,
            scoring,
            chunk_size,
            total_chunks,
            relevant_chunks,
            top_chunks,
        }
    }
}
