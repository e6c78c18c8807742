// Copyright (c) 2025 Nalu MCP Authors
//
// Licensed under dual license:
// - MIT License (LICENSE-MIT or https://opensource.org/licenses/MIT)
// - Apache License, Version 2.0 (LICENSE-APACHE or https://www.apache.org/licenses/LICENSE-2.0)

//! Chunk relevance scoring.
//!
//! Two scorers exist and exactly one is used per call: cosine similarity of
//! embeddings when an embedding backend is configured and answers, otherwise
//! a lexical TF-IDF cosine computed over the chunks of that call. Ranking is
//! by score descending, ties broken by (document rank, chunk offset)
//! ascending.

use std::cmp::Ordering;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use fnv::FnvHashMap;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::chunk::Chunk;
use super::client::{excerpt, send_error, status_error};
use crate::config::retrieval::EmbeddingConfig;
use crate::error::http::HttpError;

/// Which scorer produced a ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringMethod {
    /// Embedding cosine similarity
    Embedding,
    /// TF-IDF cosine similarity
    Lexical,
}

/// A chunk with its relevance score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    /// The chunk
    pub chunk: Chunk,
    /// Relevance to the query; higher is better
    pub score: f64,
}

/// Produces vector embeddings for text.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync + fmt::Debug {
    /// Embeds every input, returning vectors in input order.
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, HttpError>;
}

/// OpenAI-compatible `/embeddings` client.
#[derive(Debug, Clone)]
pub struct HttpEmbeddingBackend {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

impl HttpEmbeddingBackend {
    /// Creates a backend for `endpoint`.
    pub fn new(client: Client, endpoint: String, config: &EmbeddingConfig) -> Self {
        Self {
            client,
            endpoint,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            timeout: config.timeout(),
        }
    }

    /// Creates a backend when the configuration names an endpoint.
    pub fn from_config(client: Client, config: &EmbeddingConfig) -> Option<Self> {
        config
            .endpoint
            .clone()
            .map(|endpoint| Self::new(client, endpoint, config))
    }
}

#[async_trait]
impl EmbeddingBackend for HttpEmbeddingBackend {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, HttpError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&json!({ "model": self.model, "input": inputs }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
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

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| HttpError::ResponseDecodeError(e.to_string()))?;
        if parsed.data.len() != inputs.len() {
            return Err(HttpError::ResponseDecodeError(format!(
                "expected {} embeddings, got {}",
                inputs.len(),
                parsed.data.len()
            )));
        }
        parsed.data.sort_by_key(|item| item.index);
        Ok(parsed.data.into_iter().map(|item| item.embedding).collect())
    }
}

/// Cosine similarity; zero when either vector has no magnitude.
pub fn cosine(a: &[f32], b: &[f32]) -> f64 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Scores chunks by embedding similarity to the query, in one backend call.
pub async fn embedding_scores(
    backend: &dyn EmbeddingBackend,
    query: &str,
    chunks: &[Chunk],
) -> Result<Vec<f64>, HttpError> {
    let mut inputs = Vec::with_capacity(chunks.len() + 1);
    inputs.push(query.to_string());
    inputs.extend(chunks.iter().map(|c| c.text.clone()));

    let vectors = backend.embed(&inputs).await?;
    let (query_vector, chunk_vectors) = vectors
        .split_first()
        .ok_or_else(|| HttpError::ResponseDecodeError("no embeddings returned".to_string()))?;
    Ok(chunk_vectors
        .iter()
        .map(|v| cosine(query_vector, v))
        .collect())
}

/// Lowercased alphanumeric tokens.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn term_frequencies(tokens: Vec<String>) -> FnvHashMap<String, f64> {
    let mut tf = FnvHashMap::default();
    for token in tokens {
        *tf.entry(token).or_insert(0.0) += 1.0;
    }
    tf
}

/// TF-IDF cosine similarity of each chunk to the query.
///
/// Document frequencies come from the chunks themselves, with smoothed
/// `idf = ln((1 + N) / (1 + df)) + 1`.
pub fn lexical_scores(query: &str, chunks: &[Chunk]) -> Vec<f64> {
    let chunk_tfs: Vec<_> = chunks
        .iter()
        .map(|c| term_frequencies(tokenize(&c.text)))
        .collect();

    let mut document_frequency: FnvHashMap<&str, usize> = FnvHashMap::default();
    for tf in &chunk_tfs {
        for term in tf.keys() {
            *document_frequency.entry(term.as_str()).or_insert(0) += 1;
        }
    }

    let n = chunks.len() as f64;
    let idf = |term: &str| {
        let df = document_frequency.get(term).copied().unwrap_or(0) as f64;
        ((1.0 + n) / (1.0 + df)).ln() + 1.0
    };

    let query_weights: Vec<(String, f64)> = {
        let mut terms: Vec<_> = term_frequencies(tokenize(query)).into_iter().collect();
        terms.sort_by(|a, b| a.0.cmp(&b.0));
        terms
            .into_iter()
            .map(|(term, tf)| {
                let weight = tf * idf(term.as_str());
                (term, weight)
            })
            .collect()
    };
    let query_norm = query_weights.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();

    chunk_tfs
        .iter()
        .map(|tf| {
            if query_norm == 0.0 {
                return 0.0;
            }
            let mut terms: Vec<_> = tf.iter().collect();
            terms.sort_by(|a, b| a.0.cmp(b.0));
            let chunk_norm = terms
                .iter()
                .map(|(term, count)| {
                    let w = **count * idf(term.as_str());
                    w * w
                })
                .sum::<f64>()
                .sqrt();
            if chunk_norm == 0.0 {
                return 0.0;
            }
            let dot: f64 = query_weights
                .iter()
                .filter_map(|(term, qw)| tf.get(term).map(|count| qw * count * idf(term.as_str())))
                .sum();
            dot / (query_norm * chunk_norm)
        })
        .collect()
}

fn compare(a: &ScoredChunk, b: &ScoredChunk) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then(a.chunk.doc_rank.cmp(&b.chunk.doc_rank))
        .then(a.chunk.offset.cmp(&b.chunk.offset))
}

/// Orders chunks by score and keeps the best `top_k`.
///
/// Non-finite scores are treated as zero.
pub fn rank_chunks(chunks: Vec<Chunk>, scores: Vec<f64>, top_k: usize) -> Vec<ScoredChunk> {
    let mut scored: Vec<ScoredChunk> = chunks
        .into_iter()
        .zip(scores)
        .map(|(chunk, score)| ScoredChunk {
            chunk,
            score: if score.is_finite() { score } else { 0.0 },
        })
        .collect();
    scored.sort_by(compare);
    scored.truncate(top_k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(doc_rank: usize, offset: usize, text: &str) -> Chunk {
        Chunk {
            doc_rank,
            offset,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_cosine() {
        assert!((cosine(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-9);
        assert!(cosine(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-9);
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_lexical_prefers_matching_chunk() {
        let chunks = vec![
            chunk(1, 0, "The weather in Honolulu is sunny and warm."),
            chunk(1, 50, "Rust ownership rules prevent data races at compile time."),
            chunk(2, 0, "Gardening tips for tomatoes."),
        ];
        let scores = lexical_scores("rust data races", &chunks);
        assert!(scores[1] > scores[0]);
        assert!(scores[1] > scores[2]);
        assert_eq!(scores[2], 0.0);
    }

    #[test]
    fn test_lexical_empty_query_scores_zero() {
        let chunks = vec![chunk(1, 0, "anything at all")];
        assert_eq!(lexical_scores("  ...  ", &chunks), vec![0.0]);
    }

    #[test]
    fn test_lexical_is_deterministic() {
        let chunks: Vec<_> = (0..20)
            .map(|i| chunk(i % 3, i * 10, &format!("token{} shared words alpha beta {}", i % 4, i)))
            .collect();
        let first = lexical_scores("alpha token1 shared", &chunks);
        for _ in 0..5 {
            assert_eq!(lexical_scores("alpha token1 shared", &chunks), first);
        }
    }

    #[test]
    fn test_rank_breaks_ties_by_rank_then_offset() {
        let chunks = vec![
            chunk(2, 0, "c"),
            chunk(1, 100, "b"),
            chunk(1, 0, "a"),
            chunk(3, 0, "best"),
        ];
        let ranked = rank_chunks(chunks, vec![0.5, 0.5, 0.5, 0.9], 10);
        let order: Vec<_> = ranked.iter().map(|s| s.chunk.text.as_str()).collect();
        assert_eq!(order, vec!["best", "a", "b", "c"]);
    }

    #[test]
    fn test_rank_truncates_and_sanitises() {
        let chunks = vec![chunk(1, 0, "x"), chunk(1, 1, "y"), chunk(1, 2, "z")];
        let ranked = rank_chunks(chunks, vec![f64::NAN, 0.2, 0.1], 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].chunk.text, "y");
        assert_eq!(ranked[1].chunk.text, "z");
    }

    #[derive(Debug)]
    struct AxisEmbeddings;

    #[async_trait]
    impl EmbeddingBackend for AxisEmbeddings {
        async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, HttpError> {
            Ok(inputs
                .iter()
                .map(|t| if t.contains("cat") { vec![1.0, 0.0] } else { vec![0.0, 1.0] })
                .collect())
        }
    }

    #[tokio::test]
    async fn test_embedding_scores() {
        let chunks = vec![chunk(1, 0, "dogs bark"), chunk(1, 9, "a cat sleeps")];
        let scores = embedding_scores(&AxisEmbeddings, "cat", &chunks).await.unwrap();
        assert!(scores[0].abs() < 1e-9);
        assert!((scores[1] - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_http_embedding_backend() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/embeddings")
            .match_header("authorization", "Bearer sk-test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"data":[{"index":1,"embedding":[0.0,1.0]},{"index":0,"embedding":[1.0,0.0]}]}"#,
            )
            .create_async()
            .await;

        let config = EmbeddingConfig {
            api_key: Some("sk-test".to_string()),
            ..EmbeddingConfig::default()
        };
        let backend = HttpEmbeddingBackend::new(
            Client::new(),
            format!("{}/v1/embeddings", server.url()),
            &config,
        );
        let vectors = backend
            .embed(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_embedding_backend_rejects_bad_key() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/embeddings")
            .with_status(401)
            .with_body(r#"{"error":{"message":"Incorrect API key"}}"#)
            .create_async()
            .await;

        let backend = HttpEmbeddingBackend::new(
            Client::new(),
            format!("{}/embeddings", server.url()),
            &EmbeddingConfig::default(),
        );
        let err = backend.embed(&["a".to_string()]).await.unwrap_err();
        assert!(matches!(err, HttpError::Unauthorized(_)));
    }
}
