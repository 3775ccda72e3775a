//! Reranking
//!
//! Primary path is a hosted rerank API (Cohere-style request/response).
//! When no API is configured, or as an in-process fallback, a lexical
//! overlap scorer keeps the pipeline serving with degraded ordering.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use climate_chat_config::constants::{endpoints, timeouts};
use climate_chat_core::{Reranker, RerankScore, Result};

use crate::RagError;

/// Rerank API configuration
#[derive(Debug, Clone)]
pub struct HttpRerankerConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for HttpRerankerConfig {
    fn default() -> Self {
        Self {
            endpoint: endpoints::RERANK_DEFAULT.clone(),
            api_key: std::env::var("COHERE_API_KEY").unwrap_or_default(),
            model: "rerank-multilingual-v3.0".to_string(),
            timeout: Duration::from_millis(timeouts::RERANK_MS),
        }
    }
}

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
    top_n: usize,
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    results: Vec<RerankResultItem>,
}

#[derive(Debug, Deserialize)]
struct RerankResultItem {
    index: usize,
    relevance_score: f32,
}

/// Hosted rerank API client
pub struct HttpReranker {
    client: Client,
    config: HttpRerankerConfig,
}

impl HttpReranker {
    pub fn new(config: HttpRerankerConfig) -> std::result::Result<Self, RagError> {
        if config.api_key.is_empty() {
            return Err(RagError::Rerank(
                "rerank API key not set; use LexicalReranker instead".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RagError::Connection(e.to_string()))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Reranker for HttpReranker {
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_n: usize,
    ) -> Result<Vec<RerankScore>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let request = RerankRequest {
            model: &self.config.model,
            query,
            documents,
            top_n,
        };

        let response = self
            .client
            .post(format!("{}/v1/rerank", self.config.endpoint))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::Rerank(format!("rerank request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(RagError::Rerank(format!("rerank API returned {status}: {text}")).into());
        }

        let parsed: RerankResponse = response
            .json()
            .await
            .map_err(|e| RagError::Rerank(format!("bad rerank response: {e}")))?;

        Ok(parsed
            .results
            .into_iter()
            .filter(|r| r.index < documents.len())
            .map(|r| RerankScore {
                index: r.index,
                relevance: r.relevance_score.clamp(0.0, 1.0),
            })
            .collect())
    }
}

/// In-process lexical fallback scorer.
///
/// Stopword-filtered token overlap between query and document; cheap and
/// deterministic, kept for when the rerank API is down or unconfigured.
pub struct LexicalReranker;

impl LexicalReranker {
    const STOPWORDS: &'static [&'static str] = &[
        "the", "a", "an", "is", "are", "was", "were", "be", "been", "being", "have", "has",
        "had", "do", "does", "did", "will", "would", "could", "should", "may", "might", "can",
        "to", "of", "in", "for", "on", "with", "at", "by", "from", "and", "or", "but", "if",
        "then", "it", "this", "that", "what", "which", "who", "how", "i", "you", "we", "they",
    ];

    fn tokens(text: &str) -> HashSet<String> {
        let stopwords: HashSet<&str> = Self::STOPWORDS.iter().copied().collect();
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 2 && !stopwords.contains(w))
            .map(|w| w.to_string())
            .collect()
    }

    /// Overlap score in [0,1]: fraction of query tokens present in the
    /// document.
    pub fn score(query: &str, document: &str) -> f32 {
        let query_tokens = Self::tokens(query);
        if query_tokens.is_empty() {
            return 0.0;
        }
        let doc_tokens = Self::tokens(document);
        let overlap = query_tokens.intersection(&doc_tokens).count();
        overlap as f32 / query_tokens.len() as f32
    }
}

#[async_trait]
impl Reranker for LexicalReranker {
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_n: usize,
    ) -> Result<Vec<RerankScore>> {
        let mut scored: Vec<RerankScore> = documents
            .iter()
            .enumerate()
            .map(|(index, doc)| RerankScore {
                index,
                relevance: Self::score(query, doc),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_n);
        Ok(scored)
    }
}
