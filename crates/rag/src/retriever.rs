//! Passage retriever
//!
//! Composes the embedder, hybrid index, and reranker into the final
//! passage set for generation: embed, query (with one retried attempt),
//! clean, filter, dedupe, cap, rerank, floor, keep top-n.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

use climate_chat_config::constants::retrieval as defaults;
use climate_chat_config::RetrievalSettings;
use climate_chat_core::{
    EmbeddingProvider, Error, IndexHit, Passage, Reranker, Result, VectorIndex,
};

use crate::reranker::LexicalReranker;

/// Retriever configuration
#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    /// Candidate pool from the hybrid query (also the pre-rerank cap)
    pub hybrid_top_k: usize,
    /// Final number of passages after reranking
    pub final_top_n: usize,
    /// Candidates below this rerank relevance are dropped
    pub rerank_floor: f32,
    /// Cleaned passages shorter than this are dropped
    pub min_passage_chars: usize,
    /// Initial backoff before the single index retry
    pub retry_initial: Duration,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            hybrid_top_k: defaults::HYBRID_TOP_K,
            final_top_n: defaults::FINAL_TOP_N,
            rerank_floor: defaults::RERANK_FLOOR,
            min_passage_chars: defaults::MIN_PASSAGE_CHARS,
            retry_initial: Duration::from_millis(defaults::INDEX_RETRY_INITIAL_MS),
        }
    }
}

impl From<&RetrievalSettings> for RetrieverConfig {
    fn from(settings: &RetrievalSettings) -> Self {
        Self {
            hybrid_top_k: settings.hybrid_top_k,
            final_top_n: settings.final_top_n,
            rerank_floor: settings.rerank_floor,
            min_passage_chars: settings.min_passage_chars,
            retry_initial: Duration::from_millis(defaults::INDEX_RETRY_INITIAL_MS),
        }
    }
}

/// Retriever over the climate passage index
pub struct PassageRetriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    reranker: Arc<dyn Reranker>,
    config: RetrieverConfig,
}

impl PassageRetriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        reranker: Arc<dyn Reranker>,
        config: RetrieverConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            reranker,
            config,
        }
    }

    /// Produce the final passage set for an English query.
    ///
    /// Returns `NoEvidence` when nothing survives filtering and reranking,
    /// and `RetrieverUnavailable` when the index stays down after the
    /// single retry.
    pub async fn retrieve(&self, query_en: &str) -> Result<Vec<Passage>> {
        let embedding = self.embedder.embed(query_en).await?;

        let hits = self.query_with_retry(&embedding.dense, &embedding.sparse).await?;

        let mut passages = self.clean_and_filter(hits);
        passages = dedupe(passages);

        // Cap the pool before the (priced) rerank call.
        passages.sort_by(|a, b| {
            b.dense_score
                .partial_cmp(&a.dense_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        passages.truncate(self.config.hybrid_top_k);

        if passages.is_empty() {
            return Err(Error::NoEvidence);
        }

        let passages = self.rerank(query_en, passages).await;

        if passages.is_empty() {
            return Err(Error::NoEvidence);
        }
        Ok(passages)
    }

    async fn query_with_retry(
        &self,
        dense: &[f32],
        sparse: &climate_chat_core::SparseVector,
    ) -> Result<Vec<IndexHit>> {
        let mut backoff = self.config.retry_initial;
        let attempts = 2;

        for attempt in 1..=attempts {
            match self.index.query(dense, sparse, self.config.hybrid_top_k).await {
                Ok(hits) => return Ok(hits),
                Err(err) if attempt < attempts => {
                    tracing::warn!(attempt, error = %err, "index query failed, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff *= defaults::INDEX_RETRY_FACTOR;
                }
                Err(err) => {
                    return Err(Error::RetrieverUnavailable(err.to_string()));
                }
            }
        }
        unreachable!("retry loop always returns")
    }

    fn clean_and_filter(&self, hits: Vec<IndexHit>) -> Vec<Passage> {
        hits.into_iter()
            .filter_map(|hit| {
                let text = clean_passage_text(&hit.metadata.chunk_text);
                if text.chars().count() < self.config.min_passage_chars {
                    return None;
                }
                // A passage no reader could attribute is useless as evidence.
                if hit.metadata.title.is_none() && hit.metadata.url.is_none() {
                    return None;
                }
                let title = hit
                    .metadata
                    .title
                    .clone()
                    .or_else(|| hit.metadata.url.clone())
                    .unwrap_or_default();
                Some(Passage {
                    id: hit.id,
                    title,
                    url: hit.metadata.url,
                    section_title: hit.metadata.section_title,
                    text,
                    dense_score: hit.score,
                    rerank_score: None,
                    conversation_context: false,
                })
            })
            .collect()
    }

    async fn rerank(&self, query: &str, passages: Vec<Passage>) -> Vec<Passage> {
        let documents: Vec<String> = passages.iter().map(|p| p.text.clone()).collect();

        let scores = match self
            .reranker
            .rerank(query, &documents, self.config.final_top_n)
            .await
        {
            Ok(scores) => scores,
            Err(err) => {
                // Keep serving with degraded ordering when the API is down.
                tracing::warn!(error = %err, "rerank failed, falling back to lexical scorer");
                match LexicalReranker
                    .rerank(query, &documents, self.config.final_top_n)
                    .await
                {
                    Ok(scores) => scores,
                    Err(_) => return Vec::new(),
                }
            }
        };

        let mut reranked: Vec<Passage> = scores
            .into_iter()
            .filter(|s| s.relevance >= self.config.rerank_floor)
            .filter_map(|s| {
                passages.get(s.index).map(|p| {
                    let mut passage = p.clone();
                    passage.rerank_score = Some(s.relevance);
                    passage
                })
            })
            .collect();

        reranked.sort_by(|a, b| {
            b.rerank_score
                .partial_cmp(&a.rerank_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        reranked.truncate(self.config.final_top_n);
        reranked
    }
}

/// Dedupe by URL, then by normalized title, keeping the higher-scored
/// duplicate.
fn dedupe(passages: Vec<Passage>) -> Vec<Passage> {
    let mut by_key: HashMap<String, Passage> = HashMap::new();

    for passage in passages {
        let key = match &passage.url {
            Some(url) => format!("url:{}", url.trim_end_matches('/')),
            None => format!("title:{}", normalize_title(&passage.title)),
        };
        match by_key.get(&key) {
            Some(existing) if existing.dense_score >= passage.dense_score => {}
            _ => {
                by_key.insert(key, passage);
            }
        }
    }

    by_key.into_values().collect()
}

pub(crate) fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)```.*?```").expect("valid regex"));
static MD_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").expect("valid regex"));
static MD_NOISE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[#*_`>|]+").expect("valid regex"));

/// Normalize markdown, strip code fences, collapse whitespace.
pub fn clean_passage_text(text: &str) -> String {
    let no_fences = CODE_FENCE.replace_all(text, " ");
    let no_links = MD_LINK.replace_all(&no_fences, "$1");
    let no_noise = MD_NOISE.replace_all(&no_links, " ");
    no_noise.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use climate_chat_core::{Embedding, PassageMetadata, RerankScore, SparseVector};

    struct FixedEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Embedding> {
            Ok(Embedding {
                dense: vec![0.1, 0.2, 0.3],
                sparse: SparseVector::default(),
            })
        }
    }

    struct FixedIndex {
        hits: Vec<IndexHit>,
        fail_first: AtomicUsize,
        calls: AtomicUsize,
    }

    impl FixedIndex {
        fn new(hits: Vec<IndexHit>) -> Self {
            Self {
                hits,
                fail_first: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing_first(hits: Vec<IndexHit>, failures: usize) -> Self {
            Self {
                hits,
                fail_first: AtomicUsize::new(failures),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl VectorIndex for FixedIndex {
        async fn query(
            &self,
            _dense: &[f32],
            _sparse: &SparseVector,
            _top_k: usize,
        ) -> Result<Vec<IndexHit>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_first.load(Ordering::SeqCst) > 0 {
                self.fail_first.fetch_sub(1, Ordering::SeqCst);
                return Err(Error::RetrieverUnavailable("index offline".to_string()));
            }
            Ok(self.hits.clone())
        }
    }

    struct PassThroughReranker;

    #[async_trait]
    impl Reranker for PassThroughReranker {
        async fn rerank(
            &self,
            _query: &str,
            documents: &[String],
            top_n: usize,
        ) -> Result<Vec<RerankScore>> {
            Ok(documents
                .iter()
                .enumerate()
                .take(top_n)
                .map(|(index, _)| RerankScore {
                    index,
                    relevance: 0.9 - index as f32 * 0.1,
                })
                .collect())
        }
    }

    fn hit(id: &str, title: &str, url: Option<&str>, text: &str, score: f32) -> IndexHit {
        IndexHit {
            id: id.to_string(),
            score,
            metadata: PassageMetadata {
                chunk_text: text.to_string(),
                title: Some(title.to_string()),
                url: url.map(|u| u.to_string()),
                section_title: None,
                extra: Default::default(),
            },
        }
    }

    fn long_text(seed: &str) -> String {
        format!(
            "{seed} Climate adaptation requires sustained municipal investment in \
             stormwater systems, cooling centres, resilient housing, and public \
             health outreach over the coming decades."
        )
    }

    fn retriever(index: FixedIndex) -> PassageRetriever {
        PassageRetriever::new(
            Arc::new(FixedEmbedder),
            Arc::new(index),
            Arc::new(PassThroughReranker),
            RetrieverConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_retrieve_orders_by_rerank() {
        let index = FixedIndex::new(vec![
            hit("1", "Toronto heat", Some("https://a.org/1"), &long_text("Heat."), 0.9),
            hit("2", "Toronto flood", Some("https://a.org/2"), &long_text("Flood."), 0.8),
        ]);
        let passages = retriever(index).retrieve("toronto impacts").await.unwrap();
        assert_eq!(passages.len(), 2);
        assert!(passages[0].rerank_score >= passages[1].rerank_score);
    }

    #[tokio::test]
    async fn test_short_passages_dropped() {
        let index = FixedIndex::new(vec![hit(
            "1",
            "Tiny",
            Some("https://a.org/t"),
            "too short",
            0.9,
        )]);
        let result = retriever(index).retrieve("anything").await;
        assert!(matches!(result, Err(Error::NoEvidence)));
    }

    #[tokio::test]
    async fn test_untitled_unlinked_passages_dropped() {
        let mut orphan = hit("1", "x", None, &long_text("Orphan."), 0.9);
        orphan.metadata.title = None;
        let index = FixedIndex::new(vec![orphan]);
        let result = retriever(index).retrieve("anything").await;
        assert!(matches!(result, Err(Error::NoEvidence)));
    }

    #[tokio::test]
    async fn test_dedupe_by_url_keeps_higher_score() {
        let index = FixedIndex::new(vec![
            hit("1", "A", Some("https://a.org/x"), &long_text("First."), 0.7),
            hit("2", "A copy", Some("https://a.org/x/"), &long_text("Second."), 0.9),
        ]);
        let passages = retriever(index).retrieve("query").await.unwrap();
        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].id, "2");
    }

    #[tokio::test]
    async fn test_single_retry_then_success() {
        let index = FixedIndex::failing_first(
            vec![hit("1", "Doc", Some("https://a.org/1"), &long_text("Doc."), 0.9)],
            1,
        );
        let retriever = retriever(index);
        let passages = retriever.retrieve("query").await.unwrap();
        assert_eq!(passages.len(), 1);
    }

    #[tokio::test]
    async fn test_persistent_failure_is_unavailable() {
        let index = FixedIndex::failing_first(Vec::new(), 5);
        let result = retriever(index).retrieve("query").await;
        assert!(matches!(result, Err(Error::RetrieverUnavailable(_))));
    }

    #[test]
    fn test_clean_passage_text() {
        let dirty = "## Heading\nSome **bold** text with a [link](https://x.org) and\n```\ncode\n```\n  extra   spaces";
        let clean = clean_passage_text(dirty);
        assert_eq!(clean, "Heading Some bold text with a link and extra spaces");
    }

    #[test]
    fn test_cap_is_ten() {
        assert_eq!(RetrieverConfig::default().hybrid_top_k, 10);
        assert_eq!(RetrieverConfig::default().final_top_n, 5);
    }
}
