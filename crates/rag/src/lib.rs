//! Retrieval over the climate passage index
//!
//! Features:
//! - HTTP embedding client producing dense + sparse lexical vectors
//! - SHA-256-keyed bounded LRU embedding cache
//! - Hybrid (dense + sparse) Qdrant queries with weighted RRF fusion
//! - Rerank API client with a lexical-overlap fallback scorer
//! - The passage retriever: clean, filter, dedupe, cap, rerank, floor
//! - Web search fallback client

pub mod cache;
pub mod embeddings;
pub mod index;
pub mod reranker;
pub mod retriever;
pub mod web_search;

pub use cache::{CachedEmbedder, EmbeddingCacheStats};
pub use embeddings::{HttpEmbedder, HttpEmbedderConfig};
pub use index::{QdrantIndex, QdrantIndexConfig};
pub use reranker::{HttpReranker, HttpRerankerConfig, LexicalReranker};
pub use retriever::{PassageRetriever, RetrieverConfig};
pub use web_search::{TavilySearch, WebSearchConfig};

use thiserror::Error;

/// Retrieval errors
#[derive(Error, Debug)]
pub enum RagError {
    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Rerank error: {0}")]
    Rerank(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Connection error: {0}")]
    Connection(String),
}

impl From<RagError> for climate_chat_core::Error {
    fn from(err: RagError) -> Self {
        climate_chat_core::Error::RetrieverUnavailable(err.to_string())
    }
}
