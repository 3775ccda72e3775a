//! Reranker trait

use async_trait::async_trait;

use crate::error::Result;

/// Relevance of one candidate, addressed by its position in the input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RerankScore {
    pub index: usize,
    /// Query-specific relevance in [0,1].
    pub relevance: f32,
}

/// Secondary scoring pass over retrieved candidates.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Score `documents` against `query`. Returns at most `top_n` entries,
    /// best first, with relevance in [0,1].
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_n: usize,
    ) -> Result<Vec<RerankScore>>;
}
