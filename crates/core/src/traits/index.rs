//! Vector index client trait

use std::collections::HashMap;

use async_trait::async_trait;

use super::embedding::SparseVector;
use crate::error::Result;

/// Metadata stored alongside an indexed passage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassageMetadata {
    pub chunk_text: String,
    pub title: Option<String>,
    pub url: Option<String>,
    pub section_title: Option<String>,
    pub extra: HashMap<String, String>,
}

/// One candidate returned by a hybrid query.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    pub id: String,
    /// Similarity score; higher is more similar.
    pub score: f32,
    pub metadata: PassageMetadata,
}

/// Hybrid (dense + sparse) top-k query against a prebuilt, read-only index.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn query(
        &self,
        dense: &[f32],
        sparse: &SparseVector,
        top_k: usize,
    ) -> Result<Vec<IndexHit>>;
}
