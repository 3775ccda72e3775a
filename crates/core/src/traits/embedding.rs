//! Embedding provider trait

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Sparse lexical vector as (index, weight) pairs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

impl SparseVector {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// (index, weight) pairs, truncated to the shorter of the two arrays.
    pub fn pairs(&self) -> Vec<(u32, f32)> {
        self.indices
            .iter()
            .copied()
            .zip(self.values.iter().copied())
            .collect()
    }
}

/// Dense + sparse representation of one text.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub dense: Vec<f32>,
    pub sparse: SparseVector,
}

/// Maps a text to a dense vector and a sparse lexical vector.
///
/// Implementations must be deterministic for identical input.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Embedding>;

    /// Warm heavy weights at startup. Default is a no-op.
    async fn prewarm(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparse_pairs() {
        let sparse = SparseVector {
            indices: vec![3, 17],
            values: vec![0.5, 0.25],
        };
        assert_eq!(sparse.pairs(), vec![(3, 0.5), (17, 0.25)]);
        assert!(!sparse.is_empty());
        assert!(SparseVector::default().is_empty());
    }
}
