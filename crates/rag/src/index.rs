//! Hybrid vector index client backed by Qdrant
//!
//! The index is prebuilt and read-only. A query runs the dense and sparse
//! named-vector searches concurrently and fuses the two rankings with
//! weighted RRF; the dense weight is the configurable hybrid alpha.

use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::qdrant::{value::Kind, point_id::PointIdOptions, Query, QueryPointsBuilder, ScoredPoint};
use qdrant_client::Qdrant;

use climate_chat_config::constants::{endpoints, retrieval};
use climate_chat_core::{IndexHit, PassageMetadata, Result, SparseVector, VectorIndex};

use crate::RagError;

/// Qdrant index configuration
#[derive(Debug, Clone)]
pub struct QdrantIndexConfig {
    /// Qdrant endpoint
    pub endpoint: String,
    /// API key (optional)
    pub api_key: Option<String>,
    /// Collection name
    pub collection: String,
    /// Dense named vector
    pub dense_vector_name: String,
    /// Sparse named vector
    pub sparse_vector_name: String,
    /// Dense weight in fusion; sparse weight is `1 - alpha`
    pub alpha: f32,
    /// RRF k parameter
    pub rrf_k: f32,
}

impl Default for QdrantIndexConfig {
    fn default() -> Self {
        Self {
            endpoint: endpoints::QDRANT_DEFAULT.clone(),
            api_key: None,
            collection: "climate_passages".to_string(),
            dense_vector_name: "dense".to_string(),
            sparse_vector_name: "sparse".to_string(),
            alpha: retrieval::HYBRID_ALPHA,
            rrf_k: retrieval::RRF_K,
        }
    }
}

/// Hybrid index client
pub struct QdrantIndex {
    client: Qdrant,
    config: QdrantIndexConfig,
}

impl QdrantIndex {
    pub fn new(config: QdrantIndexConfig) -> std::result::Result<Self, RagError> {
        let mut builder = Qdrant::from_url(&config.endpoint);
        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
        }
        let client = builder
            .build()
            .map_err(|e| RagError::Connection(e.to_string()))?;
        Ok(Self { client, config })
    }

    async fn query_dense(
        &self,
        dense: &[f32],
        top_k: usize,
    ) -> std::result::Result<Vec<ScoredPoint>, RagError> {
        let request = QueryPointsBuilder::new(&self.config.collection)
            .query(Query::new_nearest(dense.to_vec()))
            .using(&self.config.dense_vector_name)
            .limit(top_k as u64)
            .with_payload(true);

        let response = self
            .client
            .query(request)
            .await
            .map_err(|e| RagError::Index(e.to_string()))?;
        Ok(response.result)
    }

    async fn query_sparse(
        &self,
        sparse: &SparseVector,
        top_k: usize,
    ) -> std::result::Result<Vec<ScoredPoint>, RagError> {
        if sparse.is_empty() {
            return Ok(Vec::new());
        }

        let pairs = sparse.pairs();
        let request = QueryPointsBuilder::new(&self.config.collection)
            .query(Query::new_nearest(pairs.as_slice()))
            .using(&self.config.sparse_vector_name)
            .limit(top_k as u64)
            .with_payload(true);

        let response = self
            .client
            .query(request)
            .await
            .map_err(|e| RagError::Index(e.to_string()))?;
        Ok(response.result)
    }

    fn into_hit(point: ScoredPoint, fused_score: f32) -> IndexHit {
        let mut metadata = PassageMetadata::default();

        for (key, value) in point.payload {
            let Some(Kind::StringValue(s)) = value.kind else {
                continue;
            };
            match key.as_str() {
                "chunk_text" | "text" => metadata.chunk_text = s,
                "title" => metadata.title = Some(s),
                "url" => metadata.url = Some(s),
                "section_title" => metadata.section_title = Some(s),
                _ => {
                    metadata.extra.insert(key, s);
                }
            }
        }

        let id = point
            .id
            .and_then(|pid| pid.point_id_options)
            .map(|options| match options {
                PointIdOptions::Uuid(uuid) => uuid,
                PointIdOptions::Num(num) => num.to_string(),
            })
            .unwrap_or_default();

        IndexHit {
            id,
            score: fused_score,
            metadata,
        }
    }

    /// Weighted reciprocal-rank fusion of the two rankings.
    fn fuse(&self, dense: Vec<ScoredPoint>, sparse: Vec<ScoredPoint>, top_k: usize) -> Vec<IndexHit> {
        let mut fused: HashMap<String, (f32, ScoredPoint)> = HashMap::new();

        for (weight, ranking) in [
            (self.config.alpha, dense),
            (1.0 - self.config.alpha, sparse),
        ] {
            for (rank, point) in ranking.into_iter().enumerate() {
                let rrf = weight / (self.config.rrf_k + rank as f32 + 1.0);
                let key = point_key(&point);
                fused
                    .entry(key)
                    .and_modify(|(score, _)| *score += rrf)
                    .or_insert((rrf, point));
            }
        }

        let mut hits: Vec<IndexHit> = fused
            .into_values()
            .map(|(score, point)| Self::into_hit(point, score))
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);
        hits
    }
}

fn point_key(point: &ScoredPoint) -> String {
    point
        .id
        .as_ref()
        .and_then(|pid| pid.point_id_options.as_ref())
        .map(|options| match options {
            PointIdOptions::Uuid(uuid) => uuid.clone(),
            PointIdOptions::Num(num) => num.to_string(),
        })
        .unwrap_or_default()
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn query(
        &self,
        dense: &[f32],
        sparse: &SparseVector,
        top_k: usize,
    ) -> Result<Vec<IndexHit>> {
        let (dense_result, sparse_result) = tokio::join!(
            self.query_dense(dense, top_k),
            self.query_sparse(sparse, top_k)
        );

        let hits = self.fuse(dense_result?, sparse_result?, top_k);
        tracing::debug!(
            collection = %self.config.collection,
            hits = hits.len(),
            "hybrid query complete"
        );
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qdrant_client::qdrant::{PointId, Value};

    fn point(id: &str, text: &str) -> ScoredPoint {
        let mut payload = HashMap::new();
        payload.insert(
            "chunk_text".to_string(),
            Value {
                kind: Some(Kind::StringValue(text.to_string())),
            },
        );
        payload.insert(
            "title".to_string(),
            Value {
                kind: Some(Kind::StringValue(format!("title-{id}"))),
            },
        );
        ScoredPoint {
            id: Some(PointId::from(id.to_string())),
            payload,
            score: 0.5,
            ..Default::default()
        }
    }

    fn index() -> QdrantIndex {
        QdrantIndex::new(QdrantIndexConfig {
            endpoint: "http://127.0.0.1:6334".to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_fusion_prefers_doc_in_both_rankings() {
        let idx = index();
        let dense = vec![point("a", "dense only"), point("b", "both")];
        let sparse = vec![point("b", "both"), point("c", "sparse only")];

        let hits = idx.fuse(dense, sparse, 10);
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].id, "b");
    }

    #[test]
    fn test_payload_mapping() {
        let hit = QdrantIndex::into_hit(point("p1", "flood plains expand"), 0.4);
        assert_eq!(hit.id, "p1");
        assert_eq!(hit.metadata.chunk_text, "flood plains expand");
        assert_eq!(hit.metadata.title.as_deref(), Some("title-p1"));
        assert!((hit.score - 0.4).abs() < f32::EPSILON);
    }

    #[test]
    fn test_fuse_truncates_to_top_k() {
        let idx = index();
        let dense = (0..8).map(|i| point(&format!("d{i}"), "x")).collect();
        let hits = idx.fuse(dense, Vec::new(), 3);
        assert_eq!(hits.len(), 3);
    }
}
