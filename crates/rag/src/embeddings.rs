//! HTTP embedding client
//!
//! Talks to a multilingual embedding service (BGE-M3 style) that returns a
//! dense vector and a sparse lexical-weight vector in one call.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use climate_chat_config::constants::{endpoints, timeouts};
use climate_chat_core::{Embedding, EmbeddingProvider, Result, SparseVector};

use crate::RagError;

/// Embedding service configuration
#[derive(Debug, Clone)]
pub struct HttpEmbedderConfig {
    /// Service endpoint
    pub endpoint: String,
    /// Model name
    pub model: String,
    /// Dense vector dimension
    pub dense_dim: usize,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for HttpEmbedderConfig {
    fn default() -> Self {
        Self {
            endpoint: endpoints::EMBEDDING_DEFAULT.clone(),
            model: "bge-m3".to_string(),
            dense_dim: 1024,
            timeout: Duration::from_millis(timeouts::EMBED_MS),
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    return_dense: bool,
    return_sparse: bool,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    dense: Vec<Vec<f32>>,
    #[serde(default)]
    sparse: Vec<SparseWeights>,
}

#[derive(Debug, Deserialize, Default)]
struct SparseWeights {
    indices: Vec<u32>,
    values: Vec<f32>,
}

/// HTTP embedder
pub struct HttpEmbedder {
    client: Client,
    config: HttpEmbedderConfig,
}

impl HttpEmbedder {
    pub fn new(config: HttpEmbedderConfig) -> std::result::Result<Self, RagError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RagError::Connection(e.to_string()))?;
        Ok(Self { client, config })
    }

    async fn embed_raw(&self, text: &str) -> std::result::Result<Embedding, RagError> {
        let request = EmbedRequest {
            model: &self.config.model,
            input: vec![text],
            return_dense: true,
            return_sparse: true,
        };

        let url = format!("{}/embed", self.config.endpoint);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::Embedding(format!("embedding request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(RagError::Embedding(format!(
                "embedding service returned {status}: {text}"
            )));
        }

        let mut parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| RagError::Embedding(format!("bad embedding response: {e}")))?;

        let dense = parsed
            .dense
            .drain(..)
            .next()
            .ok_or_else(|| RagError::Embedding("no dense vector returned".to_string()))?;

        if dense.len() != self.config.dense_dim {
            return Err(RagError::Embedding(format!(
                "dense dimension mismatch: expected {}, got {}",
                self.config.dense_dim,
                dense.len()
            )));
        }

        let sparse = parsed
            .sparse
            .drain(..)
            .next()
            .map(|w| SparseVector {
                indices: w.indices,
                values: w.values,
            })
            .unwrap_or_default();

        Ok(Embedding { dense, sparse })
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        Ok(self.embed_raw(text).await?)
    }

    /// Warm the service (model load, JIT) before serving traffic.
    async fn prewarm(&self) -> Result<()> {
        self.embed_raw("warmup").await?;
        tracing::info!(model = %self.config.model, "embedding service warmed");
        Ok(())
    }
}
