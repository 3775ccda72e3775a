//! Process startup wiring
//!
//! Builds the whole pipeline from settings exactly once, at process start.
//! Shared clients (embedder, LLM pools, index, cache) are constructed here
//! and handed down by reference; no component reaches up for globals.

use std::sync::Arc;

use climate_chat_core::{Error, Reranker, Result};
use climate_chat_config::constants::endpoints;
use climate_chat_config::Settings;
use climate_chat_llm::LlmFactory;
use climate_chat_rag::{
    CachedEmbedder, HttpEmbedder, HttpEmbedderConfig, HttpReranker, HttpRerankerConfig,
    LexicalReranker, PassageRetriever, QdrantIndex, QdrantIndexConfig, RetrieverConfig,
    TavilySearch, WebSearchConfig,
};

use crate::classifier::QueryClassifier;
use crate::generator::{GeneratorConfig, ResponseGenerator};
use crate::guard::{FaithfulnessGuard, GuardConfig};
use crate::history::ConversationParser;
use crate::orchestrator::{PipelineConfig, QueryPipeline};
use crate::router::{MultilingualRouter, RouterConfig};

/// Build the pipeline from settings. Called once at startup; the returned
/// pipeline is shared across all requests.
pub async fn build_pipeline(settings: &Settings) -> Result<QueryPipeline> {
    let llms = LlmFactory::from_settings(&settings.providers)
        .map_err(|e| Error::Internal(e.to_string()))?;

    let base_embedder = HttpEmbedder::new(HttpEmbedderConfig {
        model: settings.providers.embedding_model.clone(),
        ..Default::default()
    })
    .map_err(|e| Error::Internal(e.to_string()))?;
    let embedder = Arc::new(CachedEmbedder::new(
        Arc::new(base_embedder),
        settings.retrieval.embedding_cache_capacity,
    ));

    // Warm the embedding service before taking traffic; a failure here is
    // not fatal, the service may still be coming up.
    if let Err(err) = climate_chat_core::EmbeddingProvider::prewarm(embedder.as_ref()).await {
        tracing::warn!(error = %err, "embedding prewarm failed");
    }

    let index = QdrantIndex::new(QdrantIndexConfig {
        collection: settings.retrieval.collection.clone(),
        alpha: settings.retrieval.hybrid_alpha,
        api_key: settings.providers.qdrant_api_key.clone(),
        ..Default::default()
    })
    .map_err(|e| Error::Internal(e.to_string()))?;

    let reranker: Arc<dyn Reranker> = match settings.providers.rerank_api_key.clone() {
        Some(api_key) => Arc::new(
            HttpReranker::new(HttpRerankerConfig {
                api_key,
                model: settings.providers.rerank_model.clone(),
                ..Default::default()
            })
            .map_err(|e| Error::Internal(e.to_string()))?,
        ),
        None => {
            tracing::warn!("no rerank API key configured, using lexical fallback scorer");
            Arc::new(LexicalReranker)
        }
    };

    let retriever = Arc::new(PassageRetriever::new(
        embedder.clone(),
        Arc::new(index),
        reranker,
        RetrieverConfig::from(&settings.retrieval),
    ));

    let parser = ConversationParser::new(settings.pipeline.history_window)
        .with_llm(llms.high_coverage.clone());
    let classifier = QueryClassifier::new(llms.high_quality.clone());
    let router = MultilingualRouter::new(RouterConfig {
        force_family: settings.pipeline.force_family,
    })
    .with_detector(llms.high_coverage.clone());
    let guard = FaithfulnessGuard::new(GuardConfig {
        threshold: settings.guard.faithfulness_threshold,
        fallback_score: settings.guard.fallback_score,
    })
    .with_embedder(embedder);

    let mut pipeline = QueryPipeline::new(
        parser,
        classifier,
        router,
        retriever,
        ResponseGenerator::new(GeneratorConfig::default()),
        guard,
        llms,
        PipelineConfig::from(settings),
    );

    if let Some(api_key) = settings.providers.web_search_api_key.clone() {
        let web = TavilySearch::new(WebSearchConfig {
            api_key,
            endpoint: endpoints::WEB_SEARCH_DEFAULT.clone(),
            ..Default::default()
        })
        .map_err(|e| Error::Internal(e.to_string()))?;
        pipeline = pipeline.with_web_search(Arc::new(web));
    }

    if settings.cache.enabled {
        let store = climate_chat_cache::AnswerStore::open(
            climate_chat_cache::AnswerStoreConfig::from(&settings.cache),
        )
        .await
        .map_err(|e| Error::CacheUnavailable(e.to_string()))?;
        pipeline = pipeline.with_cache(Arc::new(store));
    }

    Ok(pipeline)
}
