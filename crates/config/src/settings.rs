//! Main settings module

use std::path::Path;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use climate_chat_core::ModelFamily;

use crate::constants::{guard, limits, retrieval, timeouts};
use crate::ConfigError;

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Orchestrator configuration
    #[serde(default)]
    pub pipeline: PipelineSettings,

    /// Retrieval configuration
    #[serde(default)]
    pub retrieval: RetrievalSettings,

    /// Faithfulness guard configuration
    #[serde(default)]
    pub guard: GuardSettings,

    /// Answer cache configuration
    #[serde(default)]
    pub cache: CacheSettings,

    /// External provider credentials and endpoints
    #[serde(default)]
    pub providers: ProviderSettings,
}

/// Orchestrator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Whole-request deadline (ms)
    #[serde(default = "default_request_deadline_ms")]
    pub request_deadline_ms: u64,

    /// Conversation turns kept for downstream stages
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Maximum query length accepted
    #[serde(default = "default_max_query_chars")]
    pub max_query_chars: usize,

    /// Per-process concurrent request cap
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,

    /// Force every request onto one family, overriding the router.
    #[serde(default)]
    pub force_family: Option<ModelFamily>,
}

fn default_request_deadline_ms() -> u64 {
    timeouts::REQUEST_DEADLINE_MS
}
fn default_history_window() -> usize {
    limits::HISTORY_WINDOW
}
fn default_max_query_chars() -> usize {
    limits::MAX_QUERY_CHARS
}
fn default_max_concurrent() -> usize {
    limits::MAX_CONCURRENT_REQUESTS
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            request_deadline_ms: default_request_deadline_ms(),
            history_window: default_history_window(),
            max_query_chars: default_max_query_chars(),
            max_concurrent_requests: default_max_concurrent(),
            force_family: None,
        }
    }
}

/// Retrieval settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalSettings {
    /// Candidate pool size from the hybrid query
    #[serde(default = "default_hybrid_top_k")]
    pub hybrid_top_k: usize,

    /// Final passage count after reranking
    #[serde(default = "default_final_top_n")]
    pub final_top_n: usize,

    /// Minimum rerank relevance to keep a candidate
    #[serde(default = "default_rerank_floor")]
    pub rerank_floor: f32,

    /// Minimum cleaned passage length (chars)
    #[serde(default = "default_min_passage_chars")]
    pub min_passage_chars: usize,

    /// Dense weight in hybrid fusion (sparse weight is `1 - alpha`)
    #[serde(default = "default_hybrid_alpha")]
    pub hybrid_alpha: f32,

    /// Qdrant collection holding the climate passages
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Embedding LRU cache capacity (entries)
    #[serde(default = "default_embedding_cache_capacity")]
    pub embedding_cache_capacity: usize,
}

fn default_hybrid_top_k() -> usize {
    retrieval::HYBRID_TOP_K
}
fn default_final_top_n() -> usize {
    retrieval::FINAL_TOP_N
}
fn default_rerank_floor() -> f32 {
    retrieval::RERANK_FLOOR
}
fn default_min_passage_chars() -> usize {
    retrieval::MIN_PASSAGE_CHARS
}
fn default_hybrid_alpha() -> f32 {
    retrieval::HYBRID_ALPHA
}
fn default_collection() -> String {
    "climate_passages".to_string()
}
fn default_embedding_cache_capacity() -> usize {
    retrieval::EMBEDDING_CACHE_CAPACITY
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            hybrid_top_k: default_hybrid_top_k(),
            final_top_n: default_final_top_n(),
            rerank_floor: default_rerank_floor(),
            min_passage_chars: default_min_passage_chars(),
            hybrid_alpha: default_hybrid_alpha(),
            collection: default_collection(),
            embedding_cache_capacity: default_embedding_cache_capacity(),
        }
    }
}

/// Faithfulness guard settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardSettings {
    /// Answers below this score trigger the fallback and skip the cache
    #[serde(default = "default_faithfulness_threshold")]
    pub faithfulness_threshold: f32,

    /// Score assumed when every evaluation path fails
    #[serde(default = "default_fallback_score")]
    pub fallback_score: f32,
}

fn default_faithfulness_threshold() -> f32 {
    guard::FAITHFULNESS_THRESHOLD
}
fn default_fallback_score() -> f32 {
    guard::FALLBACK_SCORE
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self {
            faithfulness_threshold: default_faithfulness_threshold(),
            fallback_score: default_fallback_score(),
        }
    }
}

/// Answer cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Disable to run without a durable cache (tests, ephemeral workers)
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    /// Directory holding the append log and snapshots
    #[serde(default = "default_cache_dir")]
    pub dir: String,

    /// Approximate in-memory bound (bytes); LRU eviction beyond it
    #[serde(default = "default_cache_max_bytes")]
    pub max_bytes: usize,

    /// Snapshot after this many writes
    #[serde(default = "default_cache_snapshot_every")]
    pub snapshot_every: u64,
}

fn default_cache_enabled() -> bool {
    true
}
fn default_cache_dir() -> String {
    "data/cache".to_string()
}
fn default_cache_max_bytes() -> usize {
    limits::CACHE_MAX_BYTES
}
fn default_cache_snapshot_every() -> u64 {
    limits::CACHE_SNAPSHOT_EVERY
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            dir: default_cache_dir(),
            max_bytes: default_cache_max_bytes(),
            snapshot_every: default_cache_snapshot_every(),
        }
    }
}

/// External provider credentials and endpoints.
///
/// API keys default from the conventional env vars so a bare `Settings`
/// works in deployment without a config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default = "default_anthropic_api_key")]
    pub anthropic_api_key: Option<String>,

    #[serde(default = "default_anthropic_model")]
    pub anthropic_model: String,

    #[serde(default = "default_openai_api_key")]
    pub openai_api_key: Option<String>,

    #[serde(default = "default_openai_model")]
    pub openai_model: String,

    #[serde(default = "default_rerank_api_key")]
    pub rerank_api_key: Option<String>,

    #[serde(default = "default_rerank_model")]
    pub rerank_model: String,

    #[serde(default = "default_web_search_api_key")]
    pub web_search_api_key: Option<String>,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default)]
    pub qdrant_api_key: Option<String>,

    /// Connection pool size per LLM provider
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

fn default_anthropic_api_key() -> Option<String> {
    std::env::var("ANTHROPIC_API_KEY").ok()
}
fn default_anthropic_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}
fn default_openai_api_key() -> Option<String> {
    std::env::var("OPENAI_API_KEY").ok()
}
fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_rerank_api_key() -> Option<String> {
    std::env::var("COHERE_API_KEY").ok()
}
fn default_rerank_model() -> String {
    "rerank-multilingual-v3.0".to_string()
}
fn default_web_search_api_key() -> Option<String> {
    std::env::var("TAVILY_API_KEY").ok()
}
fn default_embedding_model() -> String {
    "bge-m3".to_string()
}
fn default_pool_size() -> usize {
    limits::PROVIDER_POOL_SIZE
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            anthropic_api_key: default_anthropic_api_key(),
            anthropic_model: default_anthropic_model(),
            openai_api_key: default_openai_api_key(),
            openai_model: default_openai_model(),
            rerank_api_key: default_rerank_api_key(),
            rerank_model: default_rerank_model(),
            web_search_api_key: default_web_search_api_key(),
            embedding_model: default_embedding_model(),
            qdrant_api_key: None,
            pool_size: default_pool_size(),
        }
    }
}

impl Settings {
    /// Reject configurations that cannot work at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.guard.faithfulness_threshold) {
            return Err(ConfigError::Invalid(
                "guard.faithfulness_threshold must be in [0,1]".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.retrieval.hybrid_alpha) {
            return Err(ConfigError::Invalid(
                "retrieval.hybrid_alpha must be in [0,1]".to_string(),
            ));
        }
        if self.retrieval.final_top_n > self.retrieval.hybrid_top_k {
            return Err(ConfigError::Invalid(
                "retrieval.final_top_n cannot exceed retrieval.hybrid_top_k".to_string(),
            ));
        }
        if self.pipeline.max_concurrent_requests == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.max_concurrent_requests must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load settings from an optional TOML file, then apply environment
/// overrides (`CLIMATE_CHAT_` prefix, `__` separator).
pub fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    if let Some(path) = path {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        builder = builder.add_source(File::from(path));
    }

    let settings: Settings = builder
        .add_source(Environment::with_prefix("CLIMATE_CHAT").separator("__"))
        .build()?
        .try_deserialize()?;

    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.retrieval.hybrid_top_k, 10);
        assert_eq!(settings.retrieval.final_top_n, 5);
        assert!((settings.guard.faithfulness_threshold - 0.7).abs() < f32::EPSILON);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let mut settings = Settings::default();
        settings.guard.faithfulness_threshold = 1.5;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            file,
            "[retrieval]\nhybrid_top_k = 8\n\n[pipeline]\nrequest_deadline_ms = 30000\n"
        )
        .unwrap();

        let settings = load_settings(Some(file.path())).unwrap();
        assert_eq!(settings.retrieval.hybrid_top_k, 8);
        assert_eq!(settings.pipeline.request_deadline_ms, 30_000);
        // Untouched sections keep defaults.
        assert_eq!(settings.retrieval.final_top_n, 5);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = load_settings(Some(Path::new("/nonexistent/climate.toml")));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }
}
