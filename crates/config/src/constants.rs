//! Centralized constants
//!
//! Single source of truth for service endpoints, timeouts, and pipeline
//! tuning defaults. Anything an operator may want to override also has a
//! field in `Settings`; the values here are the defaults.

/// Service endpoints (loaded from env vars with fallback defaults)
pub mod endpoints {
    use once_cell::sync::Lazy;

    /// Anthropic API endpoint (env: ANTHROPIC_API_BASE)
    pub static ANTHROPIC_DEFAULT: Lazy<String> = Lazy::new(|| {
        std::env::var("ANTHROPIC_API_BASE")
            .unwrap_or_else(|_| "https://api.anthropic.com".to_string())
    });

    /// OpenAI-compatible API endpoint (env: OPENAI_API_BASE)
    pub static OPENAI_DEFAULT: Lazy<String> = Lazy::new(|| {
        std::env::var("OPENAI_API_BASE").unwrap_or_else(|_| "https://api.openai.com/v1".to_string())
    });

    /// Qdrant endpoint (env: QDRANT_URL)
    pub static QDRANT_DEFAULT: Lazy<String> = Lazy::new(|| {
        std::env::var("QDRANT_URL").unwrap_or_else(|_| "http://127.0.0.1:6334".to_string())
    });

    /// Embedding service endpoint (env: EMBEDDING_URL)
    pub static EMBEDDING_DEFAULT: Lazy<String> = Lazy::new(|| {
        std::env::var("EMBEDDING_URL").unwrap_or_else(|_| "http://127.0.0.1:8080".to_string())
    });

    /// Rerank API endpoint (env: RERANK_API_BASE)
    pub static RERANK_DEFAULT: Lazy<String> = Lazy::new(|| {
        std::env::var("RERANK_API_BASE").unwrap_or_else(|_| "https://api.cohere.com".to_string())
    });

    /// Web search API endpoint (env: WEB_SEARCH_API_BASE)
    pub static WEB_SEARCH_DEFAULT: Lazy<String> = Lazy::new(|| {
        std::env::var("WEB_SEARCH_API_BASE")
            .unwrap_or_else(|_| "https://api.tavily.com".to_string())
    });
}

/// Per-call timeouts (milliseconds unless noted)
pub mod timeouts {
    /// Embedding call timeout (ms)
    pub const EMBED_MS: u64 = 5_000;

    /// Hybrid vector query timeout (ms)
    pub const VECTOR_QUERY_MS: u64 = 3_000;

    /// Rerank call timeout (ms)
    pub const RERANK_MS: u64 = 5_000;

    /// LLM call timeout (ms)
    pub const LLM_REQUEST_MS: u64 = 30_000;

    /// Web search fallback timeout (ms)
    pub const WEB_SEARCH_MS: u64 = 10_000;

    /// Cache operation timeout (ms)
    pub const CACHE_OP_MS: u64 = 1_000;

    /// Whole-request deadline (ms)
    pub const REQUEST_DEADLINE_MS: u64 = 60_000;
}

/// Retrieval tuning defaults
pub mod retrieval {
    /// Candidate pool from the hybrid query (and hard cap before rerank)
    pub const HYBRID_TOP_K: usize = 10;

    /// Final passage count after reranking
    pub const FINAL_TOP_N: usize = 5;

    /// Candidates below this rerank relevance are dropped
    pub const RERANK_FLOOR: f32 = 0.2;

    /// Cleaned passages shorter than this are dropped
    pub const MIN_PASSAGE_CHARS: usize = 120;

    /// Dense weight in hybrid fusion; sparse weight is `1 - alpha`
    pub const HYBRID_ALPHA: f32 = 0.5;

    /// RRF k parameter for rank fusion
    pub const RRF_K: f32 = 60.0;

    /// Initial backoff before the single index retry (ms)
    pub const INDEX_RETRY_INITIAL_MS: u64 = 250;

    /// Backoff multiplier between attempts
    pub const INDEX_RETRY_FACTOR: u32 = 2;

    /// Bounded LRU capacity of the embedding cache (entries)
    pub const EMBEDDING_CACHE_CAPACITY: usize = 2_048;
}

/// Faithfulness guard defaults
pub mod guard {
    /// Answers scoring below this trigger the web-search fallback and are
    /// never cached
    pub const FAITHFULNESS_THRESHOLD: f32 = 0.7;

    /// Conservative score assumed when every evaluation path fails
    pub const FALLBACK_SCORE: f32 = 0.3;
}

/// Request shaping limits
pub mod limits {
    /// Maximum query length; longer input is rejected upstream
    pub const MAX_QUERY_CHARS: usize = 2_000;

    /// Conversation turns kept for downstream stages
    pub const HISTORY_WINDOW: usize = 8;

    /// Per-process concurrent request cap
    pub const MAX_CONCURRENT_REQUESTS: usize = 64;

    /// Connection pool size per LLM provider
    pub const PROVIDER_POOL_SIZE: usize = 8;

    /// Approximate answer-cache memory bound (bytes)
    pub const CACHE_MAX_BYTES: usize = 64 * 1024 * 1024;

    /// Snapshot the answer cache after this many writes
    pub const CACHE_SNAPSHOT_EVERY: u64 = 256;
}
