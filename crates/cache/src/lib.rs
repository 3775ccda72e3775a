//! Durable answer cache
//!
//! A global, fingerprint-keyed store of finalized answers that survives
//! process restarts:
//! - in-memory LRU map with an approximate byte bound
//! - append-only JSON log, synced at most one second behind
//! - periodic snapshots with log truncation
//! - fire-and-forget feedback log
//!
//! Keys are SHA-256 fingerprints over the normalized (language, query)
//! pair; see [`fingerprint`].

pub mod feedback;
pub mod fingerprint;
pub mod store;

pub use fingerprint::{cache_key, normalize_query};
pub use store::{AnswerStore, AnswerStoreConfig, CacheEntry};

use thiserror::Error;

/// Cache errors
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Store closed")]
    Closed,
}

impl From<CacheError> for climate_chat_core::Error {
    fn from(err: CacheError) -> Self {
        climate_chat_core::Error::CacheUnavailable(err.to_string())
    }
}
