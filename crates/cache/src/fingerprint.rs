//! Query fingerprints
//!
//! The cache is content-addressed: identical normalized queries in the
//! same language map to the same key, across users and sessions. The
//! model family is deliberately NOT part of the key.

use sha2::{Digest, Sha256};

/// Normalize a query for fingerprinting: lowercase, trim, collapse
/// internal whitespace, strip trailing punctuation.
pub fn normalize_query(query: &str) -> String {
    let collapsed = query
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    collapsed
        .trim_end_matches(|c: char| c.is_ascii_punctuation() || "。？！…¡¿".contains(c))
        .trim_end()
        .to_string()
}

/// Cache key for a (language, query) pair:
/// `q:{lang}:{sha256_hex("{lang}:{normalized}")}`.
pub fn cache_key(language_code: &str, query: &str) -> String {
    let normalized = normalize_query(query);
    let digest = Sha256::digest(format!("{language_code}:{normalized}").as_bytes());
    format!("q:{language_code}:{digest:x}")
}
