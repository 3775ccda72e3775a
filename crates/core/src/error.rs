//! Shared error type
//!
//! Every component maps its local failures into one of these kinds. The
//! orchestrator is the only place that turns them into user-visible
//! responses.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline error kinds
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid conversation history: {0}")]
    InvalidHistory(String),

    #[error("classifier unavailable: {0}")]
    ClassifierUnavailable(String),

    #[error("query language could not be detected")]
    LanguageUndetected,

    #[error("translation failed: {0}")]
    TranslationError(String),

    #[error("retriever unavailable: {0}")]
    RetrieverUnavailable(String),

    #[error("no supporting evidence found")]
    NoEvidence,

    #[error("generation failed: {0}")]
    GenerationError(String),

    #[error("provider saturated: {0}")]
    ProviderSaturated(String),

    #[error("request deadline exceeded")]
    Timeout,

    #[error("cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable machine-readable kind, for logs and correlation.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidHistory(_) => "invalid_history",
            Error::ClassifierUnavailable(_) => "classifier_unavailable",
            Error::LanguageUndetected => "language_undetected",
            Error::TranslationError(_) => "translation_error",
            Error::RetrieverUnavailable(_) => "retriever_unavailable",
            Error::NoEvidence => "no_evidence",
            Error::GenerationError(_) => "generation_error",
            Error::ProviderSaturated(_) => "provider_saturated",
            Error::Timeout => "timeout",
            Error::CacheUnavailable(_) => "cache_unavailable",
            Error::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_is_stable() {
        assert_eq!(Error::LanguageUndetected.kind(), "language_undetected");
        assert_eq!(Error::Timeout.kind(), "timeout");
        assert_eq!(
            Error::RetrieverUnavailable("down".into()).kind(),
            "retriever_unavailable"
        );
    }
}
