//! Language routing types

use serde::{Deserialize, Serialize};

/// The two LLM provider groupings the router chooses between.
///
/// `HighQuality` serves a curated set of languages with strong translation
/// quality; `HighCoverage` serves a much broader list at lower fidelity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    HighQuality,
    HighCoverage,
}

impl ModelFamily {
    /// Caller-facing label, used in the response record.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFamily::HighQuality => "HighQuality",
            ModelFamily::HighCoverage => "HighCoverage",
        }
    }
}

/// Outcome of language routing for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct LanguageDecision {
    /// Detected (or declared) ISO 639-1 code of the answer language.
    pub code: String,
    /// Detection confidence in [0,1]; 1.0 for caller-declared languages.
    pub confidence: f32,
    /// Model family that will answer.
    pub family: ModelFamily,
    /// Whether the query must be translated to English before retrieval.
    pub translate_to_en_before_retrieval: bool,
    /// Whether the answer must be translated back to `code`.
    pub translate_answer_back: bool,
}

impl LanguageDecision {
    /// English decision, used as the unsupported-language fallback.
    pub fn english(family: ModelFamily, confidence: f32) -> Self {
        Self {
            code: "en".to_string(),
            confidence,
            family,
            translate_to_en_before_retrieval: false,
            translate_answer_back: false,
        }
    }

    pub fn is_english(&self) -> bool {
        self.code == "en"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_labels() {
        assert_eq!(ModelFamily::HighQuality.as_str(), "HighQuality");
        assert_eq!(ModelFamily::HighCoverage.as_str(), "HighCoverage");
    }

    #[test]
    fn test_english_fallback() {
        let decision = LanguageDecision::english(ModelFamily::HighQuality, 0.5);
        assert!(decision.is_english());
        assert!(!decision.translate_answer_back);
    }
}
