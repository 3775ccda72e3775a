//! Query and classification types

use serde::{Deserialize, Serialize};

/// The raw per-request input, immutable once constructed.
#[derive(Debug, Clone)]
pub struct UserQuery {
    /// Unicode query text (bounded upstream to 2000 chars).
    pub text: String,
    /// Caller-declared language name or code, if any.
    pub language_name: Option<String>,
    /// Caller-supplied history in whatever shape the caller produced.
    /// Normalized by the conversation parser.
    pub history: serde_json::Value,
    /// Bypass the answer cache for this request.
    pub skip_cache: bool,
}

impl UserQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            language_name: None,
            history: serde_json::Value::Null,
            skip_cache: false,
        }
    }

    pub fn with_language(mut self, language_name: impl Into<String>) -> Self {
        self.language_name = Some(language_name.into());
        self
    }

    pub fn with_history(mut self, history: serde_json::Value) -> Self {
        self.history = history;
        self
    }

    pub fn with_skip_cache(mut self, skip_cache: bool) -> Self {
        self.skip_cache = skip_cache;
        self
    }
}

/// Tagged intent produced by the query classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIntent {
    Greeting,
    Goodbye,
    Thanks,
    /// Climate-framed emergency (flood, heat wave, wildfire). Retrieval
    /// proceeds; this is NOT the medical/personal-distress path.
    Emergency,
    /// "How do I use this" style questions about the assistant itself.
    Instruction,
    OnTopic,
    OffTopic,
    /// Personal or medical distress, self-harm, abuse. Gets the safety
    /// canned response.
    Harmful,
}

impl QueryIntent {
    pub fn as_tag(&self) -> &'static str {
        match self {
            QueryIntent::Greeting => "greeting",
            QueryIntent::Goodbye => "goodbye",
            QueryIntent::Thanks => "thanks",
            QueryIntent::Emergency => "emergency",
            QueryIntent::Instruction => "instruction",
            QueryIntent::OnTopic => "on_topic",
            QueryIntent::OffTopic => "off_topic",
            QueryIntent::Harmful => "harmful",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "greeting" => Some(QueryIntent::Greeting),
            "goodbye" => Some(QueryIntent::Goodbye),
            "thanks" => Some(QueryIntent::Thanks),
            "emergency" => Some(QueryIntent::Emergency),
            "instruction" => Some(QueryIntent::Instruction),
            "on_topic" => Some(QueryIntent::OnTopic),
            "off_topic" => Some(QueryIntent::OffTopic),
            "harmful" => Some(QueryIntent::Harmful),
            _ => None,
        }
    }

    /// Whether this intent runs retrieval and generation.
    pub fn needs_retrieval(&self) -> bool {
        matches!(self, QueryIntent::OnTopic | QueryIntent::Emergency)
    }
}

/// Classifier output: intent plus an English rewrite and canned-response
/// flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub intent: QueryIntent,
    /// Standalone English paraphrase, retrievable without history.
    pub rewrite_en: String,
    /// The user asked how to use the assistant.
    #[serde(default)]
    pub ask_how_to_use: bool,
    /// The user asked how the assistant works.
    #[serde(default)]
    pub how_it_works: bool,
    pub confidence: f32,
}

impl Classification {
    /// Degraded classification used when the classifier is unavailable:
    /// prefer retrieval over hard-failing.
    pub fn fallback(query: &str) -> Self {
        Self {
            intent: QueryIntent::OnTopic,
            rewrite_en: query.to_string(),
            ask_how_to_use: false,
            how_it_works: false,
            confidence: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_round_trip() {
        for intent in [
            QueryIntent::Greeting,
            QueryIntent::Emergency,
            QueryIntent::OnTopic,
            QueryIntent::Harmful,
        ] {
            assert_eq!(QueryIntent::from_tag(intent.as_tag()), Some(intent));
        }
        assert_eq!(QueryIntent::from_tag("no_such_tag"), None);
    }

    #[test]
    fn test_emergency_runs_retrieval() {
        assert!(QueryIntent::Emergency.needs_retrieval());
        assert!(!QueryIntent::Harmful.needs_retrieval());
    }

    #[test]
    fn test_fallback_prefers_retrieval() {
        let c = Classification::fallback("¿qué es el cambio climático?");
        assert_eq!(c.intent, QueryIntent::OnTopic);
        assert_eq!(c.rewrite_en, "¿qué es el cambio climático?");
    }
}
