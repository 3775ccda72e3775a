//! Retrieved passage and citation types

use serde::{Deserialize, Serialize};

/// A passage of evidence, alive only for the duration of one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    /// Stable id within the index.
    pub id: String,
    pub title: String,
    pub url: Option<String>,
    pub section_title: Option<String>,
    /// Cleaned passage text.
    pub text: String,
    /// Raw index similarity score (higher is better).
    pub dense_score: f32,
    /// Relevance in [0,1], set after reranking.
    pub rerank_score: Option<f32>,
    /// Synthetic passages injected from the conversation; used as
    /// generation context only and never cited.
    #[serde(default)]
    pub conversation_context: bool,
}

impl Passage {
    pub fn citable(&self) -> bool {
        !self.conversation_context
    }
}

/// A citation attached to an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub title: String,
    pub url: Option<String>,
    pub snippet: String,
    pub rerank_score: f32,
}

/// Origin of the evidence behind the final answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalSource {
    Vector,
    WebFallback,
    Canned,
    None,
}

impl RetrievalSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalSource::Vector => "vector",
            RetrievalSource::WebFallback => "web_fallback",
            RetrievalSource::Canned => "canned",
            RetrievalSource::None => "none",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_context_not_citable() {
        let passage = Passage {
            id: "conversation-context".to_string(),
            title: "Conversation context".to_string(),
            url: None,
            section_title: None,
            text: "earlier assistant reply".to_string(),
            dense_score: 0.0,
            rerank_score: None,
            conversation_context: true,
        };
        assert!(!passage.citable());
    }

    #[test]
    fn test_source_labels() {
        assert_eq!(RetrievalSource::WebFallback.as_str(), "web_fallback");
        assert_eq!(RetrievalSource::None.as_str(), "none");
    }
}
