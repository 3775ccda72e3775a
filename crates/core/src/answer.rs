//! Final answer and caller-facing response records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::language::ModelFamily;
use crate::retrieval::{Citation, RetrievalSource};

/// A finalized answer. This is the unit stored in the answer cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    /// Answer text, already in the user's language.
    pub text: String,
    /// ISO 639-1 code of the answer language.
    pub language_code: String,
    /// Family that generated the answer; `None` for canned responses.
    pub model_family: Option<ModelFamily>,
    /// At most 5, ordered by descending rerank score.
    pub citations: Vec<Citation>,
    pub faithfulness_score: f32,
    pub retrieval_source: RetrievalSource,
    pub processing_time_ms: u64,
}

/// The record returned to the HTTP caller.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub success: bool,
    /// Response text in the user's language.
    pub response: String,
    pub citations: Vec<Citation>,
    pub faithfulness_score: f32,
    pub processing_time_ms: u64,
    pub language_used: String,
    /// "HighQuality" | "HighCoverage" | "canned"
    pub model_used: String,
    /// "vector" | "web_fallback" | "canned" | "none"
    pub retrieval_source: String,
    pub request_id: String,
}

impl QueryResponse {
    /// Build the caller record from a finalized answer.
    pub fn from_answer(answer: &Answer, success: bool, request_id: impl Into<String>) -> Self {
        Self {
            success,
            response: answer.text.clone(),
            citations: answer.citations.clone(),
            faithfulness_score: answer.faithfulness_score,
            processing_time_ms: answer.processing_time_ms,
            language_used: answer.language_code.clone(),
            model_used: answer
                .model_family
                .map(|f| f.as_str().to_string())
                .unwrap_or_else(|| "canned".to_string()),
            retrieval_source: answer.retrieval_source.as_str().to_string(),
            request_id: request_id.into(),
        }
    }
}

/// User feedback on a finalized answer. Persisted fire-and-forget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub request_id: String,
    pub query: String,
    pub language_code: String,
    pub helpful: Option<bool>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_answer() -> Answer {
        Answer {
            text: "Warming shifts precipitation patterns.".to_string(),
            language_code: "en".to_string(),
            model_family: Some(ModelFamily::HighCoverage),
            citations: vec![],
            faithfulness_score: 0.85,
            retrieval_source: RetrievalSource::Vector,
            processing_time_ms: 1200,
        }
    }

    #[test]
    fn test_response_from_answer() {
        let response = QueryResponse::from_answer(&sample_answer(), true, "req-1");
        assert!(response.success);
        assert_eq!(response.model_used, "HighCoverage");
        assert_eq!(response.retrieval_source, "vector");
    }

    #[test]
    fn test_canned_model_label() {
        let mut answer = sample_answer();
        answer.model_family = None;
        answer.retrieval_source = RetrievalSource::Canned;
        let response = QueryResponse::from_answer(&answer, true, "req-2");
        assert_eq!(response.model_used, "canned");
        assert_eq!(response.retrieval_source, "canned");
    }
}
