//! Query classifier and rewriter
//!
//! One JSON-mode LLM call produces the tagged intent, a standalone English
//! rewrite, and the canned-response flags. Schema failures get a single
//! stricter retry; total failure degrades to `on_topic` with the original
//! query as the rewrite, so the pipeline prefers retrieval over failing.

use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::Deserialize;

use climate_chat_core::{Classification, LlmClient, ParsedHistory, QueryIntent, Result};
use climate_chat_llm::prompt::PromptBuilder;
use climate_chat_llm::structured::{compile_schema, complete_validated};

static CLASSIFIER_SCHEMA: Lazy<jsonschema::JSONSchema> = Lazy::new(|| {
    compile_schema(&serde_json::json!({
        "type": "object",
        "required": ["classification", "rewrite_en"],
        "properties": {
            "classification": {
                "type": "string",
                "enum": [
                    "greeting", "goodbye", "thanks", "emergency",
                    "instruction", "on_topic", "off_topic", "harmful"
                ]
            },
            "rewrite_en": {"type": "string"},
            "ask_how_to_use": {"type": "boolean"},
            "how_it_works": {"type": "boolean"},
            "confidence": {"type": "number", "minimum": 0.0, "maximum": 1.0}
        }
    }))
});

#[derive(Debug, Deserialize)]
struct RawClassification {
    classification: String,
    rewrite_en: String,
    #[serde(default)]
    ask_how_to_use: bool,
    #[serde(default)]
    how_it_works: bool,
    #[serde(default = "default_confidence")]
    confidence: f32,
}

fn default_confidence() -> f32 {
    0.5
}

/// LLM-driven intent classifier and query rewriter
pub struct QueryClassifier {
    llm: Arc<dyn LlmClient>,
}

impl QueryClassifier {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Classify a query. Never fails: provider outages and repeated schema
    /// failures both degrade to the on-topic fallback.
    pub async fn classify(
        &self,
        query: &str,
        history: &ParsedHistory,
        declared_language: Option<&str>,
    ) -> Classification {
        let result: Result<RawClassification> = complete_validated(
            self.llm.as_ref(),
            PromptBuilder::classifier(query, history, declared_language, false),
            PromptBuilder::classifier(query, history, declared_language, true),
            &CLASSIFIER_SCHEMA,
            512,
        )
        .await;

        match result {
            Ok(raw) => {
                let intent = QueryIntent::from_tag(&raw.classification).unwrap_or_else(|| {
                    tracing::warn!(tag = %raw.classification, "unknown intent tag, assuming on_topic");
                    QueryIntent::OnTopic
                });
                let rewrite_en = if raw.rewrite_en.trim().is_empty() {
                    query.to_string()
                } else {
                    raw.rewrite_en
                };
                Classification {
                    intent,
                    rewrite_en,
                    ask_how_to_use: raw.ask_how_to_use,
                    how_it_works: raw.how_it_works,
                    confidence: raw.confidence.clamp(0.0, 1.0),
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "classifier unavailable, continuing as on_topic");
                Classification::fallback(query)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use climate_chat_core::{CompletionRequest, Error, ModelFamily};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedLlm {
        replies: Vec<&'static str>,
        calls: AtomicUsize,
    }

    impl ScriptedLlm {
        fn new(replies: Vec<&'static str>) -> Self {
            Self {
                replies,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, _request: CompletionRequest) -> Result<String> {
            let i = self.calls.fetch_add(1, Ordering::SeqCst);
            match self.replies.get(i) {
                Some(reply) => Ok(reply.to_string()),
                None => Err(Error::GenerationError("provider down".to_string())),
            }
        }

        async fn translate(&self, text: &str, _target_code: &str) -> Result<String> {
            Ok(text.to_string())
        }

        fn family(&self) -> ModelFamily {
            ModelFamily::HighQuality
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    #[tokio::test]
    async fn test_valid_classification() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            r#"{"classification": "on_topic", "rewrite_en": "local climate impacts in Toronto", "confidence": 0.95}"#,
        ]));
        let classifier = QueryClassifier::new(llm);
        let c = classifier
            .classify("impacts in toronto?", &ParsedHistory::default(), None)
            .await;
        assert_eq!(c.intent, QueryIntent::OnTopic);
        assert_eq!(c.rewrite_en, "local climate impacts in Toronto");
    }

    #[tokio::test]
    async fn test_retry_after_malformed_reply() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            "sure! here's my analysis...",
            r#"{"classification": "off_topic", "rewrite_en": "pizza recipe"}"#,
        ]));
        let classifier = QueryClassifier::new(llm.clone());
        let c = classifier
            .classify("best pizza recipe?", &ParsedHistory::default(), None)
            .await;
        assert_eq!(c.intent, QueryIntent::OffTopic);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_double_failure_degrades_to_on_topic() {
        let llm = Arc::new(ScriptedLlm::new(vec!["not json", "still not json"]));
        let classifier = QueryClassifier::new(llm);
        let c = classifier
            .classify("¿qué es el cambio climático?", &ParsedHistory::default(), None)
            .await;
        assert_eq!(c.intent, QueryIntent::OnTopic);
        assert_eq!(c.rewrite_en, "¿qué es el cambio climático?");
    }

    #[tokio::test]
    async fn test_provider_outage_degrades_to_on_topic() {
        let llm = Arc::new(ScriptedLlm::new(vec![]));
        let classifier = QueryClassifier::new(llm);
        let c = classifier
            .classify("what is climate change", &ParsedHistory::default(), None)
            .await;
        assert_eq!(c.intent, QueryIntent::OnTopic);
    }
}
