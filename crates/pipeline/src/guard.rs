//! Faithfulness guard
//!
//! Scores how well an answer is supported by its evidence passages. The
//! primary path is a structured LLM evaluation; a schema failure falls
//! back to embedding cosine similarity, and total failure assumes a
//! conservative score. The guard itself never fails a request.

use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::Deserialize;

use climate_chat_core::{EmbeddingProvider, LlmClient, Passage, Result};
use climate_chat_llm::prompt::PromptBuilder;
use climate_chat_llm::structured::{compile_schema, complete_validated};

static FAITHFULNESS_SCHEMA: Lazy<jsonschema::JSONSchema> = Lazy::new(|| {
    compile_schema(&serde_json::json!({
        "type": "object",
        "required": ["score"],
        "properties": {
            "score": {"type": "number", "minimum": 0.0, "maximum": 1.0},
            "supported_claims": {"type": "array", "items": {"type": "string"}},
            "unsupported_claims": {"type": "array", "items": {"type": "string"}},
            "assessment": {"type": "string"}
        }
    }))
});

#[derive(Debug, Deserialize)]
struct RawEvaluation {
    score: f32,
    #[serde(default)]
    supported_claims: Vec<String>,
    #[serde(default)]
    unsupported_claims: Vec<String>,
    #[serde(default)]
    assessment: String,
}

/// Guard configuration
#[derive(Debug, Clone)]
pub struct GuardConfig {
    /// Answers below this are handled by the fallback policy
    pub threshold: f32,
    /// Score assumed when every evaluation path fails
    pub fallback_score: f32,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            threshold: climate_chat_config::constants::guard::FAITHFULNESS_THRESHOLD,
            fallback_score: climate_chat_config::constants::guard::FALLBACK_SCORE,
        }
    }
}

/// One faithfulness evaluation.
#[derive(Debug, Clone)]
pub struct FaithfulnessReport {
    pub score: f32,
    pub supported_claims: Vec<String>,
    pub unsupported_claims: Vec<String>,
    /// Observability band, see [`assessment_label`].
    pub assessment: &'static str,
}

/// LLM-graded faithfulness evaluation with similarity fallback
pub struct FaithfulnessGuard {
    config: GuardConfig,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
}

impl FaithfulnessGuard {
    pub fn new(config: GuardConfig) -> Self {
        Self {
            config,
            embedder: None,
        }
    }

    /// Enable the embedding-similarity fallback path.
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn threshold(&self) -> f32 {
        self.config.threshold
    }

    /// Evaluate an answer against its passages. Never fails; degraded
    /// paths produce conservative scores.
    pub async fn evaluate(
        &self,
        llm: &Arc<dyn LlmClient>,
        answer: &str,
        passages: &[Passage],
    ) -> FaithfulnessReport {
        let evaluation: Result<RawEvaluation> = complete_validated(
            llm.as_ref(),
            PromptBuilder::faithfulness(answer, passages, false),
            PromptBuilder::faithfulness(answer, passages, true),
            &FAITHFULNESS_SCHEMA,
            768,
        )
        .await;

        match evaluation {
            Ok(raw) => {
                let score = raw.score.clamp(0.0, 1.0);
                tracing::debug!(
                    score,
                    model_assessment = %raw.assessment,
                    "faithfulness evaluated"
                );
                FaithfulnessReport {
                    score,
                    supported_claims: raw.supported_claims,
                    unsupported_claims: raw.unsupported_claims,
                    assessment: assessment_label(score),
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "structured evaluation failed, using similarity");
                let score = self.similarity_score(answer, passages).await;
                FaithfulnessReport {
                    score,
                    supported_claims: Vec::new(),
                    unsupported_claims: Vec::new(),
                    assessment: assessment_label(score),
                }
            }
        }
    }

    /// Cosine similarity between the answer and the concatenated passages.
    async fn similarity_score(&self, answer: &str, passages: &[Passage]) -> f32 {
        let Some(ref embedder) = self.embedder else {
            return self.config.fallback_score;
        };

        let evidence: String = passages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let (answer_embedding, evidence_embedding) =
            tokio::join!(embedder.embed(answer), embedder.embed(&evidence));

        match (answer_embedding, evidence_embedding) {
            (Ok(a), Ok(b)) => cosine(&a.dense, &b.dense).clamp(0.0, 1.0),
            _ => {
                tracing::warn!("similarity fallback failed, assuming conservative score");
                self.config.fallback_score
            }
        }
    }
}

/// Observability bands for a faithfulness score.
pub fn assessment_label(score: f32) -> &'static str {
    if score >= 0.9 {
        "highly faithful"
    } else if score >= 0.7 {
        "faithful"
    } else if score >= 0.5 {
        "moderately faithful"
    } else if score >= 0.3 {
        "potentially unfaithful"
    } else {
        "likely unfaithful"
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
