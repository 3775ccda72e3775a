//! Multilingual router
//!
//! Determines the answer language and the model family. Detection runs in
//! three tiers: caller declaration, common-phrase lookup, then an LLM
//! detector. The router also owns the per-language success counters that
//! break family ties.

use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use serde::Deserialize;

use climate_chat_config::languages;
use climate_chat_core::{Error, LanguageDecision, LlmClient, ModelFamily, Result};
use climate_chat_llm::prompt::PromptBuilder;
use climate_chat_llm::structured::{compile_schema, complete_validated};

static DETECTION_SCHEMA: Lazy<jsonschema::JSONSchema> = Lazy::new(|| {
    compile_schema(&serde_json::json!({
        "type": "object",
        "required": ["language_code", "confidence"],
        "properties": {
            "language_code": {"type": "string", "minLength": 2, "maxLength": 3},
            "confidence": {"type": "number", "minimum": 0.0, "maximum": 1.0}
        }
    }))
});

#[derive(Debug, Deserialize)]
struct DetectedLanguage {
    language_code: String,
    confidence: f32,
}

/// Router configuration
#[derive(Debug, Clone, Default)]
pub struct RouterConfig {
    /// Route every request to this family, overriding the tables.
    pub force_family: Option<ModelFamily>,
}

#[derive(Default)]
struct FamilyStats {
    ok: u64,
    total: u64,
}

/// Language detection and family selection
pub struct MultilingualRouter {
    config: RouterConfig,
    detector: Option<Arc<dyn LlmClient>>,
    /// (code, family) -> success counters, fed back by the orchestrator.
    outcomes: DashMap<(String, ModelFamily), FamilyStats>,
}

impl MultilingualRouter {
    pub fn new(config: RouterConfig) -> Self {
        Self {
            config,
            detector: None,
            outcomes: DashMap::new(),
        }
    }

    /// Use an LLM as the third detection tier.
    pub fn with_detector(mut self, detector: Arc<dyn LlmClient>) -> Self {
        self.detector = Some(detector);
        self
    }

    /// Route a query. `LanguageUndetected` is returned only for queries
    /// that are both undetectable and unsafe to guess (non-Latin script or
    /// nearly empty); everything else falls back to English.
    pub async fn route(&self, query: &str, declared: Option<&str>) -> Result<LanguageDecision> {
        if let Some(name) = declared {
            if let Some(code) = languages::code_for_name(name) {
                return Ok(self.decide(code, 1.0));
            }
            tracing::warn!(declared = name, "unknown declared language, detecting instead");
        }

        if let Some((code, confidence)) = languages::detect_by_phrase(query) {
            return Ok(self.decide(code, confidence));
        }

        if let Some(ref detector) = self.detector {
            let detected: Result<DetectedLanguage> = complete_validated(
                detector.as_ref(),
                PromptBuilder::language_detection(query, false),
                PromptBuilder::language_detection(query, true),
                &DETECTION_SCHEMA,
                64,
            )
            .await;

            match detected {
                Ok(d) if d.confidence >= 0.5 && languages::is_supported(&d.language_code) => {
                    return Ok(self.decide(&d.language_code, d.confidence));
                }
                Ok(d) => {
                    tracing::debug!(
                        code = %d.language_code,
                        confidence = d.confidence,
                        "low-confidence detection"
                    );
                }
                Err(err) => {
                    tracing::warn!(error = %err, "language detector failed");
                }
            }
        }

        let word_count = query.split_whitespace().count();
        if !languages::is_latin_script(query) || word_count < 2 {
            return Err(Error::LanguageUndetected);
        }

        // Latin-script text with no detection signal: assume English at
        // low confidence rather than refusing.
        Ok(self.decide("en", 0.5))
    }

    fn decide(&self, code: &str, confidence: f32) -> LanguageDecision {
        let in_high_quality = languages::is_high_quality(code);
        let in_high_coverage = languages::is_high_coverage(code);

        let (code, family) = if in_high_quality && in_high_coverage {
            (code.to_string(), self.tie_break(code))
        } else if in_high_quality {
            (code.to_string(), ModelFamily::HighQuality)
        } else if in_high_coverage {
            (code.to_string(), ModelFamily::HighCoverage)
        } else {
            tracing::info!(code, "unsupported language, answering in English");
            ("en".to_string(), ModelFamily::HighQuality)
        };

        let mut decision = LanguageDecision {
            translate_to_en_before_retrieval: code != "en",
            translate_answer_back: code != "en",
            code,
            confidence,
            family,
        };

        if let Some(forced) = self.config.force_family {
            if forced != decision.family {
                tracing::warn!(
                    from = decision.family.as_str(),
                    to = forced.as_str(),
                    language = %decision.code,
                    "force_family override applied"
                );
                decision.family = forced;
                let supported = match forced {
                    ModelFamily::HighQuality => languages::is_high_quality(&decision.code),
                    ModelFamily::HighCoverage => languages::is_high_coverage(&decision.code),
                };
                if !supported {
                    // The forced family cannot answer in this language;
                    // answer in English instead.
                    decision.code = "en".to_string();
                    decision.translate_to_en_before_retrieval = false;
                    decision.translate_answer_back = false;
                }
            }
        }

        decision
    }

    /// Prefer the family with the better recorded success rate for this
    /// language; unknown rates prefer high quality.
    fn tie_break(&self, code: &str) -> ModelFamily {
        let rate = |family: ModelFamily| -> Option<f64> {
            self.outcomes
                .get(&(code.to_string(), family))
                .filter(|stats| stats.total > 0)
                .map(|stats| stats.ok as f64 / stats.total as f64)
        };

        match (rate(ModelFamily::HighQuality), rate(ModelFamily::HighCoverage)) {
            (Some(hq), Some(hc)) if hc > hq => ModelFamily::HighCoverage,
            _ => ModelFamily::HighQuality,
        }
    }

    /// Feed back whether a routed request succeeded.
    pub fn record_outcome(&self, code: &str, family: ModelFamily, success: bool) {
        let mut stats = self
            .outcomes
            .entry((code.to_string(), family))
            .or_default();
        stats.total += 1;
        if success {
            stats.ok += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> MultilingualRouter {
        MultilingualRouter::new(RouterConfig::default())
    }

    #[tokio::test]
    async fn test_declared_language_wins() {
        let decision = router().route("whatever text", Some("Spanish")).await.unwrap();
        assert_eq!(decision.code, "es");
        assert_eq!(decision.confidence, 1.0);
        assert!(decision.translate_answer_back);
        assert!(decision.translate_to_en_before_retrieval);
    }

    #[tokio::test]
    async fn test_phrase_detection_routes_spanish() {
        let decision = router()
            .route("¿Cómo puedo reducir mi huella de carbono?", None)
            .await
            .unwrap();
        assert_eq!(decision.code, "es");
        assert_eq!(decision.family, ModelFamily::HighQuality);
    }

    #[tokio::test]
    async fn test_english_stays_untranslated() {
        let decision = router()
            .route("What are the local impacts of climate change in Toronto?", None)
            .await
            .unwrap();
        assert_eq!(decision.code, "en");
        assert!(!decision.translate_answer_back);
        assert!(!decision.translate_to_en_before_retrieval);
    }

    #[tokio::test]
    async fn test_short_non_latin_is_undetected() {
        let result = router().route("ᚠᚢᚦᚨ", None).await;
        assert!(matches!(result, Err(Error::LanguageUndetected)));
    }

    #[tokio::test]
    async fn test_unknown_latin_defaults_to_english() {
        let decision = router()
            .route("zxqv plorth wibble clorpt mumble", None)
            .await
            .unwrap();
        assert_eq!(decision.code, "en");
        assert!(decision.confidence <= 0.5);
    }

    #[tokio::test]
    async fn test_unsupported_language_falls_back_to_english() {
        let router = router();
        let decision = router.decide("xx", 0.8);
        assert_eq!(decision.code, "en");
    }

    #[tokio::test]
    async fn test_force_family_override() {
        let mut config = RouterConfig::default();
        config.force_family = Some(ModelFamily::HighQuality);
        let router = MultilingualRouter::new(config);

        // "sw" is high-coverage only; the forced family cannot serve it,
        // so the answer language falls back to English.
        let decision = router.decide("sw", 0.9);
        assert_eq!(decision.family, ModelFamily::HighQuality);
        assert_eq!(decision.code, "en");
        assert!(!decision.translate_answer_back);
    }

    #[tokio::test]
    async fn test_tie_break_uses_success_rates() {
        let router = router();
        // "es" is in both families' tables.
        router.record_outcome("es", ModelFamily::HighQuality, false);
        router.record_outcome("es", ModelFamily::HighQuality, false);
        router.record_outcome("es", ModelFamily::HighCoverage, true);
        router.record_outcome("es", ModelFamily::HighCoverage, true);

        let decision = router.decide("es", 0.9);
        assert_eq!(decision.family, ModelFamily::HighCoverage);
    }

    #[tokio::test]
    async fn test_tie_break_defaults_to_high_quality() {
        let decision = router().decide("es", 0.9);
        assert_eq!(decision.family, ModelFamily::HighQuality);
    }
}
