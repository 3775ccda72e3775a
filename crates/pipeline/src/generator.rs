//! Response generator
//!
//! Assembles the grounded prompt, invokes the LLM (one retry), and
//! extracts citations: explicit `[n]` markers when the model used them,
//! otherwise a bag-of-words overlap pass between answer sentences and
//! passage text.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

use climate_chat_core::{
    Citation, CompletionRequest, Error, LlmClient, ParsedHistory, Passage, Result,
};
use climate_chat_llm::prompt::PromptBuilder;

static CITATION_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(\d{1,2})\]").expect("valid regex"));

/// Generator configuration
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Maximum answer tokens
    pub max_tokens: usize,
    /// Sampling temperature (kept low for grounded answers)
    pub temperature: f32,
    /// Minimum sentence/passage overlap for post-hoc citation assignment
    pub overlap_floor: f32,
    /// Citation cap
    pub max_citations: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: 0.3,
            overlap_floor: 0.15,
            max_citations: 5,
        }
    }
}

/// A generated answer with its citations.
#[derive(Debug, Clone)]
pub struct GeneratedAnswer {
    pub text: String,
    pub citations: Vec<Citation>,
}

/// Grounded answer generator
pub struct ResponseGenerator {
    config: GeneratorConfig,
}

impl ResponseGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    /// Generate a grounded answer. One retry on provider failure; the
    /// second failure propagates as `GenerationError`.
    pub async fn generate(
        &self,
        llm: &Arc<dyn LlmClient>,
        query: &str,
        answer_language: &str,
        passages: &[Passage],
        history: &ParsedHistory,
    ) -> Result<GeneratedAnswer> {
        let messages = PromptBuilder::grounded_answer(query, answer_language, passages, history);
        let request = CompletionRequest::new(messages)
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens);

        let text = match llm.complete(request.clone()).await {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(error = %err, "generation failed, retrying once");
                llm.complete(request)
                    .await
                    .map_err(|e| Error::GenerationError(e.to_string()))?
            }
        };

        let citations = self.extract_citations(&text, passages);
        Ok(GeneratedAnswer { text, citations })
    }

    /// Extract citations from the reply.
    ///
    /// Synthetic conversation-context passages are never cited, whatever
    /// the model marked.
    pub fn extract_citations(&self, answer: &str, passages: &[Passage]) -> Vec<Citation> {
        let mut cited: Vec<&Passage> = CITATION_MARKER
            .captures_iter(answer)
            .filter_map(|cap| cap[1].parse::<usize>().ok())
            .filter_map(|n| passages.get(n.wrapping_sub(1)))
            .filter(|p| p.citable())
            .collect();

        if cited.is_empty() {
            cited = self.citations_by_overlap(answer, passages);
        }

        dedupe_citations(cited, self.config.max_citations)
    }

    /// Post-hoc assignment: passages whose text overlaps any answer
    /// sentence above the floor.
    fn citations_by_overlap<'a>(&self, answer: &str, passages: &'a [Passage]) -> Vec<&'a Passage> {
        let sentences: Vec<HashSet<String>> = answer
            .unicode_sentences()
            .map(word_set)
            .filter(|s| !s.is_empty())
            .collect();

        passages
            .iter()
            .filter(|p| p.citable())
            .filter(|p| {
                let passage_words = word_set(&p.text);
                sentences
                    .iter()
                    .any(|sentence| jaccard(sentence, &passage_words) >= self.config.overlap_floor)
            })
            .collect()
    }
}

fn word_set(text: &str) -> HashSet<String> {
    text.unicode_words().map(|w| w.to_lowercase()).collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f32 / union as f32
}

/// At most one citation per canonical URL (fallback: normalized title),
/// keeping the higher-scored duplicate, ordered by rerank score.
fn dedupe_citations(passages: Vec<&Passage>, max: usize) -> Vec<Citation> {
    let mut by_key: HashMap<String, &Passage> = HashMap::new();

    for passage in passages {
        let key = match &passage.url {
            Some(url) => format!("url:{}", url.trim_end_matches('/').to_lowercase()),
            None => format!("title:{}", normalize(&passage.title)),
        };
        match by_key.get(&key) {
            Some(existing) if existing.rerank_score >= passage.rerank_score => {}
            _ => {
                by_key.insert(key, passage);
            }
        }
    }

    let mut citations: Vec<Citation> = by_key
        .into_values()
        .map(|p| Citation {
            title: p.title.trim().to_string(),
            url: p.url.clone(),
            snippet: snippet(&p.text),
            rerank_score: p.rerank_score.unwrap_or(0.0),
        })
        .collect();

    citations.sort_by(|a, b| {
        b.rerank_score
            .partial_cmp(&a.rerank_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    citations.truncate(max);
    citations
}

fn normalize(title: &str) -> String {
    title
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn snippet(text: &str) -> String {
    const SNIPPET_CHARS: usize = 240;
    if text.chars().count() <= SNIPPET_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(SNIPPET_CHARS).collect();
    format!("{}…", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(id: &str, url: Option<&str>, text: &str, rerank: f32) -> Passage {
        Passage {
            id: id.to_string(),
            title: format!("Title {id}"),
            url: url.map(|u| u.to_string()),
            section_title: None,
            text: text.to_string(),
            dense_score: 0.5,
            rerank_score: Some(rerank),
            conversation_context: false,
        }
    }

    fn generator() -> ResponseGenerator {
        ResponseGenerator::new(GeneratorConfig::default())
    }

    #[test]
    fn test_explicit_markers() {
        let passages = vec![
            passage("a", Some("https://x.org/a"), "urban heat islands", 0.9),
            passage("b", Some("https://x.org/b"), "storm water runoff", 0.8),
            passage("c", Some("https://x.org/c"), "never cited", 0.7),
        ];
        let citations = generator()
            .extract_citations("Cities warm faster [1] and flood more [2].", &passages);
        assert_eq!(citations.len(), 2);
        assert_eq!(citations[0].url.as_deref(), Some("https://x.org/a"));
    }

    #[test]
    fn test_overlap_fallback_when_no_markers() {
        let passages = vec![
            passage(
                "a",
                Some("https://x.org/a"),
                "Extreme heat events strain the electrical grid in summer",
                0.9,
            ),
            passage("b", Some("https://x.org/b"), "Completely unrelated farming text", 0.8),
        ];
        let citations = generator().extract_citations(
            "Extreme heat events strain the electrical grid during summer months.",
            &passages,
        );
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].url.as_deref(), Some("https://x.org/a"));
    }

    #[test]
    fn test_conversation_context_never_cited() {
        let mut context = passage("ctx", None, "previous assistant reply words", 0.95);
        context.conversation_context = true;
        let passages = vec![context, passage("a", Some("https://x.org/a"), "real evidence", 0.9)];
        let citations = generator().extract_citations("Answer citing [1] and [2].", &passages);
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].url.as_deref(), Some("https://x.org/a"));
    }

    #[test]
    fn test_dedupe_by_url_and_order() {
        let passages = vec![
            passage("a", Some("https://x.org/same"), "text one", 0.6),
            passage("b", Some("https://x.org/same/"), "text two", 0.9),
            passage("c", Some("https://x.org/other"), "text three", 0.7),
        ];
        let citations = generator().extract_citations("See [1], [2], [3].", &passages);
        assert_eq!(citations.len(), 2);
        assert!(citations[0].rerank_score >= citations[1].rerank_score);
        assert!((citations[0].rerank_score - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn test_citation_cap() {
        let passages: Vec<Passage> = (0..8)
            .map(|i| {
                passage(
                    &format!("p{i}"),
                    Some(&format!("https://x.org/{i}")),
                    "text",
                    0.9 - i as f32 * 0.05,
                )
            })
            .collect();
        let markers = "[1][2][3][4][5][6][7][8]";
        let citations = generator().extract_citations(markers, &passages);
        assert_eq!(citations.len(), 5);
    }

    #[test]
    fn test_snippet_truncation() {
        let long = "word ".repeat(100);
        let s = snippet(&long);
        assert!(s.chars().count() <= 241);
        assert!(s.ends_with('…'));
    }
}
