//! Conversation parser
//!
//! Normalizes whatever history shape the caller supplies into a canonical
//! ordered list of turns, bounded to the configured window, and derives a
//! follow-up hint. Tolerant by design: turns missing fields, mixed key
//! casings, and interleaved non-role entries are dropped, never fatal.

use std::sync::Arc;

use once_cell::sync::Lazy;
use serde_json::Value;

use climate_chat_core::{ConversationTurn, Error, LlmClient, ParsedHistory, Result, TurnRole};
use climate_chat_llm::prompt::PromptBuilder;
use climate_chat_llm::structured::{compile_schema, complete_validated};

static FOLLOW_UP_SCHEMA: Lazy<jsonschema::JSONSchema> = Lazy::new(|| {
    compile_schema(&serde_json::json!({
        "type": "object",
        "required": ["is_follow_up"],
        "properties": {
            "is_follow_up": {"type": "boolean"}
        }
    }))
});

#[derive(Debug, serde::Deserialize)]
struct FollowUpVerdict {
    is_follow_up: bool,
}

/// Normalizes caller-supplied history into an immutable snapshot.
pub struct ConversationParser {
    window: usize,
    llm: Option<Arc<dyn LlmClient>>,
}

impl ConversationParser {
    pub fn new(window: usize) -> Self {
        Self { window, llm: None }
    }

    /// Use an LLM for follow-up detection; without one the heuristic runs.
    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Parse the raw history into canonical turns.
    ///
    /// Fails with `InvalidHistory` only when the structure is
    /// unrecognizable (not a list); individual malformed entries are
    /// silently dropped.
    pub fn parse(&self, history: &Value) -> Result<Vec<ConversationTurn>> {
        let items = match history {
            Value::Null => return Ok(Vec::new()),
            Value::Array(items) => items,
            _ => {
                return Err(Error::InvalidHistory(
                    "conversation history is not a list".to_string(),
                ))
            }
        };

        let mut turns: Vec<ConversationTurn> = items
            .iter()
            .filter_map(|item| {
                let object = item.as_object()?;
                let role = lookup(object, &["role", "speaker", "from"])?;
                let role = match role.to_lowercase().as_str() {
                    "user" | "human" => TurnRole::User,
                    "assistant" | "bot" | "ai" | "model" => TurnRole::Assistant,
                    _ => return None,
                };
                let content = lookup(object, &["content", "text", "message"])?;
                if content.trim().is_empty() {
                    return None;
                }
                Some(ConversationTurn {
                    role,
                    content: content.trim().to_string(),
                })
            })
            .collect();

        if turns.len() > self.window {
            turns = turns.split_off(turns.len() - self.window);
        }
        Ok(turns)
    }

    /// Parse and derive the follow-up hint.
    pub async fn parse_with_follow_up(&self, query: &str, history: &Value) -> Result<ParsedHistory> {
        let turns = self.parse(history)?;
        let snapshot = ParsedHistory {
            is_follow_up: false,
            turns,
        };

        let last_assistant = match snapshot.last_assistant() {
            Some(turn) => turn.content.clone(),
            None => return Ok(snapshot),
        };

        let is_follow_up = self.detect_follow_up(query, &last_assistant).await;
        Ok(ParsedHistory {
            is_follow_up,
            ..snapshot
        })
    }

    /// LLM-backed detection when available, heuristic otherwise. Fails
    /// open: any detection failure means "not a follow-up".
    async fn detect_follow_up(&self, query: &str, last_assistant: &str) -> bool {
        if let Some(ref llm) = self.llm {
            let verdict: Result<FollowUpVerdict> = complete_validated(
                llm.as_ref(),
                PromptBuilder::follow_up(query, last_assistant, false),
                PromptBuilder::follow_up(query, last_assistant, true),
                &FOLLOW_UP_SCHEMA,
                64,
            )
            .await;

            match verdict {
                Ok(v) => return v.is_follow_up,
                Err(err) => {
                    tracing::debug!(error = %err, "follow-up detection failed, using heuristic");
                }
            }
        }
        follow_up_heuristic(query)
    }
}

fn lookup<'a>(object: &'a serde_json::Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    object.iter().find_map(|(k, v)| {
        let lowered = k.to_lowercase();
        if keys.contains(&lowered.as_str()) {
            v.as_str()
        } else {
            None
        }
    })
}

/// Cheap referential-language heuristic for follow-up detection.
fn follow_up_heuristic(query: &str) -> bool {
    let lowered = query.trim().to_lowercase();

    const LEADING: &[&str] = &[
        "and ", "also ", "what about", "how about", "why is that", "y ", "et ", "und ",
    ];
    if LEADING.iter().any(|prefix| lowered.starts_with(prefix)) {
        return true;
    }

    const PRONOUNS: &[&str] = &["it", "that", "this", "they", "those", "these", "them"];
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    if words.iter().any(|w| PRONOUNS.contains(w)) {
        return true;
    }

    // Very short queries after an assistant turn are usually elided
    // continuations ("in winter?", "for Toronto?").
    words.len() <= 3
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_mixed_casings_and_aliases() {
        let parser = ConversationParser::new(8);
        let history = json!([
            {"Role": "user", "Content": "what is a heat dome?"},
            {"role": "assistant", "text": "a trapped high-pressure system"},
            {"speaker": "bot", "message": "anything else?"},
        ]);
        let turns = parser.parse(&history).unwrap();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0].role, TurnRole::User);
        assert_eq!(turns[1].role, TurnRole::Assistant);
    }

    #[test]
    fn test_parse_drops_malformed_entries() {
        let parser = ConversationParser::new(8);
        let history = json!([
            {"role": "user", "content": "hello"},
            {"role": "narrator", "content": "dropped"},
            {"content": "no role, dropped"},
            {"role": "assistant", "content": "   "},
            42,
            {"role": "assistant", "content": "hi there"},
        ]);
        let turns = parser.parse(&history).unwrap();
        assert_eq!(turns.len(), 2);
    }

    #[test]
    fn test_parse_window_keeps_last_turns() {
        let parser = ConversationParser::new(2);
        let history = json!([
            {"role": "user", "content": "one"},
            {"role": "assistant", "content": "two"},
            {"role": "user", "content": "three"},
        ]);
        let turns = parser.parse(&history).unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].content, "two");
    }

    #[test]
    fn test_parse_rejects_non_list() {
        let parser = ConversationParser::new(8);
        let result = parser.parse(&json!({"role": "user"}));
        assert!(matches!(result, Err(Error::InvalidHistory(_))));
    }

    #[test]
    fn test_null_history_is_empty() {
        let parser = ConversationParser::new(8);
        assert!(parser.parse(&Value::Null).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_history_is_not_follow_up() {
        let parser = ConversationParser::new(8);
        let parsed = parser
            .parse_with_follow_up("and also the arctic?", &json!([]))
            .await
            .unwrap();
        assert!(!parsed.is_follow_up);
    }

    #[tokio::test]
    async fn test_heuristic_follow_up_after_assistant_turn() {
        let parser = ConversationParser::new(8);
        let history = json!([
            {"role": "user", "content": "impacts of warming in toronto"},
            {"role": "assistant", "content": "heat waves, flooding, and storms"},
        ]);
        let parsed = parser
            .parse_with_follow_up("and what about winters?", &history)
            .await
            .unwrap();
        assert!(parsed.is_follow_up);

        let standalone = parser
            .parse_with_follow_up(
                "how does carbon pricing work across canadian provinces today?",
                &history,
            )
            .await
            .unwrap();
        assert!(!standalone.is_follow_up);
    }

    #[test]
    fn test_heuristic_pronoun_reference() {
        assert!(follow_up_heuristic("why does it happen more often?"));
        assert!(follow_up_heuristic("in winter?"));
        assert!(!follow_up_heuristic(
            "how do rising seas affect coastal infrastructure planning?"
        ));
    }
}
