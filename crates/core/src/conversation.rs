//! Conversation turn types

use serde::{Deserialize, Serialize};

/// Role of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// A single turn in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
        }
    }
}

/// Immutable snapshot of the normalized conversation history.
///
/// Produced once per request by the conversation parser and consumed by all
/// downstream stages, so no stage can mutate what another stage sees.
#[derive(Debug, Clone, Default)]
pub struct ParsedHistory {
    /// Canonical ordered turns, bounded to the configured window.
    pub turns: Vec<ConversationTurn>,
    /// Whether the current query appears to reference the previous
    /// assistant turn.
    pub is_follow_up: bool,
}

impl ParsedHistory {
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Most recent assistant turn, if any.
    pub fn last_assistant(&self) -> Option<&ConversationTurn> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == TurnRole::Assistant)
    }
}
