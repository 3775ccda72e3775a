//! Canned responses
//!
//! Pre-authored replies returned without model generation. Authored in
//! English; the orchestrator translates them to the user's language on the
//! way out. Canned responses never carry citations.

use climate_chat_core::{Classification, QueryIntent};

/// Every pre-authored reply the pipeline can return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CannedKind {
    Greeting,
    Goodbye,
    Thanks,
    OffTopic,
    Harmful,
    HowItWorks,
    HowToUse,
    LanguageUndetected,
    EmptyQuery,
    NoEvidence,
    GenerationFailed,
    RequestFailed,
}

impl CannedKind {
    /// The canned kind for a classification, if it short-circuits the
    /// pipeline. On-topic and emergency queries return `None` and run
    /// retrieval.
    pub fn for_classification(classification: &Classification) -> Option<Self> {
        if classification.ask_how_to_use {
            return Some(CannedKind::HowToUse);
        }
        if classification.how_it_works {
            return Some(CannedKind::HowItWorks);
        }
        match classification.intent {
            QueryIntent::Greeting => Some(CannedKind::Greeting),
            QueryIntent::Goodbye => Some(CannedKind::Goodbye),
            QueryIntent::Thanks => Some(CannedKind::Thanks),
            QueryIntent::Instruction => Some(CannedKind::HowItWorks),
            QueryIntent::OffTopic => Some(CannedKind::OffTopic),
            QueryIntent::Harmful => Some(CannedKind::Harmful),
            QueryIntent::OnTopic | QueryIntent::Emergency => None,
        }
    }

    /// English template text.
    pub fn text(&self) -> &'static str {
        match self {
            CannedKind::Greeting => {
                "Hello! I answer questions about climate change: its causes, local \
                 impacts, and what you can do about them. What would you like to know?"
            }
            CannedKind::Goodbye => {
                "Goodbye! Come back any time you have questions about climate change."
            }
            CannedKind::Thanks => {
                "You're welcome! Feel free to ask me anything else about climate change."
            }
            CannedKind::OffTopic => {
                "I can only help with questions about climate change, its impacts, and \
                 adaptation. Could you ask me something on that topic?"
            }
            CannedKind::Harmful => {
                "I'm not able to help with that. If you are in immediate danger or \
                 distress, please contact your local emergency services right away. For \
                 climate-related questions, I'm happy to help."
            }
            CannedKind::HowItWorks => {
                "I look up your question in a curated library of climate documents, pick \
                 the most relevant passages, and write an answer grounded in them, with \
                 citations so you can check the sources yourself."
            }
            CannedKind::HowToUse => {
                "Ask me any question about climate change in your own language, for \
                 example \"How will flooding affect my city?\" or \"¿Cómo puedo reducir \
                 mi huella de carbono?\". I'll answer with cited sources."
            }
            CannedKind::LanguageUndetected => {
                "I couldn't tell which language you're writing in. Please select your \
                 language, or rephrase your question with a few more words."
            }
            CannedKind::EmptyQuery => {
                "Please ask a question about climate change, for example \"How will \
                 warming affect my city?\""
            }
            CannedKind::NoEvidence => {
                "I couldn't find reliable sources to answer that question, so I'd rather \
                 not guess. Try rephrasing it, or ask about a related climate topic."
            }
            CannedKind::GenerationFailed => {
                "I couldn't produce an answer to that question right now. Please try \
                 again in a moment."
            }
            CannedKind::RequestFailed => {
                "Something went wrong while processing your question. Please try again \
                 in a moment."
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classification(intent: QueryIntent) -> Classification {
        Classification {
            intent,
            rewrite_en: "q".to_string(),
            ask_how_to_use: false,
            how_it_works: false,
            confidence: 1.0,
        }
    }

    #[test]
    fn test_canned_intents_short_circuit() {
        assert_eq!(
            CannedKind::for_classification(&classification(QueryIntent::OffTopic)),
            Some(CannedKind::OffTopic)
        );
        assert_eq!(
            CannedKind::for_classification(&classification(QueryIntent::Harmful)),
            Some(CannedKind::Harmful)
        );
    }

    #[test]
    fn test_emergency_is_not_canned() {
        assert_eq!(
            CannedKind::for_classification(&classification(QueryIntent::Emergency)),
            None
        );
        assert_eq!(
            CannedKind::for_classification(&classification(QueryIntent::OnTopic)),
            None
        );
    }

    #[test]
    fn test_flags_override_intent() {
        let mut c = classification(QueryIntent::OnTopic);
        c.ask_how_to_use = true;
        assert_eq!(
            CannedKind::for_classification(&c),
            Some(CannedKind::HowToUse)
        );
    }
}
