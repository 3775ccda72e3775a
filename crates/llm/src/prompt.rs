//! Prompt assembly
//!
//! Every LLM call site in the pipeline builds its messages here, so prompt
//! wording lives in one place and call sites stay small.

use climate_chat_core::{ChatMessage, ParsedHistory, Passage, TurnRole};

/// Builds the message lists for each pipeline call.
pub struct PromptBuilder;

impl PromptBuilder {
    /// Grounded answer prompt: climate focus, cite-only-from-passages,
    /// refuse when unsupported, answer in the target language.
    pub fn grounded_answer(
        query: &str,
        answer_language: &str,
        passages: &[Passage],
        history: &ParsedHistory,
    ) -> Vec<ChatMessage> {
        let system = format!(
            "You are a climate change assistant grounded in a curated corpus.\n\
             Rules:\n\
             1. Answer only questions about climate change, its impacts, and adaptation.\n\
             2. Use ONLY the numbered passages below as evidence. Cite each claim with \
             its passage number in square brackets, e.g. [2].\n\
             3. If the passages do not support an answer, say you don't have enough \
             information rather than guessing.\n\
             4. Answer in the language with ISO code \"{answer_language}\".\n\
             Keep answers concise and practical."
        );

        let mut user = String::new();
        if !history.is_empty() {
            user.push_str("Conversation so far:\n");
            for turn in &history.turns {
                let who = match turn.role {
                    TurnRole::User => "User",
                    TurnRole::Assistant => "Assistant",
                };
                user.push_str(&format!("{}: {}\n", who, turn.content));
            }
            user.push('\n');
        }
        user.push_str("Passages:\n");
        for (i, passage) in passages.iter().enumerate() {
            user.push_str(&format!("[{}] {}: {}\n", i + 1, passage.title, passage.text));
        }
        user.push_str(&format!("\nQuestion: {query}\n"));

        vec![ChatMessage::system(system), ChatMessage::user(user)]
    }

    /// Classifier prompt. The `strict` variant is used for the single retry
    /// after a schema failure.
    pub fn classifier(
        query: &str,
        history: &ParsedHistory,
        declared_language: Option<&str>,
        strict: bool,
    ) -> Vec<ChatMessage> {
        let mut system = String::from(
            "You classify user messages sent to a climate change assistant and rewrite \
             them as standalone English search queries.\n\
             Return a JSON object with fields:\n\
             - \"classification\": one of \"greeting\", \"goodbye\", \"thanks\", \
             \"emergency\", \"instruction\", \"on_topic\", \"off_topic\", \"harmful\"\n\
             - \"rewrite_en\": a standalone English paraphrase of the message, \
             understandable without the conversation\n\
             - \"ask_how_to_use\": true if the user asks how to use this assistant\n\
             - \"how_it_works\": true if the user asks how this assistant works\n\
             - \"confidence\": number in [0,1]\n\
             Guidance:\n\
             - Climate-framed emergencies (flooding, heat wave, wildfire) are \
             \"emergency\".\n\
             - Medical or personal distress, self-harm, or abuse is \"harmful\".\n\
             - Questions about how the assistant works are \"instruction\".",
        );
        if strict {
            system.push_str(
                "\nReturn ONLY the JSON object. No prose, no markdown fences, no comments.",
            );
        }

        let mut user = String::new();
        if let Some(language) = declared_language {
            user.push_str(&format!("Declared language: {language}\n"));
        }
        if let Some(last) = history.last_assistant() {
            user.push_str(&format!("Previous assistant reply: {}\n", last.content));
        }
        user.push_str(&format!("Message: {query}"));

        vec![ChatMessage::system(system), ChatMessage::user(user)]
    }

    /// Faithfulness evaluation prompt.
    pub fn faithfulness(answer: &str, passages: &[Passage], strict: bool) -> Vec<ChatMessage> {
        let mut system = String::from(
            "You evaluate whether an answer is supported by a set of evidence passages.\n\
             Return a JSON object with fields:\n\
             - \"score\": number in [0,1], the fraction of the answer's claims supported \
             by the passages\n\
             - \"supported_claims\": array of strings\n\
             - \"unsupported_claims\": array of strings\n\
             - \"assessment\": short label",
        );
        if strict {
            system.push_str(
                "\nReturn ONLY the JSON object. No prose, no markdown fences, no comments.",
            );
        }

        let mut user = String::from("Passages:\n");
        for (i, passage) in passages.iter().enumerate() {
            user.push_str(&format!("[{}] {}\n", i + 1, passage.text));
        }
        user.push_str(&format!("\nAnswer to evaluate:\n{answer}"));

        vec![ChatMessage::system(system), ChatMessage::user(user)]
    }

    /// Language detection prompt.
    pub fn language_detection(query: &str, strict: bool) -> Vec<ChatMessage> {
        let mut system = String::from(
            "Identify the language of the user message.\n\
             Return a JSON object with fields:\n\
             - \"language_code\": ISO 639-1 code (e.g. \"en\", \"es\", \"zh\")\n\
             - \"confidence\": number in [0,1]",
        );
        if strict {
            system.push_str(
                "\nReturn ONLY the JSON object. No prose, no markdown fences, no comments.",
            );
        }
        vec![
            ChatMessage::system(system),
            ChatMessage::user(format!("Message: {query}")),
        ]
    }

    /// Follow-up detection prompt.
    pub fn follow_up(query: &str, last_assistant: &str, strict: bool) -> Vec<ChatMessage> {
        let mut system = String::from(
            "Decide whether the new user message refers back to the previous assistant \
             reply (pronouns, elided subjects, continuations like \"and also...\", in \
             any language).\n\
             Return a JSON object with one field:\n\
             - \"is_follow_up\": boolean",
        );
        if strict {
            system.push_str(
                "\nReturn ONLY the JSON object. No prose, no markdown fences, no comments.",
            );
        }
        vec![
            ChatMessage::system(system),
            ChatMessage::user(format!(
                "Previous assistant reply: {last_assistant}\nNew message: {query}"
            )),
        ]
    }

    /// Translation prompt.
    pub fn translation(text: &str, target_code: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(format!(
                "Translate the user's text into the language with ISO 639-1 code \
                 \"{target_code}\". Preserve citation markers like [1] exactly. \
                 Return only the translation."
            )),
            ChatMessage::user(text.to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use climate_chat_core::ChatRole;

    fn passage(title: &str, text: &str) -> Passage {
        Passage {
            id: title.to_string(),
            title: title.to_string(),
            url: Some(format!("https://example.org/{title}")),
            section_title: None,
            text: text.to_string(),
            dense_score: 0.8,
            rerank_score: Some(0.9),
            conversation_context: false,
        }
    }

    #[test]
    fn test_grounded_answer_numbers_passages() {
        let passages = vec![
            passage("urban-heat", "Cities trap heat in concrete."),
            passage("flooding", "Impervious surfaces worsen runoff."),
        ];
        let messages = PromptBuilder::grounded_answer(
            "why are cities hotter?",
            "en",
            &passages,
            &ParsedHistory::default(),
        );
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ChatRole::System);
        assert!(messages[1].content.contains("[1] urban-heat"));
        assert!(messages[1].content.contains("[2] flooding"));
    }

    #[test]
    fn test_strict_classifier_demands_bare_json() {
        let messages =
            PromptBuilder::classifier("hola", &ParsedHistory::default(), Some("Spanish"), true);
        assert!(messages[0].content.contains("ONLY the JSON object"));
        assert!(messages[1].content.contains("Declared language: Spanish"));
    }

    #[test]
    fn test_translation_preserves_markers() {
        let messages = PromptBuilder::translation("See [1] and [2].", "fr");
        assert!(messages[0].content.contains("\"fr\""));
        assert!(messages[0].content.contains("[1]"));
    }
}
