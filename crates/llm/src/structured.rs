//! Schema-validated JSON completions
//!
//! Providers are asked for JSON-mode output, the reply is parsed (markdown
//! fences tolerated), validated against a schema, and deserialized. A
//! schema or parse failure gets exactly one retry with a stricter prompt;
//! callers supply their own safe fallback after that.

use jsonschema::JSONSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

use climate_chat_core::{ChatMessage, CompletionRequest, Error, LlmClient, Result};

/// Compile an embedded schema. Panics only on a malformed embedded schema,
/// which is a programming error caught by the unit tests.
pub fn compile_schema(schema: &Value) -> JSONSchema {
    JSONSchema::compile(schema).expect("embedded schema must compile")
}

/// Run a JSON-mode completion validated against `schema`, retrying once
/// with `strict_messages` before giving up.
pub async fn complete_validated<T: DeserializeOwned>(
    client: &dyn LlmClient,
    messages: Vec<ChatMessage>,
    strict_messages: Vec<ChatMessage>,
    schema: &JSONSchema,
    max_tokens: usize,
) -> Result<T> {
    match attempt(client, messages, schema, max_tokens).await {
        Ok(value) => Ok(value),
        Err(first_err) => {
            tracing::debug!(error = %first_err, "structured completion failed, retrying strict");
            attempt(client, strict_messages, schema, max_tokens).await
        }
    }
}

async fn attempt<T: DeserializeOwned>(
    client: &dyn LlmClient,
    messages: Vec<ChatMessage>,
    schema: &JSONSchema,
    max_tokens: usize,
) -> Result<T> {
    let text = client
        .complete(
            CompletionRequest::new(messages)
                .with_temperature(0.0)
                .with_max_tokens(max_tokens)
                .json(),
        )
        .await?;

    let value = parse_json_block(&text)
        .ok_or_else(|| Error::GenerationError("completion is not JSON".to_string()))?;

    if !schema.is_valid(&value) {
        return Err(Error::GenerationError(
            "completion does not match schema".to_string(),
        ));
    }

    serde_json::from_value(value)
        .map_err(|e| Error::GenerationError(format!("schema-valid JSON failed to deserialize: {e}")))
}

/// Extract the first JSON object from a completion, tolerating markdown
/// fences and surrounding prose.
pub fn parse_json_block(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&trimmed[start..=end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_plain_json() {
        let value = parse_json_block("{\"score\": 0.8}").unwrap();
        assert_eq!(value["score"], 0.8);
    }

    #[test]
    fn test_parse_fenced_json() {
        let text = "Here you go:\n```json\n{\"score\": 0.5, \"assessment\": \"faithful\"}\n```";
        let value = parse_json_block(text).unwrap();
        assert_eq!(value["assessment"], "faithful");
    }

    #[test]
    fn test_parse_rejects_prose() {
        assert!(parse_json_block("I cannot answer that.").is_none());
    }

    #[test]
    fn test_schema_validation() {
        let schema = compile_schema(&json!({
            "type": "object",
            "required": ["score"],
            "properties": {
                "score": {"type": "number", "minimum": 0.0, "maximum": 1.0}
            }
        }));
        assert!(schema.is_valid(&json!({"score": 0.4})));
        assert!(!schema.is_valid(&json!({"score": 7})));
        assert!(!schema.is_valid(&json!({"verdict": "fine"})));
    }
}
