//! OpenAI-compatible chat backend
//!
//! Serves the high-coverage family: hosted models with a broad language
//! list, used when the detected language falls outside the curated
//! high-quality set.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use climate_chat_config::constants::{endpoints, timeouts};
use climate_chat_core::{
    ChatRole, CompletionRequest, Error, LlmClient, ModelFamily, Result,
};

use crate::prompt::PromptBuilder;
use crate::LlmError;

/// Configuration for the OpenAI-compatible backend
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
    /// Base URL ending in `/v1`
    pub endpoint: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
            model: "gpt-4o-mini".to_string(),
            timeout: Duration::from_millis(timeouts::LLM_REQUEST_MS),
            endpoint: endpoints::OPENAI_DEFAULT.clone(),
        }
    }
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ApiMessage>,
    max_tokens: usize,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

/// OpenAI-compatible chat completions client
pub struct OpenAiClient {
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> std::result::Result<Self, LlmError> {
        if config.api_key.is_empty() {
            return Err(LlmError::Configuration(
                "OPENAI_API_KEY not set. Set it via environment or config.".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Network(e.to_string()))?;

        Ok(Self { config, client })
    }

    async fn chat(&self, request: &CompletionRequest) -> std::result::Result<String, LlmError> {
        let messages: Vec<ApiMessage> = request
            .messages
            .iter()
            .map(|m| ApiMessage {
                role: match m.role {
                    ChatRole::System => "system",
                    ChatRole::User => "user",
                    ChatRole::Assistant => "assistant",
                },
                content: m.content.clone(),
            })
            .collect();

        let body = ChatRequest {
            model: self.config.model.clone(),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            response_format: request.json_mode.then(|| json!({"type": "json_object"})),
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.endpoint))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("HTTP {status}: {error_text}")));
        }

        let response: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let text = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        if text.is_empty() {
            return Err(LlmError::InvalidResponse("empty completion".to_string()));
        }
        Ok(text)
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        self.chat(&request).await.map_err(Error::from)
    }

    async fn translate(&self, text: &str, target_code: &str) -> Result<String> {
        let request = CompletionRequest::new(PromptBuilder::translation(text, target_code))
            .with_temperature(0.0)
            .with_max_tokens(2048);
        self.chat(&request)
            .await
            .map_err(|e| Error::TranslationError(e.to_string()))
    }

    fn family(&self) -> ModelFamily {
        ModelFamily::HighCoverage
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_api_key() {
        let result = OpenAiClient::new(OpenAiConfig {
            api_key: String::new(),
            ..Default::default()
        });
        assert!(matches!(result, Err(LlmError::Configuration(_))));
    }

    #[test]
    fn test_json_mode_sets_response_format() {
        let request = ChatRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![],
            max_tokens: 16,
            temperature: 0.0,
            response_format: Some(json!({"type": "json_object"})),
        };
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["response_format"]["type"], "json_object");
    }
}
