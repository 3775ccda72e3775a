//! Anthropic Messages API backend
//!
//! Serves the high-quality family: a curated language set with strong
//! translation quality.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use climate_chat_config::constants::{endpoints, timeouts};
use climate_chat_core::{
    ChatRole, CompletionRequest, Error, LlmClient, ModelFamily, Result,
};

use crate::prompt::PromptBuilder;
use crate::LlmError;

/// Configuration for the Anthropic backend
#[derive(Debug, Clone)]
pub struct ClaudeConfig {
    /// API key (from ANTHROPIC_API_KEY or direct)
    pub api_key: String,
    /// Model id
    pub model: String,
    /// Request timeout
    pub timeout: Duration,
    /// API endpoint (for testing or proxy)
    pub endpoint: String,
}

impl Default for ClaudeConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
            model: "claude-sonnet-4-20250514".to_string(),
            timeout: Duration::from_millis(timeouts::LLM_REQUEST_MS),
            endpoint: endpoints::ANTHROPIC_DEFAULT.clone(),
        }
    }
}

impl ClaudeConfig {
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
struct MessagesRequest {
    model: String,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

/// Anthropic Messages API client
pub struct ClaudeClient {
    config: ClaudeConfig,
    client: Client,
}

impl ClaudeClient {
    pub fn new(config: ClaudeConfig) -> std::result::Result<Self, LlmError> {
        if config.api_key.is_empty() {
            return Err(LlmError::Configuration(
                "ANTHROPIC_API_KEY not set. Set it via environment or config.".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Network(e.to_string()))?;

        Ok(Self { config, client })
    }

    async fn messages(&self, request: &CompletionRequest) -> std::result::Result<String, LlmError> {
        let mut system = request
            .messages
            .iter()
            .find(|m| m.role == ChatRole::System)
            .map(|m| m.content.clone());

        if request.json_mode {
            let hint = "Respond with a single JSON object and nothing else.";
            system = Some(match system {
                Some(s) => format!("{s}\n{hint}"),
                None => hint.to_string(),
            });
        }

        let messages: Vec<ApiMessage> = request
            .messages
            .iter()
            .filter(|m| m.role != ChatRole::System)
            .map(|m| ApiMessage {
                role: match m.role {
                    ChatRole::Assistant => "assistant",
                    _ => "user",
                },
                content: m.content.clone(),
            })
            .collect();

        let body = MessagesRequest {
            model: self.config.model.clone(),
            max_tokens: request.max_tokens,
            system,
            messages,
            temperature: Some(request.temperature),
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.config.endpoint))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("HTTP {status}: {error_text}")));
        }

        let response: MessagesResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let text: String = response
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text.as_str())
            .collect();

        if text.is_empty() {
            return Err(LlmError::InvalidResponse("empty completion".to_string()));
        }
        Ok(text)
    }
}

#[async_trait]
impl LlmClient for ClaudeClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        self.messages(&request).await.map_err(Error::from)
    }

    async fn translate(&self, text: &str, target_code: &str) -> Result<String> {
        let request = CompletionRequest::new(PromptBuilder::translation(text, target_code))
            .with_temperature(0.0)
            .with_max_tokens(2048);
        self.messages(&request)
            .await
            .map_err(|e| Error::TranslationError(e.to_string()))
    }

    fn family(&self) -> ModelFamily {
        ModelFamily::HighQuality
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
        let result = ClaudeClient::new(ClaudeConfig {
            api_key: String::new(),
            ..Default::default()
        });
        assert!(matches!(result, Err(LlmError::Configuration(_))));
    }

    #[test]
    fn test_config_builder() {
        let config = ClaudeConfig::new("sk-test")
            .with_model("claude-3-5-haiku-20241022")
            .with_endpoint("http://localhost:9999");
        assert_eq!(config.model, "claude-3-5-haiku-20241022");
        assert_eq!(config.endpoint, "http://localhost:9999");
    }
}
