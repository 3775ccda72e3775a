//! LLM provider backends
//!
//! Features:
//! - Anthropic Messages API backend (high-quality family)
//! - OpenAI-compatible chat backend (high-coverage family)
//! - Schema-validated JSON-mode completions with one stricter retry
//! - Prompt assembly for every pipeline call site
//! - Semaphore-bounded provider pools with jittered saturation retry

pub mod claude;
pub mod factory;
pub mod openai;
pub mod prompt;
pub mod structured;

pub use claude::{ClaudeClient, ClaudeConfig};
pub use factory::{FamilyClients, LlmFactory, PooledClient};
pub use openai::{OpenAiClient, OpenAiConfig};
pub use prompt::PromptBuilder;
pub use structured::{complete_validated, compile_schema};

use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Generation error: {0}")]
    Generation(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout")]
    Timeout,

    #[error("Provider pool saturated")]
    Saturated,

    #[error("Schema validation failed: {0}")]
    Schema(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<LlmError> for climate_chat_core::Error {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Saturated => {
                climate_chat_core::Error::ProviderSaturated("llm pool".to_string())
            }
            LlmError::Timeout => climate_chat_core::Error::Timeout,
            other => climate_chat_core::Error::GenerationError(other.to_string()),
        }
    }
}
