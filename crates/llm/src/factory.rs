//! Provider construction and pooling
//!
//! Builds one client per model family from settings and wraps each in a
//! semaphore-bounded pool. A saturated pool is retried once after a
//! jittered backoff, then surfaces `ProviderSaturated`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::sync::Semaphore;

use climate_chat_config::ProviderSettings;
use climate_chat_core::{
    CompletionRequest, Error, LlmClient, ModelFamily, Result,
};

use crate::claude::{ClaudeClient, ClaudeConfig};
use crate::openai::{OpenAiClient, OpenAiConfig};
use crate::LlmError;

/// Semaphore-bounded wrapper around an LLM client.
pub struct PooledClient {
    inner: Arc<dyn LlmClient>,
    permits: Arc<Semaphore>,
}

impl PooledClient {
    pub fn new(inner: Arc<dyn LlmClient>, pool_size: usize) -> Self {
        Self {
            inner,
            permits: Arc::new(Semaphore::new(pool_size.max(1))),
        }
    }

    /// Acquire a permit, retrying once with jitter when the pool is full.
    async fn acquire(&self) -> std::result::Result<tokio::sync::SemaphorePermit<'_>, LlmError> {
        if let Ok(permit) = self.permits.try_acquire() {
            return Ok(permit);
        }

        let jitter_ms = rand::thread_rng().gen_range(50..200);
        tracing::warn!(
            model = self.inner.model_name(),
            backoff_ms = jitter_ms,
            "provider pool saturated, retrying once"
        );
        tokio::time::sleep(Duration::from_millis(jitter_ms)).await;

        self.permits.try_acquire().map_err(|_| LlmError::Saturated)
    }
}

#[async_trait]
impl LlmClient for PooledClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let _permit = self.acquire().await.map_err(Error::from)?;
        self.inner.complete(request).await
    }

    async fn translate(&self, text: &str, target_code: &str) -> Result<String> {
        let _permit = self.acquire().await.map_err(Error::from)?;
        self.inner.translate(text, target_code).await
    }

    fn family(&self) -> ModelFamily {
        self.inner.family()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

/// One pooled client per model family.
#[derive(Clone)]
pub struct FamilyClients {
    pub high_quality: Arc<dyn LlmClient>,
    pub high_coverage: Arc<dyn LlmClient>,
}

impl FamilyClients {
    pub fn new(high_quality: Arc<dyn LlmClient>, high_coverage: Arc<dyn LlmClient>) -> Self {
        Self {
            high_quality,
            high_coverage,
        }
    }

    pub fn for_family(&self, family: ModelFamily) -> Arc<dyn LlmClient> {
        match family {
            ModelFamily::HighQuality => Arc::clone(&self.high_quality),
            ModelFamily::HighCoverage => Arc::clone(&self.high_coverage),
        }
    }
}

/// Factory for family clients
pub struct LlmFactory;

impl LlmFactory {
    /// Build both family clients from provider settings.
    pub fn from_settings(
        providers: &ProviderSettings,
    ) -> std::result::Result<FamilyClients, LlmError> {
        let anthropic_key = providers.anthropic_api_key.clone().ok_or_else(|| {
            LlmError::Configuration("high-quality family requires ANTHROPIC_API_KEY".to_string())
        })?;
        let openai_key = providers.openai_api_key.clone().ok_or_else(|| {
            LlmError::Configuration("high-coverage family requires OPENAI_API_KEY".to_string())
        })?;

        let high_quality = ClaudeClient::new(
            ClaudeConfig::new(anthropic_key).with_model(providers.anthropic_model.clone()),
        )?;
        let high_coverage = OpenAiClient::new(
            OpenAiConfig::new(openai_key).with_model(providers.openai_model.clone()),
        )?;

        Ok(FamilyClients::new(
            Arc::new(PooledClient::new(
                Arc::new(high_quality),
                providers.pool_size,
            )),
            Arc::new(PooledClient::new(
                Arc::new(high_coverage),
                providers.pool_size,
            )),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoClient(ModelFamily);

    #[async_trait]
    impl LlmClient for EchoClient {
        async fn complete(&self, request: CompletionRequest) -> Result<String> {
            Ok(request.messages.last().map(|m| m.content.clone()).unwrap_or_default())
        }

        async fn translate(&self, text: &str, _target_code: &str) -> Result<String> {
            Ok(text.to_string())
        }

        fn family(&self) -> ModelFamily {
            self.0
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    #[test]
    fn test_family_selection() {
        let clients = FamilyClients::new(
            Arc::new(EchoClient(ModelFamily::HighQuality)),
            Arc::new(EchoClient(ModelFamily::HighCoverage)),
        );
        assert_eq!(
            clients.for_family(ModelFamily::HighCoverage).family(),
            ModelFamily::HighCoverage
        );
    }

    #[tokio::test]
    async fn test_pooled_client_passes_through() {
        use climate_chat_core::ChatMessage;

        let pooled = PooledClient::new(Arc::new(EchoClient(ModelFamily::HighQuality)), 2);
        let reply = pooled
            .complete(CompletionRequest::new(vec![ChatMessage::user("hello")]))
            .await
            .unwrap();
        assert_eq!(reply, "hello");
    }

    #[tokio::test]
    async fn test_saturated_pool_errors_after_retry() {
        let pooled = PooledClient::new(Arc::new(EchoClient(ModelFamily::HighQuality)), 1);
        // Hold the only permit so both acquire attempts fail.
        let _held = pooled.permits.clone().acquire_owned().await.unwrap();
        let result = pooled.translate("hola", "en").await;
        assert!(matches!(result, Err(Error::ProviderSaturated(_))));
    }
}
