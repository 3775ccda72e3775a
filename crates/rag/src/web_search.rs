//! Web search fallback
//!
//! Queries a hosted search API (Tavily-style) for short live-web passages.
//! Used when the vector index yields no evidence or the generated answer
//! fails the faithfulness check.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use climate_chat_config::constants::{endpoints, timeouts};
use climate_chat_core::{Result, WebHit, WebSearch};

use crate::RagError;

/// Web search configuration
#[derive(Debug, Clone)]
pub struct WebSearchConfig {
    pub endpoint: String,
    pub api_key: String,
    pub max_results: usize,
    pub timeout: Duration,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            endpoint: endpoints::WEB_SEARCH_DEFAULT.clone(),
            api_key: std::env::var("TAVILY_API_KEY").unwrap_or_default(),
            max_results: 5,
            timeout: Duration::from_millis(timeouts::WEB_SEARCH_MS),
        }
    }
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResultItem>,
}

#[derive(Debug, Deserialize)]
struct SearchResultItem {
    title: String,
    url: String,
    #[serde(default)]
    content: String,
}

/// Tavily-style search client
pub struct TavilySearch {
    client: Client,
    config: WebSearchConfig,
}

impl TavilySearch {
    pub fn new(config: WebSearchConfig) -> std::result::Result<Self, RagError> {
        if config.api_key.is_empty() {
            return Err(RagError::Search("web search API key not set".to_string()));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RagError::Connection(e.to_string()))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl WebSearch for TavilySearch {
    async fn search(&self, query: &str) -> Result<Vec<WebHit>> {
        let request = SearchRequest {
            api_key: &self.config.api_key,
            query,
            max_results: self.config.max_results,
        };

        let response = self
            .client
            .post(format!("{}/search", self.config.endpoint))
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::Search(format!("web search request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(RagError::Search(format!("web search returned {status}")).into());
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| RagError::Search(format!("bad web search response: {e}")))?;

        Ok(parsed
            .results
            .into_iter()
            .filter(|r| !r.content.trim().is_empty())
            .map(|r| WebHit {
                title: r.title,
                url: r.url,
                snippet: r.content,
            })
            .collect())
    }
}
