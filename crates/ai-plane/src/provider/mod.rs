//! HTTP client for the upstream LLM/embedding provider (OpenRouter-shaped
//! chat + models + key endpoints). One [`ProviderClient`] per process,
//! shared the same way [`ai_plane_core::http_client::HTTP_CLIENT`] is.

mod catalog;
mod chat;
mod embeddings;
mod quota;

pub use catalog::{ModelCatalogEntry, Pricing};
pub use quota::QuotaStatus;

use ai_plane_core::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use ai_plane_core::http_client::HTTP_CLIENT;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

pub struct ProviderClient {
    base_url: String,
    api_key: String,
    request_timeout: Duration,
    circuit: Arc<CircuitBreaker>,
}

impl ProviderClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, request_timeout: Duration) -> Self {
        let circuit = CircuitBreaker::new(CircuitBreakerConfig {
            name: "provider".to_string(),
            failure_threshold: 3,
            success_threshold: 1,
            timeout: Duration::from_secs(30),
            failure_window: Duration::from_secs(60),
        });
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            request_timeout,
            circuit,
        }
    }

    fn client(&self) -> &'static reqwest::Client {
        &HTTP_CLIENT
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    /// Single-shot chat completion. Returns the raw assistant message text;
    /// callers run it through [`crate::response_cleaner`] themselves.
    pub async fn chat(&self, model_id: &str, system: &str, user: &str, max_tokens: Option<usize>) -> Result<String> {
        chat::chat(self, model_id, system, user, max_tokens).await
    }

    /// Batch-embed `texts` with `model_id`, preserving input order.
    pub async fn embed(&self, model_id: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        embeddings::embed(self, model_id, texts).await
    }

    /// Fetch the current model catalog.
    pub async fn list_models(&self) -> Result<Vec<ModelCatalogEntry>> {
        catalog::list_models(self).await
    }

    /// Fetch the current key/quota status.
    pub async fn quota_status(&self) -> Result<QuotaStatus> {
        quota::quota_status(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_base_and_path_without_duplicating_slash() {
        let client = ProviderClient::new("https://openrouter.ai/api/v1/", "key", Duration::from_secs(30));
        assert_eq!(client.endpoint("/models"), "https://openrouter.ai/api/v1/models");
        assert_eq!(client.endpoint("models"), "https://openrouter.ai/api/v1/models");
    }
}
