//! C8 — free-model wrapper: routes every call through a currently
//! eligible free model drawn from a lazily refreshed catalog, retrying
//! against other eligible models on failure and recording outcomes into
//! C3 (rate limits) and C4 (circuit breakers).

use crate::circuit_breakers::CircuitBreakerSet;
use crate::provider::{ModelCatalogEntry, ProviderClient};
use crate::rate_limit::RateLimitRegistry;
use ai_plane_core::AiPlaneError;
use ai_plane_core::config::FreeModelConfig;
use ai_plane_core::observability::metrics;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;

/// Returned when no model in the catalog is currently eligible, naming
/// how many candidates were filtered out for each reason so a caller can
/// tell "everything is free but rate-limited" from "nothing is free".
#[derive(Debug, Error)]
#[error(
    "no free models available: {total} in catalog, {not_free} not free, \
     {rate_limited} rate-limited, {circuit_open} circuit-open, {failure_capped} over the local failure cap"
)]
pub struct NoEligibleModelError {
    pub total: usize,
    pub not_free: usize,
    pub rate_limited: usize,
    pub circuit_open: usize,
    pub failure_capped: usize,
}

struct CatalogCache {
    fetched_at: Option<Instant>,
    entries: Vec<ModelCatalogEntry>,
}

pub struct FreeModelWrapper {
    provider: Arc<ProviderClient>,
    rate_limits: Arc<RateLimitRegistry>,
    circuit_breakers: Arc<CircuitBreakerSet>,
    config: FreeModelConfig,
    catalog: Mutex<CatalogCache>,
    local_failures: StdMutex<HashMap<String, u32>>,
}

impl FreeModelWrapper {
    pub fn new(
        provider: Arc<ProviderClient>,
        rate_limits: Arc<RateLimitRegistry>,
        circuit_breakers: Arc<CircuitBreakerSet>,
        config: FreeModelConfig,
    ) -> Self {
        Self {
            provider,
            rate_limits,
            circuit_breakers,
            config,
            catalog: Mutex::new(CatalogCache { fetched_at: None, entries: Vec::new() }),
            local_failures: StdMutex::new(HashMap::new()),
        }
    }

    async fn refreshed_catalog(&self) -> anyhow::Result<Vec<ModelCatalogEntry>> {
        let mut cache = self.catalog.lock().await;
        let stale = match cache.fetched_at {
            Some(fetched_at) => fetched_at.elapsed() >= self.config.catalog_refresh_period,
            None => true,
        };
        if stale {
            let fresh = self.provider.list_models().await?;
            cache.entries = fresh;
            cache.fetched_at = Some(Instant::now());
        }
        Ok(cache.entries.clone())
    }

    fn local_failure_count(&self, model_id: &str) -> u32 {
        *self
            .local_failures
            .lock()
            .expect("free model local failure mutex poisoned")
            .get(model_id)
            .unwrap_or(&0)
    }

    fn bump_local_failure(&self, model_id: &str) {
        let mut failures = self.local_failures.lock().expect("free model local failure mutex poisoned");
        *failures.entry(model_id.to_string()).or_insert(0) += 1;
    }

    fn clear_local_failure(&self, model_id: &str) {
        self.local_failures
            .lock()
            .expect("free model local failure mutex poisoned")
            .remove(model_id);
    }

    /// Select the lowest-id eligible free model, or a structured error
    /// naming how many candidates were filtered out for each reason.
    async fn select_model(&self) -> Result<String, NoEligibleModelError> {
        let catalog = self.refreshed_catalog().await.unwrap_or_default();
        let total = catalog.len();

        let free: Vec<&ModelCatalogEntry> = catalog.iter().filter(|m| m.is_free()).collect();
        let not_free = total - free.len();

        let not_rate_limited: Vec<&&ModelCatalogEntry> =
            free.iter().filter(|m| !self.rate_limits.is_blocked(&m.id)) .collect();
        let rate_limited = free.len() - not_rate_limited.len();

        let mut not_circuit_open = Vec::with_capacity(not_rate_limited.len());
        for m in &not_rate_limited {
            if self.circuit_breakers.should_attempt(&m.id).await {
                not_circuit_open.push(*m);
            }
        }
        let circuit_open = not_rate_limited.len() - not_circuit_open.len();

        let under_cap: Vec<&ModelCatalogEntry> = not_circuit_open
            .into_iter()
            .filter(|m| self.local_failure_count(&m.id) < self.config.per_model_failure_cap)
            .collect();
        let failure_capped = (free.len() - rate_limited - circuit_open) - under_cap.len();

        match under_cap.iter().min_by(|a, b| a.id.cmp(&b.id)) {
            Some(chosen) => Ok(chosen.id.clone()),
            None => Err(NoEligibleModelError {
                total,
                not_free,
                rate_limited,
                circuit_open,
                failure_capped,
            }),
        }
    }

    /// Route a chat call to an eligible free model, retrying against
    /// other eligible models on failure up to the configured bound.
    /// Returns the response body and the id of the model that produced it.
    pub async fn chat_json(
        &self,
        system: &str,
        user: &str,
        max_tokens: Option<usize>,
    ) -> anyhow::Result<(String, String)> {
        let start = Instant::now();
        let mut last_error: Option<anyhow::Error> = None;

        for _ in 0..self.config.max_reselect_attempts.max(1) {
            let model_id = match self.select_model().await {
                Ok(id) => id,
                Err(err) => return Err(err.into()),
            };

            match self.provider.chat(&model_id, system, user, max_tokens).await {
                Ok(body) => {
                    self.rate_limits.record_success(&model_id);
                    self.circuit_breakers.record_success(&model_id).await;
                    self.clear_local_failure(&model_id);
                    metrics()
                        .free_model_selection_duration
                        .record(start.elapsed().as_secs_f64(), &[]);
                    return Ok((body, model_id));
                }
                Err(err) => {
                    if let Some(AiPlaneError::UpstreamRateLimit { retry_after }) =
                        err.downcast_ref::<AiPlaneError>()
                    {
                        self.rate_limits.record_rate_limit(&model_id, *retry_after);
                        metrics().rate_limit_blocks_total.add(1, &[]);
                    } else {
                        self.rate_limits.record_failure(&model_id);
                        self.circuit_breakers.record_failure(&model_id).await;
                        self.bump_local_failure(&model_id);
                    }
                    last_error = Some(anyhow::anyhow!("model {} failed: {}", model_id, err));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("free model retries exhausted with no attempts made")))
    }

    /// Delegates unchanged to the underlying provider.
    pub async fn embed(&self, model_id: &str, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.provider.embed(model_id, texts).await
    }

    /// Delegates unchanged to [`crate::response_cleaner::clean_json_response`].
    pub fn clean_cot_response(&self, raw: &str) -> String {
        crate::response_cleaner::clean_json_response(raw)
    }

    /// A single attempt with no reselection, used when a caller already
    /// knows which model it wants (e.g. a pinned probe). Delegates the
    /// attempt loop to [`ai_plane_core::retry::retry_with_policy`], built
    /// from [`ai_plane_core::retry::provider_retry_policy`] capped to
    /// `max_attempts`, recording C3/C4 outcomes on every attempt.
    pub async fn chat_json_with_retry(
        &self,
        model_id: &str,
        system: &str,
        user: &str,
        max_tokens: Option<usize>,
        max_attempts: u32,
    ) -> anyhow::Result<String> {
        let policy = ai_plane_core::retry::RetryPolicy {
            max_attempts: max_attempts.max(1) - 1,
            ..ai_plane_core::retry::provider_retry_policy()
        };
        ai_plane_core::retry::retry_with_policy(&policy, "free_model.chat_json_with_retry", || async {
            match self.provider.chat(model_id, system, user, max_tokens).await {
                Ok(body) => {
                    self.rate_limits.record_success(model_id);
                    self.circuit_breakers.record_success(model_id).await;
                    Ok(body)
                }
                Err(err) => {
                    self.rate_limits.record_failure(model_id);
                    self.circuit_breakers.record_failure(model_id).await;
                    Err(err)
                }
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Pricing;

    fn entry(id: &str, prompt: &str) -> ModelCatalogEntry {
        ModelCatalogEntry {
            id: id.to_string(),
            name: id.to_string(),
            context_length: Some(8192),
            pricing: Pricing { prompt: prompt.to_string(), completion: "0".to_string() },
        }
    }

    fn wrapper() -> FreeModelWrapper {
        FreeModelWrapper::new(
            Arc::new(ProviderClient::new("https://example.test", "key", Duration::from_secs(5))),
            Arc::new(RateLimitRegistry::new(ai_plane_core::config::RateLimitConfig {
                failure_threshold: 5,
                base_block: Duration::from_secs(20),
                max_block: Duration::from_secs(7200),
                cleanup_period: Duration::from_secs(30),
            })),
            Arc::new(CircuitBreakerSet::new(ai_plane_core::config::CircuitBreakerConfig {
                failure_threshold: 3,
                success_threshold: 1,
                recovery_timeout: Duration::from_secs(30),
                failure_window: Duration::from_secs(60),
            })),
            FreeModelConfig {
                catalog_refresh_period: Duration::from_secs(3600),
                per_model_failure_cap: 5,
                max_reselect_attempts: 3,
            },
        )
    }

    #[tokio::test]
    async fn select_model_rejects_empty_catalog() {
        let w = wrapper();
        {
            let mut cache = w.catalog.lock().await;
            cache.entries = Vec::new();
            cache.fetched_at = Some(Instant::now());
        }
        let err = w.select_model().await.unwrap_err();
        assert_eq!(err.total, 0);
    }

    #[tokio::test]
    async fn select_model_picks_lowest_free_id() {
        let w = wrapper();
        {
            let mut cache = w.catalog.lock().await;
            cache.entries = vec![entry("z-model", "0"), entry("a-model", "0"), entry("paid", "0.002")];
            cache.fetched_at = Some(Instant::now());
        }
        let chosen = w.select_model().await.unwrap();
        assert_eq!(chosen, "a-model");
    }

    #[tokio::test]
    async fn select_model_excludes_rate_limited_and_failure_capped() {
        let w = wrapper();
        {
            let mut cache = w.catalog.lock().await;
            cache.entries = vec![entry("a-model", "0"), entry("b-model", "0")];
            cache.fetched_at = Some(Instant::now());
        }
        for _ in 0..5 {
            w.rate_limits.record_failure("a-model");
        }
        let chosen = w.select_model().await.unwrap();
        assert_eq!(chosen, "b-model");

        for _ in 0..5 {
            w.bump_local_failure("b-model");
        }
        let err = w.select_model().await.unwrap_err();
        assert_eq!(err.failure_capped, 1);
    }
}
