//! The resilient AI invocation plane: layered middleware that turns
//! best-effort, rate-limited, sometimes-refusing third-party LLM and
//! embedding endpoints into a reliable internal capability.
//!
//! Each module below corresponds to one component of the design: an
//! embedding cache (C1), a JSON response cleaner (C2), a per-model
//! rate-limit registry (C3), a circuit breaker set (C4), a model-response
//! cache (C5), a refusal detector (C6), a response validator (C7), a
//! free-model selection wrapper (C8), a quota checker (C9), a rag seed
//! routine (C10), a cleanup worker (C11), and the thin evaluation
//! boundary (C15) that keeps concrete persistence/queue/HTTP surfaces out
//! of this crate.

pub mod boundary;
pub mod circuit_breakers;
pub mod cleanup_worker;
pub mod embedding_cache;
pub mod free_model;
pub mod provider;
pub mod quota;
pub mod rag_seed;
pub mod rate_limit;
pub mod refusal;
pub mod response_cache;
pub mod response_cleaner;
pub mod validator;
pub mod vector_store;

use ai_plane_core::config::AppConfig;
use provider::ProviderClient;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// The process-wide AI plane: every singleton registry (C1, C3, C4, C5,
/// C8's catalog) plus the long-lived cleanup worker (C11), assembled from
/// [`AppConfig`] and bound to a single lifecycle. Construct one per
/// process with [`AiPlane::new`]; callers inject it rather than reaching
/// for a global.
pub struct AiPlane {
    pub embedding_cache: Arc<embedding_cache::EmbeddingCache>,
    pub rate_limits: Arc<rate_limit::RateLimitRegistry>,
    pub circuit_breakers: Arc<circuit_breakers::CircuitBreakerSet>,
    pub response_cache: Arc<response_cache::ResponseCache>,
    pub free_model: Arc<free_model::FreeModelWrapper>,
    pub quota: Arc<quota::QuotaChecker>,
    cleanup_interval: Duration,
    cleanup_cancel: CancellationToken,
}

impl AiPlane {
    pub fn new(config: &AppConfig) -> Self {
        let provider = Arc::new(ProviderClient::new(
            config.provider.base_url.clone(),
            config.provider.api_key.clone(),
            config.provider.request_timeout,
        ));
        let rate_limits = Arc::new(rate_limit::RateLimitRegistry::new(config.rate_limit.clone()));
        let circuit_breakers =
            Arc::new(circuit_breakers::CircuitBreakerSet::new(config.circuit_breaker.clone()));
        let free_model = Arc::new(free_model::FreeModelWrapper::new(
            provider.clone(),
            rate_limits.clone(),
            circuit_breakers.clone(),
            config.free_model.clone(),
        ));
        let quota = Arc::new(quota::QuotaChecker::new(
            ProviderClient::new(
                config.provider.base_url.clone(),
                config.provider.api_key.clone(),
                config.provider.request_timeout,
            ),
            config.quota.clone(),
        ));

        Self {
            embedding_cache: Arc::new(embedding_cache::EmbeddingCache::new(config.embedding_cache.capacity)),
            rate_limits,
            circuit_breakers,
            response_cache: Arc::new(response_cache::ResponseCache::new(
                config.response_cache.capacity,
                config.response_cache.default_ttl,
            )),
            free_model,
            quota,
            cleanup_interval: config.cleanup_worker.tick_interval,
            cleanup_cancel: CancellationToken::new(),
        }
    }

    /// Spawn the cleanup worker (C11) bound to this plane's lifecycle.
    /// The returned handle resolves once the worker observes cancellation
    /// (via [`AiPlane::shutdown`]) or the process-wide shutdown signal.
    pub fn spawn_cleanup_worker(&self) -> tokio::task::JoinHandle<()> {
        let worker = cleanup_worker::CleanupWorker::new(
            self.rate_limits.clone(),
            self.response_cache.clone(),
            self.cleanup_interval,
        );
        let cancel = self.cleanup_cancel.clone();
        tokio::spawn(async move { worker.run(cancel).await })
    }

    /// Signal the cleanup worker to stop. Does not block; await the
    /// handle returned by [`AiPlane::spawn_cleanup_worker`] to observe
    /// the worker's actual exit.
    pub fn shutdown(&self) {
        self.cleanup_cancel.cancel();
    }
}
