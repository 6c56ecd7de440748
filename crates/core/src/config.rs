//! Centralized configuration management.
//!
//! All configuration is loaded from environment variables at startup.
//! This provides a single source of truth and fails fast if required
//! config is missing.

use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub vector_store: VectorStoreConfig,
    pub embedding_cache: EmbeddingCacheConfig,
    pub response_cache: ResponseCacheConfig,
    pub rate_limit: RateLimitConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub free_model: FreeModelConfig,
    pub quota: QuotaConfig,
    pub rag_seed: RagSeedConfig,
    pub cleanup_worker: CleanupWorkerConfig,
    pub server: ServerConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            provider: ProviderConfig::from_env()?,
            vector_store: VectorStoreConfig::from_env()?,
            embedding_cache: EmbeddingCacheConfig::from_env()?,
            response_cache: ResponseCacheConfig::from_env()?,
            rate_limit: RateLimitConfig::from_env()?,
            circuit_breaker: CircuitBreakerConfig::from_env()?,
            free_model: FreeModelConfig::from_env()?,
            quota: QuotaConfig::from_env()?,
            rag_seed: RagSeedConfig::from_env()?,
            cleanup_worker: CleanupWorkerConfig::from_env()?,
            server: ServerConfig::from_env()?,
            observability: ObservabilityConfig::from_env()?,
        })
    }
}

/// Upstream LLM/embedding provider configuration (e.g. OpenRouter).
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: String,
    pub base_url: String,
    pub request_timeout: Duration,
}

impl ProviderConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            api_key: env::var("PROVIDER_API_KEY").context("PROVIDER_API_KEY is required")?,
            base_url: env::var("PROVIDER_BASE_URL")
                .unwrap_or_else(|_| "https://openrouter.ai/api/v1".to_string()),
            request_timeout: Duration::from_secs(
                env::var("PROVIDER_REQUEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30),
            ),
        })
    }
}

/// REST vector-store configuration (see §6 of the system design — a
/// plain collections/points/search JSON contract, not a gRPC binding).
#[derive(Debug, Clone)]
pub struct VectorStoreConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub request_timeout: Duration,
    pub vector_size: usize,
    pub distance: String,
}

impl VectorStoreConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            base_url: env::var("VECTOR_STORE_URL")
                .unwrap_or_else(|_| "http://localhost:6333".to_string()),
            api_key: env::var("VECTOR_STORE_API_KEY").ok(),
            request_timeout: Duration::from_secs(
                env::var("VECTOR_STORE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30),
            ),
            vector_size: env::var("VECTOR_STORE_VECTOR_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1536),
            distance: env::var("VECTOR_STORE_DISTANCE")
                .unwrap_or_else(|_| "Cosine".to_string()),
        })
    }
}

/// C1 embedding cache configuration.
#[derive(Debug, Clone)]
pub struct EmbeddingCacheConfig {
    /// Capacity <= 0 makes the cache a passthrough.
    pub capacity: i64,
}

impl EmbeddingCacheConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            capacity: env::var("EMBEDDING_CACHE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10_000),
        })
    }
}

/// C5 model-response cache configuration.
#[derive(Debug, Clone)]
pub struct ResponseCacheConfig {
    pub capacity: usize,
    pub default_ttl: Duration,
}

impl ResponseCacheConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            capacity: env::var("RESPONSE_CACHE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1_000),
            default_ttl: Duration::from_secs(
                env::var("RESPONSE_CACHE_TTL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(3600),
            ),
        })
    }
}

/// C3 rate-limit registry configuration.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub failure_threshold: u32,
    pub base_block: Duration,
    pub max_block: Duration,
    pub cleanup_period: Duration,
}

impl RateLimitConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            failure_threshold: env::var("RATE_LIMIT_FAILURE_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            base_block: Duration::from_secs(
                env::var("RATE_LIMIT_BASE_BLOCK_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(20),
            ),
            max_block: Duration::from_secs(
                env::var("RATE_LIMIT_MAX_BLOCK_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(7200),
            ),
            cleanup_period: Duration::from_secs(
                env::var("RATE_LIMIT_CLEANUP_PERIOD_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30),
            ),
        })
    }
}

/// C4 circuit breaker defaults, threaded into `CircuitBreakerSet::new` and
/// mapped onto [`crate::circuit_breaker::CircuitBreakerConfig`] per model id.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub recovery_timeout: Duration,
    pub failure_window: Duration,
}

impl CircuitBreakerConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            failure_threshold: env::var("CIRCUIT_BREAKER_FAILURE_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
            success_threshold: env::var("CIRCUIT_BREAKER_SUCCESS_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1),
            recovery_timeout: Duration::from_secs(
                env::var("CIRCUIT_BREAKER_RECOVERY_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30),
            ),
            failure_window: Duration::from_secs(
                env::var("CIRCUIT_BREAKER_FAILURE_WINDOW_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(60),
            ),
        })
    }
}

/// C8 free-model wrapper configuration.
#[derive(Debug, Clone)]
pub struct FreeModelConfig {
    pub catalog_refresh_period: Duration,
    pub per_model_failure_cap: u32,
    pub max_reselect_attempts: u32,
}

impl FreeModelConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            catalog_refresh_period: Duration::from_secs(
                env::var("FREE_MODEL_CATALOG_REFRESH_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(3600),
            ),
            per_model_failure_cap: env::var("FREE_MODEL_PER_MODEL_FAILURE_CAP")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            max_reselect_attempts: env::var("FREE_MODEL_MAX_RESELECT_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
        })
    }
}

/// C9 quota checker configuration.
#[derive(Debug, Clone)]
pub struct QuotaConfig {
    pub poll_interval: Duration,
}

impl QuotaConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            poll_interval: Duration::from_secs(
                env::var("QUOTA_POLL_INTERVAL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(5),
            ),
        })
    }
}

/// C10 rag-seed configuration.
#[derive(Debug, Clone)]
pub struct RagSeedConfig {
    /// When false (default), seed file paths are constrained to the
    /// working directory; set true to allow an explicit absolute path.
    pub allow_absolute_paths: bool,
    pub job_description_path: String,
    pub scoring_rubric_path: String,
    pub embed_batch_size: usize,
}

impl RagSeedConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            allow_absolute_paths: env::var("RAG_SEED_ALLOW_ABSOLUTE_PATHS")
                .map(|v| v.to_lowercase() == "true")
                .unwrap_or(false),
            job_description_path: env::var("RAG_SEED_JOB_DESCRIPTION_PATH")
                .unwrap_or_else(|_| "seed/job_description.yaml".to_string()),
            scoring_rubric_path: env::var("RAG_SEED_SCORING_RUBRIC_PATH")
                .unwrap_or_else(|_| "seed/scoring_rubric.yaml".to_string()),
            embed_batch_size: env::var("RAG_SEED_EMBED_BATCH_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(16),
        })
    }
}

/// C11 cleanup worker configuration.
#[derive(Debug, Clone)]
pub struct CleanupWorkerConfig {
    pub tick_interval: Duration,
}

impl CleanupWorkerConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            tick_interval: Duration::from_secs(
                env::var("CLEANUP_WORKER_TICK_INTERVAL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30),
            ),
        })
    }
}

/// HTTP server configuration (the thin boundary host crate's liveness
/// listener only — see Non-goals).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub hostname: String,
    pub port: u16,
    pub shutdown_timeout: Duration,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            hostname: env::var("HOSTNAME").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
            shutdown_timeout: Duration::from_secs(
                env::var("SHUTDOWN_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30),
            ),
        })
    }
}

/// Observability configuration.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub service_name: String,
    pub otlp_endpoint: String,
    pub log_format: LogFormat,
}

/// Log format type
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl ObservabilityConfig {
    pub fn from_env() -> Result<Self> {
        let log_format = match env::var("LOG_FORMAT")
            .unwrap_or_else(|_| "json".to_string())
            .to_lowercase()
            .as_str()
        {
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Json,
        };

        Ok(Self {
            service_name: env::var("SERVICE_NAME").unwrap_or_else(|_| "ai-plane".to_string()),
            otlp_endpoint: env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:4317".to_string()),
            log_format,
        })
    }
}
