//! C4 — circuit breaker set: one [`CircuitBreaker`] per model id, created
//! lazily on first use.

use ai_plane_core::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use ai_plane_core::config::CircuitBreakerConfig as CircuitBreakerSettings;
use ai_plane_core::observability::metrics;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub struct CircuitBreakerSet {
    settings: CircuitBreakerSettings,
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
}

impl CircuitBreakerSet {
    pub fn new(settings: CircuitBreakerSettings) -> Self {
        Self {
            settings,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    fn breaker_for(&self, model_id: &str) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock().expect("circuit breaker set mutex poisoned");
        breakers
            .entry(model_id.to_string())
            .or_insert_with(|| {
                CircuitBreaker::new(CircuitBreakerConfig {
                    name: model_id.to_string(),
                    failure_threshold: self.settings.failure_threshold,
                    success_threshold: self.settings.success_threshold,
                    timeout: self.settings.recovery_timeout,
                    failure_window: self.settings.failure_window,
                })
            })
            .clone()
    }

    pub async fn should_attempt(&self, model_id: &str) -> bool {
        self.breaker_for(model_id).should_allow().await
    }

    pub async fn record_success(&self, model_id: &str) {
        self.breaker_for(model_id).record_success().await;
    }

    pub async fn record_failure(&self, model_id: &str) {
        let breaker = self.breaker_for(model_id);
        let before = breaker.state().await;
        breaker.record_failure().await;
        let after = breaker.state().await;
        if before != after {
            metrics().circuit_breaker_transitions_total.add(1, &[]);
        }
    }

    /// Returns the ids, among `all`, whose breaker is not currently Open.
    pub async fn healthy_models<'a>(&self, all: &'a [String]) -> Vec<&'a String> {
        let mut healthy = Vec::with_capacity(all.len());
        for id in all {
            let breaker = self.breaker_for(id);
            if breaker.state().await != ai_plane_core::circuit_breaker::CircuitState::Open {
                healthy.push(id);
            }
        }
        healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_settings() -> CircuitBreakerSettings {
        CircuitBreakerSettings {
            failure_threshold: 3,
            success_threshold: 1,
            recovery_timeout: Duration::from_secs(30),
            failure_window: Duration::from_secs(60),
        }
    }

    #[tokio::test]
    async fn opens_after_three_consecutive_failures() {
        let set = CircuitBreakerSet::new(test_settings());
        for _ in 0..3 {
            set.should_attempt("m").await;
            set.record_failure("m").await;
        }
        assert!(!set.should_attempt("m").await);
    }

    #[tokio::test]
    async fn models_are_independent() {
        let set = CircuitBreakerSet::new(test_settings());
        for _ in 0..3 {
            set.should_attempt("bad").await;
            set.record_failure("bad").await;
        }
        assert!(set.should_attempt("good").await);
    }

    #[tokio::test]
    async fn success_keeps_circuit_closed() {
        let set = CircuitBreakerSet::new(test_settings());
        set.should_attempt("m").await;
        set.record_success("m").await;
        let all = vec!["m".to_string()];
        assert_eq!(set.healthy_models(&all).await, vec![&"m".to_string()]);
    }

    #[tokio::test]
    async fn custom_failure_threshold_is_honored() {
        let settings = CircuitBreakerSettings { failure_threshold: 1, ..test_settings() };
        let set = CircuitBreakerSet::new(settings);
        set.should_attempt("m").await;
        set.record_failure("m").await;
        assert!(!set.should_attempt("m").await);
    }
}
