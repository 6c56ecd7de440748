//! C3 — rate-limit registry: per-model failure counter with exponential
//! backoff, honoring an explicit `Retry-After` when the provider supplies
//! one. Every operation is infallible; the registry only ever records
//! state, it never surfaces an error of its own.

use ai_plane_core::config::RateLimitConfig;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Entry {
    consecutive_failures: u32,
    last_failure: Option<Instant>,
    blocked_until: Option<Instant>,
}

impl Entry {
    fn fresh() -> Self {
        Self {
            consecutive_failures: 0,
            last_failure: None,
            blocked_until: None,
        }
    }
}

pub struct RateLimitRegistry {
    config: RateLimitConfig,
    entries: Mutex<HashMap<String, Entry>>,
}

impl RateLimitRegistry {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn block_duration_for(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(10);
        let scaled = self.config.base_block.as_secs_f64() * 2f64.powi(exponent as i32);
        Duration::from_secs_f64(scaled).min(self.config.max_block)
    }

    pub fn is_blocked(&self, model_id: &str) -> bool {
        let entries = self.entries.lock().expect("rate limit mutex poisoned");
        match entries.get(model_id) {
            Some(entry) => match entry.blocked_until {
                Some(until) => Instant::now() < until,
                None => false,
            },
            None => false,
        }
    }

    pub fn remaining_block_duration(&self, model_id: &str) -> Duration {
        let entries = self.entries.lock().expect("rate limit mutex poisoned");
        match entries.get(model_id).and_then(|e| e.blocked_until) {
            Some(until) => until.saturating_duration_since(Instant::now()),
            None => Duration::ZERO,
        }
    }

    /// Unconditionally block a model for `duration`, bumping its failure
    /// counter as if a failure had just been observed.
    pub fn block(&self, model_id: &str, duration: Duration) {
        let mut entries = self.entries.lock().expect("rate limit mutex poisoned");
        let entry = entries.entry(model_id.to_string()).or_insert_with(Entry::fresh);
        entry.consecutive_failures += 1;
        entry.last_failure = Some(Instant::now());
        entry.blocked_until = Some(Instant::now() + duration);
    }

    pub fn record_failure(&self, model_id: &str) {
        let mut entries = self.entries.lock().expect("rate limit mutex poisoned");
        let entry = entries.entry(model_id.to_string()).or_insert_with(Entry::fresh);
        entry.consecutive_failures += 1;
        entry.last_failure = Some(Instant::now());
        if entry.consecutive_failures >= self.config.failure_threshold {
            let duration = self.block_duration_for(entry.consecutive_failures);
            entry.blocked_until = Some(Instant::now() + duration);
        }
    }

    /// Record an explicit provider-issued rate limit, honoring
    /// `retry_after` verbatim (falling back to the configured base block
    /// when it is zero or negative).
    pub fn record_rate_limit(&self, model_id: &str, retry_after: Duration) {
        let mut entries = self.entries.lock().expect("rate limit mutex poisoned");
        let entry = entries.entry(model_id.to_string()).or_insert_with(Entry::fresh);
        entry.consecutive_failures += 1;
        entry.last_failure = Some(Instant::now());
        let duration = if retry_after.is_zero() {
            self.config.base_block
        } else {
            retry_after
        };
        entry.blocked_until = Some(Instant::now() + duration);
    }

    pub fn record_success(&self, model_id: &str) {
        let mut entries = self.entries.lock().expect("rate limit mutex poisoned");
        if let Some(entry) = entries.get_mut(model_id) {
            entry.consecutive_failures = 0;
            entry.blocked_until = None;
        }
    }

    pub fn available_models<'a>(&self, all: &'a [String]) -> Vec<&'a String> {
        all.iter().filter(|id| !self.is_blocked(id)).collect()
    }

    /// Remove entries that are no longer blocked and have been quiet for
    /// longer than twice the base block duration.
    pub fn cleanup(&self) {
        let now = Instant::now();
        let quiet_threshold = self.config.base_block * 2;
        let mut entries = self.entries.lock().expect("rate limit mutex poisoned");
        entries.retain(|_, entry| {
            let still_blocked = entry.blocked_until.map(|u| now < u).unwrap_or(false);
            if still_blocked {
                return true;
            }
            match entry.last_failure {
                Some(last) => now.duration_since(last) <= quiet_threshold,
                None => false,
            }
        });
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("rate limit mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RateLimitConfig {
        RateLimitConfig {
            failure_threshold: 5,
            base_block: Duration::from_secs(20),
            max_block: Duration::from_secs(7200),
            cleanup_period: Duration::from_secs(30),
        }
    }

    #[test]
    fn exponential_backoff_matches_formula() {
        let registry = RateLimitRegistry::new(config());
        for _ in 0..5 {
            registry.record_failure("m");
        }
        // at threshold (5 failures), exponent = min(5-1,10) = 4 -> 20 * 2^4 = 320s
        let remaining = registry.remaining_block_duration("m");
        assert!(remaining.as_secs() > 300 && remaining.as_secs() <= 320);
    }

    #[test]
    fn block_duration_caps_at_two_hours() {
        let registry = RateLimitRegistry::new(config());
        for _ in 0..50 {
            registry.record_failure("m");
        }
        let remaining = registry.remaining_block_duration("m");
        assert!(remaining.as_secs() <= 7200);
    }

    #[test]
    fn retry_after_is_honored_verbatim() {
        let registry = RateLimitRegistry::new(config());
        registry.record_rate_limit("m", Duration::from_secs(5));
        let remaining = registry.remaining_block_duration("m");
        assert!(remaining.as_secs() <= 5 && remaining.as_secs() >= 4);
    }

    #[test]
    fn success_clears_state() {
        let registry = RateLimitRegistry::new(config());
        for _ in 0..5 {
            registry.record_failure("m");
        }
        assert!(registry.is_blocked("m"));
        registry.record_success("m");
        assert!(!registry.is_blocked("m"));
    }

    #[test]
    fn available_models_filters_blocked() {
        let registry = RateLimitRegistry::new(config());
        for _ in 0..5 {
            registry.record_failure("blocked-model");
        }
        let all = vec!["blocked-model".to_string(), "free-model".to_string()];
        let available = registry.available_models(&all);
        assert_eq!(available, vec![&"free-model".to_string()]);
    }
}
