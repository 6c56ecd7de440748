//! C11 — cleanup worker: a single long-lived task that periodically
//! prunes stale rate-limit entries (C3) and expired cached responses
//! (C5). Holds no other locks across ticks and stops promptly on
//! cancellation.

use crate::rate_limit::RateLimitRegistry;
use crate::response_cache::ResponseCache;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub struct CleanupWorker {
    rate_limits: Arc<RateLimitRegistry>,
    response_cache: Arc<ResponseCache>,
    tick_interval: Duration,
}

impl CleanupWorker {
    pub fn new(
        rate_limits: Arc<RateLimitRegistry>,
        response_cache: Arc<ResponseCache>,
        tick_interval: Duration,
    ) -> Self {
        Self { rate_limits, response_cache, tick_interval }
    }

    fn tick(&self) {
        self.rate_limits.cleanup();
        self.response_cache.cleanup();
        debug!(
            rate_limit_entries = self.rate_limits.len(),
            response_cache_entries = self.response_cache.len(),
            "cleanup worker tick"
        );
    }

    /// Run until `cancel` fires. Checks the token before and after every
    /// tick so a cancellation during sleep or during the tick itself is
    /// observed promptly, never blocking shutdown beyond one in-flight tick.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(interval_secs = self.tick_interval.as_secs(), "cleanup worker started");
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            if cancel.is_cancelled() {
                break;
            }
            tokio::select! {
                _ = interval.tick() => {
                    if cancel.is_cancelled() {
                        break;
                    }
                    self.tick();
                }
                _ = cancel.cancelled() => break,
            }
        }
        info!("cleanup worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ai_plane_core::config::RateLimitConfig;

    fn registry() -> Arc<RateLimitRegistry> {
        Arc::new(RateLimitRegistry::new(RateLimitConfig {
            failure_threshold: 5,
            base_block: Duration::from_secs(20),
            max_block: Duration::from_secs(7200),
            cleanup_period: Duration::from_millis(10),
        }))
    }

    #[tokio::test]
    async fn stops_promptly_on_cancellation() {
        let worker = CleanupWorker::new(
            registry(),
            Arc::new(ResponseCache::new(10, Duration::from_secs(60))),
            Duration::from_millis(5),
        );
        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();
        let handle = tokio::spawn(async move { worker.run(cancel_clone).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("cleanup worker did not stop promptly")
            .expect("cleanup worker task panicked");
    }

    #[tokio::test]
    async fn tick_prunes_expired_response_cache_entries() {
        let cache = Arc::new(ResponseCache::new(10, Duration::from_millis(1)));
        cache.set("sys", "user", "body".into(), "model".into());
        tokio::time::sleep(Duration::from_millis(5)).await;

        let worker = CleanupWorker::new(registry(), cache.clone(), Duration::from_secs(60));
        worker.tick();
        assert!(cache.is_empty());
    }
}
