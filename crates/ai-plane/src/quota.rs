//! C9 — quota checker: queries the provider's account/key endpoint for
//! usage and limits, and offers a polling wait-for-quota helper.

use crate::provider::{ProviderClient, QuotaStatus};
use ai_plane_core::config::QuotaConfig;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub struct QuotaChecker {
    provider: ProviderClient,
    config: QuotaConfig,
}

impl QuotaChecker {
    pub fn new(provider: ProviderClient, config: QuotaConfig) -> Self {
        Self { provider, config }
    }

    /// Fetch the current quota snapshot from the provider.
    pub async fn check_rate_limit(&self) -> anyhow::Result<QuotaStatus> {
        self.provider.quota_status().await
    }

    /// Unlimited accounts (null limit/remaining) always have sufficient
    /// quota; limited accounts compare `limit_remaining` against `required`.
    pub async fn has_sufficient_quota(&self, required: f64) -> anyhow::Result<(bool, QuotaStatus)> {
        let status = self.check_rate_limit().await?;
        let sufficient = match status.limit_remaining {
            None => true,
            Some(remaining) => remaining >= required,
        };
        Ok((sufficient, status))
    }

    /// Poll every [`QuotaConfig::poll_interval`] until quota is sufficient
    /// or `max_wait` elapses, re-checking `cancel` on every iteration.
    pub async fn wait_for_quota(
        &self,
        required: f64,
        max_wait: Duration,
        cancel: &CancellationToken,
    ) -> anyhow::Result<bool> {
        let deadline = tokio::time::Instant::now() + max_wait;
        loop {
            if cancel.is_cancelled() {
                return Ok(false);
            }
            let (sufficient, _) = self.has_sufficient_quota(required).await?;
            if sufficient {
                return Ok(true);
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                _ = cancel.cancelled() => return Ok(false),
            }
        }
    }

    /// Fixed free-model request-per-day limits by account tier, not drawn
    /// from the provider response: `(true, 50)` for free-tier keys,
    /// `(true, 1000)` for paid keys.
    pub fn check_free_model_limits(&self, is_free_tier: bool) -> (bool, u32) {
        if is_free_tier { (true, 50) } else { (true, 1000) }
    }

    /// An account is active iff it has credits or is free tier; an
    /// unlimited limit is treated as having credits.
    pub fn check_account_status(&self, status: &QuotaStatus) -> (bool, bool) {
        let has_credits = match status.limit {
            None => true,
            Some(limit) => status.usage < limit,
        };
        let is_active = has_credits || status.is_free_tier;
        (is_active, has_credits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(limit: Option<f64>, usage: f64, is_free_tier: bool, limit_remaining: Option<f64>) -> QuotaStatus {
        QuotaStatus {
            label: "test".to_string(),
            usage,
            limit,
            is_free_tier,
            limit_remaining,
            is_provisioning_key: false,
        }
    }

    fn checker() -> QuotaChecker {
        QuotaChecker::new(
            ProviderClient::new("https://example.test", "key", Duration::from_secs(5)),
            QuotaConfig { poll_interval: Duration::from_millis(10) },
        )
    }

    #[test]
    fn free_model_limits_match_tier() {
        let c = checker();
        assert_eq!(c.check_free_model_limits(true), (true, 50));
        assert_eq!(c.check_free_model_limits(false), (true, 1000));
    }

    #[test]
    fn unlimited_account_has_credits() {
        let c = checker();
        let (is_active, has_credits) = c.check_account_status(&status(None, 0.0, false, None));
        assert!(is_active);
        assert!(has_credits);
    }

    #[test]
    fn free_tier_without_credits_is_still_active() {
        let c = checker();
        let (is_active, has_credits) = c.check_account_status(&status(Some(1.0), 1.0, true, Some(0.0)));
        assert!(is_active);
        assert!(!has_credits);
    }

    #[test]
    fn paid_tier_without_credits_is_inactive() {
        let c = checker();
        let (is_active, has_credits) = c.check_account_status(&status(Some(1.0), 1.0, false, Some(0.0)));
        assert!(!is_active);
        assert!(!has_credits);
    }
}
