use super::ProviderClient;
use ai_plane_core::AiPlaneError;
use anyhow::{Context, Result};
use serde::Deserialize;

/// Snapshot of the provider account's quota, as reported by the `/key`
/// endpoint. `limit` and `limit_remaining` are `None` for unlimited
/// (e.g. pay-as-you-go) accounts.
#[derive(Debug, Clone, Deserialize)]
pub struct QuotaStatus {
    pub label: String,
    pub usage: f64,
    pub limit: Option<f64>,
    pub is_free_tier: bool,
    pub limit_remaining: Option<f64>,
    #[serde(default)]
    pub is_provisioning_key: bool,
}

#[derive(Deserialize)]
struct KeyResponse {
    data: QuotaStatus,
}

pub(super) async fn quota_status(client: &ProviderClient) -> Result<QuotaStatus> {
    let url = client.endpoint("/key");
    let response = client
        .client()
        .get(&url)
        .bearer_auth(&client.api_key)
        .timeout(std::time::Duration::from_secs(30))
        .send()
        .await
        .context("provider key request failed")?;

    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        return Err(AiPlaneError::Internal(anyhow::anyhow!(
            "provider key endpoint returned {}: {}",
            status,
            text
        ))
        .into());
    }

    let parsed: KeyResponse = response
        .json()
        .await
        .context("failed to parse provider key response")?;

    Ok(parsed.data)
}
