use super::ProviderClient;
use ai_plane_core::AiPlaneError;
use anyhow::{Context, Result};
use serde::Deserialize;

/// Prompt/completion pricing as reported by the provider. Values are
/// carried as strings (the provider's own wire format) and parsed lazily
/// only where the numeric value matters (free-tier detection).
#[derive(Debug, Clone, Deserialize)]
pub struct Pricing {
    pub prompt: String,
    pub completion: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelCatalogEntry {
    pub id: String,
    pub name: String,
    pub context_length: Option<u64>,
    pub pricing: Pricing,
}

impl ModelCatalogEntry {
    /// A model is free iff its prompt price parses to exactly zero.
    pub fn is_free(&self) -> bool {
        self.pricing
            .prompt
            .parse::<f64>()
            .map(|price| price == 0.0)
            .unwrap_or(false)
    }
}

#[derive(Deserialize)]
struct ModelsResponse {
    data: Vec<ModelCatalogEntry>,
}

pub(super) async fn list_models(client: &ProviderClient) -> Result<Vec<ModelCatalogEntry>> {
    let url = client.endpoint("/models");
    let response = client
        .client()
        .get(&url)
        .bearer_auth(&client.api_key)
        .timeout(client.request_timeout)
        .send()
        .await
        .context("provider models request failed")?;

    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        return Err(AiPlaneError::Internal(anyhow::anyhow!(
            "provider models endpoint returned {}: {}",
            status,
            text
        ))
        .into());
    }

    let parsed: ModelsResponse = response
        .json()
        .await
        .context("failed to parse provider models response")?;

    Ok(parsed.data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(prompt: &str) -> ModelCatalogEntry {
        ModelCatalogEntry {
            id: "m".to_string(),
            name: "m".to_string(),
            context_length: Some(8192),
            pricing: Pricing { prompt: prompt.to_string(), completion: "0".to_string() },
        }
    }

    #[test]
    fn zero_prompt_price_is_free() {
        assert!(entry("0").is_free());
        assert!(entry("0.0").is_free());
    }

    #[test]
    fn nonzero_or_unparsable_price_is_not_free() {
        assert!(!entry("0.0000002").is_free());
        assert!(!entry("not-a-number").is_free());
    }
}
