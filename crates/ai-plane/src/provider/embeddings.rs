use super::ProviderClient;
use ai_plane_core::AiPlaneError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

pub(super) async fn embed(client: &ProviderClient, model_id: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    if !client.circuit.should_allow().await {
        return Err(AiPlaneError::UpstreamTimeout.into());
    }

    let request = EmbeddingRequest { input: texts, model: model_id };
    let url = client.endpoint("/embeddings");

    let sent = client
        .client()
        .post(&url)
        .bearer_auth(&client.api_key)
        .timeout(client.request_timeout)
        .json(&request)
        .send()
        .await;

    let response = match sent {
        Ok(resp) => resp,
        Err(err) => {
            client.circuit.record_failure().await;
            if err.is_timeout() {
                return Err(AiPlaneError::UpstreamTimeout.into());
            }
            return Err(anyhow::anyhow!("provider embeddings request failed: {}", err));
        }
    };

    if !response.status().is_success() {
        let status = response.status();
        client.circuit.record_failure().await;
        let text = response.text().await.unwrap_or_default();
        return Err(anyhow::anyhow!("provider embeddings returned {}: {}", status, text));
    }

    let parsed: EmbeddingResponse = response
        .json()
        .await
        .context("failed to parse provider embeddings response")?;

    client.circuit.record_success().await;

    let mut ordered: Vec<Option<Vec<f32>>> = (0..texts.len()).map(|_| None).collect();
    for item in parsed.data {
        if let Some(slot) = ordered.get_mut(item.index) {
            *slot = Some(item.embedding);
        }
    }

    ordered
        .into_iter()
        .enumerate()
        .map(|(i, v)| v.ok_or_else(|| anyhow::anyhow!("provider embeddings response missing index {}", i)))
        .collect()
}
