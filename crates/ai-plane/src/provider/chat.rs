use super::ProviderClient;
use ai_plane_core::AiPlaneError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// Parse a `Retry-After` header value, accepting either a delay in
/// seconds or an HTTP-date naming the moment retries may resume.
/// Falls back to 30s when the header is absent or unparseable.
fn retry_after_seconds(resp: &reqwest::Response) -> u64 {
    let Some(raw) = resp.headers().get(reqwest::header::RETRY_AFTER).and_then(|v| v.to_str().ok()) else {
        return 30;
    };
    if let Ok(secs) = raw.parse::<u64>() {
        return secs;
    }
    chrono::DateTime::parse_from_rfc2822(raw)
        .ok()
        .map(|at| (at.timestamp() - chrono::Utc::now().timestamp()).max(0) as u64)
        .unwrap_or(30)
}

pub(super) async fn chat(
    client: &ProviderClient,
    model_id: &str,
    system: &str,
    user: &str,
    max_tokens: Option<usize>,
) -> Result<String> {
    if !client.circuit.should_allow().await {
        return Err(AiPlaneError::UpstreamTimeout.into());
    }

    let request = ChatRequest {
        model: model_id,
        messages: vec![
            ChatMessage { role: "system", content: system },
            ChatMessage { role: "user", content: user },
        ],
        max_tokens,
    };

    let url = client.endpoint("/chat/completions");
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
            return Err(anyhow::anyhow!("provider chat request failed: {}", err));
        }
    };

    if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = Duration::from_secs(retry_after_seconds(&response));
        client.circuit.record_failure().await;
        return Err(AiPlaneError::UpstreamRateLimit { retry_after }.into());
    }

    if !response.status().is_success() {
        let status = response.status();
        client.circuit.record_failure().await;
        let text = response.text().await.unwrap_or_default();
        return Err(anyhow::anyhow!("provider chat returned {}: {}", status, text));
    }

    let parsed: ChatResponse = response
        .json()
        .await
        .context("failed to parse provider chat response")?;

    client.circuit.record_success().await;

    parsed
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .ok_or_else(|| anyhow::anyhow!("provider chat response had no choices"))
}
