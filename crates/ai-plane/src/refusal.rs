//! C6 — refusal detector: ask a model to classify text as refusal or
//! not, falling back to a fixed string-indicator heuristic if that call
//! fails for any reason.

use crate::provider::ProviderClient;
use ai_plane_core::observability::metrics;
use serde::Deserialize;
use std::time::Duration;

/// A narrow, separate timeout for the refusal probe so a stuck primary
/// chat call cannot also stall the validator's fallback path.
const REFUSAL_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

const REFUSAL_INDICATORS: &[&str] = &[
    "i'm sorry",
    "i cannot",
    "i can't",
    "i am unable",
    "i am not able",
    "unfortunately",
    "as an ai",
    "against my",
    "policy",
    "guidelines",
    "harmful",
    "i apologize",
    "i won't",
];

#[derive(Debug, Clone, PartialEq)]
pub enum RefusalType {
    PolicyViolation,
    CapabilityLimitation,
    SafetyConcern,
    CodeDetected,
    Other,
}

#[derive(Debug, Clone)]
pub struct RefusalAnalysis {
    pub is_refusal: bool,
    pub confidence: f32,
    pub refusal_type: RefusalType,
    pub reason: String,
    pub suggestions: Vec<String>,
}

#[derive(Deserialize)]
struct RawAnalysis {
    is_refusal: bool,
    confidence: f32,
    #[serde(default)]
    refusal_type: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

fn refusal_type_from_str(s: &str) -> RefusalType {
    match s {
        "policy_violation" => RefusalType::PolicyViolation,
        "capability_limitation" => RefusalType::CapabilityLimitation,
        "safety_concern" => RefusalType::SafetyConcern,
        "code_detected" => RefusalType::CodeDetected,
        _ => RefusalType::Other,
    }
}

const ANALYZER_SYSTEM_PROMPT: &str = "You classify whether a piece of text is a refusal to \
perform a requested task. Respond with a single JSON object: \
{\"is_refusal\": bool, \"confidence\": number between 0 and 1, \
\"refusal_type\": one of \"policy_violation\", \"capability_limitation\", \
\"safety_concern\", \"other\", \"reason\": short string}. Respond with \
JSON only, no other text.";

/// Ask a model to classify `text`. Fails whenever the downstream call
/// fails or its output cannot be parsed as the expected JSON shape.
pub async fn detect_refusal(
    provider: &ProviderClient,
    model_id: &str,
    text: &str,
) -> anyhow::Result<RefusalAnalysis> {
    let body = tokio::time::timeout(
        REFUSAL_PROBE_TIMEOUT,
        provider.chat(model_id, ANALYZER_SYSTEM_PROMPT, text, Some(256)),
    )
    .await
    .map_err(|_| anyhow::anyhow!("refusal probe timed out"))??;

    let cleaned = crate::response_cleaner::clean_json_response(&body);
    let raw: RawAnalysis = serde_json::from_str(&cleaned)?;

    Ok(RefusalAnalysis {
        is_refusal: raw.is_refusal,
        confidence: raw.confidence,
        refusal_type: raw
            .refusal_type
            .as_deref()
            .map(refusal_type_from_str)
            .unwrap_or(RefusalType::Other),
        reason: raw.reason.unwrap_or_default(),
        suggestions: Vec::new(),
    })
}

/// Checks indicators against the start of the (trimmed, lowercased) text
/// rather than anywhere within it — a quirk preserved from the source
/// this detector was distilled from, kept for compatibility with the
/// fixed indicator lists rather than widened to a substring search.
fn starts_with_any(text: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| text.starts_with(needle))
}

fn string_fallback(text: &str) -> RefusalAnalysis {
    let lowered = text.trim().to_lowercase();
    let is_refusal = starts_with_any(&lowered, REFUSAL_INDICATORS);
    RefusalAnalysis {
        is_refusal,
        confidence: 0.7,
        refusal_type: RefusalType::CodeDetected,
        reason: "fallback string-indicator match".to_string(),
        suggestions: Vec::new(),
    }
}

/// Best-effort refusal detection: try the LLM-assisted path, and fall
/// back to the fixed string-indicator heuristic on any failure.
pub async fn detect_refusal_with_fallback(
    provider: &ProviderClient,
    model_id: &str,
    text: &str,
) -> RefusalAnalysis {
    match detect_refusal(provider, model_id, text).await {
        Ok(mut analysis) => {
            analysis.suggestions = get_refusal_handling_suggestions(&analysis.refusal_type);
            metrics()
                .refusal_detections_total
                .add(1, &[opentelemetry::KeyValue::new("source", "llm")]);
            analysis
        }
        Err(_) => {
            let mut analysis = string_fallback(text);
            analysis.suggestions = get_refusal_handling_suggestions(&analysis.refusal_type);
            metrics()
                .refusal_detections_total
                .add(1, &[opentelemetry::KeyValue::new("source", "fallback")]);
            analysis
        }
    }
}

pub fn get_refusal_handling_suggestions(refusal_type: &RefusalType) -> Vec<String> {
    match refusal_type {
        RefusalType::PolicyViolation => vec![
            "Rephrase the request to avoid policy-sensitive language".to_string(),
            "Remove any instructions that resemble a jailbreak attempt".to_string(),
        ],
        RefusalType::CapabilityLimitation => vec![
            "Break the task into smaller, more specific sub-requests".to_string(),
            "Provide more context about the expected output format".to_string(),
        ],
        RefusalType::SafetyConcern => vec![
            "Clarify the legitimate, non-harmful intent behind the request".to_string(),
            "Remove content that could be read as describing harmful acts".to_string(),
        ],
        RefusalType::CodeDetected => vec![
            "Retry with a different model from the free-model pool".to_string(),
            "Shorten the prompt and request a stricter output format".to_string(),
        ],
        RefusalType::Other => vec![
            "Retry the request with adjusted phrasing".to_string(),
            "Escalate to a human reviewer if retries continue to fail".to_string(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_flags_known_indicators() {
        let analysis = string_fallback("I'm sorry, but I cannot help with that request.");
        assert!(analysis.is_refusal);
        assert_eq!(analysis.confidence, 0.7);
    }

    #[test]
    fn fallback_does_not_flag_ordinary_text() {
        let analysis = string_fallback("Here is the summary you requested.");
        assert!(!analysis.is_refusal);
    }

    #[test]
    fn suggestions_are_non_empty_for_every_type() {
        for t in [
            RefusalType::PolicyViolation,
            RefusalType::CapabilityLimitation,
            RefusalType::SafetyConcern,
            RefusalType::CodeDetected,
            RefusalType::Other,
        ] {
            assert!(!get_refusal_handling_suggestions(&t).is_empty());
        }
    }
}
