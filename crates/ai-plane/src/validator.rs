//! C7 — response validator: orchestrates the basic/refusal/clean/JSON/
//! quality checks into one pipeline. Never fails at the top level —
//! every outcome, including a refusal, is reported as an `Issue` inside
//! the result.

use crate::provider::ProviderClient;
use crate::refusal::{self, RefusalAnalysis};
use crate::response_cleaner;
use ai_plane_core::observability::metrics;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone)]
pub struct Issue {
    pub issue_type: String,
    pub severity: Severity,
    pub description: String,
    pub solution: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub is_refusal: bool,
    pub refusal_analysis: Option<RefusalAnalysis>,
    pub cleaned_response: String,
    pub issues: Vec<Issue>,
    pub processing_time: std::time::Duration,
}

fn severity_label(s: Severity) -> &'static str {
    match s {
        Severity::Low => "low",
        Severity::Medium => "medium",
        Severity::High => "high",
        Severity::Critical => "critical",
    }
}

fn push_issue(issues: &mut Vec<Issue>, issue_type: &str, severity: Severity, description: impl Into<String>) {
    metrics()
        .validation_issues_total
        .add(1, &[opentelemetry::KeyValue::new("severity", severity_label(severity))]);
    issues.push(Issue {
        issue_type: issue_type.to_string(),
        severity,
        description: description.into(),
        solution: None,
    });
}

static REPEATED_TRIGRAM: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S+\s+\S+\s+\S+").unwrap());
const OFF_TOPIC_MARKERS: &[&str] = &["as a language model", "i do not have access", "cannot browse the internet"];
const TRUNCATION_MARKERS: &[&str] = &["...", "etc.", "truncated", "[continued]"];

fn basic_checks(text: &str, issues: &mut Vec<Issue>) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        push_issue(issues, "empty_response", Severity::Critical, "response is empty or whitespace-only");
        return false;
    }
    if trimmed.len() < 20 {
        push_issue(issues, "too_short", Severity::High, "response is implausibly short");
    }
    if trimmed.len() > 10_000 {
        push_issue(issues, "too_long", Severity::Medium, "response exceeds the expected length");
    }
    true
}

fn quality_checks(text: &str, issues: &mut Vec<Issue>) {
    let mut trigram_counts = std::collections::HashMap::new();
    for window in REPEATED_TRIGRAM.find_iter(text) {
        *trigram_counts.entry(window.as_str().to_string()).or_insert(0) += 1;
    }
    if trigram_counts.values().any(|&count| count > 2) {
        push_issue(
            issues,
            "repetition",
            Severity::Medium,
            "a 3-gram phrase repeats more than twice",
        );
    }

    let lowered = text.to_lowercase();
    let has_truncation_marker = TRUNCATION_MARKERS.iter().any(|m| lowered.contains(m));
    let ends_cleanly = text
        .trim_end()
        .chars()
        .last()
        .map(|c| matches!(c, '.' | '}' | ']'))
        .unwrap_or(false);
    if has_truncation_marker || !ends_cleanly {
        push_issue(
            issues,
            "possibly_truncated",
            Severity::Medium,
            "response shows signs of truncation or an abrupt ending",
        );
    }

    if OFF_TOPIC_MARKERS.iter().any(|m| lowered.contains(m)) {
        push_issue(issues, "off_topic", Severity::High, "response contains off-topic disclaimers");
    }
}

/// Run the full basic/refusal/clean/JSON/quality pipeline.
pub async fn validate_response(
    provider: &ProviderClient,
    refusal_probe_model: &str,
    text: &str,
) -> ValidationResult {
    let start = Instant::now();
    let mut issues = Vec::new();

    let passed_basic = basic_checks(text, &mut issues);
    if !passed_basic {
        return ValidationResult {
            is_valid: false,
            is_refusal: false,
            refusal_analysis: None,
            cleaned_response: String::new(),
            issues,
            processing_time: start.elapsed(),
        };
    }

    let refusal_analysis =
        refusal::detect_refusal_with_fallback(provider, refusal_probe_model, text).await;
    let is_refusal = refusal_analysis.is_refusal;
    if is_refusal {
        push_issue(
            &mut issues,
            "refusal",
            Severity::Critical,
            format!("model refused the request: {}", refusal_analysis.reason),
        );
        for suggestion in &refusal_analysis.suggestions {
            issues.last_mut().unwrap().solution = Some(suggestion.clone());
        }
    }

    let cleaned_response = match response_cleaner::clean_and_validate_json(text) {
        Ok(cleaned) => cleaned,
        Err(err) => {
            push_issue(
                &mut issues,
                "json_cleanup_failed",
                Severity::High,
                format!("best-effort cleanup did not produce valid JSON: {}", err.message),
            );
            response_cleaner::clean_json_response(text)
        }
    };

    match serde_json::from_str::<serde_json::Value>(&cleaned_response) {
        Ok(serde_json::Value::Object(_)) => {}
        Ok(_) => push_issue(
            &mut issues,
            "not_a_json_object",
            Severity::High,
            "cleaned response parses but is not a JSON object",
        ),
        Err(_) => push_issue(
            &mut issues,
            "invalid_json",
            Severity::High,
            "cleaned response does not parse as JSON",
        ),
    }

    quality_checks(text, &mut issues);

    let high_count = issues.iter().filter(|i| i.severity == Severity::High).count();
    let has_critical = issues.iter().any(|i| i.severity == Severity::Critical);
    let is_valid = !has_critical && !is_refusal && high_count <= 2;

    ValidationResult {
        is_valid,
        is_refusal,
        refusal_analysis: Some(refusal_analysis),
        cleaned_response,
        issues,
        processing_time: start.elapsed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_checks_flag_empty_text() {
        let mut issues = Vec::new();
        let passed = basic_checks("   ", &mut issues);
        assert!(!passed);
        assert_eq!(issues[0].severity, Severity::Critical);
    }

    #[test]
    fn basic_checks_flag_short_text() {
        let mut issues = Vec::new();
        let passed = basic_checks("too short", &mut issues);
        assert!(passed);
        assert!(issues.iter().any(|i| i.issue_type == "too_short"));
    }

    #[test]
    fn quality_checks_flag_repeated_phrase() {
        let mut issues = Vec::new();
        let text = "lorem ipsum dolor lorem ipsum dolor lorem ipsum dolor sit amet consectetur";
        quality_checks(text, &mut issues);
        assert!(issues.iter().any(|i| i.issue_type == "repetition"));
    }

    #[test]
    fn overall_validity_rule_matches_spec() {
        // no critical, not refusal, <=2 high -> valid
        let issues = vec![
            Issue { issue_type: "a".into(), severity: Severity::High, description: "".into(), solution: None },
            Issue { issue_type: "b".into(), severity: Severity::High, description: "".into(), solution: None },
        ];
        let high_count = issues.iter().filter(|i| i.severity == Severity::High).count();
        let has_critical = issues.iter().any(|i| i.severity == Severity::Critical);
        assert!(!has_critical && high_count <= 2);
    }
}
