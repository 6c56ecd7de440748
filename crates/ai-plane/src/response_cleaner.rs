//! C2 — response cleaner: recover valid JSON from markdown-wrapped,
//! quote-mangled, or trailing-comma-afflicted model output.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("model output could not be coerced into valid JSON: {message}")]
pub struct JsonValidationError {
    pub original: String,
    pub cleaned: String,
    pub message: String,
}

static FENCE_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*```[A-Za-z0-9_-]*\s*\n?").unwrap());
static FENCE_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n?\s*```\s*$").unwrap());
static BOLD_ITALIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*{1,2}([^*\n]+)\*{1,2}").unwrap());
static BARE_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([\{,]\s*)([A-Za-z_][A-Za-z0-9_]*)(\s*:)"#).unwrap());
static TRAILING_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r",(\s*[}\]])").unwrap());

/// Find the first balanced top-level `{ ... }` object, ignoring braces
/// that occur inside string literals.
fn extract_balanced_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let bytes = s.as_bytes();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Pure transformation pipeline. Deterministic: always produces the
/// same output for the same input.
pub fn clean_json_response(raw: &str) -> String {
    let mut text = raw.trim().to_string();

    text = FENCE_OPEN.replace(&text, "").to_string();
    text = FENCE_CLOSE.replace(&text, "").to_string();
    text = text.trim().to_string();

    text = text.replace('`', "\"").replace('\'', "\"");
    text = BOLD_ITALIC.replace_all(&text, "\"$1\"").to_string();

    if let Some(balanced) = extract_balanced_object(&text) {
        text = balanced.to_string();
    }

    if serde_json::from_str::<serde_json::Value>(&text).is_ok() {
        return text;
    }

    text = TRAILING_COMMA.replace_all(&text, "$1").to_string();
    text = BARE_KEY.replace_all(&text, "$1\"$2\"$3").to_string();
    text = text.replace('\'', "\"");

    if let Some(brace) = text.find('{') {
        text = text[brace..].to_string();
    }

    text
}

/// Clean, then verify the result parses as JSON.
pub fn clean_and_validate_json(raw: &str) -> Result<String, JsonValidationError> {
    let cleaned = clean_json_response(raw);
    match serde_json::from_str::<serde_json::Value>(&cleaned) {
        Ok(_) => Ok(cleaned),
        Err(e) => Err(JsonValidationError {
            original: raw.to_string(),
            cleaned,
            message: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotent_on_any_input() {
        let inputs = [
            "```json\n{\"a\": 1}\n```",
            "{'a': 1,}",
            "prefix noise {\"a\": \"b\"} suffix",
            "not json at all",
        ];
        for input in inputs {
            let once = clean_json_response(input);
            let twice = clean_json_response(&once);
            assert_eq!(once, twice, "not idempotent for input: {input}");
        }
    }

    #[test]
    fn preserves_already_valid_json() {
        let valid = r#"{"a":1,"b":"two"}"#;
        assert_eq!(clean_json_response(valid), valid);
    }

    #[test]
    fn strips_fenced_block() {
        let raw = "```json\n{\"a\": 1}\n```";
        let cleaned = clean_json_response(raw);
        assert_eq!(cleaned, r#"{"a": 1}"#);
    }

    #[test]
    fn fixes_trailing_comma() {
        let raw = r#"{"a": 1, "b": 2,}"#;
        let cleaned = clean_and_validate_json(raw).unwrap();
        let value: serde_json::Value = serde_json::from_str(&cleaned).unwrap();
        assert_eq!(value["a"], 1);
        assert_eq!(value["b"], 2);
    }

    #[test]
    fn quotes_bare_keys() {
        let raw = "{a: 1, b: \"two\"}";
        let cleaned = clean_and_validate_json(raw).unwrap();
        let value: serde_json::Value = serde_json::from_str(&cleaned).unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn extracts_balanced_object_from_surrounding_prose() {
        let raw = "Sure, here is the JSON: {\"a\": 1} Hope that helps!";
        let cleaned = clean_json_response(raw);
        assert_eq!(cleaned, r#"{"a": 1}"#);
    }

    #[test]
    fn reports_validation_error_when_unrecoverable() {
        let raw = "this is not json and has no braces at all";
        let err = clean_and_validate_json(raw).unwrap_err();
        assert_eq!(err.original, raw);
    }
}
