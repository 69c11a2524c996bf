//! Tolerant JSON extraction from model output
//!
//! Models wrap JSON in code fences, leave trailing commas, add `//`
//! comments, or put raw newlines inside strings. Each repair is tried in
//! turn until something parses.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[A-Za-z]*\s*(.*?)```").expect("fenced block regex is valid"));

static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",(\s*[}\]])").expect("trailing comma regex is valid"));

static LINE_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?m)(^|[,{\[\s])//[^"\n]*$"#).expect("line comment regex is valid"));

/// Pull the body of the first fenced block that looks like JSON
fn unfence(content: &str) -> &str {
    FENCED_BLOCK
        .captures_iter(content)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .find(|body| body.starts_with('{') || body.starts_with('['))
        .unwrap_or(content.trim())
}

fn scrub(content: &str) -> String {
    let without_comments = LINE_COMMENT.replace_all(content, "$1");
    TRAILING_COMMA.replace_all(&without_comments, "$1").into_owned()
}

/// Replace raw control characters with spaces
fn flatten_controls(content: &str) -> String {
    content.chars().map(|c| if c.is_control() { ' ' } else { c }).collect()
}

/// Outermost `{...}` span
fn outer_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (end > start).then(|| &content[start..=end])
}

/// Parse a JSON value out of free-form model output
pub fn extract_json(content: &str) -> Result<Value, String> {
    debug!(len = content.len(), "extract_json: called");
    let body = scrub(unfence(content));

    let first_error = match serde_json::from_str::<Value>(&body) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    let flattened = flatten_controls(&body);
    if let Ok(value) = serde_json::from_str::<Value>(&flattened) {
        debug!("extract_json: parsed after flattening control characters");
        return Ok(value);
    }

    if let Some(object) = outer_object(&flattened)
        && let Ok(value) = serde_json::from_str::<Value>(object)
    {
        debug!("extract_json: parsed outermost object");
        return Ok(value);
    }

    Err(format!("response is not valid JSON: {}", first_error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_json() {
        assert_eq!(extract_json(r#"{"a": 1}"#).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_fenced_json() {
        let content = "Here you go:\n```json\n{\"ids\": [\"a1\", \"a2\"]}\n```\nEnjoy!";
        assert_eq!(extract_json(content).unwrap(), json!({"ids": ["a1", "a2"]}));
    }

    #[test]
    fn test_plain_fence_skips_non_json_blocks() {
        let content = "```\nnot json\n```\n```\n[1, 2]\n```";
        assert_eq!(extract_json(content).unwrap(), json!([1, 2]));
    }

    #[test]
    fn test_trailing_commas_and_comments() {
        let content = "{\n  \"a\": 1, // the first\n  \"b\": [1, 2,],\n}";
        assert_eq!(extract_json(content).unwrap(), json!({"a": 1, "b": [1, 2]}));
    }

    #[test]
    fn test_urls_inside_strings_survive() {
        let content = r#"{"url": "https://example.com/x"}"#;
        assert_eq!(extract_json(content).unwrap(), json!({"url": "https://example.com/x"}));
    }

    #[test]
    fn test_raw_newline_inside_string() {
        let content = "{\"story\": \"line one\nline two\"}";
        assert_eq!(extract_json(content).unwrap(), json!({"story": "line one line two"}));
    }

    #[test]
    fn test_prose_around_object() {
        let content = "Sure! {\"fits\": true} Let me know.";
        assert_eq!(extract_json(content).unwrap(), json!({"fits": true}));
    }

    #[test]
    fn test_garbage_is_error() {
        assert!(extract_json("I cannot help with that").is_err());
    }
}
