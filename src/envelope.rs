//! The fixed textual envelope carried inside text-typed content blocks.
//!
//! Every worker tool result travels as text: a `RESULT_JSON:` marker line
//! followed by a fenced JSON block on success, or a single `ERROR: <message>`
//! line on failure. Consumers that only understand text keep working, while
//! the bridge recovers the structured payload with a best-effort extraction
//! chain. The envelope is a compatibility contract; do not change it without
//! versioning the protocol.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{json, Value};

/// Marker line preceding the fenced JSON payload.
pub const RESULT_MARKER: &str = "RESULT_JSON:";

/// Prefix of the error sentinel line.
pub const ERROR_PREFIX: &str = "ERROR: ";

/// Character cap applied to logged payloads.
pub const LOG_PEEK_CHARS: usize = 900;

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)```json\s*(.*?)```").expect("valid fence regex"))
}

/// Wrap a structured payload in the marker-plus-fence envelope.
pub fn wrap_json(value: &Value) -> String {
    let pretty = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    format!("{RESULT_MARKER}\n```json\n{pretty}\n```")
}

/// Render an error message in sentinel form.
pub fn error_sentinel(message: &str) -> String {
    format!("{ERROR_PREFIX}{message}")
}

/// Strip the sentinel prefix from an error payload, if present.
pub fn strip_error_sentinel(text: &str) -> &str {
    text.strip_prefix(ERROR_PREFIX).unwrap_or(text).trim()
}

/// Try to recover a JSON value embedded in free-form text.
///
/// Scans for a fenced ```json block first (case-insensitive), then attempts
/// to parse the whole text as bare JSON. Returns `None` when neither works.
pub fn extract_json(text: &str) -> Option<Value> {
    if text.is_empty() {
        return None;
    }
    if let Some(caps) = fence_re().captures(text) {
        if let Ok(v) = serde_json::from_str::<Value>(caps[1].trim()) {
            return Some(v);
        }
    }
    serde_json::from_str::<Value>(text.trim()).ok()
}

/// Extraction chain terminal: opaque text is a legitimate outcome, not an
/// error, so it is wrapped as `{"text": <raw>}`.
pub fn extract_or_wrap(text: &str) -> Value {
    extract_json(text).unwrap_or_else(|| json!({ "text": text }))
}

/// Truncate a string for logging, appending an ellipsis and the number of
/// characters dropped. Logging must never balloon on large payloads.
pub fn peek(s: &str) -> String {
    let total = s.chars().count();
    if total <= LOG_PEEK_CHARS {
        return s.to_string();
    }
    let head: String = s.chars().take(LOG_PEEK_CHARS).collect();
    format!("{}…(+{} chars)", head, total - LOG_PEEK_CHARS)
}

/// Truncated single-line rendering of a JSON value for logging.
pub fn peek_value(v: &Value) -> String {
    peek(&v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn wrap_then_extract_round_trips() {
        let payload = json!({
            "output": {
                "inventory": [{ "url": "https://a.example/", "depth": 0 }],
                "stats": { "pages": 1 }
            }
        });
        let wrapped = wrap_json(&payload);
        assert!(wrapped.starts_with(RESULT_MARKER));
        assert_eq!(extract_json(&wrapped), Some(payload));
    }

    #[test]
    fn fence_marker_is_case_insensitive() {
        let text = "RESULT_JSON:\n```JSON\n{\"a\": 1}\n```";
        assert_eq!(extract_json(text), Some(json!({ "a": 1 })));
    }

    #[test]
    fn bare_json_parses_without_fence() {
        assert_eq!(extract_json("{\"ok\": true}"), Some(json!({ "ok": true })));
    }

    #[test]
    fn opaque_text_is_wrapped_not_rejected() {
        let v = extract_or_wrap("plain prose, no JSON here");
        assert_eq!(v, json!({ "text": "plain prose, no JSON here" }));
    }

    #[test]
    fn malformed_fence_falls_through_to_wrapper() {
        let v = extract_or_wrap("```json\n{not valid\n```");
        assert_eq!(v["text"], json!("```json\n{not valid\n```"));
    }

    #[test]
    fn error_sentinel_round_trips() {
        let s = error_sentinel("timeout");
        assert_eq!(s, "ERROR: timeout");
        assert_eq!(strip_error_sentinel(&s), "timeout");
        assert_eq!(strip_error_sentinel("plain failure"), "plain failure");
    }

    #[test]
    fn peek_caps_long_payloads() {
        let s = "x".repeat(LOG_PEEK_CHARS + 50);
        let p = peek(&s);
        assert!(p.ends_with("…(+50 chars)"));
        assert!(p.chars().count() < s.chars().count());
        assert_eq!(peek("short"), "short");
    }
}
