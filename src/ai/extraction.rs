//! Structural JSON Extraction
//!
//! Model responses wrap their JSON payload in prose, markdown fences, or
//! both. The raw text is scanned for a fenced code block first, then for
//! the bracket-delimited array or brace-delimited object - whichever opens
//! earliest in the text; the first candidate that parses wins. Each
//! strategy is independently testable.
//!
//! Absent or malformed JSON is a typed Parse failure, charged against the
//! calling attempt's retry budget - never a generic panic.

use serde_json::Value;
use tracing::debug;

use crate::types::CompletionError;

/// Extract the first parseable JSON payload from raw model output
pub fn extract_json(raw: &str) -> Result<Value, CompletionError> {
    // The delimiter that opens earliest is the outer structure: a bare
    // object with a nested array must yield the object, not the array.
    let array = find_delimited(raw, '[', ']');
    let object = find_delimited(raw, '{', '}');
    let (first, second) = match (raw.find('['), raw.find('{')) {
        (Some(bracket), Some(brace)) if brace < bracket => (object, array),
        _ => (array, object),
    };

    let candidates = [find_fenced_block(raw), first, second];

    for candidate in candidates.into_iter().flatten() {
        match serde_json::from_str(candidate) {
            Ok(value) => return Ok(value),
            Err(e) => debug!(error = %e, "Extraction candidate failed to parse, trying next"),
        }
    }

    Err(CompletionError::parse(format!(
        "no parseable JSON in model output. Preview: {}...",
        raw.chars().take(200).collect::<String>()
    )))
}

/// Content of the first markdown code fence, language tag stripped
pub fn find_fenced_block(raw: &str) -> Option<&str> {
    let start = raw.find("```")?;
    let after_fence = &raw[start + 3..];
    // Skip the optional language tag line (```json)
    let body_start = after_fence.find('\n')? + 1;
    let body = &after_fence[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

/// First balanced `open`..`close` span, string-literal aware
///
/// Depth counting ignores delimiters inside JSON string literals so an
/// option text containing "[citation]" does not truncate the span.
pub fn find_delimited(raw: &str, open: char, close: char) -> Option<&str> {
    let start = raw.find(open)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in raw[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            c if c == open && !in_string => depth += 1,
            c if c == close && !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_block() {
        let raw = "Here you go:\n```json\n[{\"a\": 1}]\n```\nEnjoy!";
        assert_eq!(find_fenced_block(raw), Some("[{\"a\": 1}]"));
    }

    #[test]
    fn test_fenced_block_no_language_tag() {
        let raw = "```\n{\"a\": 1}\n```";
        assert_eq!(find_fenced_block(raw), Some("{\"a\": 1}"));
    }

    #[test]
    fn test_fenced_block_absent() {
        assert_eq!(find_fenced_block("plain text"), None);
        assert_eq!(find_fenced_block("``` unterminated"), None);
    }

    #[test]
    fn test_delimited_array() {
        let raw = "The questions are: [1, [2, 3], 4] and that's all.";
        assert_eq!(find_delimited(raw, '[', ']'), Some("[1, [2, 3], 4]"));
    }

    #[test]
    fn test_delimited_object() {
        let raw = "prefix {\"a\": {\"b\": 2}} suffix";
        assert_eq!(find_delimited(raw, '{', '}'), Some("{\"a\": {\"b\": 2}}"));
    }

    #[test]
    fn test_delimited_ignores_brackets_in_strings() {
        let raw = r#"[{"text": "pick [one] option"}]"#;
        assert_eq!(find_delimited(raw, '[', ']'), Some(raw));
    }

    #[test]
    fn test_delimited_handles_escaped_quotes() {
        let raw = r#"{"text": "she said \"hi [there]\""}"#;
        assert_eq!(find_delimited(raw, '{', '}'), Some(raw));
    }

    #[test]
    fn test_extract_prefers_fence() {
        let raw = "ignore [9, 9] this\n```json\n[1, 2]\n```";
        let value = extract_json(raw).unwrap();
        assert_eq!(value, serde_json::json!([1, 2]));
    }

    #[test]
    fn test_extract_array_without_fence() {
        let raw = "Sure! Here are the items: [1, 2, 3]. Anything else?";
        let value = extract_json(raw).unwrap();
        assert_eq!(value, serde_json::json!([1, 2, 3]));
    }

    #[test]
    fn test_extract_object_fallback() {
        let raw = "map: {\"topic\": \"rust\"} done";
        let value = extract_json(raw).unwrap();
        assert_eq!(value, serde_json::json!({"topic": "rust"}));
    }

    #[test]
    fn test_extract_bad_fence_falls_through_to_array() {
        let raw = "```json\nnot json at all\n```\nbut see [1, 2]";
        let value = extract_json(raw).unwrap();
        assert_eq!(value, serde_json::json!([1, 2]));
    }

    #[test]
    fn test_extract_unfenced_object_with_nested_array() {
        let raw = r#"Here is the map: {"title": "Rust", "summary": "The language", "children": [{"title": "Ownership", "children": []}]}"#;
        let value = extract_json(raw).unwrap();
        assert_eq!(value["title"], "Rust");
        assert_eq!(value["children"][0]["title"], "Ownership");
    }

    #[test]
    fn test_extract_unfenced_array_with_nested_object() {
        let raw = r#"Items: [{"text": "q1"}, {"text": "q2"}] as requested."#;
        let value = extract_json(raw).unwrap();
        assert!(value.is_array());
        assert_eq!(value[1]["text"], "q2");
    }

    #[test]
    fn test_extract_failure_is_parse_error() {
        let err = extract_json("no structure here at all").unwrap_err();
        assert_eq!(err.kind, crate::types::CompletionErrorKind::Parse);
        assert!(err.message.contains("no parseable JSON"));
    }
}
