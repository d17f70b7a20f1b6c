//! Defensive JSON extraction for LLM responses that are supposed to be pure
//! JSON but, in practice, come wrapped in reasoning preambles, `[THINKING]`
//! blocks, or markdown code fences. Shared by every call site that asks the
//! model for a structured answer (cognition's present/merge/search-intent
//! calls, memory's LLM-graded importance score) so the stripping logic lives
//! in exactly one place.

/// Strip common LLM wrapper noise and parse the first JSON object or array
/// found in `text`. Returns `None` if no balanced `{...}`/`[...]` region
/// parses as valid JSON.
pub fn extract_json(text: &str) -> Option<serde_json::Value> {
    let cleaned = strip_wrappers(text);

    if let Some(obj) = extract_delimited(&cleaned, '{', '}') {
        if let Ok(v) = serde_json::from_str(&obj) {
            return Some(v);
        }
    }
    if let Some(arr) = extract_delimited(&cleaned, '[', ']') {
        if let Ok(v) = serde_json::from_str(&arr) {
            return Some(v);
        }
    }
    None
}

/// Same as [`extract_json`] but deserializes straight into `T`, returning
/// `default` when extraction or deserialization fails — the caller never has
/// to branch on malformed LLM output.
pub fn extract_or_default<T: serde::de::DeserializeOwned>(text: &str, default: T) -> T {
    extract_json(text)
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or(default)
}

fn strip_wrappers(text: &str) -> String {
    let mut s = text.trim();

    if let Some(start) = s.find("[THINKING]") {
        if let Some(end) = s.find("[/THINKING]") {
            if end > start {
                let before = &s[..start];
                let after = &s[end + "[/THINKING]".len()..];
                return format!("{}{}", before, after).trim().to_string();
            }
        }
    }

    if s.starts_with("```") {
        if let Some(first_newline) = s.find('\n') {
            s = &s[first_newline + 1..];
        }
        if let Some(fence_end) = s.rfind("```") {
            s = &s[..fence_end];
        }
    }

    s.trim().to_string()
}

/// Find the outermost balanced `open`..`close` region — i.e. the first
/// `open` to the last matching `close` — and return its substring.
fn extract_delimited(s: &str, open: char, close: char) -> Option<String> {
    let start = s.find(open)?;
    let end = s.rfind(close)?;
    if end < start {
        return None;
    }
    Some(s[start..=end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_plain_json_object() {
        let v = extract_json(r#"{"a": 1}"#).unwrap();
        assert_eq!(v["a"], 1);
    }

    #[test]
    fn strips_code_fence() {
        let v = extract_json("```json\n{\"a\": 1}\n```").unwrap();
        assert_eq!(v["a"], 1);
    }

    #[test]
    fn strips_thinking_block() {
        let v = extract_json("[THINKING]reasoning here[/THINKING]\n{\"a\": 2}").unwrap();
        assert_eq!(v["a"], 2);
    }

    #[test]
    fn handles_preamble_text() {
        let v = extract_json("Sure, here's the analysis: {\"sentiment\": \"positive\"} hope that helps").unwrap();
        assert_eq!(v["sentiment"], "positive");
    }

    #[test]
    fn returns_none_for_non_json() {
        assert!(extract_json("no json here at all").is_none());
    }

    #[test]
    fn extract_or_default_falls_back() {
        let v: Vec<String> = extract_or_default("not json", vec!["fallback".to_string()]);
        assert_eq!(v, vec!["fallback".to_string()]);
    }
}
