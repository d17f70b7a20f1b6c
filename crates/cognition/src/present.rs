//! Stream 1: analyze the current message in the context of recent turns.

use gw_llm::{ChatRequest, Router, RoutingLabel};
use tracing::warn;

use crate::types::{HistoryTurn, PresentStream};

pub async fn analyze_present(router: &Router, message: &str, history: Option<&[HistoryTurn]>) -> PresentStream {
    let mut present = PresentStream::new(message);

    let recent_context = history
        .map(|h| {
            h.iter()
                .rev()
                .take(3)
                .rev()
                .map(|m| format!("{}: {}", m.role, truncate(&m.content, 100)))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default();

    let prompt = format!(
        r#"Analyze this message IN CONTEXT. Return JSON only.

Recent conversation:
{}

Current message: "{}"

Return:
{{
  "sentiment": "positive|negative|neutral",
  "intent": "question|statement|request|venting|bragging|deflecting",
  "claims": ["factual claims user is making"],
  "emotional_state": "calm|excited|defensive|vulnerable|evasive|guilty",
  "topics": ["key topics"],
  "conversational_pattern": "single_turn|continuation|topic_shift|callback|escalation"
}}

JSON only:"#,
        if recent_context.is_empty() { "(no prior context)" } else { &recent_context },
        message,
    );

    let mut req = ChatRequest::new(router.model_for(RoutingLabel::Analysis), "You analyze conversational messages.").with_user(&prompt);
    req.temperature = 0.1;
    req.max_tokens = 300;

    match router.chat(&req).await {
        Ok(resp) => {
            if let Some(data) = gw_llm::extract_json(&resp.content) {
                present.sentiment = field_str(&data, "sentiment", "neutral");
                present.intent = field_str(&data, "intent", "statement");
                present.emotional_state = field_str(&data, "emotional_state", "calm");
                present.conversational_pattern = field_str(&data, "conversational_pattern", "single_turn");
                present.claims = field_str_list(&data, "claims");
                present.topics = field_str_list(&data, "topics");
            }
        }
        Err(e) => warn!(error = %e, "present stream analysis failed"),
    }

    present
}

fn field_str(data: &serde_json::Value, key: &str, default: &str) -> String {
    data.get(key).and_then(|v| v.as_str()).unwrap_or(default).to_string()
}

fn field_str_list(data: &serde_json::Value, key: &str) -> Vec<String> {
    data.get(key)
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
        .unwrap_or_default()
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("hello world", 5), "hello");
        assert_eq!(truncate("hi", 10), "hi");
    }
}
