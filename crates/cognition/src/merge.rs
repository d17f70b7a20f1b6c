//! Merge stage: compares the present stream against recalled memory and
//! produces the inner monologue injected into the system prompt. The deep
//! path adds a chain-of-thought instruction block the standard path omits.

use gw_llm::{ChatRequest, Router, RoutingLabel};
use tracing::warn;

use crate::types::{CognitiveMerge, MemoryStream, PresentStream};

pub async fn merge_streams(
    router: &Router,
    present: &PresentStream,
    memory: &MemoryStream,
    trajectory_summary: &str,
    use_cot: bool,
) -> CognitiveMerge {
    let mut merge = CognitiveMerge::default();

    let trajectory_section = if trajectory_summary.is_empty() {
        String::new()
    } else {
        format!("\n{trajectory_summary}\n")
    };

    let (thought_schema, cot_instruction) = if use_cot {
        (
            r#"  "thought": "Step-by-step reasoning about contradictions and emotional state (2-3 sentences),""#,
            "\nINSTRUCTIONS:\n1. First, think step by step about whether the user's claims contradict any memories\n2. Then decide your response strategy\n",
        )
    } else {
        (r#"  "thought": "","#, "")
    };

    let relevant_facts: Vec<&String> = memory.relevant_facts.iter().take(5).collect();
    let relationship = if memory.relationship_context.is_empty() {
        "None".to_string()
    } else {
        truncate(&memory.relationship_context, 400).to_string()
    };

    let prompt = format!(
        r#"You are the inner thinking process of a close friend AI.

WHAT THEY JUST SAID:
  Message: "{}"
  Intent: {}
  Claims: {}
  Emotional state: {}
  Conversational pattern: {}

WHAT I KNOW FROM MEMORY:
  Past facts: {}
  Relationship: {}
{}{}
Return JSON only:
{{
{}
  "tension_level": 0.0 to 1.0,
  "tension_type": "none|mild_inconsistency|pattern_break|direct_contradiction|growth",
  "contradictions": ["list contradictions"],
  "response_strategy": "acknowledge|challenge|support|redirect|quiz|celebrate",
  "suggested_tone": "warm|playful|concerned|firm|proud|teasing",
  "inner_monologue": "1-2 sentences of what you're THINKING (not saying)"
}}

JSON only:"#,
        present.raw_message,
        present.intent,
        serde_json::to_string(&present.claims).unwrap_or_default(),
        present.emotional_state,
        present.conversational_pattern,
        serde_json::to_string(&relevant_facts).unwrap_or_default(),
        relationship,
        trajectory_section,
        cot_instruction,
        thought_schema,
    );

    let mut req = ChatRequest::new(router.model_for(RoutingLabel::Review), "You are an inner-thought reasoning process.").with_user(&prompt);
    req.temperature = 0.3;
    req.max_tokens = if use_cot { 500 } else { 400 };

    match router.chat(&req).await {
        Ok(resp) => {
            if let Some(data) = gw_llm::extract_json(&resp.content) {
                merge.thought = data.get("thought").and_then(|v| v.as_str()).unwrap_or("").to_string();
                merge.tension_level = data.get("tension_level").and_then(|v| v.as_f64()).unwrap_or(0.0) as f32;
                merge.tension_type = data
                    .get("tension_type")
                    .and_then(|v| v.as_str())
                    .unwrap_or("none")
                    .to_string();
                merge.contradictions = data
                    .get("contradictions")
                    .and_then(|v| v.as_array())
                    .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
                    .unwrap_or_default();
                merge.response_strategy = data
                    .get("response_strategy")
                    .and_then(|v| v.as_str())
                    .unwrap_or("acknowledge")
                    .to_string();
                merge.suggested_tone = data
                    .get("suggested_tone")
                    .and_then(|v| v.as_str())
                    .unwrap_or("warm")
                    .to_string();
                merge.inner_monologue = data
                    .get("inner_monologue")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string();
                merge.memory_insights = memory.relevant_facts.iter().take(3).cloned().collect();
            }
        }
        Err(e) => warn!(error = %e, "cognitive merge failed"),
    }

    merge
}

/// Pre-retrieval intent extraction for the deep path: asks the model what
/// specific topics the user is referring to, to target the memory query
/// more narrowly than the raw message would.
pub async fn extract_search_intent(router: &Router, message: &str, history: &[crate::types::HistoryTurn]) -> String {
    let recent = history
        .iter()
        .rev()
        .take(3)
        .rev()
        .map(|m| format!("{}: {}", m.role, truncate(&m.content, 80)))
        .collect::<Vec<_>>()
        .join("\n");

    let prompt = format!(
        "What specific topics/events is the user referring to?\nRecent conversation:\n{recent}\nMessage: \"{message}\"\nReturn 1-3 specific search terms as JSON array. JSON only:"
    );

    let mut req = ChatRequest::new(router.model_for(RoutingLabel::Casual), "You extract search terms from messages.").with_user(&prompt);
    req.temperature = 0.0;
    req.max_tokens = 100;

    match router.chat(&req).await {
        Ok(resp) => gw_llm::extract_json(&resp.content)
            .and_then(|v| v.as_array().cloned())
            .map(|arr| {
                arr.iter()
                    .take(3)
                    .filter_map(|v| v.as_str())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default(),
        Err(e) => {
            warn!(error = %e, "search intent extraction failed");
            String::new()
        }
    }
}

/// Render the merge as the system-prompt cognitive injection.
pub fn build_cognitive_context(merge: &CognitiveMerge) -> String {
    let insights = if merge.memory_insights.is_empty() {
        "- None".to_string()
    } else {
        merge
            .memory_insights
            .iter()
            .take(3)
            .map(|m| format!("- {}", truncate(m, 120)))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let contradictions = if merge.contradictions.is_empty() {
        "- None".to_string()
    } else {
        merge.contradictions.iter().map(|c| format!("- {c}")).collect::<Vec<_>>().join("\n")
    };

    format!(
        r#"

## YOUR INNER THOUGHTS (Use these to guide your response. Do NOT share directly.)

**What I'm thinking:** {}

**Tension Level:** {:.1}/1.0 ({})
**Response Strategy:** {}
**Suggested Tone:** {}

**Memory Insights:**
{}

**Contradictions Detected:**
{}

**BEHAVIORAL RULES:**
- If tension > 0.5: Don't just agree. Challenge gently with memory evidence.
- If strategy is "quiz": Ask them to prove their claim.
- If strategy is "celebrate": They've genuinely grown. Be proud.
- NEVER say "I checked my memory." Make it feel like a friend who remembers.
"#,
        merge.inner_monologue, merge.tension_level, merge.tension_type, merge.response_strategy, merge.suggested_tone, insights, contradictions,
    )
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
    fn context_renders_tension_and_insights() {
        let mut merge = CognitiveMerge::default();
        merge.inner_monologue = "They seem tense about work.".to_string();
        merge.tension_level = 0.7;
        merge.tension_type = "pattern_break".to_string();
        merge.memory_insights = vec!["mentioned a deadline last week".to_string()];

        let ctx = build_cognitive_context(&merge);
        assert!(ctx.contains("0.7/1.0"));
        assert!(ctx.contains("mentioned a deadline"));
    }

    #[test]
    fn context_handles_empty_insights_and_contradictions() {
        let merge = CognitiveMerge::default();
        let ctx = build_cognitive_context(&merge);
        assert!(ctx.contains("- None"));
    }
}
