use serde::{Deserialize, Serialize};

/// Zero-, two-, or four-LLM-call complexity tier a message is routed
/// through. See [`crate::classifier::classify_complexity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Fast,
    Standard,
    Deep,
}

/// Stream 1: what the user is saying right now.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PresentStream {
    pub raw_message: String,
    pub sentiment: String,
    pub intent: String,
    pub topics: Vec<String>,
    pub claims: Vec<String>,
    pub emotional_state: String,
    pub conversational_pattern: String,
}

impl PresentStream {
    pub fn new(raw_message: impl Into<String>) -> Self {
        Self {
            raw_message: raw_message.into(),
            sentiment: "neutral".to_string(),
            intent: "statement".to_string(),
            topics: Vec::new(),
            claims: Vec::new(),
            emotional_state: "calm".to_string(),
            conversational_pattern: "single_turn".to_string(),
        }
    }
}

/// Stream 2: what is known from memory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryStream {
    pub relevant_facts: Vec<String>,
    pub relationship_context: String,
    pub graph_connections: String,
    pub contradictions: Vec<String>,
}

/// Result of merging the present and memory streams — the "inner
/// monologue" injected into the system prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CognitiveMerge {
    pub thought: String,
    pub tension_level: f32,
    pub tension_type: String,
    pub response_strategy: String,
    pub memory_insights: Vec<String>,
    pub suggested_tone: String,
    pub inner_monologue: String,
    pub contradictions: Vec<String>,
}

impl Default for CognitiveMerge {
    fn default() -> Self {
        Self {
            thought: String::new(),
            tension_level: 0.0,
            tension_type: "none".to_string(),
            response_strategy: "acknowledge".to_string(),
            memory_insights: Vec::new(),
            suggested_tone: "warm".to_string(),
            inner_monologue: String::new(),
            contradictions: Vec::new(),
        }
    }
}

/// A turn of conversation history fed into present-stream analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub role: String,
    pub content: String,
}
