//! Zero-LLM complexity triage, a direct port of `classify_complexity` —
//! decides how many cognition LLM calls a message is worth before spending
//! any of them.

use crate::types::{Complexity, HistoryTurn};

const CONTRADICTION_MARKERS: &[&str] = &[
    "but", "however", "actually", "didn't", "never", "that's not", "i don't think", "you're wrong",
];
const EMOTIONAL_MARKERS: &[&str] = &[
    "help", "stuck", "frustrated", "can't", "failed", "stressed", "scared", "angry", "depressed",
    "crying",
];
const AMBIGUITY_MARKERS: &[&str] = &["that thing", "what we", "you know", "remember when"];

pub fn classify_complexity(message: &str, history: Option<&[HistoryTurn]>, fast_phrases: &[String]) -> Complexity {
    let lowered = message.to_lowercase();
    let trimmed = lowered.trim();
    let word_count = trimmed.split_whitespace().count();

    if fast_phrases.iter().any(|p| p == trimmed) {
        return Complexity::Fast;
    }
    if word_count <= 3 && !trimmed.contains('?') && !trimmed.contains('!') {
        return Complexity::Fast;
    }

    let mut deep_signals = 0u32;

    if word_count > 60 {
        deep_signals += 1;
    }
    let sentence_count = message
        .trim()
        .split(|c| matches!(c, '.' | '!' | '?'))
        .filter(|s| !s.trim().is_empty())
        .count();
    if sentence_count >= 3 {
        deep_signals += 1;
    }
    if CONTRADICTION_MARKERS.iter().any(|m| trimmed.contains(m)) {
        deep_signals += 1;
    }
    if EMOTIONAL_MARKERS.iter().any(|m| trimmed.contains(m)) {
        deep_signals += 1;
    }
    if AMBIGUITY_MARKERS.iter().any(|m| trimmed.contains(m)) {
        deep_signals += 1;
    }
    if history.map(|h| h.len() > 5).unwrap_or(false) {
        deep_signals += 1;
    }

    if deep_signals >= 2 {
        Complexity::Deep
    } else {
        Complexity::Standard
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phrases() -> Vec<String> {
        vec!["hi".to_string(), "ok".to_string(), "thanks".to_string()]
    }

    #[test]
    fn short_greeting_is_fast() {
        assert_eq!(classify_complexity("hi", None, &phrases()), Complexity::Fast);
    }

    #[test]
    fn short_question_is_not_fast() {
        // has a '?' so the <=3-word fast-path shortcut doesn't apply
        assert_eq!(classify_complexity("you ok?", None, &phrases()), Complexity::Standard);
    }

    #[test]
    fn contradiction_plus_emotion_is_deep() {
        let msg = "but that's not true, I'm so stressed and frustrated right now";
        assert_eq!(classify_complexity(msg, None, &phrases()), Complexity::Deep);
    }

    #[test]
    fn long_conversation_history_pushes_toward_deep() {
        let history: Vec<HistoryTurn> = (0..6)
            .map(|i| HistoryTurn {
                role: "user".to_string(),
                content: format!("msg {i}"),
            })
            .collect();
        let msg = "but actually I never said that";
        assert_eq!(classify_complexity(msg, Some(&history), &phrases()), Complexity::Deep);
    }

    #[test]
    fn plain_statement_is_standard() {
        let msg = "I went to the store today and bought some groceries for dinner";
        assert_eq!(classify_complexity(msg, None, &phrases()), Complexity::Standard);
    }
}
