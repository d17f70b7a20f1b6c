//! Tracks emotional state across turns per chat, Peak-End Rule weighted:
//! peaks and the most recent entries matter most when summarizing.
//!
//! The source system persisted this to its own SQLite database queried by
//! a time window (`hours=72`). This port keeps it as an in-process bounded
//! ring per chat instead — the gateway already holds per-chat state in
//! memory for generation tracking, and a personal assistant's trajectory
//! is read back within the same process lifetime it was written in, so a
//! second on-disk database buys nothing a bounded `VecDeque` doesn't.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use gw_core::ChatId;

use crate::types::CognitiveMerge;

const PEAK_THRESHOLD: f32 = 0.6;

#[derive(Debug, Clone)]
struct Entry {
    timestamp: f64,
    tension_level: f32,
    tension_type: String,
    emotional_state: String,
    topics: String,
    is_peak: bool,
}

/// Bounded rolling window of emotional snapshots, one ring per chat.
pub struct EmotionalTrajectory {
    window: usize,
    min_turns: usize,
    chats: DashMap<ChatId, Mutex<VecDeque<Entry>>>,
}

impl EmotionalTrajectory {
    pub fn new(window: usize, min_turns: usize) -> Self {
        Self {
            window,
            min_turns,
            chats: DashMap::new(),
        }
    }

    pub fn record(&self, chat_id: &ChatId, merge: &CognitiveMerge, topics: &[String]) {
        let entry = Entry {
            timestamp: now_unix_f64(),
            tension_level: merge.tension_level,
            tension_type: merge.tension_type.clone(),
            emotional_state: merge.suggested_tone.clone(),
            topics: topics.iter().take(3).cloned().collect::<Vec<_>>().join(","),
            is_peak: merge.tension_level > PEAK_THRESHOLD,
        };

        let ring = self
            .chats
            .entry(chat_id.clone())
            .or_insert_with(|| Mutex::new(VecDeque::new()));
        let mut ring = ring.lock().unwrap();
        if ring.len() >= self.window {
            ring.pop_front();
        }
        ring.push_back(entry);
    }

    /// Compact trajectory summary for injection into the merge prompt —
    /// empty until at least `min_turns` entries have been recorded.
    pub fn get_summary(&self, chat_id: &ChatId) -> String {
        let Some(ring) = self.chats.get(chat_id) else {
            return String::new();
        };
        let ring = ring.lock().unwrap();
        if ring.len() < self.min_turns {
            return String::new();
        }

        let now = now_unix_f64();
        let mut entries: Vec<&Entry> = ring.iter().collect();
        entries.sort_by(|a, b| {
            b.is_peak
                .cmp(&a.is_peak)
                .then(b.timestamp.partial_cmp(&a.timestamp).unwrap())
        });

        let lines: Vec<String> = entries
            .into_iter()
            .take(10)
            .map(|e| {
                let age_hrs = (now - e.timestamp) / 3600.0;
                format!(
                    "- {:.0}h ago: {} (tension={:.1}, type={}, topic={})",
                    age_hrs, e.emotional_state, e.tension_level, e.tension_type, e.topics
                )
            })
            .collect();

        format!("EMOTIONAL TRAJECTORY (peaks highlighted):\n{}", lines.join("\n"))
    }
}

fn now_unix_f64() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merge_with_tension(t: f32) -> CognitiveMerge {
        let mut m = CognitiveMerge::default();
        m.tension_level = t;
        m
    }

    #[test]
    fn summary_is_empty_below_min_turns() {
        let traj = EmotionalTrajectory::new(20, 3);
        let chat = ChatId::from("c1".to_string());
        traj.record(&chat, &merge_with_tension(0.2), &[]);
        assert!(traj.get_summary(&chat).is_empty());
    }

    #[test]
    fn summary_appears_after_min_turns() {
        let traj = EmotionalTrajectory::new(20, 2);
        let chat = ChatId::from("c1".to_string());
        traj.record(&chat, &merge_with_tension(0.2), &["work".to_string()]);
        traj.record(&chat, &merge_with_tension(0.8), &["family".to_string()]);
        let summary = traj.get_summary(&chat);
        assert!(summary.contains("EMOTIONAL TRAJECTORY"));
    }

    #[test]
    fn ring_evicts_oldest_past_window() {
        let traj = EmotionalTrajectory::new(2, 1);
        let chat = ChatId::from("c1".to_string());
        for i in 0..5 {
            traj.record(&chat, &merge_with_tension(i as f32 * 0.1), &[]);
        }
        let ring = traj.chats.get(&chat).unwrap();
        assert_eq!(ring.lock().unwrap().len(), 2);
    }
}
