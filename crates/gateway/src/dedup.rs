//! TTL-cache deduplicator for inbound message IDs — avoids reprocessing a
//! message the webhook source retries delivery of. A direct port of the
//! source system's `MessageDeduplicator`, backed by a `DashMap` instead of
//! a plain dict guarded by nothing (the original ran single-threaded;
//! webhook handlers here run concurrently across Axum's worker threads).

use std::time::{Duration, Instant};

use dashmap::DashMap;
use gw_core::MessageId;

pub struct MessageDeduplicator {
    window: Duration,
    seen: DashMap<String, Instant>,
}

impl MessageDeduplicator {
    pub fn new(window_secs: u64) -> Self {
        Self {
            window: Duration::from_secs(window_secs),
            seen: DashMap::new(),
        }
    }

    /// Returns `true` if `message_id` was already seen within the window.
    /// IDs that shouldn't be tracked (empty, or the "0" sentinel) are never
    /// considered duplicates.
    pub fn is_duplicate(&self, message_id: &MessageId) -> bool {
        if !message_id.is_trackable() {
            return false;
        }

        let now = Instant::now();
        self.seen.retain(|_, seen_at| now.duration_since(*seen_at) <= self.window);

        let key = message_id.as_str().to_string();
        if self.seen.contains_key(&key) {
            return true;
        }
        self.seen.insert(key, now);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sighting_is_not_a_duplicate() {
        let dedup = MessageDeduplicator::new(300);
        assert!(!dedup.is_duplicate(&MessageId::from("abc")));
    }

    #[test]
    fn repeat_sighting_within_window_is_a_duplicate() {
        let dedup = MessageDeduplicator::new(300);
        let id = MessageId::from("abc");
        assert!(!dedup.is_duplicate(&id));
        assert!(dedup.is_duplicate(&id));
    }

    #[test]
    fn untrackable_ids_are_never_duplicates() {
        let dedup = MessageDeduplicator::new(300);
        let zero = MessageId::from("0");
        assert!(!dedup.is_duplicate(&zero));
        assert!(!dedup.is_duplicate(&zero));
    }
}
