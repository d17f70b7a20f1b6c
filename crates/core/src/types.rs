use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifies a conversation — one chat on the bridged messaging platform.
/// Time-sortable (UUIDv7-derived when minted locally) so log correlation
/// doesn't need a separate timestamp column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub String);

impl ChatId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ChatId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ChatId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Unique identifier for an inbound message, as reported by the bridging
/// platform. Dedup keys on this, so its `Eq`/`Hash` impls are load-bearing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for IDs that should never be considered duplicates (empty,
    /// missing, or a platform-reported sentinel like "0").
    pub fn is_trackable(&self) -> bool {
        !self.0.is_empty() && self.0 != "0"
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// An inbound message as delivered by the webhook, before any pipeline
/// processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message_id: MessageId,
    pub chat_id: ChatId,
    pub sender: String,
    pub text: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Message ID this one is a reply to, threaded through to the sender's
    /// `--quote` argument when present.
    #[serde(default)]
    pub reply_to: Option<MessageId>,
}

/// Status of a task as it moves through the queue and worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    Superseded,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Superseded => "superseded",
        };
        write!(f, "{}", s)
    }
}

/// A unit of work handed from the flood-gate to a worker: one or more
/// coalesced inbound messages for a single chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageTask {
    pub task_id: String,
    pub chat_id: ChatId,
    pub combined_text: String,
    pub source_message_ids: Vec<MessageId>,
    pub status: TaskStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Generation this task was minted under — compared against the live
    /// counter at reply-time to detect staleness.
    pub generation: u64,
    /// True when this task is a scheduled continuation of a truncated reply
    /// rather than a fresh user message.
    pub is_continuation: bool,
    /// Which persona this task is routed to (`/chat/<persona>`); governs
    /// which relationship node the memory engine looks up context under.
    pub target: String,
    /// Display name of the sender of the most recent message in the batch.
    pub sender_name: String,
    /// Whether this chat is a group conversation rather than a 1:1 one.
    pub is_group: bool,
    /// Stamped by `TaskQueue::dequeue` when a worker picks this task up.
    pub processing_started: Option<chrono::DateTime<chrono::Utc>>,
    /// Stamped when the task reaches a terminal state (`complete`/`fail`/
    /// `supersede`).
    pub processing_finished: Option<chrono::DateTime<chrono::Utc>>,
    /// The delivered reply text, set on `complete`.
    pub response: Option<String>,
    /// The failure reason, set on `fail`.
    pub error: Option<String>,
    /// `processing_finished - processing_started` in milliseconds.
    pub processing_time_ms: Option<i64>,
}

/// User role hierarchy retained for parity with upstream auth plumbing;
/// only `Admin` vs non-admin currently gates anything in this gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    #[default]
    User,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Admin => write!(f, "admin"),
            UserRole::User => write!(f, "user"),
        }
    }
}
