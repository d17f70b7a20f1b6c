//! Debounced batching of rapid-fire messages from the same chat — a port of
//! the source system's `FloodGate`. Each new message restarts the window;
//! only once a chat goes quiet for `batch_window_secs` does the buffer
//! flush as a single combined task.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use gw_core::clock::{Clock, SystemClock};
use gw_core::{ChatId, MessageId, MessageTask, TaskStatus};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::queue::TaskQueue;

struct Buffer {
    messages: Vec<String>,
    source_ids: Vec<MessageId>,
    /// Persona this chat's messages are routed to. Overwritten by every
    /// arrival so the flushed task reflects the latest message's metadata,
    /// not the first one's.
    target: String,
    sender_name: String,
    is_group: bool,
}

pub struct FloodGate {
    window: Duration,
    buffers: DashMap<ChatId, Mutex<Buffer>>,
    timers: DashMap<ChatId, JoinHandle<()>>,
    out: Arc<TaskQueue>,
    clock: Arc<dyn Clock>,
}

impl FloodGate {
    pub fn new(batch_window_secs: f64, out: Arc<TaskQueue>) -> Arc<Self> {
        Self::with_clock(batch_window_secs, out, Arc::new(SystemClock))
    }

    /// Construct with an injected clock — used in tests that need a
    /// deterministic `created_at` on the flushed task.
    pub fn with_clock(batch_window_secs: f64, out: Arc<TaskQueue>, clock: Arc<dyn Clock>) -> Arc<Self> {
        Arc::new(Self {
            window: Duration::from_secs_f64(batch_window_secs),
            buffers: DashMap::new(),
            timers: DashMap::new(),
            out,
            clock,
        })
    }

    /// Accept an inbound message for `chat_id`, extending the debounce
    /// window for that chat. Messages already buffered are combined with
    /// `"\n\n"` when the window finally elapses. Each arrival's metadata
    /// (`target`/`sender_name`/`is_group`) replaces whatever the buffer held
    /// before — the flushed task always reflects the latest message.
    #[allow(clippy::too_many_arguments)]
    pub async fn incoming(
        self: &Arc<Self>,
        chat_id: ChatId,
        message_id: MessageId,
        text: String,
        target: String,
        sender_name: String,
        is_group: bool,
    ) {
        {
            let entry = self.buffers.entry(chat_id.clone()).or_insert_with(|| {
                Mutex::new(Buffer {
                    messages: Vec::new(),
                    source_ids: Vec::new(),
                    target: target.clone(),
                    sender_name: sender_name.clone(),
                    is_group,
                })
            });
            let mut buf = entry.lock().await;
            buf.messages.push(text);
            buf.source_ids.push(message_id);
            buf.target = target;
            buf.sender_name = sender_name;
            buf.is_group = is_group;
        }

        if let Some((_, old_timer)) = self.timers.remove(&chat_id) {
            old_timer.abort();
        }

        let this = self.clone();
        let chat_id_for_timer = chat_id.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(this.window).await;
            this.flush(chat_id_for_timer).await;
        });
        self.timers.insert(chat_id, handle);
    }

    async fn flush(self: &Arc<Self>, chat_id: ChatId) {
        self.timers.remove(&chat_id);
        let Some((_, buf_lock)) = self.buffers.remove(&chat_id) else {
            return;
        };
        let buf = buf_lock.into_inner();
        if buf.messages.is_empty() {
            return;
        }

        let task = MessageTask {
            task_id: Uuid::new_v4().to_string(),
            chat_id,
            combined_text: buf.messages.join("\n\n"),
            source_message_ids: buf.source_ids,
            status: TaskStatus::Queued,
            created_at: self.clock.now(),
            generation: 0,
            is_continuation: false,
            target: buf.target,
            sender_name: buf.sender_name,
            is_group: buf.is_group,
            processing_started: None,
            processing_finished: None,
            response: None,
            error: None,
            processing_time_ms: None,
        };

        if let Err(e) = self.out.enqueue(task) {
            tracing::warn!(error = %e, "flood gate flush dropped: queue rejected task");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn rapid_messages_combine_into_one_task() {
        let queue = Arc::new(TaskQueue::new(10, 10));
        let gate = FloodGate::new(0.05, queue.clone());

        let chat = ChatId::from("c1");
        gate.incoming(
            chat.clone(),
            MessageId::from("1"),
            "hello".to_string(),
            "the_creator".to_string(),
            "alice".to_string(),
            false,
        )
        .await;
        tokio::time::advance(Duration::from_millis(10)).await;
        gate.incoming(
            chat.clone(),
            MessageId::from("2"),
            "there".to_string(),
            "the_partner".to_string(),
            "alice".to_string(),
            false,
        )
        .await;

        tokio::time::advance(Duration::from_millis(100)).await;
        let task = queue.dequeue().await.expect("task should flush");
        assert_eq!(task.combined_text, "hello\n\nthere");
        assert_eq!(task.source_message_ids.len(), 2);
        assert_eq!(task.target, "the_partner", "latest message's metadata should win");
    }

    #[tokio::test(start_paused = true)]
    async fn fixed_clock_drives_flushed_task_timestamp() {
        use gw_core::clock::FixedClock;

        let start = chrono::Utc::now();
        let clock = Arc::new(FixedClock::new(start));
        let queue = Arc::new(TaskQueue::new(10, 10));
        let gate = FloodGate::with_clock(0.05, queue.clone(), clock.clone());

        clock.advance(chrono::Duration::seconds(10));
        gate.incoming(
            ChatId::from("c1"),
            MessageId::from("1"),
            "hi".to_string(),
            "the_creator".to_string(),
            "alice".to_string(),
            false,
        )
        .await;

        tokio::time::advance(Duration::from_millis(100)).await;
        let task = queue.dequeue().await.expect("task should flush");
        assert_eq!(task.created_at, start + chrono::Duration::seconds(10));
    }
}
