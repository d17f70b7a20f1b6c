//! Bounded task queue with an in-flight/history split — a port of the
//! source system's `TaskQueue`. `enqueue` drops the task and signals
//! `QueueFull` when the channel is at capacity rather than blocking the
//! flood-gate flush, matching `asyncio.Queue(maxsize=...)`'s backpressure
//! at the point this gateway chooses to surface it instead of awaiting it.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use gw_core::clock::{Clock, SystemClock};
use gw_core::{GatewayError, MessageTask, Result, TaskStatus};
use tokio::sync::mpsc;

pub struct TaskQueue {
    sender: mpsc::Sender<MessageTask>,
    receiver: Mutex<mpsc::Receiver<MessageTask>>,
    active: DashMap<String, MessageTask>,
    history: Mutex<VecDeque<MessageTask>>,
    max_history: usize,
    clock: Arc<dyn Clock>,
}

impl TaskQueue {
    pub fn new(max_size: usize, max_history: usize) -> Self {
        Self::with_clock(max_size, max_history, Arc::new(SystemClock))
    }

    /// Construct with an injected clock — used in tests that need
    /// deterministic `processing_started`/`processing_finished` timestamps.
    pub fn with_clock(max_size: usize, max_history: usize, clock: Arc<dyn Clock>) -> Self {
        let (sender, receiver) = mpsc::channel(max_size.max(1));
        Self {
            sender,
            receiver: Mutex::new(receiver),
            active: DashMap::new(),
            history: Mutex::new(VecDeque::new()),
            max_history,
            clock,
        }
    }

    /// Non-blocking enqueue: returns `GatewayError::QueueFull` immediately
    /// if the queue is saturated rather than waiting for room.
    pub fn enqueue(&self, task: MessageTask) -> Result<()> {
        self.active.insert(task.task_id.clone(), task.clone());
        self.sender.try_send(task).map_err(|e| {
            match &e {
                mpsc::error::TrySendError::Full(t) => {
                    self.active.remove(&t.task_id);
                }
                mpsc::error::TrySendError::Closed(t) => {
                    self.active.remove(&t.task_id);
                }
            }
            GatewayError::QueueFull
        })
    }

    /// Pull the next task and mark it processing. Blocks (async) until one
    /// is available or the queue is closed.
    pub async fn dequeue(&self) -> Option<MessageTask> {
        let mut task = self.receiver.lock().await.recv().await?;
        task.status = TaskStatus::Processing;
        task.processing_started = Some(self.clock.now());
        self.active.insert(task.task_id.clone(), task.clone());
        Some(task)
    }

    pub fn complete(&self, mut task: MessageTask, response: String) {
        task.status = TaskStatus::Completed;
        task.response = Some(response);
        self.finish(task);
    }

    pub fn fail(&self, mut task: MessageTask, error: String) {
        task.status = TaskStatus::Failed;
        task.error = Some(error);
        self.finish(task);
    }

    pub fn supersede(&self, mut task: MessageTask) {
        task.status = TaskStatus::Superseded;
        self.finish(task);
    }

    /// Stamp `processing_finished`/`processing_time_ms` against
    /// `processing_started` (falling back to `created_at` for tasks that
    /// never went through `dequeue`, e.g. superseded before a worker claimed
    /// them) before archiving.
    fn finish(&self, mut task: MessageTask) {
        let finished = self.clock.now();
        let started = task.processing_started.unwrap_or(task.created_at);
        task.processing_finished = Some(finished);
        task.processing_time_ms = Some((finished - started).num_milliseconds());
        self.archive(task);
    }

    fn archive(&self, task: MessageTask) {
        self.active.remove(&task.task_id);
        let mut history = self.history.lock().unwrap();
        history.push_back(task);
        while history.len() > self.max_history {
            history.pop_front();
        }
    }

    pub fn pending_count(&self) -> usize {
        self.active.len()
    }

    pub fn stats(&self) -> serde_json::Value {
        serde_json::json!({ "pendingSize": self.pending_count() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gw_core::{ChatId, MessageId};

    fn sample_task(id: &str) -> MessageTask {
        MessageTask {
            task_id: id.to_string(),
            chat_id: ChatId::from("c1"),
            combined_text: "hi".to_string(),
            source_message_ids: vec![MessageId::from("m1")],
            status: TaskStatus::Queued,
            created_at: Utc::now(),
            generation: 0,
            is_continuation: false,
            target: "the_creator".to_string(),
            sender_name: "tester".to_string(),
            is_group: false,
            processing_started: None,
            processing_finished: None,
            response: None,
            error: None,
            processing_time_ms: None,
        }
    }

    #[tokio::test]
    async fn enqueue_then_dequeue_marks_processing() {
        let queue = TaskQueue::new(10, 10);
        queue.enqueue(sample_task("t1")).unwrap();
        let task = queue.dequeue().await.unwrap();
        assert_eq!(task.status, TaskStatus::Processing);
    }

    #[tokio::test]
    async fn complete_moves_task_out_of_active() {
        let queue = TaskQueue::new(10, 10);
        queue.enqueue(sample_task("t1")).unwrap();
        let task = queue.dequeue().await.unwrap();
        queue.complete(task, "ok".to_string());
        assert_eq!(queue.pending_count(), 0);
    }

    #[tokio::test]
    async fn dequeue_then_complete_stamps_ordered_timestamps() {
        let queue = TaskQueue::new(10, 10);
        queue.enqueue(sample_task("t1")).unwrap();
        let mut task = queue.dequeue().await.unwrap();
        let started = task.processing_started.expect("dequeue stamps processing_started");
        assert!(started >= task.created_at);

        task.response = None;
        let task_id = task.task_id.clone();
        queue.complete(task, "reply".to_string());

        let history = queue.history.lock().unwrap();
        let archived = history.iter().find(|t| t.task_id == task_id).unwrap();
        let finished = archived.processing_finished.expect("complete stamps processing_finished");
        assert!(finished >= started);
        assert_eq!(archived.response.as_deref(), Some("reply"));
        assert!(archived.processing_time_ms.unwrap() >= 0);
    }

    #[tokio::test]
    async fn fixed_clock_drives_timestamps_deterministically() {
        use gw_core::clock::FixedClock;

        let start = Utc::now();
        let clock = Arc::new(FixedClock::new(start));
        let queue = TaskQueue::with_clock(10, 10, clock.clone());
        queue.enqueue(sample_task("t1")).unwrap();

        clock.advance(chrono::Duration::seconds(2));
        let task = queue.dequeue().await.unwrap();
        assert_eq!(task.processing_started, Some(start + chrono::Duration::seconds(2)));

        clock.advance(chrono::Duration::seconds(3));
        let task_id = task.task_id.clone();
        queue.complete(task, "ok".to_string());

        let history = queue.history.lock().unwrap();
        let archived = history.iter().find(|t| t.task_id == task_id).unwrap();
        assert_eq!(archived.processing_finished, Some(start + chrono::Duration::seconds(5)));
        assert_eq!(archived.processing_time_ms, Some(3_000));
    }

    #[test]
    fn enqueue_fails_when_queue_is_full() {
        let queue = TaskQueue::new(1, 10);
        queue.enqueue(sample_task("t1")).unwrap();
        let err = queue.enqueue(sample_task("t2")).unwrap_err();
        assert_eq!(err.code(), "QUEUE_FULL");
    }
}
