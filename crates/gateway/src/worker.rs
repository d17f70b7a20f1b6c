//! Background worker pool draining the task queue — a port of the source
//! system's `MessageWorker`, including its per-chat generation tracking:
//! if a newer task for the same chat has started by the time this one
//! finishes, the reply is dropped silently instead of arriving out of
//! order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gw_core::{ChatId, MessageTask};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::queue::TaskQueue;
use crate::sender::Sender;

/// Produces the final reply text for a combined message — the "SBS + RAG +
/// LLM" pipeline stage the queue hands tasks off to.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn respond(&self, combined_text: &str, chat_id: &ChatId, target: &str) -> anyhow::Result<String>;
}

pub struct MessageWorkerPool {
    queue: Arc<TaskQueue>,
    sender: Arc<Sender>,
    responder: Arc<dyn Responder>,
    worker_count: usize,
    typing_interval: Duration,
    chat_generations: Mutex<HashMap<ChatId, Arc<AtomicU64>>>,
}

impl MessageWorkerPool {
    pub fn new(
        queue: Arc<TaskQueue>,
        sender: Arc<Sender>,
        responder: Arc<dyn Responder>,
        worker_count: usize,
        typing_interval_secs: u64,
    ) -> Arc<Self> {
        Arc::new(Self {
            queue,
            sender,
            responder,
            worker_count,
            typing_interval: Duration::from_secs(typing_interval_secs),
            chat_generations: Mutex::new(HashMap::new()),
        })
    }

    /// Spawn `worker_count` loops pulling from the shared queue. The
    /// returned handles can be aborted for a clean shutdown.
    pub fn spawn(self: &Arc<Self>) -> Vec<tokio::task::JoinHandle<()>> {
        (0..self.worker_count)
            .map(|id| {
                let this = self.clone();
                tokio::spawn(async move { this.worker_loop(id).await })
            })
            .collect()
    }

    async fn worker_loop(self: Arc<Self>, worker_id: usize) {
        loop {
            let Some(task) = self.queue.dequeue().await else {
                break;
            };
            self.handle_task(task, worker_id).await;
        }
    }

    async fn generation_counter(&self, chat_id: &ChatId) -> Arc<AtomicU64> {
        self.chat_generations
            .lock()
            .await
            .entry(chat_id.clone())
            .or_insert_with(|| Arc::new(AtomicU64::new(0)))
            .clone()
    }

    async fn handle_task(&self, mut task: MessageTask, worker_id: usize) {
        let start = std::time::Instant::now();
        let counter = self.generation_counter(&task.chat_id).await;
        let generation = counter.fetch_add(1, Ordering::SeqCst) + 1;
        task.generation = generation;

        info!(
            worker_id,
            generation,
            chat_id = %task.chat_id,
            text = %truncate(&task.combined_text, 60),
            "processing task"
        );

        if let Some(first_id) = task.source_message_ids.first() {
            self.sender.send_seen(task.chat_id.as_str(), first_id.as_str()).await;
        }

        let typing = {
            let sender = self.sender.clone();
            let chat_id = task.chat_id.clone();
            let interval = self.typing_interval;
            tokio::spawn(async move {
                loop {
                    sender.send_typing(chat_id.as_str()).await;
                    tokio::time::sleep(interval).await;
                }
            })
        };

        let response = self.responder.respond(&task.combined_text, &task.chat_id, &task.target).await;
        typing.abort();

        if counter.load(Ordering::SeqCst) != generation {
            self.queue.supersede(task.clone());
            info!(worker_id, generation, chat_id = %task.chat_id, "superseded, dropping response silently");
            return;
        }

        match response {
            Ok(reply) if !reply.trim().is_empty() => {
                let quote_id = task.source_message_ids.first().map(|m| m.as_str());
                let delivered = self.sender.send_long_message(task.chat_id.as_str(), &reply, quote_id).await;
                if delivered {
                    let elapsed = start.elapsed().as_millis();
                    info!(worker_id, generation, chat_id = %task.chat_id, elapsed_ms = elapsed, "delivered");
                    self.queue.complete(task, reply);
                } else {
                    self.queue.fail(task, "delivery failed".to_string());
                }
            }
            Ok(_) => self.queue.fail(task, "empty reply".to_string()),
            Err(e) => {
                warn!(worker_id, chat_id = %task.chat_id, error = %e, "task failed");
                self.sender
                    .send_text(task.chat_id.as_str(), "A technical glitch occurred. Please try again.", None)
                    .await;
                self.queue.fail(task, e.to_string());
            }
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
