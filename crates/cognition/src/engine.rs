//! Orchestrates fast/standard/deep routing across the present, memory and
//! merge stages — the single `think()` entry point the gateway calls per
//! message.

use std::sync::Arc;

use gw_core::ChatId;
use gw_llm::Router;
use gw_memory::MemoryEngine;
use tracing::warn;

use crate::classifier::classify_complexity;
use crate::merge::{build_cognitive_context, extract_search_intent, merge_streams};
use crate::present::analyze_present;
use crate::trajectory::EmotionalTrajectory;
use crate::types::{CognitiveMerge, Complexity, HistoryTurn, MemoryStream};

/// The entity name graph context is looked up under for the relationship
/// line in the merge prompt; partner-directed turns look up the partner
/// node instead of the default user node.
const PRIMARY_USER_NODE: &str = "primary_user";
const PRIMARY_PARTNER_NODE: &str = "primary_partner";

pub struct CognitionEngine {
    router: Router,
    memory: Arc<MemoryEngine>,
    trajectory: Option<EmotionalTrajectory>,
    fast_phrases: Vec<String>,
}

impl CognitionEngine {
    pub fn new(router: Router, memory: Arc<MemoryEngine>, trajectory: Option<EmotionalTrajectory>, fast_phrases: Vec<String>) -> Self {
        Self {
            router,
            memory,
            trajectory,
            fast_phrases,
        }
    }

    pub async fn think(
        &self,
        user_message: &str,
        chat_id: &ChatId,
        history: Option<&[HistoryTurn]>,
        target: &str,
    ) -> CognitiveMerge {
        let complexity = classify_complexity(user_message, history, &self.fast_phrases);

        let merge = match complexity {
            Complexity::Fast => CognitiveMerge {
                inner_monologue: "Simple message, no deep analysis needed.".to_string(),
                ..CognitiveMerge::default()
            },
            Complexity::Standard => {
                let (present, memory) = tokio::join!(
                    analyze_present(&self.router, user_message, history),
                    self.recall_memory(user_message, target),
                );
                let trajectory_summary = self.trajectory_summary(chat_id);
                let merge = merge_streams(&self.router, &present, &memory, &trajectory_summary, false).await;
                self.record_trajectory(chat_id, &merge, &present.topics);
                merge
            }
            Complexity::Deep => {
                let search_query = match history {
                    Some(h) => extract_search_intent(&self.router, user_message, h).await,
                    None => extract_search_intent(&self.router, user_message, &[]).await,
                };
                let recall_query = if search_query.is_empty() { user_message } else { &search_query };

                let (present, memory) = tokio::join!(
                    analyze_present(&self.router, user_message, history),
                    self.recall_memory(recall_query, target),
                );
                let trajectory_summary = self.trajectory_summary(chat_id);
                let merge = merge_streams(&self.router, &present, &memory, &trajectory_summary, true).await;
                self.record_trajectory(chat_id, &merge, &present.topics);
                merge
            }
        };

        merge
    }

    async fn recall_memory(&self, query: &str, target: &str) -> MemoryStream {
        let mut memory = MemoryStream::default();
        let result = self.memory.query(query, 5).await;
        memory.relevant_facts = result.results.into_iter().map(|r| r.content).collect();
        memory.graph_connections = result.graph_context;

        let target_name = if target.to_lowercase().contains("partner") {
            PRIMARY_PARTNER_NODE
        } else {
            PRIMARY_USER_NODE
        };
        match self.memory.graph().get_entity_neighborhood(target_name) {
            Ok(context) => memory.relationship_context = context,
            Err(e) => warn!(error = %e, "relationship context lookup failed"),
        }
        memory
    }

    fn trajectory_summary(&self, chat_id: &ChatId) -> String {
        self.trajectory.as_ref().map(|t| t.get_summary(chat_id)).unwrap_or_default()
    }

    fn record_trajectory(&self, chat_id: &ChatId, merge: &CognitiveMerge, topics: &[String]) {
        if let Some(trajectory) = &self.trajectory {
            trajectory.record(chat_id, merge, topics);
        }
    }

    /// Render a merge as the system-prompt injection block.
    pub fn build_context(&self, merge: &CognitiveMerge) -> String {
        build_cognitive_context(merge)
    }

    pub fn router(&self) -> &Router {
        &self.router
    }
}
