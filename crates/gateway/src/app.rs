use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use gw_core::config::MAX_PAYLOAD_BYTES;
use gw_core::{GatewayConfig, ProfileStore};
use gw_memory::{ConflictManager, MemoryEngine};
use tokio::sync::Mutex;

use crate::bridge::BridgeIndex;
use crate::dedup::MessageDeduplicator;
use crate::flood::FloodGate;
use crate::queue::TaskQueue;
use crate::sender::Sender;

/// Central shared state for every Axum handler — owns the ingress pipeline
/// components and the stores the worker pool reads through `responder`.
pub struct AppState {
    pub config: GatewayConfig,
    pub started_at: Instant,
    pub dedup: MessageDeduplicator,
    pub flood: Arc<FloodGate>,
    pub queue: Arc<TaskQueue>,
    pub sender: Arc<Sender>,
    pub memory: Arc<MemoryEngine>,
    pub conflicts: Arc<Mutex<ConflictManager>>,
    pub bridge: BridgeIndex,
    pub profile: Option<ProfileStore>,
}

impl AppState {
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Resolve a `/chat/<persona>` path segment to the target name the
    /// cognition engine's memory recall keys relationship context under.
    /// Unrecognized personas fall back to the default.
    pub fn resolve_persona(&self, persona: &str) -> String {
        match persona.to_lowercase().as_str() {
            "partner" => "the_partner".to_string(),
            "creator" | "default" => "the_creator".to_string(),
            _ => "the_creator".to_string(),
        }
    }
}

/// Assemble the full Axum router — every route named in the external
/// interface, nothing else.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/gateway/status", get(crate::http::health::status_handler))
        .route("/chat", post(crate::http::chat::chat_handler))
        .route("/chat/{persona}", post(crate::http::chat::chat_persona_handler))
        .route("/v1/chat/completions", post(crate::http::chat::chat_completions_handler))
        .route("/persona/rebuild", post(crate::http::admin::persona_rebuild_handler))
        .route("/whatsapp/loop-test", post(crate::http::admin::loop_test_handler))
        .layer(DefaultBodyLimit::max(MAX_PAYLOAD_BYTES))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
