//! `GET /health` and `GET /gateway/status` — liveness and operational
//! snapshot endpoints.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::app::AppState;

/// GET /health — node/edge counts, memory-DB stats, pending-conflict count,
/// and configured model names.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let nodes = state.memory.graph().number_of_nodes().unwrap_or(0);
    let edges = state.memory.graph().number_of_edges().unwrap_or(0);
    let documents = state.memory.vectors().count().unwrap_or(0);
    let pending_conflicts = state.conflicts.lock().await.pending().len();

    Json(json!({
        "status": "ok",
        "graph": {"nodes": nodes, "edges": edges},
        "memory": {"documents": documents},
        "pending_conflicts": pending_conflicts,
        "model": state.config.llm.model,
    }))
}

/// GET /gateway/status — queue stats, worker count, uptime, timestamp.
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "queue": state.queue.stats(),
        "workers": state.config.pipeline.worker_count,
        "uptime_seconds": state.uptime_seconds(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
