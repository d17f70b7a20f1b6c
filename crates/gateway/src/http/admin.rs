//! Auth-gated operational endpoints: persona profile rebuild trigger and a
//! Sender smoke test.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;

fn check_bridge_token(state: &AppState, headers: &HeaderMap) -> bool {
    let Some(expected) = &state.config.server.bridge_token else {
        return true;
    };
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v == expected)
        .unwrap_or(false)
}

/// POST /persona/rebuild — auth-gated. The profile-building analysis itself
/// runs outside this core; this endpoint only snapshots the current layers
/// (so a rebuild can be rolled back) and reports where the analyzer should
/// pick up.
pub async fn persona_rebuild_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if !check_bridge_token(&state, &headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthorized"})));
    }

    let Some(profile) = &state.profile else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "profile store is disabled"})),
        );
    };

    let version = profile
        .load_layer("meta")
        .ok()
        .and_then(|meta| meta.get("current_version").and_then(|v| v.as_u64()))
        .unwrap_or(0) as u32
        + 1;
    let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H-%M").to_string();

    match profile.snapshot_version(version, &timestamp) {
        Ok(path) => (
            StatusCode::ACCEPTED,
            Json(json!({"status": "snapshot_created", "path": path.display().to_string(), "version": version})),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": e.to_string()})),
        ),
    }
}

#[derive(Deserialize, Default)]
pub struct LoopTestRequest {
    #[serde(default = "default_loop_test_target")]
    pub target: String,
}

fn default_loop_test_target() -> String {
    "loop-test".to_string()
}

/// POST /whatsapp/loop-test — bridge-token gated. Smoke-tests the Sender
/// with a `--dry-run` hint and reports route and duration.
pub async fn loop_test_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Option<Json<LoopTestRequest>>,
) -> (StatusCode, Json<Value>) {
    if !check_bridge_token(&state, &headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthorized"})));
    }

    let target = body.map(|b| b.0.target).unwrap_or_else(default_loop_test_target);
    let (ok, elapsed) = state.sender.dry_run(&target).await;

    (
        StatusCode::OK,
        Json(json!({
            "ok": ok,
            "route": state.config.sender.channel,
            "duration_ms": elapsed.as_millis(),
        })),
    )
}
