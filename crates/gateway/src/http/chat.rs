//! Chat ingress — `POST /chat`, `POST /chat/<persona>`, and the OpenAI-
//! compatible `POST /v1/chat/completions`. All three funnel into the same
//! dedup → flood-gate pipeline; only the request body shape and the target
//! persona differ.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use gw_core::{ChatId, MessageId};
use serde_json::{json, Value};

use crate::app::AppState;

pub async fn chat_handler(State(state): State<Arc<AppState>>, headers: HeaderMap, body: Json<Value>) -> (StatusCode, Json<Value>) {
    handle(&state, &headers, body.0, "the_creator").await
}

pub async fn chat_persona_handler(
    State(state): State<Arc<AppState>>,
    Path(persona): Path<String>,
    headers: HeaderMap,
    body: Json<Value>,
) -> (StatusCode, Json<Value>) {
    let target = state.resolve_persona(&persona);
    handle(&state, &headers, body.0, &target).await
}

pub async fn chat_completions_handler(State(state): State<Arc<AppState>>, headers: HeaderMap, body: Json<Value>) -> (StatusCode, Json<Value>) {
    handle(&state, &headers, body.0, "the_creator").await
}

async fn handle(state: &AppState, headers: &HeaderMap, payload: Value, target: &str) -> (StatusCode, Json<Value>) {
    if !check_api_key(state, headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "invalid or missing x-api-key"})));
    }

    let Some(extracted) = extract_message(&payload) else {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "malformed request body"})));
    };

    if extracted.from_me {
        return skipped("own_message");
    }
    if extracted.text.trim().is_empty() {
        return skipped("empty");
    }

    let message_id = MessageId::from(extracted.message_id.clone());
    if state.dedup.is_duplicate(&message_id) {
        return skipped("duplicate");
    }

    let chat_id = ChatId::from(extracted.chat_id.clone());
    state.bridge.record_inbound(
        message_id.as_str(),
        &state.config.sender.channel,
        &extracted.sender_name,
        chat_id.as_str(),
        &extracted.text,
        None,
    );

    let sender_name = extracted.sender_name.clone();
    let is_group = extracted.is_group;
    state
        .flood
        .incoming(chat_id, message_id, extracted.text, target.to_string(), sender_name, is_group)
        .await;

    (
        StatusCode::OK,
        Json(json!({
            "status": "queued",
            "accepted": true,
            "task_queue_depth": state.queue.pending_count(),
        })),
    )
}

fn skipped(reason: &str) -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({"status": "skipped", "reason": reason})))
}

fn check_api_key(state: &AppState, headers: &HeaderMap) -> bool {
    let Some(expected) = &state.config.server.api_key else {
        return true;
    };
    headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == expected)
        .unwrap_or(false)
}

struct ExtractedMessage {
    chat_id: String,
    message_id: String,
    sender_name: String,
    text: String,
    from_me: bool,
    is_group: bool,
}

/// Accepts either the native `{message, chat_id, message_id, sender_name,
/// fromMe?}` shape or an OpenAI-style `{messages[], user?}` body, extracting
/// the last user message from the latter.
fn extract_message(payload: &Value) -> Option<ExtractedMessage> {
    if let Some(messages) = payload.get("messages").and_then(|v| v.as_array()) {
        let text = messages
            .iter()
            .rev()
            .find(|m| m.get("role").and_then(|r| r.as_str()) == Some("user"))
            .and_then(|m| m.get("content").and_then(|c| c.as_str()))
            .map(str::to_string)?;
        let chat_id = payload
            .get("user")
            .and_then(|v| v.as_str())
            .unwrap_or("openai-default")
            .to_string();
        return Some(ExtractedMessage {
            chat_id,
            message_id: uuid::Uuid::new_v4().to_string(),
            sender_name: "api".to_string(),
            text,
            from_me: false,
            is_group: false,
        });
    }

    let text = payload.get("message").and_then(|v| v.as_str())?.to_string();
    let chat_id = payload.get("chat_id").and_then(|v| v.as_str())?.to_string();
    let message_id = payload
        .get("message_id")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let sender_name = payload.get("sender_name").and_then(|v| v.as_str()).unwrap_or("user").to_string();
    let from_me = payload.get("fromMe").and_then(|v| v.as_bool()).unwrap_or(false);
    let is_group = payload.get("is_group").and_then(|v| v.as_bool()).unwrap_or(false);

    Some(ExtractedMessage {
        chat_id,
        message_id,
        sender_name,
        text,
        from_me,
        is_group,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_native_shape() {
        let payload = json!({"message": "hi", "chat_id": "c1", "message_id": "m1", "sender_name": "alice"});
        let extracted = extract_message(&payload).unwrap();
        assert_eq!(extracted.chat_id, "c1");
        assert_eq!(extracted.text, "hi");
        assert!(!extracted.from_me);
    }

    #[test]
    fn extracts_openai_shape_last_user_message() {
        let payload = json!({
            "messages": [
                {"role": "system", "content": "be nice"},
                {"role": "user", "content": "first"},
                {"role": "assistant", "content": "ack"},
                {"role": "user", "content": "second"},
            ],
            "user": "c2",
        });
        let extracted = extract_message(&payload).unwrap();
        assert_eq!(extracted.chat_id, "c2");
        assert_eq!(extracted.text, "second");
    }

    #[test]
    fn malformed_body_is_rejected() {
        let payload = json!({"nonsense": true});
        assert!(extract_message(&payload).is_none());
    }

    #[test]
    fn from_me_flag_is_honored() {
        let payload = json!({"message": "hi", "chat_id": "c1", "fromMe": true});
        let extracted = extract_message(&payload).unwrap();
        assert!(extracted.from_me);
    }
}
