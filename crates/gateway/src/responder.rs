//! Final reply-generation stage: runs the dual-cognition engine over the
//! combined message, then asks the LLM for the actual reply with the
//! cognitive merge injected into the system prompt.

use async_trait::async_trait;
use gw_cognition::CognitionEngine;
use gw_core::{ChatId, ProfileStore};
use gw_llm::ChatRequest;

use crate::worker::Responder;

const BASE_SYSTEM_PROMPT: &str = "You are a close, trusted friend who remembers everything about the person you're talking to. Reply naturally and conversationally.";

pub struct CognitiveResponder {
    cognition: CognitionEngine,
    profile: Option<ProfileStore>,
}

impl CognitiveResponder {
    pub fn new(cognition: CognitionEngine, profile: Option<ProfileStore>) -> Self {
        Self { cognition, profile }
    }
}

#[async_trait]
impl Responder for CognitiveResponder {
    async fn respond(&self, combined_text: &str, chat_id: &ChatId, target: &str) -> anyhow::Result<String> {
        let merge = self.cognition.think(combined_text, chat_id, None, target).await;
        let context = self.cognition.build_context(&merge);

        let prefix = match &self.profile {
            Some(store) => store.as_prompt_prefix().unwrap_or_default(),
            None => String::new(),
        };
        let system = format!("{prefix}{BASE_SYSTEM_PROMPT}{context}");

        let router = self.cognition.router();
        let req = ChatRequest::new(router.model(), system).with_user(combined_text);
        let resp = router.chat(&req).await?;
        Ok(resp.content)
    }
}
