use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError, Role};
use crate::registry;

/// Speaks the OpenAI-compatible `/chat/completions` wire format. Backs three
/// of the four `BackendKind` variants — `OauthProxy`, `DirectApiKey`, and
/// `OpenRouterFallback` only differ in which base URL and bearer token they
/// point at, never in request/response shape.
pub struct OpenAiCompatBackend {
    client: reqwest::Client,
    name: String,
    base_url: String,
    chat_path: String,
    token: String,
}

impl OpenAiCompatBackend {
    pub fn new(name: impl Into<String>, base_url: String, chat_path: String, token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            name: name.into(),
            base_url,
            chat_path,
            token,
        }
    }

    /// Build a backend from a well-known registry provider ID, e.g. "groq" or
    /// "openrouter". Falls back to "/v1/chat/completions" when the provider
    /// isn't in the registry (custom/self-hosted endpoints still need an
    /// explicit `base_url`, so this path only applies to known IDs).
    pub fn for_known_provider(provider_id: &str, api_key: String) -> Self {
        match registry::lookup(provider_id) {
            Some(p) => Self::new(p.id, p.base_url.to_string(), p.chat_path.to_string(), api_key),
            None => Self::new(provider_id, String::new(), "/v1/chat/completions".to_string(), api_key),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, self.chat_path)
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let body = build_request_body(req);
        let url = self.endpoint();

        debug!(provider = %self.name, model = %req.model, "sending chat completion request");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status == 429 {
            let retry_after_ms = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1000)
                .unwrap_or(5000);
            return Err(ProviderError::RateLimited { retry_after_ms });
        }

        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(provider = %self.name, status, body = %text, "provider API error");
            return Err(ProviderError::Api {
                status,
                message: text,
            });
        }

        let api_resp: ApiResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        Ok(parse_response(api_resp))
    }
}

/// Speaks Ollama's native `/api/chat` format — used for `LocalVault`, a
/// same-LAN machine running a local model server.
pub struct LocalVaultBackend {
    client: reqwest::Client,
    base_url: String,
}

impl LocalVaultBackend {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: format!("http://{}:{}", host, port),
        }
    }
}

#[async_trait]
impl LlmProvider for LocalVaultBackend {
    fn name(&self) -> &str {
        "local_vault"
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let mut messages = vec![serde_json::json!({
            "role": "system",
            "content": req.system,
        })];
        for m in &req.messages {
            messages.push(serde_json::json!({
                "role": role_str(m.role),
                "content": m.content,
            }));
        }

        let body = serde_json::json!({
            "model": req.model,
            "messages": messages,
            "stream": false,
            "options": { "num_predict": req.max_tokens, "temperature": req.temperature },
        });

        let url = format!("{}/api/chat", self.base_url);
        debug!(model = %req.model, "sending request to local vault");

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    ProviderError::Unavailable(e.to_string())
                } else {
                    ProviderError::Http(e)
                }
            })?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "local vault API error");
            return Err(ProviderError::Api {
                status,
                message: text,
            });
        }

        let api_resp: LocalApiResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        Ok(ChatResponse {
            content: api_resp.message.content,
            model: api_resp.model,
            tokens_in: api_resp.prompt_eval_count.unwrap_or(0),
            tokens_out: api_resp.eval_count.unwrap_or(0),
            stop_reason: if api_resp.done { "stop".to_string() } else { String::new() },
        })
    }
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::System => "system",
    }
}

fn build_request_body(req: &ChatRequest) -> serde_json::Value {
    let mut messages = vec![serde_json::json!({
        "role": "system",
        "content": req.system,
    })];
    for m in &req.messages {
        messages.push(serde_json::json!({
            "role": role_str(m.role),
            "content": m.content,
        }));
    }

    serde_json::json!({
        "model": req.model,
        "messages": messages,
        "max_tokens": req.max_tokens,
        "temperature": req.temperature,
        "stream": false,
    })
}

fn parse_response(resp: ApiResponse) -> ChatResponse {
    let choice = resp.choices.into_iter().next();
    let content = choice
        .as_ref()
        .and_then(|c| c.message.content.as_deref())
        .unwrap_or("")
        .to_string();
    let stop_reason = choice.and_then(|c| c.finish_reason).unwrap_or_default();

    ChatResponse {
        content,
        model: resp.model,
        tokens_in: resp.usage.as_ref().map(|u| u.prompt_tokens).unwrap_or(0),
        tokens_out: resp.usage.as_ref().map(|u| u.completion_tokens).unwrap_or(0),
        stop_reason,
    }
}

#[derive(Deserialize)]
struct ApiResponse {
    model: String,
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Deserialize)]
struct LocalApiResponse {
    model: String,
    message: OllamaMessage,
    done: bool,
    prompt_eval_count: Option<u32>,
    eval_count: Option<u32>,
}

#[derive(Deserialize)]
struct OllamaMessage {
    content: String,
}
