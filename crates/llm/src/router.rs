use std::sync::Arc;

use gw_core::config::{BackendKind, LlmConfig, RoutingModels};
use tracing::warn;

use crate::backends::{LocalVaultBackend, OpenAiCompatBackend};
use crate::provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError, RoutingLabel};

/// Builds a concrete `LlmProvider` from a tagged `BackendKind` configuration.
/// The rest of the system never matches on provider identity again once a
/// `Router` exists.
pub fn build_backend(kind: &BackendKind) -> Box<dyn LlmProvider> {
    match kind {
        BackendKind::OauthProxy { url, token } => {
            Box::new(OpenAiCompatBackend::new("oauth_proxy", url.clone(), "/v1/chat/completions".to_string(), token.clone()))
        }
        BackendKind::DirectApiKey { provider_id, api_key } => {
            Box::new(OpenAiCompatBackend::for_known_provider(provider_id, api_key.clone()))
        }
        BackendKind::LocalVault { host, port } => Box::new(LocalVaultBackend::new(host, *port)),
        BackendKind::OpenRouterFallback { api_key } => {
            Box::new(OpenAiCompatBackend::for_known_provider("openrouter", api_key.clone()))
        }
    }
}

/// Routes chat requests to a primary backend, falling back to a secondary
/// one when the primary is unavailable or rate limited. Mirrors the
/// cloud-then-local degradation pattern used throughout the source system's
/// LLM call sites, generalized to two configured backends instead of a
/// hard-coded cloud/Ollama pair.
pub struct Router {
    primary: Arc<dyn LlmProvider>,
    fallback: Option<Arc<dyn LlmProvider>>,
    model: String,
    routing_models: RoutingModels,
}

impl Router {
    pub fn new(cfg: &LlmConfig) -> Self {
        let primary = cfg
            .primary
            .as_ref()
            .map(|k| Arc::from(build_backend(k)))
            .unwrap_or_else(|| Arc::from(build_backend(&BackendKind::LocalVault {
                host: "127.0.0.1".to_string(),
                port: 11434,
            })) as Arc<dyn LlmProvider>);
        let fallback = cfg.fallback.as_ref().map(|k| Arc::from(build_backend(k)));
        Self {
            primary,
            fallback,
            model: cfg.model.clone(),
            routing_models: cfg.routing_models.clone(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Resolve which model answers a request labeled `label` — a pure
    /// function of configuration, never of which backend is live or which
    /// provider answered the last call.
    pub fn model_for(&self, label: RoutingLabel) -> &str {
        let configured = match label {
            RoutingLabel::Casual => &self.routing_models.casual,
            RoutingLabel::Coding => &self.routing_models.coding,
            RoutingLabel::Analysis => &self.routing_models.analysis,
            RoutingLabel::Review => &self.routing_models.review,
        };
        configured.as_deref().unwrap_or(&self.model)
    }

    pub async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        match self.primary.send(req).await {
            Ok(resp) => Ok(resp),
            Err(err) => {
                let Some(fallback) = &self.fallback else {
                    return Err(err);
                };
                warn!(
                    primary = self.primary.name(),
                    fallback = fallback.name(),
                    error = %err,
                    "primary llm backend failed, trying fallback"
                );
                fallback.send(req).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Role;

    struct StubProvider {
        name: &'static str,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl LlmProvider for StubProvider {
        fn name(&self) -> &str {
            self.name
        }

        async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            if self.fail {
                return Err(ProviderError::Unavailable("stub down".to_string()));
            }
            Ok(ChatResponse {
                content: format!("echo:{}", req.messages.last().map(|m| m.content.clone()).unwrap_or_default()),
                model: req.model.clone(),
                tokens_in: 1,
                tokens_out: 1,
                stop_reason: "stop".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn falls_back_when_primary_unavailable() {
        let router = Router {
            primary: Arc::new(StubProvider { name: "primary", fail: true }),
            fallback: Some(Arc::new(StubProvider { name: "fallback", fail: false })),
            model: "test-model".to_string(),
            routing_models: RoutingModels::default(),
        };
        let req = ChatRequest::new("test-model", "sys").with_user("hi");
        let resp = router.chat(&req).await.expect("fallback should succeed");
        assert_eq!(resp.content, "echo:hi");
        let _ = Role::User;
    }

    #[tokio::test]
    async fn propagates_error_with_no_fallback() {
        let router = Router {
            primary: Arc::new(StubProvider { name: "primary", fail: true }),
            fallback: None,
            model: "test-model".to_string(),
            routing_models: RoutingModels::default(),
        };
        let req = ChatRequest::new("test-model", "sys").with_user("hi");
        assert!(router.chat(&req).await.is_err());
    }

    #[test]
    fn model_for_label_falls_back_to_default_model() {
        let router = Router {
            primary: Arc::new(StubProvider { name: "primary", fail: false }),
            fallback: None,
            model: "default-model".to_string(),
            routing_models: RoutingModels {
                coding: Some("coding-model".to_string()),
                ..RoutingModels::default()
            },
        };
        assert_eq!(router.model_for(RoutingLabel::Coding), "coding-model");
        assert_eq!(router.model_for(RoutingLabel::Analysis), "default-model");
    }
}
