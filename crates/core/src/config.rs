use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_PORT: u16 = 8787;
pub const DEFAULT_API_BIND: &str = "127.0.0.1";
/// Hard cap on a single inbound webhook body.
pub const MAX_PAYLOAD_BYTES: usize = 256 * 1024;

/// Top-level configuration (`gateway.toml` + `GATEWAY_*` env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub sender: SenderConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub cognition: CognitionConfig,
    #[serde(default)]
    pub profile: ProfileConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            pipeline: PipelineConfig::default(),
            sender: SenderConfig::default(),
            llm: LlmConfig::default(),
            cognition: CognitionConfig::default(),
            profile: ProfileConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    #[serde(default = "default_api_bind_host")]
    pub api_bind_host: String,
    /// Allowed `Origin` values for browser-facing endpoints, empty = none.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Shared secret checked against the `x-api-key` header on `/chat` and
    /// `/v1/chat/completions`. `None` disables the check (trusted network).
    #[serde(default)]
    pub api_key: Option<String>,
    /// Bridge-token gate for `/whatsapp/loop-test`, mirroring
    /// `WHATSAPP_BRIDGE_TOKEN` in the original deployment.
    #[serde(default)]
    pub bridge_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            api_bind_host: default_api_bind_host(),
            cors_origins: Vec::new(),
            api_key: None,
            bridge_token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_memory_db_path")]
    pub memory_db_path: String,
    #[serde(default = "default_graph_db_path")]
    pub graph_db_path: String,
    #[serde(default = "default_conflicts_path")]
    pub conflicts_path: String,
    #[serde(default = "default_memory_backup_path")]
    pub memory_backup_path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            memory_db_path: default_memory_db_path(),
            graph_db_path: default_graph_db_path(),
            conflicts_path: default_conflicts_path(),
            memory_backup_path: default_memory_backup_path(),
        }
    }
}

/// Deduplicator / flood-gate / queue / worker-pool tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_dedup_window_secs")]
    pub dedup_window_secs: u64,
    #[serde(default = "default_batch_window_secs")]
    pub batch_window_secs: f64,
    #[serde(default = "default_queue_max_size")]
    pub queue_max_size: usize,
    #[serde(default = "default_queue_max_history")]
    pub queue_max_history: usize,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default = "default_typing_interval_secs")]
    pub typing_interval_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dedup_window_secs: default_dedup_window_secs(),
            batch_window_secs: default_batch_window_secs(),
            queue_max_size: default_queue_max_size(),
            queue_max_history: default_queue_max_history(),
            worker_count: default_worker_count(),
            typing_interval_secs: default_typing_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SenderConfig {
    #[serde(default = "default_sender_cli_command")]
    pub cli_command: String,
    /// Name of the bridged channel passed to the CLI as `--channel`.
    #[serde(default = "default_sender_channel")]
    pub channel: String,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_cli_timeout_secs")]
    pub cli_timeout_secs: u64,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            cli_command: default_sender_cli_command(),
            channel: default_sender_channel(),
            chunk_size: default_chunk_size(),
            cli_timeout_secs: default_cli_timeout_secs(),
        }
    }
}

/// Back-end selection for the LLM adapter. Tagged so a single `LlmProvider`
/// trait object can be built from whichever variant is configured, instead
/// of branching on provider name throughout the codebase.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendKind {
    /// Routed through a self-hosted gateway that holds the real credentials.
    OauthProxy { url: String, token: String },
    /// Direct API key against a known OpenAI-compatible provider.
    DirectApiKey {
        provider_id: String,
        api_key: String,
    },
    /// A same-LAN machine running a local model server (e.g. Ollama).
    LocalVault { host: String, port: u16 },
    /// Last-resort OpenRouter fallback when the primary backend errors.
    OpenRouterFallback { api_key: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub primary: Option<BackendKind>,
    pub fallback: Option<BackendKind>,
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Per-routing-label model overrides; a label with no override falls
    /// back to `model`.
    #[serde(default)]
    pub routing_models: RoutingModels,
    #[serde(default = "default_llm_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            primary: None,
            fallback: None,
            model: default_llm_model(),
            routing_models: RoutingModels::default(),
            request_timeout_secs: default_llm_timeout_secs(),
        }
    }
}

/// Model override per routing label (`CASUAL | CODING | ANALYSIS | REVIEW`).
/// `None` means "use `LlmConfig::model`" — selection is a pure function of
/// this config plus the label a call site passes, never of which backend
/// happens to be configured.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingModels {
    #[serde(default)]
    pub casual: Option<String>,
    #[serde(default)]
    pub coding: Option<String>,
    #[serde(default)]
    pub analysis: Option<String>,
    #[serde(default)]
    pub review: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CognitionConfig {
    #[serde(default = "default_fast_phrases")]
    pub fast_phrases: Vec<String>,
    #[serde(default = "default_trajectory_window")]
    pub trajectory_window: usize,
    #[serde(default = "default_trajectory_min_turns")]
    pub trajectory_min_turns: usize,
}

impl Default for CognitionConfig {
    fn default() -> Self {
        Self {
            fast_phrases: default_fast_phrases(),
            trajectory_window: default_trajectory_window(),
            trajectory_min_turns: default_trajectory_min_turns(),
        }
    }
}

/// The optional layered persona-profile store, consumed as a prompt-prefix
/// provider. The layers themselves are written by an offline analyzer that
/// lives outside this core; this config only says where to find them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_profile_dir")]
    pub profile_dir: String,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            profile_dir: default_profile_dir(),
        }
    }
}

fn default_profile_dir() -> String {
    data_dir_path("data/profiles")
}

fn default_server_host() -> String {
    DEFAULT_API_BIND.to_string()
}
fn default_server_port() -> u16 {
    DEFAULT_API_PORT
}
fn default_api_bind_host() -> String {
    DEFAULT_API_BIND.to_string()
}
fn default_memory_db_path() -> String {
    data_dir_path("db/memory.db")
}
fn default_graph_db_path() -> String {
    data_dir_path("db/knowledge_graph.db")
}
fn default_conflicts_path() -> String {
    data_dir_path("conflicts.json")
}
fn default_memory_backup_path() -> String {
    data_dir_path("memory_backup.jsonl")
}
fn data_dir_path(rel: &str) -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.gateway/workspace/{}", home, rel)
}
fn default_dedup_window_secs() -> u64 {
    300
}
fn default_batch_window_secs() -> f64 {
    3.0
}
fn default_queue_max_size() -> usize {
    100
}
fn default_queue_max_history() -> usize {
    500
}
fn default_worker_count() -> usize {
    4
}
fn default_typing_interval_secs() -> u64 {
    4
}
fn default_sender_cli_command() -> String {
    "openclaw".to_string()
}
fn default_sender_channel() -> String {
    "whatsapp".to_string()
}
fn default_chunk_size() -> usize {
    4000
}
fn default_cli_timeout_secs() -> u64 {
    30
}
fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    30
}
fn default_trajectory_window() -> usize {
    20
}
fn default_trajectory_min_turns() -> usize {
    3
}
fn default_fast_phrases() -> Vec<String> {
    [
        "hi", "hello", "hey", "ok", "thanks", "good morning", "good night", "bye", "hmm", "haha",
        "lol", "yes", "no", "yep", "nope", "sure", "cool", "nice", "wow", "damn",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.gateway/gateway.toml", home)
}

impl GatewayConfig {
    /// Load config from a TOML file with `GATEWAY_*` env var overrides.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: GatewayConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("GATEWAY_").split("_"))
            .extract()
            .map_err(|e| crate::error::GatewayError::Config(e.to_string()))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = GatewayConfig::default();
        assert_eq!(cfg.server.port, DEFAULT_API_PORT);
        assert_eq!(cfg.pipeline.queue_max_size, 100);
        assert!(cfg.cognition.fast_phrases.contains(&"hello".to_string()));
    }

    #[test]
    fn env_override_splits_nested_keys() {
        std::env::set_var("GATEWAY_SERVER_PORT", "9999");
        let result: Result<GatewayConfig, _> = Figment::new()
            .merge(figment::providers::Serialized::defaults(GatewayConfig::default()))
            .merge(Env::prefixed("GATEWAY_").split("_"))
            .extract();
        std::env::remove_var("GATEWAY_SERVER_PORT");
        let cfg = result.expect("config should parse");
        assert_eq!(cfg.server.port, 9999);
    }
}
