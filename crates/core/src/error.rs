use thiserror::Error;

/// Flat error taxonomy shared by every crate in the workspace. Individual
/// crates define their own richer error enums (`MemoryError`, `ProviderError`,
/// ...) and convert into this one at the boundary where an error is reported
/// to a client or logged for an operator (ingress handlers, the worker pool).
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("queue is full, dropping task")]
    QueueFull,

    #[error("llm provider error: {0}")]
    Llm(String),

    #[error("memory engine error: {0}")]
    Memory(String),

    #[error("sender error: {0}")]
    Sender(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("corrupt persisted state: {0}")]
    CorruptState(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("request timeout after {ms}ms")]
    Timeout { ms: u64 },

    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Short, stable error code. Used to shape HTTP error bodies and for
    /// metrics/log grepping — never changes across message-text revisions.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::Config(_) => "CONFIG_ERROR",
            GatewayError::Auth(_) => "AUTH_FAILED",
            GatewayError::QueueFull => "QUEUE_FULL",
            GatewayError::Llm(_) => "LLM_ERROR",
            GatewayError::Memory(_) => "MEMORY_ERROR",
            GatewayError::Sender(_) => "SENDER_ERROR",
            GatewayError::Database(_) => "DATABASE_ERROR",
            GatewayError::CorruptState(_) => "CORRUPT_STATE",
            GatewayError::Serialization(_) => "SERIALIZATION_ERROR",
            GatewayError::Io(_) => "IO_ERROR",
            GatewayError::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            GatewayError::Timeout { .. } => "TIMEOUT",
            GatewayError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
