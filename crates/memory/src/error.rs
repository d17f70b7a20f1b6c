use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("embedding error: {0}")]
    Embed(#[from] gw_embedder::EmbedError),

    #[error("llm provider error: {0}")]
    Llm(#[from] gw_llm::ProviderError),

    #[error("database locked after {attempts} retries")]
    LockContention { attempts: u32 },

    #[error("conflict not found: {0}")]
    ConflictNotFound(String),
}

pub type Result<T> = std::result::Result<T, MemoryError>;
