use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("embeddings provider not configured: {0}")]
    NotConfigured(String),

    /// The provider answered, but not with embeddings.
    #[error("{0}")]
    Embedding(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid timestamp: {0}")]
    Timestamp(String),
}

pub type Result<T> = std::result::Result<T, MemoryError>;
