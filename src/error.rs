//! Error types for Replikk.

use thiserror::Error;

/// Library-level error type for Replikk operations.
#[derive(Error, Debug)]
pub enum ReplikkError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Upstream request timed out: {0}")]
    UpstreamTimeout(String),

    #[error("Vector index error: {0}")]
    Index(String),

    #[error("Index write failed for batch {batch}: {message}")]
    IndexWriteFailed { batch: usize, message: String },

    #[error("Cache serialization failed: {0}")]
    CacheSerialization(String),

    #[error("Chat not found: {0}")]
    ChatNotFound(String),

    #[error("Transcript store error: {0}")]
    Transcript(String),

    #[error("Response generation failed: {0}")]
    Generation(String),

    #[error("Script ingestion error: {0}")]
    Ingest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),
}

/// Result type alias for Replikk operations.
pub type Result<T> = std::result::Result<T, ReplikkError>;
