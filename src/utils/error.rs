//! Error Handling
//!
//! Unified error types for the engine.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

use crate::services::embedding::EmbeddingError;
use crate::services::llm::ChatError;

/// Engine-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Extraction produced no text to chunk
    #[error("No text to chunk: {0}")]
    ExtractionEmpty(String),

    /// Upstream embedding provider failure (auto-converted from EmbeddingError)
    #[error("Embedding service error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Vector store or index unavailable
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Language model invocation failure (auto-converted from ChatError)
    #[error("Synthesis error: {0}")]
    Synthesis(#[from] ChatError),

    /// Database errors
    #[error("Database error: {0}")]
    Database(String),

    /// SQLite errors (auto-converted from rusqlite::Error)
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for engine errors
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Create an extraction-empty error
    pub fn extraction_empty(msg: impl Into<String>) -> Self {
        Self::ExtractionEmpty(msg.into())
    }

    /// Create a retrieval error
    pub fn retrieval(msg: impl Into<String>) -> Self {
        Self::Retrieval(msg.into())
    }

    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether retrying the failed call (with backoff) can succeed.
    ///
    /// Only provider-side transient failures qualify; everything else
    /// (validation, schema, I/O on local state) needs intervention.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Embedding(e) => e.is_retryable(),
            Self::Synthesis(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// Convert AppError to a string suitable for collaborator-facing responses
impl From<AppError> for String {
    fn from(err: AppError) -> String {
        err.to_string()
    }
}
