//! Error types for Cosmic Chat.
//!
//! This module defines a unified error enum that covers all error categories
//! in the application, including configuration, I/O, LLM backends, retrieval,
//! prompt assembly, chat state and persistence.

use thiserror::Error;

/// Unified error type for Cosmic Chat.
///
/// All fallible functions in the workspace return `Result<T, AppError>`.
/// Generation failures never reach the conversation layer as errors: the
/// answer generator turns them into answer text.
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or invalid configuration. Fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Embedding or generation backend unreachable, timed out or non-2xx
    #[error("LLM error: {0}")]
    Llm(String),

    /// Vector store and retrieval errors
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Prompt assembly errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Invalid session or feedback operations
    #[error("Chat error: {0}")]
    Chat(String),

    /// Conversation store and feedback log errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
