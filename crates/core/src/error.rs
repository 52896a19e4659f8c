//! Error types for Grounded.
//!
//! This module defines a unified error enum that covers all error categories
//! in the workspace: configuration, I/O, embedding, generation, retrieval,
//! session lookup, prompt rendering and serialization.

use thiserror::Error;

/// Unified error type for Grounded.
///
/// All fallible functions in the workspace return `Result<T, AppError>`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Embedding provider errors
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Text generation (LLM provider) errors
    #[error("Generation error: {0}")]
    Generation(String),

    /// Retrieval failed, usually because the query could not be embedded
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// The requested chat session does not exist
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Caller supplied an out-of-range or malformed argument
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Prompt template errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether the error was caused by the caller rather than by a collaborator.
    pub fn is_client_error(&self) -> bool {
        matches!(self, AppError::SessionNotFound(_) | AppError::InvalidInput(_))
    }
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors() {
        assert!(AppError::SessionNotFound("s1".to_string()).is_client_error());
        assert!(AppError::InvalidInput("top_k".to_string()).is_client_error());
        assert!(!AppError::Generation("timeout".to_string()).is_client_error());
    }

    #[test]
    fn test_display_includes_category() {
        let err = AppError::Retrieval("embedding service down".to_string());
        assert_eq!(err.to_string(), "Retrieval error: embedding service down");
    }

    #[test]
    fn test_from_serde_json() {
        let err: AppError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, AppError::Serialization(_)));
    }
}
