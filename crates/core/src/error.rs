//! Error types for docask.
//!
//! This module defines a unified error enum that covers all error categories
//! in the application: configuration, I/O, completion service, knowledge
//! (search and answering), prompt rendering and serialization.

use thiserror::Error;

/// Unified error type for docask.
///
/// Library functions return `Result<T, AppError>`. Conditions the answer loop
/// recovers from (rate limits, oversized payloads, malformed model output) are
/// not errors; they are reported through outcome types instead.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Completion service errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Collection, search and answering errors
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_prefixes() {
        assert_eq!(
            AppError::Config("missing key".to_string()).to_string(),
            "Configuration error: missing key"
        );
        assert_eq!(AppError::Other("plain".to_string()).to_string(), "plain");
    }

    #[test]
    fn test_json_error_converts_to_serialization() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let app: AppError = err.into();
        assert!(matches!(app, AppError::Serialization(_)));
    }
}
