use std::io;
use thiserror::Error;

/// Application-wide error type, consolidating all possible errors into a single enum.
#[derive(Debug, Error)]
pub enum AppError {
    /// Represents standard input/output errors.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Represents errors specific to the actor system, such as communication failures.
    #[error("Actor error: {0}")]
    Actor(#[from] crate::actors::messages::ActorError),

    /// Represents data validation errors (e.g., invalid input format).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Represents configuration-related errors (e.g., missing environment variables).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Static data (lexicon, resource tables, character card) failed to load.
    /// Fatal at startup.
    #[error("Data load error: {0}")]
    DataLoad(String),

    /// The turn log could not be written or read.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Represents unexpected internal errors that indicate a bug.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Represents errors from operations that did not complete in time.
    #[error("Operation timed out: {0}")]
    Timeout(String),
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        match self {
            AppError::Io(e) => AppError::Io(io::Error::new(e.kind(), e.to_string())),
            AppError::Actor(e) => AppError::Actor(e.clone()),
            AppError::Validation(s) => AppError::Validation(s.clone()),
            AppError::Config(s) => AppError::Config(s.clone()),
            AppError::DataLoad(s) => AppError::DataLoad(s.clone()),
            AppError::Persistence(s) => AppError::Persistence(s.clone()),
            AppError::Internal(s) => AppError::Internal(s.clone()),
            AppError::Timeout(s) => AppError::Timeout(s.clone()),
        }
    }
}

impl From<tokio::time::error::Elapsed> for AppError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        AppError::Timeout(format!("Operation timed out: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Validation(format!("JSON error: {}", err))
    }
}

impl From<url::ParseError> for AppError {
    fn from(err: url::ParseError) -> Self {
        AppError::Config(format!("URL parse error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(format!("Validation errors: {}", err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Actor(crate::actors::messages::ActorError::LlmError(format!(
            "HTTP error: {}",
            err
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actors::messages::ActorError;

    #[test]
    fn test_clone_preserves_variant_and_message() {
        let err = AppError::DataLoad("lexicon.json: missing category 'crisis'".to_string());
        let cloned = err.clone();
        assert!(matches!(cloned, AppError::DataLoad(_)));
        assert_eq!(err.to_string(), cloned.to_string());

        let err = AppError::Actor(ActorError::Timeout("llm".to_string()));
        assert_eq!(err.to_string(), err.clone().to_string());
    }

    #[test]
    fn test_json_error_maps_to_validation() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: AppError = parse_err.into();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
