//! Error types for askdocs.
//!
//! A single error enum covers configuration, transport, stream and schema
//! failures across the workspace.

use thiserror::Error;

/// Unified error type for askdocs.
///
/// All fallible functions return `Result<T, AppError>`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Request could not be sent or the backend answered with an error status
    #[error("HTTP error: {0}")]
    Http(String),

    /// Failure while reading an open event stream
    #[error("Stream error: {0}")]
    Stream(String),

    /// Response body did not match the expected shape
    #[error("Schema error: {0}")]
    Schema(String),

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
