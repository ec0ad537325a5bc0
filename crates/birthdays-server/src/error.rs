//! Server error types.

use std::io;

use birthdays_providers::ProviderError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the poll loop.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The contact source failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// IO error (state file, stdout).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A publisher could not deliver a snapshot.
    #[error("Publisher {publisher} failed: {message}")]
    Publish { publisher: String, message: String },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl ServerError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a publish error.
    pub fn publish(publisher: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Publish {
            publisher: publisher.into(),
            message: message.into(),
        }
    }

    /// Returns the provider error, if this is one.
    pub fn as_provider(&self) -> Option<&ProviderError> {
        match self {
            Self::Provider(e) => Some(e),
            _ => None,
        }
    }
}
