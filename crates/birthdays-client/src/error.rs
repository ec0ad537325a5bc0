//! Client error types.

use std::fmt;
use std::process::ExitCode;

use birthdays_providers::ProviderError;
use birthdays_server::ServerError;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug)]
pub enum ClientError {
    /// Configuration error.
    Config(String),
    /// Provider error.
    Provider(String),
    /// Poll loop or publisher error.
    Server(String),
    /// IO error.
    Io(std::io::Error),
    /// A connection check failed; `reason` is `invalid_auth`,
    /// `cannot_connect` or `unknown`.
    Check {
        reason: &'static str,
        message: String,
    },
}

impl ClientError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Config(_) => ExitCode::from(2),
            Self::Check { .. } => ExitCode::from(3),
            _ => ExitCode::FAILURE,
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {}", msg),
            Self::Provider(msg) => write!(f, "provider error: {}", msg),
            Self::Server(msg) => write!(f, "{}", msg),
            Self::Io(err) => write!(f, "IO error: {}", err),
            Self::Check { reason, message } => write!(f, "{}: {}", reason, message),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<ProviderError> for ClientError {
    fn from(err: ProviderError) -> Self {
        Self::Provider(err.to_string())
    }
}

impl From<ServerError> for ClientError {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::Provider(e) => e.into(),
            ServerError::Io(e) => Self::Io(e),
            ServerError::Config { message } => Self::Config(message),
            other => Self::Server(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_error_display() {
        let err = ClientError::Check {
            reason: "invalid_auth",
            message: "401".to_string(),
        };
        assert_eq!(err.to_string(), "invalid_auth: 401");
    }

    #[test]
    fn server_errors_are_unwrapped() {
        let err: ClientError = ServerError::Provider(ProviderError::network("down")).into();
        assert!(matches!(err, ClientError::Provider(_)));

        let err: ClientError = ServerError::config("bad").into();
        assert!(matches!(err, ClientError::Config(ref m) if m == "bad"));
    }
}
