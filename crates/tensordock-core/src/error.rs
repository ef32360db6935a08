//! Error types for marketplace operations.
//!
//! Transport and decode faults are fatal for the call that raised them and are
//! never folded into [`Error::ApplicationFailure`]; the latter only appears when a
//! caller explicitly converts a failed [`Reply`](crate::envelope::Reply).

use thiserror::Error;

/// Main error type for marketplace operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Network or connection level failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Response body could not be decoded
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The backend reported `success = false`
    #[error("API call failed: {0}")]
    ApplicationFailure(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid endpoint
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// An authenticated call was attempted without API credentials
    #[error("Missing API credentials: {0}")]
    MissingCredentials(String),
}

/// Specialized result type for marketplace operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::Decode(_) => "DECODE_ERROR",
            Self::ApplicationFailure(_) => "APPLICATION_FAILURE",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::InvalidEndpoint(_) => "INVALID_ENDPOINT",
            Self::MissingCredentials(_) => "MISSING_CREDENTIALS",
        }
    }

    /// Returns true when the backend answered and reported a failure, as
    /// opposed to the call itself failing.
    #[must_use]
    pub const fn is_application_failure(&self) -> bool {
        matches!(self, Self::ApplicationFailure(_))
    }
}

// reqwest's Display omits the underlying cause (DNS, refused, reset), so the
// whole chain is kept.
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        Self::Transport(message)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidEndpoint(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Self::ConfigError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ConfigError(err.to_string())
    }
}
