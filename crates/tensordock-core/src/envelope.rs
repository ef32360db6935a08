//! Canonical response envelope and typed replies.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// The `{success, error}` pair every normalized response carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Whether the backend performed the operation.
    pub success: bool,
    /// Failure message; empty when the backend sent none.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub error: String,
}

impl Envelope {
    /// A failed envelope carrying `message`.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: message.into(),
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// A request the backend rejected with `success = false`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationFailure {
    /// Message from the envelope's `error` field.
    pub message: String,
}

impl fmt::Display for ApplicationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            f.write_str("request was not successful")
        } else {
            f.write_str(&self.message)
        }
    }
}

/// Outcome of a marketplace call that reached the backend and decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply<T> {
    /// The backend reported success; the payload is meaningful.
    Success(T),
    /// The backend reported failure; no payload was decoded.
    Failure(ApplicationFailure),
}

impl<T> Reply<T>
where
    T: DeserializeOwned,
{
    /// Decode canonical envelope bytes.
    ///
    /// The payload is only decoded when the envelope reports success.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the envelope or payload does not match the
    /// expected shape.
    pub fn decode(canonical: &[u8]) -> Result<Self> {
        let envelope: Envelope = serde_json::from_slice(canonical)
            .map_err(|err| Error::Decode(format!("invalid envelope: {err}")))?;

        if !envelope.success {
            return Ok(Self::Failure(ApplicationFailure {
                message: envelope.error,
            }));
        }

        serde_json::from_slice(canonical)
            .map(Self::Success)
            .map_err(|err| Error::Decode(format!("unexpected payload: {err}")))
    }
}

impl<T> Reply<T> {
    /// Returns true for [`Reply::Success`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The payload, if the call succeeded.
    #[must_use]
    pub fn success(self) -> Option<T> {
        match self {
            Self::Success(value) => Some(value),
            Self::Failure(_) => None,
        }
    }

    /// The failure, if the call did not succeed.
    #[must_use]
    pub const fn failure(&self) -> Option<&ApplicationFailure> {
        match self {
            Self::Success(_) => None,
            Self::Failure(failure) => Some(failure),
        }
    }

    /// Transform the payload.
    pub fn map<U, F>(self, f: F) -> Reply<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Self::Success(value) => Reply::Success(f(value)),
            Self::Failure(failure) => Reply::Failure(failure),
        }
    }

    /// Convert into a `Result`, turning a failure into
    /// [`Error::ApplicationFailure`].
    ///
    /// # Errors
    ///
    /// Returns the backend's failure message when the call did not succeed.
    pub fn into_result(self) -> Result<T> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure(failure) => Err(Error::ApplicationFailure(failure.to_string())),
        }
    }
}
