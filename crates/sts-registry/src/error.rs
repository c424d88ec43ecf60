//! Registry error types.

use std::fmt;

use sts_core::StsError;

/// Registry operation errors.
#[derive(Debug)]
pub enum RegistryError {
    /// The backing store could not be read or written.
    Io(String),
    /// An entry could not be encoded or decoded.
    Serialization(String),
    /// Invalid registry configuration.
    Configuration(String),
    /// Internal registry error.
    Internal(String),
}

impl RegistryError {
    pub(crate) fn io(context: impl fmt::Display, err: &std::io::Error) -> Self {
        Self::Io(format!("{context}: {err}"))
    }
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "registry I/O error: {msg}"),
            Self::Serialization(msg) => write!(f, "registry serialization error: {msg}"),
            Self::Configuration(msg) => write!(f, "registry configuration error: {msg}"),
            Self::Internal(msg) => write!(f, "internal registry error: {msg}"),
        }
    }
}

impl std::error::Error for RegistryError {}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<RegistryError> for StsError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Configuration(msg) => Self::Configuration(msg),
            other => Self::Processing(other.to_string()),
        }
    }
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
