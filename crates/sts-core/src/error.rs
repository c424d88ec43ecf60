//! Error handling for the security token service.
//!
//! Failures fall into four kinds so callers can decide how to answer:
//! configuration problems fail fast, processing problems may be retried by
//! the caller, validation failures carry a sub-kind that maps onto
//! protocol-specific responses, and permission failures deny the caller.

use thiserror::Error;

/// Result type alias using the STS error type.
pub type StsResult<T> = std::result::Result<T, StsError>;

/// Why a token failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationFailure {
    /// The token is outside its conditions window.
    Expired,
    /// The token is missing, cancelled or otherwise unusable.
    Invalid,
}

/// Coarse classification of an [`StsError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing issuer, missing provider, bad options.
    Configuration,
    /// Registry I/O, malformed input, schema-invalid documents.
    Processing,
    /// The token was evaluated and rejected.
    Validation(ValidationFailure),
    /// The caller may not use the STS.
    Permission,
}

/// Main error type for STS operations.
#[derive(Debug, Error)]
pub enum StsError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Processing error.
    #[error("processing error: {0}")]
    Processing(String),

    /// A value did not match the expected lexical format.
    #[error("invalid format for {expected}: {value:?}")]
    InvalidFormat {
        /// The rejected input.
        value: String,
        /// What the input was supposed to be.
        expected: &'static str,
    },

    /// The assertion is outside its validity window.
    #[error("assertion expired: {0}")]
    AssertionExpired(String),

    /// The assertion is absent, cancelled or malformed.
    #[error("assertion invalid: {0}")]
    AssertionInvalid(String),

    /// The caller lacks the permission required for the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),
}

impl StsError {
    /// Classifies this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Processing(_) | Self::InvalidFormat { .. } => ErrorKind::Processing,
            Self::AssertionExpired(_) => ErrorKind::Validation(ValidationFailure::Expired),
            Self::AssertionInvalid(_) => ErrorKind::Validation(ValidationFailure::Invalid),
            Self::PermissionDenied(_) => ErrorKind::Permission,
        }
    }

    /// Returns the validation sub-kind, if this is a validation failure.
    #[must_use]
    pub const fn validation_failure(&self) -> Option<ValidationFailure> {
        match self.kind() {
            ErrorKind::Validation(failure) => Some(failure),
            _ => None,
        }
    }

    /// Returns whether this error was caused by the caller's input rather than the service.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidFormat { .. }
                | Self::AssertionExpired(_)
                | Self::AssertionInvalid(_)
                | Self::PermissionDenied(_)
        )
    }
}
