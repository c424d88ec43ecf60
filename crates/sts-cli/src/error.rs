//! CLI error types.

use sts_core::StsError;
use sts_protocol_saml::SamlError;
use sts_spi::SpiError;
use thiserror::Error;

/// CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Token service failure.
    #[error(transparent)]
    Sts(#[from] StsError),

    /// Message parsing or encoding failure.
    #[error(transparent)]
    Saml(#[from] SamlError),

    /// Provider or registry instantiation failure.
    #[error("provider setup failed: {0}")]
    Spi(#[from] SpiError),

    /// The checked token is not valid.
    #[error("{0}")]
    Invalid(String),

    /// Invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// CLI result type.
pub type CliResult<T> = Result<T, CliError>;
