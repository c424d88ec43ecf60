//! SAML error types.
//!
//! Failures while parsing, building or checking SAML messages. Every error
//! maps onto a SAML status code so the transport layer can answer with a
//! protocol-level error response.

use sts_core::{ErrorKind, StsError};
use thiserror::Error;

use crate::constants::{status_codes, sub_status_codes};

/// Result type for SAML operations.
pub type SamlResult<T> = Result<T, SamlError>;

/// SAML protocol errors.
#[derive(Debug, Error)]
pub enum SamlError {
    /// Invalid SAML request format or content.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid SAML response format or content.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// XML could not be parsed.
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    /// Missing required element.
    #[error("missing required element: {0}")]
    MissingElement(String),

    /// Missing or malformed attribute.
    #[error("invalid attribute {attribute} on {element}: {reason}")]
    InvalidAttribute {
        /// Element carrying the attribute.
        element: String,
        /// Attribute name.
        attribute: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Document root is not a message this crate understands.
    #[error("unsupported message: {0}")]
    UnsupportedMessage(String),

    /// Invalid assertion.
    #[error("invalid assertion: {0}")]
    InvalidAssertion(String),

    /// Assertion expired.
    #[error("assertion expired")]
    AssertionExpired,

    /// Assertion not yet valid.
    #[error("assertion not yet valid")]
    AssertionNotYetValid,

    /// Invalid audience.
    #[error("invalid audience: expected {expected}, got {actual}")]
    InvalidAudience {
        /// The expected audience URI.
        expected: String,
        /// The audiences found on the assertion.
        actual: String,
    },

    /// Issuer is not trusted.
    #[error("untrusted issuer: {0}")]
    UntrustedIssuer(String),

    /// The peer answered with a non-success status.
    #[error("peer returned status {code}{}", message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    StatusFailure {
        /// Top-level status code URI.
        code: String,
        /// Optional status message.
        message: Option<String>,
    },

    /// Unknown or unsupported binding.
    #[error("unsupported binding: {0}")]
    UnsupportedBinding(String),

    /// Base64 decoding error.
    #[error("base64 decode error: {0}")]
    Base64Decode(String),

    /// Deflate compression or decompression error.
    #[error("deflate error: {0}")]
    Deflate(String),

    /// Authentication failed.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The caller may not perform the operation.
    #[error("request denied: {0}")]
    RequestDenied(String),

    /// Message signing failed.
    #[error("signature creation failed: {0}")]
    SignatureCreation(String),

    /// Handler or binding misconfiguration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Failure reported by the token service.
    #[error(transparent)]
    Token(#[from] StsError),
}

impl SamlError {
    /// Creates an [`SamlError::InvalidAttribute`].
    pub fn invalid_attribute(
        element: impl Into<String>,
        attribute: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidAttribute {
            element: element.into(),
            attribute: attribute.into(),
            reason: reason.into(),
        }
    }

    /// Returns the top-level SAML status code for this error.
    #[must_use]
    pub fn status_code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_)
            | Self::InvalidResponse(_)
            | Self::XmlParse(_)
            | Self::MissingElement(_)
            | Self::InvalidAttribute { .. }
            | Self::UnsupportedMessage(_)
            | Self::InvalidAssertion(_)
            | Self::AssertionExpired
            | Self::AssertionNotYetValid
            | Self::InvalidAudience { .. }
            | Self::UntrustedIssuer(_)
            | Self::UnsupportedBinding(_)
            | Self::Base64Decode(_)
            | Self::Deflate(_)
            | Self::AuthenticationFailed(_)
            | Self::RequestDenied(_) => status_codes::REQUESTER,
            Self::Token(err) => match err.kind() {
                ErrorKind::Validation(_) | ErrorKind::Permission => status_codes::REQUESTER,
                ErrorKind::Configuration | ErrorKind::Processing => status_codes::RESPONDER,
            },
            Self::StatusFailure { .. } | Self::SignatureCreation(_) | Self::Configuration(_) => {
                status_codes::RESPONDER
            }
        }
    }

    /// Returns a second-level status code if one applies.
    #[must_use]
    pub fn sub_status_code(&self) -> Option<&'static str> {
        match self {
            Self::AuthenticationFailed(_) => Some(sub_status_codes::AUTHN_FAILED),
            Self::RequestDenied(_) | Self::UntrustedIssuer(_) => {
                Some(sub_status_codes::REQUEST_DENIED)
            }
            Self::InvalidAudience { .. } => Some(sub_status_codes::INVALID_ATTR_NAME_OR_VALUE),
            Self::UnsupportedBinding(_) => Some(sub_status_codes::UNSUPPORTED_BINDING),
            Self::UnsupportedMessage(_) => Some(sub_status_codes::REQUEST_UNSUPPORTED),
            Self::Token(err) if err.kind() == ErrorKind::Permission => {
                Some(sub_status_codes::REQUEST_DENIED)
            }
            _ => None,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidRequest(_)
            | Self::InvalidResponse(_)
            | Self::MissingElement(_)
            | Self::InvalidAttribute { .. }
            | Self::UnsupportedMessage(_)
            | Self::Base64Decode(_)
            | Self::Deflate(_)
            | Self::XmlParse(_) => 400,
            Self::AuthenticationFailed(_)
            | Self::AssertionExpired
            | Self::AssertionNotYetValid
            | Self::InvalidAssertion(_)
            | Self::InvalidAudience { .. } => 401,
            Self::RequestDenied(_) | Self::UntrustedIssuer(_) => 403,
            Self::Token(err) if err.is_client_error() => 400,
            _ => 500,
        }
    }
}

impl From<quick_xml::Error> for SamlError {
    fn from(err: quick_xml::Error) -> Self {
        Self::XmlParse(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for SamlError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Self::XmlParse(err.to_string())
    }
}

impl From<base64::DecodeError> for SamlError {
    fn from(err: base64::DecodeError) -> Self {
        Self::Base64Decode(err.to_string())
    }
}

impl From<std::io::Error> for SamlError {
    fn from(err: std::io::Error) -> Self {
        Self::Deflate(err.to_string())
    }
}

impl From<SamlError> for StsError {
    fn from(err: SamlError) -> Self {
        match err {
            SamlError::Token(err) => err,
            SamlError::AssertionExpired => Self::AssertionExpired("assertion expired".to_string()),
            err @ (SamlError::InvalidAssertion(_)
            | SamlError::AssertionNotYetValid
            | SamlError::InvalidAudience { .. }
            | SamlError::UntrustedIssuer(_)
            | SamlError::StatusFailure { .. }
            | SamlError::AuthenticationFailed(_)) => Self::AssertionInvalid(err.to_string()),
            SamlError::RequestDenied(msg) => Self::PermissionDenied(msg),
            SamlError::Configuration(msg) => Self::Configuration(msg),
            other => Self::Processing(other.to_string()),
        }
    }
}
