//! Any SAML 2.0 protocol message, dispatched on its root element.

use super::{AuthnRequest, LogoutRequest, LogoutResponse, NameId, Response, Status};
use crate::constants::SAMLP_NS;
use crate::error::{SamlError, SamlResult};
use crate::xml::XmlElement;

/// A parsed SAML 2.0 protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SamlMessage {
    /// `samlp:AuthnRequest`.
    AuthnRequest(AuthnRequest),
    /// `samlp:Response`.
    Response(Response),
    /// `samlp:LogoutRequest`.
    LogoutRequest(LogoutRequest),
    /// `samlp:LogoutResponse`.
    LogoutResponse(LogoutResponse),
}

impl SamlMessage {
    /// Parses a protocol message document.
    ///
    /// ## Errors
    ///
    /// Returns [`SamlError::UnsupportedMessage`] for an unknown root element,
    /// or a parse error for malformed content.
    pub fn from_xml(xml: &str) -> SamlResult<Self> {
        Self::from_element(&XmlElement::parse(xml)?)
    }

    /// Reads a protocol message element.
    ///
    /// ## Errors
    ///
    /// Returns an error for unknown or malformed messages.
    pub fn from_element(element: &XmlElement) -> SamlResult<Self> {
        if element.namespace.as_deref() != Some(SAMLP_NS) {
            return Err(SamlError::UnsupportedMessage(element.name.clone()));
        }
        match element.local_name() {
            "AuthnRequest" => AuthnRequest::from_element(element).map(Self::AuthnRequest),
            "Response" => Response::from_element(element).map(Self::Response),
            "LogoutRequest" => LogoutRequest::from_element(element).map(Self::LogoutRequest),
            "LogoutResponse" => LogoutResponse::from_element(element).map(Self::LogoutResponse),
            _ => Err(SamlError::UnsupportedMessage(element.name.clone())),
        }
    }

    /// Builds the message element.
    #[must_use]
    pub fn to_element(&self) -> XmlElement {
        match self {
            Self::AuthnRequest(request) => request.to_element(),
            Self::Response(response) => response.to_element(),
            Self::LogoutRequest(request) => request.to_element(),
            Self::LogoutResponse(response) => response.to_element(),
        }
    }

    /// Serialises the message.
    #[must_use]
    pub fn to_xml(&self) -> String {
        self.to_element().to_xml()
    }

    /// The message ID.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::AuthnRequest(request) => &request.id,
            Self::Response(response) => &response.id,
            Self::LogoutRequest(request) => &request.id,
            Self::LogoutResponse(response) => &response.id,
        }
    }

    /// The issuer, if the message names one.
    #[must_use]
    pub fn issuer(&self) -> Option<&NameId> {
        match self {
            Self::AuthnRequest(request) => request.issuer.as_ref(),
            Self::Response(response) => response.issuer.as_ref(),
            Self::LogoutRequest(request) => request.issuer.as_ref(),
            Self::LogoutResponse(response) => response.issuer.as_ref(),
        }
    }

    /// The destination, if set.
    #[must_use]
    pub fn destination(&self) -> Option<&str> {
        match self {
            Self::AuthnRequest(request) => request.destination.as_deref(),
            Self::Response(response) => response.destination.as_deref(),
            Self::LogoutRequest(request) => request.destination.as_deref(),
            Self::LogoutResponse(response) => response.destination.as_deref(),
        }
    }

    /// The status of a status response.
    #[must_use]
    pub fn status(&self) -> Option<&Status> {
        match self {
            Self::Response(response) => Some(&response.status),
            Self::LogoutResponse(response) => Some(&response.status),
            Self::AuthnRequest(_) | Self::LogoutRequest(_) => None,
        }
    }

    /// True for requests, false for status responses.
    #[must_use]
    pub const fn is_request(&self) -> bool {
        matches!(self, Self::AuthnRequest(_) | Self::LogoutRequest(_))
    }

    /// Element name used in logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::AuthnRequest(_) => "AuthnRequest",
            Self::Response(_) => "Response",
            Self::LogoutRequest(_) => "LogoutRequest",
            Self::LogoutResponse(_) => "LogoutResponse",
        }
    }
}

impl From<AuthnRequest> for SamlMessage {
    fn from(request: AuthnRequest) -> Self {
        Self::AuthnRequest(request)
    }
}

impl From<Response> for SamlMessage {
    fn from(response: Response) -> Self {
        Self::Response(response)
    }
}

impl From<LogoutRequest> for SamlMessage {
    fn from(request: LogoutRequest) -> Self {
        Self::LogoutRequest(request)
    }
}

impl From<LogoutResponse> for SamlMessage {
    fn from(response: LogoutResponse) -> Self {
        Self::LogoutResponse(response)
    }
}
