//! State threaded through one handler chain invocation.

use std::collections::HashMap;

use sts_protocol_saml::xml::XmlElement;
use sts_protocol_saml::{Assertion, NameId, SamlMessage};

/// Which outbound request a generation pass builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationMode {
    /// An `AuthnRequest`.
    Auth,
    /// A `LogoutRequest`.
    Logout,
}

/// Options handlers read from and add to the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Attributes to release for the principal, by attribute name.
    pub attributes: HashMap<String, Vec<String>>,
    /// Authentication context class the principal logged in with.
    pub login_type: Option<String>,
    /// Answer with HTTP-POST even if the peer used HTTP-Redirect.
    pub strict_post_binding: bool,
    /// Peer expects HTTP-POST.
    pub post_binding: bool,
    /// ID of the `AuthnRequest` generated during this invocation.
    pub auth_request_id: Option<String>,
}

/// Inbound side of a chain invocation.
#[derive(Debug, Clone)]
pub struct HandlerRequest {
    /// Our own entity ID.
    pub issuer: NameId,
    /// Message received from the peer, absent when generating.
    pub message: Option<SamlMessage>,
    /// Document the message was read from.
    pub document: Option<XmlElement>,
    /// `RelayState` received with the message.
    pub relay_state: Option<String>,
    /// Handler options.
    pub options: RequestOptions,
    /// Request to build during a generation pass.
    pub generation_mode: Option<GenerationMode>,
    /// Authenticated principal, if any.
    pub principal: Option<String>,
    /// Roles of the authenticated principal.
    pub roles: Vec<String>,
    /// Assertion bound to the principal's session.
    pub session_assertion: Option<Assertion>,
}

impl HandlerRequest {
    fn empty(issuer: NameId) -> Self {
        Self {
            issuer,
            message: None,
            document: None,
            relay_state: None,
            options: RequestOptions::default(),
            generation_mode: None,
            principal: None,
            roles: Vec::new(),
            session_assertion: None,
        }
    }

    /// A request carrying a message received from the peer.
    #[must_use]
    pub fn inbound(issuer: NameId, message: SamlMessage) -> Self {
        let mut request = Self::empty(issuer);
        request.document = Some(message.to_element());
        request.message = Some(message);
        request
    }

    /// A request asking the chain to build an outbound message.
    #[must_use]
    pub fn generate(issuer: NameId, mode: GenerationMode) -> Self {
        let mut request = Self::empty(issuer);
        request.generation_mode = Some(mode);
        request
    }

    /// Sets the relay state.
    #[must_use]
    pub fn with_relay_state(mut self, relay_state: impl Into<String>) -> Self {
        self.relay_state = Some(relay_state.into());
        self
    }

    /// Sets the authenticated principal.
    #[must_use]
    pub fn with_principal(mut self, principal: impl Into<String>) -> Self {
        self.principal = Some(principal.into());
        self
    }

    /// Grants the principal a role.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    /// Replaces the options.
    #[must_use]
    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// Binds an assertion to the principal's session.
    #[must_use]
    pub fn with_session_assertion(mut self, assertion: Assertion) -> Self {
        self.session_assertion = Some(assertion);
        self
    }
}

/// An error answer the transport should send instead of a SAML message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError {
    /// HTTP status code.
    pub status: u16,
    /// Explanation for the log and error page.
    pub message: String,
}

/// Outbound side of a chain invocation.
#[derive(Debug, Clone, Default)]
pub struct HandlerResponse {
    /// Message to send to the peer.
    pub message: Option<SamlMessage>,
    /// Document of [`HandlerResponse::message`].
    pub document: Option<XmlElement>,
    /// `RelayState` to send back.
    pub relay_state: Option<String>,
    /// Where to send the message.
    pub destination: Option<String>,
    /// Send with HTTP-POST rather than HTTP-Redirect.
    pub post_binding: bool,
    /// True when the message is a request, false for a status response.
    pub send_request: bool,
    /// Signed redirect query string, set by the signature handler.
    pub destination_query_with_signature: Option<String>,
    /// Error to report instead of sending a message.
    pub error: Option<HandlerError>,
    /// Principal established from a received assertion.
    pub principal: Option<String>,
    /// Roles established from a received assertion.
    pub roles: Vec<String>,
    /// Attributes collected from received assertions.
    pub attributes: HashMap<String, Vec<String>>,
    /// Assertion issued or accepted during this invocation.
    pub assertion: Option<Assertion>,
    /// The local session should end.
    pub terminate_session: bool,
}

impl HandlerResponse {
    /// Creates an empty response.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the message to emit along with its document.
    pub fn set_message(&mut self, message: impl Into<SamlMessage>) {
        let message = message.into();
        self.document = Some(message.to_element());
        self.message = Some(message);
    }

    /// Serialised form of the message to emit.
    #[must_use]
    pub fn message_xml(&self) -> Option<String> {
        self.document.as_ref().map(XmlElement::to_xml)
    }

    /// Records an error answer.
    pub fn set_error(&mut self, status: u16, message: impl Into<String>) {
        self.error = Some(HandlerError {
            status,
            message: message.into(),
        });
    }
}
