//! SAML 2.0 HTTP bindings.
//!
//! - **HTTP-POST** - messages are base64-encoded into an auto-submitting HTML form
//! - **HTTP-Redirect** - messages are deflated, base64-encoded and URL-encoded
//!   into the query string
//!
//! Only the redirect binding compresses its payload; POST bodies have no
//! length limit and peers reject deflated POST content.

mod post;
mod redirect;

pub use post::*;
pub use redirect::*;

/// Query or form parameter carrying a request.
pub const SAML_REQUEST_PARAM: &str = "SAMLRequest";
/// Query or form parameter carrying a status response.
pub const SAML_RESPONSE_PARAM: &str = "SAMLResponse";
/// Opaque state echoed back by the peer.
pub const RELAY_STATE_PARAM: &str = "RelayState";
/// Redirect signature algorithm parameter.
pub const SIG_ALG_PARAM: &str = "SigAlg";
/// Redirect signature parameter.
pub const SIGNATURE_PARAM: &str = "Signature";

/// Direction of a message carried by a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamlMessageType {
    /// Request messages (`SAMLRequest`).
    Request,
    /// Status responses (`SAMLResponse`).
    Response,
}

impl SamlMessageType {
    /// Parameter name for this message type.
    #[must_use]
    pub const fn form_param(&self) -> &'static str {
        match self {
            Self::Request => SAML_REQUEST_PARAM,
            Self::Response => SAML_RESPONSE_PARAM,
        }
    }
}

/// A message extracted from a binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMessage {
    /// The message document.
    pub xml: String,
    /// Request or response.
    pub message_type: SamlMessageType,
    /// `RelayState`, if present.
    pub relay_state: Option<String>,
    /// Redirect `Signature`, if present.
    pub signature: Option<String>,
    /// Redirect `SigAlg`, if present.
    pub sig_alg: Option<String>,
}

fn select_message<'a>(
    saml_request: Option<&'a str>,
    saml_response: Option<&'a str>,
) -> crate::SamlResult<(&'a str, SamlMessageType)> {
    match (saml_request, saml_response) {
        (Some(request), _) => Ok((request, SamlMessageType::Request)),
        (None, Some(response)) => Ok((response, SamlMessageType::Response)),
        (None, None) => Err(crate::SamlError::InvalidRequest(format!(
            "no {SAML_REQUEST_PARAM} or {SAML_RESPONSE_PARAM} parameter"
        ))),
    }
}
