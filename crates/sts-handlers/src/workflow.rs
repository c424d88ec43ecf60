//! Service provider side of the browser SSO exchange.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use sts_protocol_saml::bindings::{
    HttpPostBinding, HttpRedirectBinding, SAML_RESPONSE_PARAM, SamlMessageType,
};
use sts_protocol_saml::{SamlError, SamlResult};

use crate::request::HandlerResponse;

/// Request parameter asking for a global logout.
pub const GLOBAL_LOGOUT_PARAM: &str = "GLO";

/// Request parameter asking for a local logout.
pub const LOCAL_LOGOUT_PARAM: &str = "LLO";

/// Query or form parameters of an HTTP request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestParams {
    params: HashMap<String, String>,
}

impl RequestParams {
    /// Creates an empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses an `application/x-www-form-urlencoded` string. The first
    /// occurrence of a repeated parameter wins.
    #[must_use]
    pub fn from_query(query: &str) -> Self {
        let mut params = HashMap::new();
        for (key, value) in url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
            params.entry(key.into_owned()).or_insert_with(|| value.into_owned());
        }
        Self { params }
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Value of `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Returns true if `key` is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    fn is_true(&self, key: &str) -> bool {
        self.get(key).is_some_and(|value| value.eq_ignore_ascii_case("true"))
    }
}

impl FromIterator<(String, String)> for RequestParams {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            params: iter.into_iter().collect(),
        }
    }
}

/// What the transport sends back to the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingOutput {
    /// Redirect the browser to `location`.
    Redirect {
        /// Full URL including the SAML query string.
        location: String,
    },
    /// Serve an auto-submitting form.
    Post {
        /// The HTML page.
        html: String,
    },
}

impl BindingOutput {
    /// Redirect target, if this is a redirect.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        match self {
            Self::Redirect { location } => Some(location),
            Self::Post { .. } => None,
        }
    }

    /// Form page, if this is a POST.
    #[must_use]
    pub fn html(&self) -> Option<&str> {
        match self {
            Self::Post { html } => Some(html),
            Self::Redirect { .. } => None,
        }
    }
}

/// Delivers binding output to the browser.
///
/// Transports override the methods to write straight to their response type;
/// the defaults just return the output.
pub trait RedirectionHandler: Send + Sync + Debug {
    /// Sends a redirect.
    ///
    /// ## Errors
    ///
    /// Returns an error if the redirect cannot be delivered.
    fn send_redirect(&self, location: String) -> SamlResult<BindingOutput> {
        Ok(BindingOutput::Redirect { location })
    }

    /// Sends an auto-submitting form carrying `xml`.
    ///
    /// ## Errors
    ///
    /// Returns an error if the form cannot be delivered.
    fn send_post(
        &self,
        destination: &str,
        xml: &str,
        relay_state: Option<&str>,
        will_send_request: bool,
    ) -> SamlResult<BindingOutput> {
        Ok(BindingOutput::Post {
            html: HttpPostBinding::encode(xml, destination, relay_state, message_type(will_send_request)),
        })
    }
}

/// [`RedirectionHandler`] with the default behavior.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRedirectionHandler;

impl RedirectionHandler for DefaultRedirectionHandler {}

const fn message_type(will_send_request: bool) -> SamlMessageType {
    if will_send_request {
        SamlMessageType::Request
    } else {
        SamlMessageType::Response
    }
}

/// Request checks and message delivery for a service provider.
#[derive(Debug, Clone)]
pub struct ServiceProviderSamlWorkflow {
    redirection: Arc<dyn RedirectionHandler>,
}

impl Default for ServiceProviderSamlWorkflow {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceProviderSamlWorkflow {
    /// Creates a workflow using [`DefaultRedirectionHandler`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            redirection: Arc::new(DefaultRedirectionHandler),
        }
    }

    /// Replaces the redirection handler.
    #[must_use]
    pub fn with_redirection_handler(mut self, handler: Arc<dyn RedirectionHandler>) -> Self {
        self.redirection = handler;
        self
    }

    /// Returns true if the request carries a `SAMLResponse`. No signature or
    /// content check is made.
    #[must_use]
    pub fn validate(&self, params: &RequestParams) -> bool {
        params.contains(SAML_RESPONSE_PARAM)
    }

    /// Returns true if `GLO` is `true`, ignoring case.
    #[must_use]
    pub fn is_global_logout(&self, params: &RequestParams) -> bool {
        params.is_true(GLOBAL_LOGOUT_PARAM)
    }

    /// Returns true if `LLO` is `true`, ignoring case.
    #[must_use]
    pub fn is_local_logout(&self, params: &RequestParams) -> bool {
        params.is_true(LOCAL_LOGOUT_PARAM)
    }

    /// Sends a message to the IDP.
    ///
    /// With `post_binding` the message goes base64-encoded in a form.
    /// Otherwise it is deflated into a redirect URL, or
    /// `query_with_signature` is used as the query when the message was
    /// already signed.
    ///
    /// ## Errors
    ///
    /// Returns an encoding or delivery failure.
    pub fn send_request_to_idp(
        &self,
        destination: &str,
        message_xml: &str,
        relay_state: Option<&str>,
        will_send_request: bool,
        query_with_signature: Option<&str>,
        post_binding: bool,
    ) -> SamlResult<BindingOutput> {
        if post_binding {
            self.send_http_post_binding_request(destination, message_xml, relay_state, will_send_request)
        } else {
            self.send_http_redirect_request(
                destination,
                message_xml,
                relay_state,
                will_send_request,
                query_with_signature,
            )
        }
    }

    /// Sends a message with HTTP-Redirect.
    ///
    /// ## Errors
    ///
    /// Returns a deflate or delivery failure.
    pub fn send_http_redirect_request(
        &self,
        destination: &str,
        message_xml: &str,
        relay_state: Option<&str>,
        will_send_request: bool,
        query_with_signature: Option<&str>,
    ) -> SamlResult<BindingOutput> {
        let location = match query_with_signature {
            Some(query) => HttpRedirectBinding::append_query(destination, query),
            None => HttpRedirectBinding::encode(
                message_xml,
                destination,
                relay_state,
                message_type(will_send_request),
            )?,
        };
        tracing::debug!(destination, signed = query_with_signature.is_some(), "sending redirect to IDP");
        self.redirection.send_redirect(location)
    }

    /// Sends a message with HTTP-POST.
    ///
    /// ## Errors
    ///
    /// Returns a delivery failure.
    pub fn send_http_post_binding_request(
        &self,
        destination: &str,
        message_xml: &str,
        relay_state: Option<&str>,
        will_send_request: bool,
    ) -> SamlResult<BindingOutput> {
        tracing::debug!(destination, "sending POST form to IDP");
        self.redirection
            .send_post(destination, message_xml, relay_state, will_send_request)
    }

    /// Sends the message a handler chain produced.
    ///
    /// ## Errors
    ///
    /// Returns [`SamlError::InvalidRequest`] if the response has no message
    /// or no destination, or a delivery failure.
    pub fn send_response(&self, response: &HandlerResponse) -> SamlResult<BindingOutput> {
        let xml = response.message_xml().ok_or_else(|| {
            SamlError::InvalidRequest("handler chain produced no message".to_string())
        })?;
        let destination = response.destination.as_deref().ok_or_else(|| {
            SamlError::InvalidRequest("handler chain produced no destination".to_string())
        })?;
        self.send_request_to_idp(
            destination,
            &xml,
            response.relay_state.as_deref(),
            response.send_request,
            response.destination_query_with_signature.as_deref(),
            response.post_binding,
        )
    }
}
