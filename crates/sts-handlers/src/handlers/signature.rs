//! HTTP-Redirect query signing.

use std::fmt::Debug;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sts_protocol_saml::bindings::{
    HttpRedirectBinding, SIG_ALG_PARAM, SIGNATURE_PARAM, SamlMessageType,
};
use sts_protocol_saml::SamlResult;

use crate::handler::{HandlerOutcome, HandlerRole, SamlHandler};
use crate::request::{HandlerRequest, HandlerResponse};

/// Factory name of [`SignatureGenerationHandler`].
pub const SIGNATURE_GENERATION_HANDLER: &str = "signature-generation";

/// Signs redirect query strings. Keys stay with the implementation.
pub trait MessageSigner: Send + Sync + Debug {
    /// Algorithm URI sent as `SigAlg`.
    fn signature_algorithm(&self) -> &str;

    /// Raw signature over `data`.
    ///
    /// ## Errors
    ///
    /// Returns [`sts_protocol_saml::SamlError::SignatureCreation`] if signing fails.
    fn sign(&self, data: &[u8]) -> SamlResult<Vec<u8>>;
}

/// Signs the outgoing message for the HTTP-Redirect binding.
///
/// The signature covers `SAMLRequest`/`SAMLResponse`, `RelayState` and
/// `SigAlg` in that order. Messages sent with HTTP-POST carry an enveloped
/// XML signature instead and are left alone.
#[derive(Debug)]
pub struct SignatureGenerationHandler {
    role: HandlerRole,
    signer: Arc<dyn MessageSigner>,
}

impl SignatureGenerationHandler {
    /// Creates a handler for `role` signing with `signer`.
    #[must_use]
    pub fn new(role: HandlerRole, signer: Arc<dyn MessageSigner>) -> Self {
        Self { role, signer }
    }

    /// Builds the signed query string for `xml`.
    ///
    /// ## Errors
    ///
    /// Returns the encoding or signing failure.
    pub fn signed_query(
        &self,
        xml: &str,
        relay_state: Option<&str>,
        message_type: SamlMessageType,
    ) -> SamlResult<String> {
        let mut query = HttpRedirectBinding::encode_query(xml, relay_state, message_type)?;
        query.push_str(&format!(
            "&{SIG_ALG_PARAM}={}",
            urlencoding::encode(self.signer.signature_algorithm())
        ));
        let signature = STANDARD.encode(self.signer.sign(query.as_bytes())?);
        query.push_str(&format!(
            "&{SIGNATURE_PARAM}={}",
            urlencoding::encode(&signature)
        ));
        Ok(query)
    }

    fn sign_response(&self, response: &mut HandlerResponse) -> SamlResult<HandlerOutcome> {
        if response.error.is_some() {
            return Ok(HandlerOutcome::Continue);
        }
        let Some(xml) = response.message_xml() else {
            return Ok(HandlerOutcome::Continue);
        };
        if response.post_binding {
            tracing::debug!("POST binding; redirect signature not applied");
            return Ok(HandlerOutcome::Continue);
        }
        let message_type = if response.send_request {
            SamlMessageType::Request
        } else {
            SamlMessageType::Response
        };
        let query = self.signed_query(&xml, response.relay_state.as_deref(), message_type)?;
        tracing::debug!(
            algorithm = self.signer.signature_algorithm(),
            ?message_type,
            "signed redirect query"
        );
        response.destination_query_with_signature = Some(query);
        Ok(HandlerOutcome::Continue)
    }
}

impl SamlHandler for SignatureGenerationHandler {
    fn name(&self) -> &str {
        SIGNATURE_GENERATION_HANDLER
    }

    fn role(&self) -> HandlerRole {
        self.role
    }

    fn generate_saml_request(
        &mut self,
        _request: &mut HandlerRequest,
        response: &mut HandlerResponse,
    ) -> SamlResult<HandlerOutcome> {
        self.sign_response(response)
    }

    fn handle_request_type(
        &mut self,
        _request: &mut HandlerRequest,
        response: &mut HandlerResponse,
    ) -> SamlResult<HandlerOutcome> {
        self.sign_response(response)
    }

    fn handle_status_response_type(
        &mut self,
        _request: &mut HandlerRequest,
        response: &mut HandlerResponse,
    ) -> SamlResult<HandlerOutcome> {
        self.sign_response(response)
    }
}
