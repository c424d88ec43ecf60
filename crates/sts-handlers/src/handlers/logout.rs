//! Single logout.

use std::sync::Arc;

use sts_core::XmlTime;
use sts_protocol_saml::{
    LogoutRequest, LogoutResponse, NameId, SamlError, SamlMessage, SamlResult, Status,
};
use sts_token::{Caller, CoreSts, ProtocolContext, SamlProtocolContext};

use crate::handler::{HandlerOutcome, HandlerRole, SamlHandler};
use crate::request::{GenerationMode, HandlerRequest, HandlerResponse};

/// Factory name of [`LogoutHandler`].
pub const LOGOUT_HANDLER: &str = "logout";

/// Builds `LogoutRequest`s and answers them with `LogoutResponse`s.
///
/// The IDP side cancels the session assertion through the token service so it
/// can no longer be renewed or validated.
#[derive(Debug)]
pub struct LogoutHandler {
    role: HandlerRole,
    time: XmlTime,
    sts: Option<Arc<CoreSts>>,
}

impl LogoutHandler {
    /// Creates a handler for `role`.
    #[must_use]
    pub const fn new(role: HandlerRole, time: XmlTime) -> Self {
        Self {
            role,
            time,
            sts: None,
        }
    }

    /// Token service used to cancel session assertions.
    #[must_use]
    pub fn with_sts(mut self, sts: Arc<CoreSts>) -> Self {
        self.sts = Some(sts);
        self
    }

    fn cancel_session(&self, request: &HandlerRequest) -> SamlResult<()> {
        let (Some(sts), Some(assertion)) = (&self.sts, &request.session_assertion) else {
            return Ok(());
        };
        let mut context: ProtocolContext = SamlProtocolContext::for_assertion(assertion.clone()).into();
        sts.cancel_token(&Caller::new(request.issuer.value.clone()), &mut context)?;
        tracing::info!(assertion_id = %assertion.id, "cancelled session assertion");
        Ok(())
    }

    fn answer(
        &self,
        logout: &LogoutRequest,
        request: &HandlerRequest,
        response: &mut HandlerResponse,
    ) -> SamlResult<()> {
        let destination = response
            .destination
            .clone()
            .or_else(|| logout.issuer.as_ref().map(|issuer| issuer.value.clone()))
            .ok_or_else(|| {
                SamlError::InvalidRequest("LogoutRequest has no issuer to answer".to_string())
            })?;
        let answer = LogoutResponse::new(request.issuer.clone(), self.time.issue_instant(), Status::success())
            .in_response_to(logout.id.clone())
            .with_destination(destination.clone());

        tracing::info!(request_id = %logout.id, %destination, role = %self.role, "answering LogoutRequest");
        response.set_message(answer);
        response.destination = Some(destination);
        response.relay_state.clone_from(&request.relay_state);
        response.post_binding = request.options.post_binding;
        response.send_request = false;
        response.terminate_session = true;
        Ok(())
    }
}

impl SamlHandler for LogoutHandler {
    fn name(&self) -> &str {
        LOGOUT_HANDLER
    }

    fn role(&self) -> HandlerRole {
        self.role
    }

    fn generate_saml_request(
        &mut self,
        request: &mut HandlerRequest,
        response: &mut HandlerResponse,
    ) -> SamlResult<HandlerOutcome> {
        if request.generation_mode != Some(GenerationMode::Logout) {
            return Ok(HandlerOutcome::Continue);
        }
        let principal = request.principal.as_deref().ok_or_else(|| {
            SamlError::InvalidRequest("no principal to log out".to_string())
        })?;

        let mut logout =
            LogoutRequest::new(request.issuer.clone(), NameId::new(principal), self.time.issue_instant());
        if let Some(destination) = &response.destination {
            logout = logout.with_destination(destination.clone());
        }
        tracing::debug!(request_id = %logout.id, principal, "generated LogoutRequest");
        response.set_message(logout);
        response.send_request = true;
        response.relay_state.clone_from(&request.relay_state);
        response.post_binding = request.options.post_binding;
        Ok(HandlerOutcome::Continue)
    }

    fn handle_request_type(
        &mut self,
        request: &mut HandlerRequest,
        response: &mut HandlerResponse,
    ) -> SamlResult<HandlerOutcome> {
        let Some(SamlMessage::LogoutRequest(logout)) = &request.message else {
            return Ok(HandlerOutcome::Continue);
        };
        if self.role == HandlerRole::Idp {
            self.cancel_session(request)?;
        }
        self.answer(logout, request, response)?;
        Ok(HandlerOutcome::Continue)
    }

    fn handle_status_response_type(
        &mut self,
        request: &mut HandlerRequest,
        response: &mut HandlerResponse,
    ) -> SamlResult<HandlerOutcome> {
        let Some(SamlMessage::LogoutResponse(answer)) = &request.message else {
            return Ok(HandlerOutcome::Continue);
        };
        answer.status.ensure_success()?;
        if self.role == HandlerRole::Idp {
            self.cancel_session(request)?;
        }
        tracing::info!(
            in_response_to = answer.in_response_to.as_deref(),
            role = %self.role,
            "logout confirmed"
        );
        response.relay_state.clone_from(&request.relay_state);
        response.terminate_session = true;
        Ok(HandlerOutcome::Continue)
    }
}
