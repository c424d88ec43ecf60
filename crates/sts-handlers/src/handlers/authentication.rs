//! Web browser SSO authentication.
//!
//! On the SP side the handler builds the `AuthnRequest` and checks the
//! `Response` that comes back. On the IDP side it answers an `AuthnRequest`
//! with an assertion issued through the token service.

use std::collections::HashMap;
use std::sync::Arc;

use sts_core::XmlTime;
use sts_core::time::{add, subtract};
use sts_protocol_saml::constants::{BEARER_CONFIRMATION, NameIdFormat, ROLE_ATTRIBUTE, authn_context};
use sts_protocol_saml::{
    Assertion, Attribute, AttributeStatement, AuthnRequest, AuthnStatement, Conditions, NameId,
    NameIdPolicy, Response, SamlError, SamlMessage, SamlResult, Statement, Subject,
    SubjectConfirmation, SubjectConfirmationData,
};
use sts_token::{Caller, CoreSts, ProtocolContext, SamlProtocolContext};

use super::{flag, keys, list, reject_unknown};
use crate::handler::{ChainConfig, HandlerOutcome, HandlerRole, SamlHandler, check_clock_skew};
use crate::request::{GenerationMode, HandlerRequest, HandlerResponse};

/// Factory name of [`AuthenticationHandler`].
pub const AUTHENTICATION_HANDLER: &str = "authentication";

/// Options of [`AuthenticationHandler`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthenticationOptions {
    /// Where the IDP should deliver its response; defaults to the SP's issuer.
    pub assertion_consumer_url: Option<String>,
    /// Name ID format the SP asks for.
    pub name_id_format: Option<NameIdFormat>,
    /// Attribute names carrying roles. Empty means every attribute.
    pub role_keys: Vec<String>,
    /// Ignore roles in received assertions.
    pub disable_role_picking: bool,
    /// Leave the authentication statement out of issued assertions.
    pub disable_authn_statement: bool,
    /// Leave the role attribute out of issued assertions.
    pub disable_sending_roles: bool,
    /// The principal needs at least one of these roles. Empty disables the check.
    pub required_roles: Vec<String>,
    /// Clock skew for received assertions, overriding the chain's.
    pub clock_skew_ms: Option<i64>,
}

impl AuthenticationOptions {
    /// Reads the options from a handler option map.
    ///
    /// ## Errors
    ///
    /// Returns [`SamlError::Configuration`] for unknown keys, an unknown
    /// name ID format or a malformed value.
    pub fn from_options(options: &HashMap<String, String>) -> SamlResult<Self> {
        reject_unknown(
            AUTHENTICATION_HANDLER,
            options,
            &[
                keys::ASSERTION_CONSUMER_URL,
                keys::NAMEID_FORMAT,
                keys::ROLE_KEY,
                keys::DISABLE_ROLE_PICKING,
                keys::DISABLE_AUTHN_STATEMENT,
                keys::DISABLE_SENDING_ROLES,
                keys::REQUIRED_ROLES,
                keys::CLOCK_SKEW_MILIS,
            ],
        )?;

        let name_id_format = options
            .get(keys::NAMEID_FORMAT)
            .map(|uri| {
                NameIdFormat::from_uri(uri).ok_or_else(|| {
                    SamlError::Configuration(format!("unknown name ID format: {uri}"))
                })
            })
            .transpose()?;
        let clock_skew_ms = options
            .get(keys::CLOCK_SKEW_MILIS)
            .map(|value| {
                let millis = value.trim().parse::<i64>().map_err(|_| {
                    SamlError::Configuration(format!(
                        "{} must be an integer, got {value:?}",
                        keys::CLOCK_SKEW_MILIS
                    ))
                })?;
                check_clock_skew(keys::CLOCK_SKEW_MILIS, millis)
            })
            .transpose()?;

        Ok(Self {
            assertion_consumer_url: options.get(keys::ASSERTION_CONSUMER_URL).cloned(),
            name_id_format,
            role_keys: list(options, keys::ROLE_KEY),
            disable_role_picking: flag(options, keys::DISABLE_ROLE_PICKING)?,
            disable_authn_statement: flag(options, keys::DISABLE_AUTHN_STATEMENT)?,
            disable_sending_roles: flag(options, keys::DISABLE_SENDING_ROLES)?,
            required_roles: list(options, keys::REQUIRED_ROLES),
            clock_skew_ms,
        })
    }
}

/// Handles `AuthnRequest` and `Response` messages.
#[derive(Debug)]
pub struct AuthenticationHandler {
    role: HandlerRole,
    options: AuthenticationOptions,
    time: XmlTime,
    sts: Option<Arc<CoreSts>>,
    chain_skew_ms: i64,
}

impl AuthenticationHandler {
    /// Creates a handler for `role`.
    #[must_use]
    pub const fn new(role: HandlerRole, options: AuthenticationOptions, time: XmlTime) -> Self {
        Self {
            role,
            options,
            time,
            sts: None,
            chain_skew_ms: 0,
        }
    }

    /// Token service the IDP issues assertions through.
    #[must_use]
    pub fn with_sts(mut self, sts: Arc<CoreSts>) -> Self {
        self.sts = Some(sts);
        self
    }

    fn clock_skew_ms(&self) -> i64 {
        self.options.clock_skew_ms.unwrap_or(self.chain_skew_ms)
    }

    fn generate_authn_request(
        &self,
        request: &mut HandlerRequest,
        response: &mut HandlerResponse,
    ) {
        let acs_url = self
            .options
            .assertion_consumer_url
            .clone()
            .unwrap_or_else(|| request.issuer.value.clone());
        let mut authn = AuthnRequest::new(request.issuer.clone(), self.time.issue_instant())
            .with_acs_url(acs_url);
        if let Some(destination) = &response.destination {
            authn = authn.with_destination(destination.clone());
        }
        if let Some(format) = self.options.name_id_format {
            authn = authn.with_name_id_policy(NameIdPolicy::with_format(format));
        }

        tracing::debug!(request_id = %authn.id, issuer = %request.issuer.value, "generated AuthnRequest");
        request.options.auth_request_id = Some(authn.id.clone());
        response.set_message(authn);
        response.send_request = true;
        response.relay_state.clone_from(&request.relay_state);
        response.post_binding = request.options.post_binding;
    }

    fn issue(
        &self,
        authn: &AuthnRequest,
        request: &HandlerRequest,
        response: &mut HandlerResponse,
    ) -> SamlResult<()> {
        let principal = request.principal.as_deref().ok_or_else(|| {
            SamlError::AuthenticationFailed("no authenticated principal".to_string())
        })?;
        let requester = authn.issuer.as_ref().map(|issuer| issuer.value.clone());
        let acs_url = authn
            .assertion_consumer_service_url
            .clone()
            .or_else(|| requester.clone())
            .ok_or_else(|| {
                SamlError::InvalidRequest(
                    "AuthnRequest names neither an assertion consumer nor an issuer".to_string(),
                )
            })?;
        let sts = self.sts.as_ref().ok_or_else(|| {
            SamlError::Configuration("IDP authentication handler has no token service".to_string())
        })?;

        let confirmation = SubjectConfirmation::new(BEARER_CONFIRMATION).with_data(
            SubjectConfirmationData {
                recipient: Some(acs_url.clone()),
                in_response_to: Some(authn.id.clone()),
                ..SubjectConfirmationData::default()
            },
        );
        let mut context = SamlProtocolContext::new()
            .with_issuer(request.issuer.clone())
            .with_subject(Subject::new(NameId::new(principal)).with_confirmation(confirmation));
        if let Some(audience) = requester {
            context = context.with_conditions(Conditions::default().with_audience(audience));
        }
        if !self.options.disable_authn_statement {
            let class_ref = request
                .options
                .login_type
                .clone()
                .unwrap_or_else(|| authn_context::PASSWORD.to_string());
            context = context.with_statement(Statement::Authn(AuthnStatement::new(
                self.time.issue_instant(),
                class_ref,
            )));
        }
        if let Some(statement) = self.attribute_statement(request) {
            context = context.with_statement(Statement::Attribute(statement));
        }

        let mut context = ProtocolContext::Saml2(context);
        sts.issue_token(&Caller::new(request.issuer.value.clone()), &mut context)?;
        let assertion = context.saml2_assertion().cloned().ok_or_else(|| {
            SamlError::InvalidAssertion("token service returned no assertion".to_string())
        })?;

        tracing::info!(
            principal,
            request_id = %authn.id,
            assertion_id = %assertion.id,
            destination = %acs_url,
            "answering AuthnRequest"
        );
        let answer = Response::success(request.issuer.clone(), self.time.issue_instant())
            .in_response_to(authn.id.clone())
            .with_destination(acs_url.clone())
            .with_assertion(assertion.clone());
        response.set_message(answer);
        response.destination = Some(acs_url);
        response.relay_state.clone_from(&request.relay_state);
        response.post_binding = request.options.post_binding || request.options.strict_post_binding;
        response.send_request = false;
        response.principal = Some(principal.to_string());
        response.roles.clone_from(&request.roles);
        response.assertion = Some(assertion);
        Ok(())
    }

    fn attribute_statement(&self, request: &HandlerRequest) -> Option<AttributeStatement> {
        let mut statement = AttributeStatement::default();
        if !self.options.disable_sending_roles && !request.roles.is_empty() {
            statement = statement.with_attribute(Attribute::multi(ROLE_ATTRIBUTE, request.roles.clone()));
        }
        let mut names: Vec<&String> = request.options.attributes.keys().collect();
        names.sort_unstable();
        for name in names {
            if let Some(values) = request.options.attributes.get(name) {
                statement = statement.with_attribute(Attribute::multi(name.clone(), values.clone()));
            }
        }
        (!statement.attributes.is_empty()).then_some(statement)
    }

    fn consume(
        &self,
        answer: &Response,
        request: &HandlerRequest,
        response: &mut HandlerResponse,
    ) -> SamlResult<HandlerOutcome> {
        answer.status.ensure_success()?;
        let assertion = answer.first_assertion().ok_or_else(|| {
            SamlError::InvalidResponse("no assertion in response from IDP".to_string())
        })?;
        self.check_window(assertion)?;
        check_audience(assertion, &request.issuer.value)?;
        let principal = assertion.subject_name().ok_or_else(|| {
            SamlError::InvalidAssertion("assertion subject has no name ID".to_string())
        })?;

        let roles = self.pick_roles(assertion);
        response.relay_state.clone_from(&request.relay_state);
        response.roles.clone_from(&roles);

        if !self.options.required_roles.is_empty()
            && !roles.iter().any(|role| self.options.required_roles.contains(role))
        {
            tracing::warn!(principal, ?roles, "principal has none of the required roles");
            response.principal = None;
            response.set_error(403, format!("{principal} has none of the required roles"));
            return Ok(HandlerOutcome::Stop);
        }

        tracing::info!(principal, assertion_id = %assertion.id, "accepted assertion");
        response.principal = Some(principal.to_string());
        response.assertion = Some(assertion.clone());
        Ok(HandlerOutcome::Continue)
    }

    fn check_window(&self, assertion: &Assertion) -> SamlResult<()> {
        let Some(conditions) = &assertion.conditions else {
            return Ok(());
        };
        let now = self.time.now().fixed_offset();
        let skew = self.clock_skew_ms();
        if let Some(not_before) = &conditions.not_before
            && add(&now, skew)? < *not_before
        {
            return Err(SamlError::AssertionNotYetValid);
        }
        if let Some(not_on_or_after) = &conditions.not_on_or_after
            && subtract(&now, skew)? >= *not_on_or_after
        {
            return Err(SamlError::AssertionExpired);
        }
        Ok(())
    }

    fn pick_roles(&self, assertion: &Assertion) -> Vec<String> {
        if self.options.disable_role_picking {
            return Vec::new();
        }
        assertion
            .attributes()
            .filter(|attribute| {
                self.options.role_keys.is_empty() || self.options.role_keys.contains(&attribute.name)
            })
            .flat_map(|attribute| attribute.values.iter().cloned())
            .collect()
    }
}

fn check_audience(assertion: &Assertion, entity_id: &str) -> SamlResult<()> {
    let audiences: Vec<&str> = assertion.audiences().collect();
    if audiences.is_empty() || audiences.contains(&entity_id) {
        return Ok(());
    }
    Err(SamlError::InvalidAudience {
        expected: entity_id.to_string(),
        actual: audiences.join(", "),
    })
}

impl SamlHandler for AuthenticationHandler {
    fn name(&self) -> &str {
        AUTHENTICATION_HANDLER
    }

    fn role(&self) -> HandlerRole {
        self.role
    }

    fn initialize(&mut self, config: &ChainConfig) -> SamlResult<()> {
        self.chain_skew_ms = check_clock_skew("clock_skew_ms", config.clock_skew_ms)?;
        Ok(())
    }

    fn generate_saml_request(
        &mut self,
        request: &mut HandlerRequest,
        response: &mut HandlerResponse,
    ) -> SamlResult<HandlerOutcome> {
        if self.role == HandlerRole::Sp && request.generation_mode == Some(GenerationMode::Auth) {
            self.generate_authn_request(request, response);
        }
        Ok(HandlerOutcome::Continue)
    }

    fn handle_request_type(
        &mut self,
        request: &mut HandlerRequest,
        response: &mut HandlerResponse,
    ) -> SamlResult<HandlerOutcome> {
        if self.role != HandlerRole::Idp {
            return Ok(HandlerOutcome::Continue);
        }
        if let Some(SamlMessage::AuthnRequest(authn)) = &request.message {
            self.issue(authn, request, response)?;
        }
        Ok(HandlerOutcome::Continue)
    }

    fn handle_status_response_type(
        &mut self,
        request: &mut HandlerRequest,
        response: &mut HandlerResponse,
    ) -> SamlResult<HandlerOutcome> {
        if self.role != HandlerRole::Sp {
            return Ok(HandlerOutcome::Continue);
        }
        match &request.message {
            Some(SamlMessage::Response(answer)) => self.consume(answer, request, response),
            _ => Ok(HandlerOutcome::Continue),
        }
    }
}

#[cfg(test)]
mod tests {
    use sts_core::time::add;
    use sts_protocol_saml::Status;

    use super::*;
    use crate::test_support::{SP_ENTITY, IDP_ENTITY, TestIdp, manual_time};

    fn sp_handler(options: AuthenticationOptions) -> (AuthenticationHandler, Arc<sts_core::ManualClock>) {
        let (time, clock) = manual_time();
        (AuthenticationHandler::new(HandlerRole::Sp, options, time), clock)
    }

    fn idp_response(idp: &TestIdp, principal: &str, roles: &[&str]) -> Response {
        let authn = AuthnRequest::new(NameId::entity(SP_ENTITY), idp.time.issue_instant())
            .with_acs_url("https://sp.example.com/acs");
        let mut handler = idp.handler(AuthenticationOptions::default());
        let mut request = HandlerRequest::inbound(NameId::entity(IDP_ENTITY), authn.into())
            .with_principal(principal);
        for role in roles {
            request = request.with_role(*role);
        }
        let mut response = HandlerResponse::new();
        handler.handle_request_type(&mut request, &mut response).unwrap();
        match response.message {
            Some(SamlMessage::Response(answer)) => answer,
            other => panic!("expected Response, got {other:?}"),
        }
    }

    #[test]
    fn options_reject_unknown_keys_and_formats() {
        let unknown = HashMap::from([("ROLE_KYE".to_string(), "Role".to_string())]);
        assert!(AuthenticationOptions::from_options(&unknown).is_err());

        let format = HashMap::from([(keys::NAMEID_FORMAT.to_string(), "urn:bogus".to_string())]);
        assert!(AuthenticationOptions::from_options(&format).is_err());

        let good = HashMap::from([
            (keys::NAMEID_FORMAT.to_string(), NameIdFormat::Persistent.uri().to_string()),
            (keys::ROLE_KEY.to_string(), "Role, Group".to_string()),
            (keys::CLOCK_SKEW_MILIS.to_string(), "1500".to_string()),
            (keys::ROLE.to_string(), "SP".to_string()),
        ]);
        let options = AuthenticationOptions::from_options(&good).unwrap();
        assert_eq!(options.name_id_format, Some(NameIdFormat::Persistent));
        assert_eq!(options.role_keys, vec!["Role", "Group"]);
        assert_eq!(options.clock_skew_ms, Some(1500));
    }

    #[test]
    fn out_of_range_skew_is_rejected() {
        for value in ["-1", "9000000000000000", "86400001"] {
            let options = HashMap::from([(keys::CLOCK_SKEW_MILIS.to_string(), value.to_string())]);
            assert!(
                matches!(AuthenticationOptions::from_options(&options), Err(SamlError::Configuration(_))),
                "{value} accepted"
            );
        }

        let mut handler = AuthenticationHandler::new(
            HandlerRole::Sp,
            AuthenticationOptions::default(),
            TestIdp::new().time,
        );
        let err = handler
            .initialize(&ChainConfig::new(HandlerRole::Sp).with_clock_skew_ms(-5))
            .unwrap_err();
        assert!(matches!(err, SamlError::Configuration(_)));
    }

    #[test]
    fn sp_generates_authn_request() {
        let (mut handler, _clock) = sp_handler(AuthenticationOptions {
            assertion_consumer_url: Some("https://sp.example.com/acs".to_string()),
            name_id_format: Some(NameIdFormat::Persistent),
            ..AuthenticationOptions::default()
        });
        let mut request = HandlerRequest::generate(NameId::entity(SP_ENTITY), GenerationMode::Auth)
            .with_relay_state("/protected");
        let mut response = HandlerResponse::new();
        response.destination = Some("https://idp.example.com/sso".to_string());

        handler.generate_saml_request(&mut request, &mut response).unwrap();

        let Some(SamlMessage::AuthnRequest(authn)) = &response.message else {
            panic!("expected AuthnRequest");
        };
        assert!(response.send_request);
        assert_eq!(response.relay_state.as_deref(), Some("/protected"));
        assert_eq!(authn.destination.as_deref(), Some("https://idp.example.com/sso"));
        assert_eq!(authn.assertion_consumer_service_url.as_deref(), Some("https://sp.example.com/acs"));
        assert_eq!(
            authn.name_id_policy.as_ref().and_then(|policy| policy.format.as_deref()),
            Some(NameIdFormat::Persistent.uri())
        );
        assert_eq!(request.options.auth_request_id.as_deref(), Some(authn.id.as_str()));
    }

    #[test]
    fn sp_ignores_logout_generation() {
        let (mut handler, _clock) = sp_handler(AuthenticationOptions::default());
        let mut request = HandlerRequest::generate(NameId::entity(SP_ENTITY), GenerationMode::Logout);
        let mut response = HandlerResponse::new();
        handler.generate_saml_request(&mut request, &mut response).unwrap();
        assert!(response.message.is_none());
    }

    #[test]
    fn idp_issues_assertion_for_authn_request() {
        let idp = TestIdp::new();
        let answer = idp_response(&idp, "alice", &["manager"]);

        assert!(answer.status.is_success());
        assert_eq!(answer.destination.as_deref(), Some("https://sp.example.com/acs"));
        let assertion = answer.first_assertion().unwrap();
        assert_eq!(assertion.subject_name(), Some("alice"));
        assert_eq!(assertion.audiences().collect::<Vec<_>>(), vec![SP_ENTITY]);
        assert_eq!(assertion.roles(), vec!["manager"]);
        assert_eq!(
            assertion.authn_statement().and_then(|s| s.authn_context_class_ref.as_deref()),
            Some(authn_context::PASSWORD)
        );
    }

    #[test]
    fn idp_requires_principal_and_sts() {
        let idp = TestIdp::new();
        let authn = AuthnRequest::new(NameId::entity(SP_ENTITY), idp.time.issue_instant());

        let mut handler = idp.handler(AuthenticationOptions::default());
        let mut request = HandlerRequest::inbound(NameId::entity(IDP_ENTITY), authn.clone().into());
        let err = handler
            .handle_request_type(&mut request, &mut HandlerResponse::new())
            .unwrap_err();
        assert!(matches!(err, SamlError::AuthenticationFailed(_)));

        let mut bare = AuthenticationHandler::new(
            HandlerRole::Idp,
            AuthenticationOptions::default(),
            idp.time.clone(),
        );
        let mut request =
            HandlerRequest::inbound(NameId::entity(IDP_ENTITY), authn.into()).with_principal("alice");
        let err = bare
            .handle_request_type(&mut request, &mut HandlerResponse::new())
            .unwrap_err();
        assert!(matches!(err, SamlError::Configuration(_)));
    }

    #[test]
    fn sp_accepts_valid_response() {
        let idp = TestIdp::new();
        let answer = idp_response(&idp, "alice", &["manager", "employee"]);
        let mut handler = AuthenticationHandler::new(
            HandlerRole::Sp,
            AuthenticationOptions::default(),
            idp.time.clone(),
        );
        let mut request = HandlerRequest::inbound(NameId::entity(SP_ENTITY), answer.into())
            .with_relay_state("/home");
        let mut response = HandlerResponse::new();

        let outcome = handler
            .handle_status_response_type(&mut request, &mut response)
            .unwrap();

        assert_eq!(outcome, HandlerOutcome::Continue);
        assert_eq!(response.principal.as_deref(), Some("alice"));
        assert_eq!(response.roles, vec!["manager", "employee"]);
        assert_eq!(response.relay_state.as_deref(), Some("/home"));
        assert!(response.assertion.is_some());
    }

    #[test]
    fn sp_rejects_failed_status() {
        let (mut handler, _clock) = sp_handler(AuthenticationOptions::default());
        let answer = Response::with_status(
            NameId::entity(IDP_ENTITY),
            handler.time.issue_instant(),
            Status::responder_error("denied"),
        );
        let mut request = HandlerRequest::inbound(NameId::entity(SP_ENTITY), answer.into());
        let err = handler
            .handle_status_response_type(&mut request, &mut HandlerResponse::new())
            .unwrap_err();
        assert!(matches!(err, SamlError::StatusFailure { .. }));
    }

    #[test]
    fn sp_rejects_empty_response() {
        let (mut handler, _clock) = sp_handler(AuthenticationOptions::default());
        let answer = Response::success(NameId::entity(IDP_ENTITY), handler.time.issue_instant());
        let mut request = HandlerRequest::inbound(NameId::entity(SP_ENTITY), answer.into());
        let err = handler
            .handle_status_response_type(&mut request, &mut HandlerResponse::new())
            .unwrap_err();
        assert!(matches!(err, SamlError::InvalidResponse(_)));
    }

    #[test]
    fn sp_rejects_expired_assertion_beyond_skew() {
        let idp = TestIdp::new();
        let answer = idp_response(&idp, "alice", &[]);
        let mut handler = AuthenticationHandler::new(
            HandlerRole::Sp,
            AuthenticationOptions::default(),
            idp.time.clone(),
        );
        handler
            .initialize(&ChainConfig::new(HandlerRole::Sp).with_clock_skew_ms(1_000))
            .unwrap();

        // Issued window ends at issue + 5000 + 2000; the SP adds 1000 more.
        idp.clock.advance_millis(7_999);
        let mut request = HandlerRequest::inbound(NameId::entity(SP_ENTITY), answer.clone().into());
        assert!(handler
            .handle_status_response_type(&mut request, &mut HandlerResponse::new())
            .is_ok());

        idp.clock.advance_millis(1);
        let mut request = HandlerRequest::inbound(NameId::entity(SP_ENTITY), answer.into());
        let err = handler
            .handle_status_response_type(&mut request, &mut HandlerResponse::new())
            .unwrap_err();
        assert!(matches!(err, SamlError::AssertionExpired));
    }

    #[test]
    fn sp_rejects_assertion_not_yet_valid() {
        let (mut handler, _clock) = sp_handler(AuthenticationOptions::default());
        let later = add(&handler.time.issue_instant(), 60_000).unwrap();
        let mut assertion = Assertion::new("ID_future", NameId::entity(IDP_ENTITY), later)
            .with_subject(Subject::new(NameId::new("alice")));
        assertion.create_timed_conditions(5_000, 0).unwrap();
        let answer = Response::success(NameId::entity(IDP_ENTITY), later).with_assertion(assertion);

        let mut request = HandlerRequest::inbound(NameId::entity(SP_ENTITY), answer.into());
        let err = handler
            .handle_status_response_type(&mut request, &mut HandlerResponse::new())
            .unwrap_err();
        assert!(matches!(err, SamlError::AssertionNotYetValid));
    }

    #[test]
    fn sp_rejects_foreign_audience() {
        let idp = TestIdp::new();
        let answer = idp_response(&idp, "alice", &[]);
        let mut handler = AuthenticationHandler::new(
            HandlerRole::Sp,
            AuthenticationOptions::default(),
            idp.time.clone(),
        );
        let mut request =
            HandlerRequest::inbound(NameId::entity("https://other-sp.example.com"), answer.into());
        let err = handler
            .handle_status_response_type(&mut request, &mut HandlerResponse::new())
            .unwrap_err();
        assert!(matches!(err, SamlError::InvalidAudience { .. }));
    }

    #[test]
    fn role_keys_and_picking() {
        let idp = TestIdp::new();
        let answer = idp_response(&idp, "alice", &["manager"]);

        let mut keyed = AuthenticationHandler::new(
            HandlerRole::Sp,
            AuthenticationOptions {
                role_keys: vec!["Group".to_string()],
                ..AuthenticationOptions::default()
            },
            idp.time.clone(),
        );
        let mut response = HandlerResponse::new();
        let mut request = HandlerRequest::inbound(NameId::entity(SP_ENTITY), answer.clone().into());
        keyed.handle_status_response_type(&mut request, &mut response).unwrap();
        assert!(response.roles.is_empty());

        let mut disabled = AuthenticationHandler::new(
            HandlerRole::Sp,
            AuthenticationOptions {
                disable_role_picking: true,
                ..AuthenticationOptions::default()
            },
            idp.time.clone(),
        );
        let mut response = HandlerResponse::new();
        let mut request = HandlerRequest::inbound(NameId::entity(SP_ENTITY), answer.into());
        disabled.handle_status_response_type(&mut request, &mut response).unwrap();
        assert!(response.roles.is_empty());
        assert_eq!(response.principal.as_deref(), Some("alice"));
    }

    #[test]
    fn missing_required_role_stops_with_forbidden() {
        let idp = TestIdp::new();
        let answer = idp_response(&idp, "bob", &["employee"]);
        let mut handler = AuthenticationHandler::new(
            HandlerRole::Sp,
            AuthenticationOptions {
                required_roles: vec!["manager".to_string()],
                ..AuthenticationOptions::default()
            },
            idp.time.clone(),
        );
        let mut request = HandlerRequest::inbound(NameId::entity(SP_ENTITY), answer.into());
        let mut response = HandlerResponse::new();

        let outcome = handler
            .handle_status_response_type(&mut request, &mut response)
            .unwrap();

        assert_eq!(outcome, HandlerOutcome::Stop);
        assert!(response.principal.is_none());
        assert_eq!(response.error.as_ref().map(|error| error.status), Some(403));
    }
}
