//! SP and IDP handler chains exchanging messages over the HTTP bindings.

use anyhow::Context;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sts_core::ValidationFailure;
use sts_handlers::{
    GenerationMode, HandlerChain, HandlerOutcome, HandlerRequest, HandlerResponse,
    ServiceProviderSamlWorkflow,
};
use sts_integration_tests::{
    IDP_ENTITY, IDP_SLO_URL, IDP_SSO_URL, SP_ACS_URL, SP_ENTITY, StsFixture, chain, form_value,
};
use sts_protocol_saml::bindings::{HttpPostBinding, HttpRedirectBinding, SamlMessageType};
use sts_protocol_saml::{NameId, SamlError, SamlMessage};
use sts_token::{ProtocolContext, SamlProtocolContext};

const SP_CHAIN: &str = r#"
role = "SP"
trusted_domains = ["example.com"]
clock_skew_ms = 1000

[[handlers]]
name = "issuer-trust"

[[handlers]]
name = "authentication"
options = { ROLE_KEY = "Role", ASSERTION_CONSUMER_URL = "https://sp.example.com/acs" }

[[handlers]]
name = "attribute"

[[handlers]]
name = "logout"

[[handlers]]
name = "signature-generation"
"#;

const IDP_CHAIN: &str = r#"
role = "IDP"
trusted_domains = ["example.com"]

[[handlers]]
name = "issuer-trust"

[[handlers]]
name = "attribute"
options = { ATTRIBUTE_KEYS = "mail" }

[[handlers]]
name = "authentication"

[[handlers]]
name = "logout"
"#;

struct Exchange {
    fx: StsFixture,
    sp: HandlerChain,
    idp: HandlerChain,
    workflow: ServiceProviderSamlWorkflow,
}

impl Exchange {
    fn new() -> anyhow::Result<Self> {
        Self::with_chains(SP_CHAIN, IDP_CHAIN)
    }

    fn with_chains(sp: &str, idp: &str) -> anyhow::Result<Self> {
        let fx = StsFixture::new()?;
        let sp = chain(sp, fx.sp_environment())?;
        let idp = chain(idp, fx.idp_environment())?;
        Ok(Self {
            fx,
            sp,
            idp,
            workflow: ServiceProviderSamlWorkflow::new(),
        })
    }

    /// SP side: builds the AuthnRequest and returns the redirect location.
    fn sp_login_redirect(&mut self) -> anyhow::Result<String> {
        let mut request = HandlerRequest::generate(NameId::entity(SP_ENTITY), GenerationMode::Auth)
            .with_relay_state("/reports");
        let mut response = HandlerResponse::new();
        response.destination = Some(IDP_SSO_URL.to_string());
        self.sp.process(&mut request, &mut response)?;

        let output = self.workflow.send_response(&response)?;
        Ok(output.location().context("expected a redirect")?.to_string())
    }

    /// IDP side: answers the redirected AuthnRequest with a POST form.
    fn idp_answer(&mut self, location: &str, principal: &str, roles: &[&str]) -> anyhow::Result<String> {
        let decoded = HttpRedirectBinding::decode_url(location)?;
        assert_eq!(decoded.message_type, SamlMessageType::Request);

        let mut request =
            HandlerRequest::inbound(NameId::entity(IDP_ENTITY), SamlMessage::from_xml(&decoded.xml)?)
                .with_principal(principal);
        request.relay_state = decoded.relay_state;
        request.options.post_binding = true;
        for role in roles {
            request = request.with_role(*role);
        }
        let mut response = HandlerResponse::new();
        self.idp.process(&mut request, &mut response)?;
        assert!(response.post_binding);

        let xml = response.message_xml().context("IDP produced no response")?;
        let destination = response.destination.as_deref().context("IDP response has no destination")?;
        Ok(HttpPostBinding::encode_response(&xml, destination, response.relay_state.as_deref()))
    }

    /// SP side: consumes the posted Response.
    fn sp_consume(&mut self, html: &str) -> anyhow::Result<HandlerResponse> {
        let saml_response = form_value(html, "SAMLResponse").context("form has no SAMLResponse")?;
        let relay_state = form_value(html, "RelayState");
        let decoded = HttpPostBinding::decode(None, Some(&saml_response), relay_state.as_deref())?;

        let mut request =
            HandlerRequest::inbound(NameId::entity(SP_ENTITY), SamlMessage::from_xml(&decoded.xml)?);
        request.relay_state = decoded.relay_state;
        let mut response = HandlerResponse::new();
        self.sp.process(&mut request, &mut response)?;
        Ok(response)
    }

    fn login(&mut self, principal: &str, roles: &[&str]) -> anyhow::Result<HandlerResponse> {
        let location = self.sp_login_redirect()?;
        let html = self.idp_answer(&location, principal, roles)?;
        self.sp_consume(&html)
    }
}

#[test]
fn single_sign_on_round_trip() -> anyhow::Result<()> {
    let mut exchange = Exchange::new()?;
    let session = exchange.login("alice", &["manager"])?;

    assert!(session.error.is_none());
    assert_eq!(session.principal.as_deref(), Some("alice"));
    assert_eq!(session.roles, vec!["manager"]);
    assert_eq!(session.relay_state.as_deref(), Some("/reports"));
    assert_eq!(
        session.attributes.get("mail"),
        Some(&vec!["alice@example.com".to_string()])
    );
    assert!(!session.attributes.contains_key("department"));

    let assertion = session.assertion.context("no assertion in session")?;
    assert_eq!(assertion.audiences().collect::<Vec<_>>(), vec![SP_ENTITY]);
    let mut context: ProtocolContext = SamlProtocolContext::for_assertion(assertion).into();
    exchange.fx.sts.validate_token(&exchange.fx.caller(), &mut context)?;
    Ok(())
}

#[test]
fn authn_request_redirect_is_signed() -> anyhow::Result<()> {
    let mut exchange = Exchange::new()?;
    let location = exchange.sp_login_redirect()?;

    let decoded = HttpRedirectBinding::decode_url(&location)?;
    let signature = decoded.signature.context("redirect carries no signature")?;
    let signed = HttpRedirectBinding::extract_signed_query(&location)?;
    let expected: Vec<u8> = signed.bytes().rev().collect();
    assert_eq!(STANDARD.decode(signature)?, expected);

    let authn = match SamlMessage::from_xml(&decoded.xml)? {
        SamlMessage::AuthnRequest(authn) => authn,
        other => anyhow::bail!("expected AuthnRequest, got {}", other.kind()),
    };
    assert_eq!(authn.assertion_consumer_service_url.as_deref(), Some(SP_ACS_URL));
    assert_eq!(authn.destination.as_deref(), Some(IDP_SSO_URL));
    Ok(())
}

#[test]
fn reset_clears_state_between_messages() -> anyhow::Result<()> {
    let mut exchange = Exchange::new()?;
    let alice = exchange.login("alice", &["manager"])?;
    assert!(alice.attributes.contains_key("mail"));

    exchange.sp.reset();
    let bob = exchange.login("bob", &["clerk"])?;
    assert_eq!(bob.principal.as_deref(), Some("bob"));
    assert!(!bob.attributes.contains_key("mail"));
    assert_eq!(bob.attributes.get("Role"), Some(&vec!["clerk".to_string()]));
    Ok(())
}

#[test]
fn missing_required_role_stops_the_chain() -> anyhow::Result<()> {
    let sp = SP_CHAIN.replace(
        r#"ROLE_KEY = "Role","#,
        r#"ROLE_KEY = "Role", REQUIRED_ROLES = "admin, auditor","#,
    );
    let mut exchange = Exchange::with_chains(&sp, IDP_CHAIN)?;
    let location = exchange.sp_login_redirect()?;
    let html = exchange.idp_answer(&location, "alice", &["manager"])?;

    let saml_response = form_value(&html, "SAMLResponse").context("no SAMLResponse")?;
    let decoded = HttpPostBinding::decode(None, Some(&saml_response), None)?;
    let mut request =
        HandlerRequest::inbound(NameId::entity(SP_ENTITY), SamlMessage::from_xml(&decoded.xml)?);
    let mut response = HandlerResponse::new();
    let outcome = exchange.sp.process(&mut request, &mut response)?;

    assert_eq!(outcome, HandlerOutcome::Stop);
    assert_eq!(response.error.as_ref().map(|error| error.status), Some(403));
    assert!(response.principal.is_none());
    assert!(response.attributes.is_empty());
    Ok(())
}

#[test]
fn stale_response_is_rejected() -> anyhow::Result<()> {
    let mut exchange = Exchange::new()?;
    let location = exchange.sp_login_redirect()?;
    let html = exchange.idp_answer(&location, "alice", &[])?;

    // 5000 ms validity + 2000 ms issuer skew + 1000 ms SP skew.
    exchange.fx.clock.advance_millis(8_000);
    let err = exchange.sp_consume(&html).expect_err("stale response accepted");
    assert!(matches!(
        err.downcast_ref::<SamlError>(),
        Some(SamlError::AssertionExpired)
    ));
    Ok(())
}

#[test]
fn idp_refuses_untrusted_requester() -> anyhow::Result<()> {
    let idp = IDP_CHAIN.replace(r#"["example.com"]"#, r#"["partner.org"]"#);
    let mut exchange = Exchange::with_chains(SP_CHAIN, &idp)?;
    let location = exchange.sp_login_redirect()?;

    let err = exchange
        .idp_answer(&location, "alice", &[])
        .expect_err("untrusted SP was answered");
    assert!(matches!(
        err.downcast_ref::<SamlError>(),
        Some(SamlError::UntrustedIssuer(_))
    ));
    assert!(exchange.fx.events.events().is_empty());
    Ok(())
}

#[test]
fn single_logout_cancels_the_session_assertion() -> anyhow::Result<()> {
    let mut exchange = Exchange::new()?;
    let session = exchange.login("alice", &["manager"])?;
    let assertion = session.assertion.context("no assertion in session")?;

    // SP asks the IDP to end the session.
    let mut request = HandlerRequest::generate(NameId::entity(SP_ENTITY), GenerationMode::Logout)
        .with_principal("alice");
    let mut response = HandlerResponse::new();
    response.destination = Some(IDP_SLO_URL.to_string());
    exchange.sp.process(&mut request, &mut response)?;
    let location = exchange.workflow.send_response(&response)?;
    let decoded = HttpRedirectBinding::decode_url(location.location().context("expected redirect")?)?;

    // IDP cancels and answers.
    let mut request =
        HandlerRequest::inbound(NameId::entity(IDP_ENTITY), SamlMessage::from_xml(&decoded.xml)?)
            .with_session_assertion(assertion.clone());
    let mut answer = HandlerResponse::new();
    exchange.idp.process(&mut request, &mut answer)?;
    assert!(answer.terminate_session);
    let xml = answer.message_xml().context("IDP sent no LogoutResponse")?;

    // SP receives the confirmation.
    let mut request = HandlerRequest::inbound(NameId::entity(SP_ENTITY), SamlMessage::from_xml(&xml)?);
    let mut confirmed = HandlerResponse::new();
    exchange.sp.process(&mut request, &mut confirmed)?;
    assert!(confirmed.terminate_session);

    let mut context: ProtocolContext = SamlProtocolContext::for_assertion(assertion).into();
    let err = exchange
        .fx
        .sts
        .validate_token(&exchange.fx.caller(), &mut context)
        .expect_err("logged out assertion still valid");
    assert_eq!(err.validation_failure(), Some(ValidationFailure::Invalid));
    Ok(())
}

#[test]
fn chain_rejects_handler_with_other_role() -> anyhow::Result<()> {
    let fx = StsFixture::new()?;
    let settings = r#"
        role = "SP"

        [[handlers]]
        name = "logout"
        options = { ROLE = "IDP" }
    "#;
    let err = chain(settings, fx.sp_environment()).expect_err("mixed roles accepted");
    assert!(err.to_string().contains("logout"));
    Ok(())
}
