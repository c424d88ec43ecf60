//! Request checks and message delivery on the service provider.

use std::sync::Arc;

use anyhow::Context;
use parking_lot::Mutex;
use sts_handlers::workflow::{GLOBAL_LOGOUT_PARAM, LOCAL_LOGOUT_PARAM};
use sts_handlers::{
    BindingOutput, GenerationMode, HandlerRequest, HandlerResponse, RedirectionHandler,
    RequestParams, ServiceProviderSamlWorkflow,
};
use sts_integration_tests::{IDP_SSO_URL, SP_ENTITY, StsFixture, chain, form_value};
use sts_protocol_saml::bindings::HttpPostBinding;
use sts_protocol_saml::{NameId, SamlMessage, SamlResult};

const SP_POST_CHAIN: &str = r#"
role = "SP"

[[handlers]]
name = "authentication"

[[handlers]]
name = "signature-generation"
"#;

/// Keeps every redirect it is asked to send.
#[derive(Debug, Default)]
struct RecordingRedirects {
    sent: Mutex<Vec<String>>,
}

impl RedirectionHandler for RecordingRedirects {
    fn send_redirect(&self, location: String) -> SamlResult<BindingOutput> {
        self.sent.lock().push(location.clone());
        Ok(BindingOutput::Redirect { location })
    }
}

#[test]
fn request_parameters_drive_the_checks() {
    let workflow = ServiceProviderSamlWorkflow::new();
    let params = RequestParams::from_query("SAMLResponse=PHg%2B&GLO=true&RelayState=%2Fhome");

    assert!(workflow.validate(&params));
    assert!(workflow.is_global_logout(&params));
    assert!(!workflow.is_local_logout(&params));
    assert_eq!(params.get("RelayState"), Some("/home"));

    let local: RequestParams = [(LOCAL_LOGOUT_PARAM.to_string(), "TRUE".to_string())]
        .into_iter()
        .collect();
    assert!(workflow.is_local_logout(&local));
    assert!(!workflow.is_global_logout(&local));
    assert!(!workflow.validate(&local));
    assert!(!local.contains(GLOBAL_LOGOUT_PARAM));
}

#[test]
fn post_binding_skips_signing_and_deflate() -> anyhow::Result<()> {
    let fx = StsFixture::new()?;
    let mut sp = chain(SP_POST_CHAIN, fx.sp_environment())?;

    let mut request = HandlerRequest::generate(NameId::entity(SP_ENTITY), GenerationMode::Auth);
    request.options.post_binding = true;
    let mut response = HandlerResponse::new();
    response.destination = Some(IDP_SSO_URL.to_string());
    sp.process(&mut request, &mut response)?;
    assert!(response.destination_query_with_signature.is_none());

    let output = ServiceProviderSamlWorkflow::new().send_response(&response)?;
    let BindingOutput::Post { html } = output else {
        anyhow::bail!("expected a POST form");
    };
    let encoded = form_value(&html, "SAMLRequest").context("form has no SAMLRequest")?;
    let decoded = HttpPostBinding::decode(Some(&encoded), None, None)?;
    assert!(matches!(
        SamlMessage::from_xml(&decoded.xml)?,
        SamlMessage::AuthnRequest(_)
    ));
    Ok(())
}

#[test]
fn redirects_go_through_the_injected_handler() -> anyhow::Result<()> {
    let fx = StsFixture::new()?;
    let mut sp = chain(SP_POST_CHAIN, fx.sp_environment())?;
    let redirects = Arc::new(RecordingRedirects::default());
    let workflow = ServiceProviderSamlWorkflow::new().with_redirection_handler(redirects.clone());

    let mut request = HandlerRequest::generate(NameId::entity(SP_ENTITY), GenerationMode::Auth);
    let mut response = HandlerResponse::new();
    response.destination = Some(IDP_SSO_URL.to_string());
    sp.process(&mut request, &mut response)?;
    let signed = response
        .destination_query_with_signature
        .clone()
        .context("redirect query was not signed")?;

    workflow.send_response(&response)?;

    let sent = redirects.sent.lock();
    assert_eq!(sent.as_slice(), [format!("{IDP_SSO_URL}?{signed}")]);
    Ok(())
}
