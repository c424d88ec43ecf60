//! Fixtures shared by the cross-crate scenarios in `tests/`.

#![forbid(unsafe_code)]
#![allow(missing_docs)]

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Offset, Utc};
use sts_core::{ManualClock, RecordingEventSink, XmlTime};
use sts_handlers::handlers::{AttributeManager, MessageSigner};
use sts_handlers::{HandlerChain, HandlerChainSettings, HandlerEnvironment, HandlerFactories};
use sts_protocol_saml::constants::signature_algorithms::RSA_SHA256;
use sts_protocol_saml::constants::BEARER_CONFIRMATION;
use sts_protocol_saml::{
    Conditions, NameId, SamlError, SamlResult, Subject, SubjectConfirmation,
};
use sts_registry::RegistryFactories;
use sts_token::{
    Caller, CoreSts, ProtocolContext, ProviderEnvironment, Saml20AssertionTokenProvider,
    SamlProtocolContext, StsConfiguration,
};
use tracing_subscriber::EnvFilter;

pub const SP_ENTITY: &str = "https://sp.example.com";
pub const SP_ACS_URL: &str = "https://sp.example.com/acs";
pub const IDP_ENTITY: &str = "https://idp.example.com";
pub const IDP_SSO_URL: &str = "https://idp.example.com/sso";
pub const IDP_SLO_URL: &str = "https://idp.example.com/slo";

/// Installs a test subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_test_writer()
        .try_init();
}

/// An STS with one SAML 2.0 provider on a manual clock.
pub struct StsFixture {
    pub clock: Arc<ManualClock>,
    pub time: XmlTime,
    pub sts: Arc<CoreSts>,
    pub events: Arc<RecordingEventSink>,
    pub provider: Arc<Saml20AssertionTokenProvider>,
}

impl StsFixture {
    /// Default window: 5000 ms validity, 2000 ms skew.
    pub fn new() -> anyhow::Result<Self> {
        Self::with_options(&[])
    }

    pub fn with_options(options: &[(&str, &str)]) -> anyhow::Result<Self> {
        init_tracing();
        let clock = Arc::new(ManualClock::starting_now());
        let time = XmlTime::new(clock.clone(), Utc.fix());
        let environment =
            ProviderEnvironment::new(time.clone(), Arc::new(RegistryFactories::with_builtin()?));
        let options: HashMap<String, String> = options
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        let provider = Arc::new(Saml20AssertionTokenProvider::from_options(&options, &environment)?);

        let events = Arc::new(RecordingEventSink::new());
        let configuration = StsConfiguration::builder("integration")
            .provider(provider.clone())
            .build()?;
        let sts = CoreSts::new(configuration)
            .with_event_sink(events.clone())
            .with_clock(clock.clone());
        Ok(Self {
            clock,
            time,
            sts: Arc::new(sts),
            events,
            provider,
        })
    }

    pub fn caller(&self) -> Caller {
        Caller::new(IDP_ENTITY)
    }

    /// A bearer assertion request for `subject`, restricted to the SP.
    pub fn request(&self, subject: &str) -> ProtocolContext {
        SamlProtocolContext::new()
            .with_issuer(NameId::entity(IDP_ENTITY))
            .with_subject(
                Subject::new(NameId::new(subject))
                    .with_confirmation(SubjectConfirmation::new(BEARER_CONFIRMATION)),
            )
            .with_conditions(Conditions::default().with_audience(SP_ENTITY))
            .into()
    }

    /// Issues an assertion and returns the context carrying it.
    pub fn issue(&self, subject: &str) -> anyhow::Result<ProtocolContext> {
        let mut context = self.request(subject);
        self.sts.issue_token(&self.caller(), &mut context)?;
        Ok(context)
    }

    /// Handler environment for the IDP side.
    pub fn idp_environment(&self) -> HandlerEnvironment {
        HandlerEnvironment::new(self.time.clone())
            .with_sts(self.sts.clone())
            .with_attribute_manager(Arc::new(Directory))
    }

    /// Handler environment for the SP side.
    pub fn sp_environment(&self) -> HandlerEnvironment {
        HandlerEnvironment::new(self.time.clone()).with_signer(Arc::new(ReversingSigner))
    }
}

/// Builds a chain from TOML settings.
pub fn chain(settings: &str, environment: HandlerEnvironment) -> anyhow::Result<HandlerChain> {
    let settings: HandlerChainSettings = toml::from_str(settings)?;
    let factories = HandlerFactories::with_builtin(environment)?;
    Ok(HandlerChain::from_settings(&settings, &factories)?)
}

/// Knows the attributes of `alice` only.
#[derive(Debug)]
pub struct Directory;

impl AttributeManager for Directory {
    fn attributes(&self, principal: &str, keys: &[String]) -> HashMap<String, Vec<String>> {
        if principal != "alice" {
            return HashMap::new();
        }
        HashMap::from([
            ("mail".to_string(), vec!["alice@example.com".to_string()]),
            ("department".to_string(), vec!["finance".to_string()]),
        ])
        .into_iter()
        .filter(|(name, _)| keys.is_empty() || keys.contains(name))
        .collect()
    }
}

/// "Signs" by reversing the input, so tests can check what was covered.
#[derive(Debug)]
pub struct ReversingSigner;

impl MessageSigner for ReversingSigner {
    fn signature_algorithm(&self) -> &str {
        RSA_SHA256
    }

    fn sign(&self, data: &[u8]) -> SamlResult<Vec<u8>> {
        if data.is_empty() {
            return Err(SamlError::SignatureCreation("empty input".to_string()));
        }
        Ok(data.iter().rev().copied().collect())
    }
}

/// Value of the hidden input `name` in an HTTP-POST form.
pub fn form_value(html: &str, name: &str) -> Option<String> {
    let marker = format!(r#"name="{name}" value=""#);
    let start = html.find(&marker)? + marker.len();
    let end = html[start..].find('"')?;
    Some(html[start..start + end].to_string())
}
