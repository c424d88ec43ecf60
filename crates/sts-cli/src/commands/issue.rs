//! `sts issue`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use sts_core::config::keys;
use sts_core::time::format_xml_datetime;
use sts_core::{SystemClock, TimeConfig, XmlTime};
use sts_protocol_saml::constants::BEARER_CONFIRMATION;
use sts_protocol_saml::{Assertion, Conditions, NameId, Subject, SubjectConfirmation};
use sts_registry::RegistryFactories;
use sts_token::{
    Caller, CoreSts, ProtocolContext, ProviderEnvironment, Saml20AssertionTokenProvider,
    SamlProtocolContext, StsConfiguration, StsSettings, TokenProviderFactories,
};

use crate::cli::{IssueArgs, OutputFormat};
use crate::output::{field, json, success};
use crate::{CliError, CliResult};

#[derive(Debug, Serialize)]
struct IssuedAssertion<'a> {
    id: &'a str,
    issuer: &'a str,
    subject: Option<&'a str>,
    not_before: Option<String>,
    not_on_or_after: Option<String>,
    xml: String,
}

/// Runs `sts issue`.
pub fn run_issue(args: &IssueArgs, config: Option<&Path>, format: OutputFormat) -> CliResult<()> {
    let sts = match config {
        Some(path) => sts_from_settings(&StsSettings::load(path)?)?,
        None => standalone_sts(args)?,
    };
    let assertion = issue(&sts, args)?;

    let conditions = assertion.conditions.as_ref();
    let issued = IssuedAssertion {
        id: &assertion.id,
        issuer: &assertion.issuer.value,
        subject: assertion.subject_name(),
        not_before: conditions
            .and_then(|c| c.not_before.as_ref())
            .map(format_xml_datetime),
        not_on_or_after: conditions
            .and_then(|c| c.not_on_or_after.as_ref())
            .map(format_xml_datetime),
        xml: assertion.to_xml(),
    };
    if json(&issued, format)? {
        return Ok(());
    }

    success(&format!("issued assertion {}", issued.id));
    if let Some(not_before) = &issued.not_before {
        field("not before", not_before);
    }
    if let Some(not_on_or_after) = &issued.not_on_or_after {
        field("not on or after", not_on_or_after);
    }
    println!("{}", issued.xml);
    Ok(())
}

/// Builds an STS from a settings file.
pub(crate) fn sts_from_settings(settings: &StsSettings) -> CliResult<CoreSts> {
    let time = XmlTime::from_config(Arc::new(SystemClock), &settings.time_config())?;
    let environment = ProviderEnvironment::new(time, Arc::new(RegistryFactories::with_builtin()?));
    let factories = TokenProviderFactories::with_builtin(environment)?;
    let configuration = StsConfiguration::from_settings(settings, &factories)?;
    tracing::debug!(name = configuration.name(), "loaded STS settings");
    Ok(CoreSts::new(configuration))
}

/// Builds a single-provider STS from command-line options.
fn standalone_sts(args: &IssueArgs) -> CliResult<CoreSts> {
    let mut options = HashMap::new();
    if let Some(validity) = args.validity {
        options.insert(keys::ASSERTION_VALIDITY.to_string(), validity.to_string());
    }
    if let Some(skew) = args.skew {
        options.insert(keys::CLOCK_SKEW.to_string(), skew.to_string());
    }

    let time = XmlTime::from_config(Arc::new(SystemClock), &TimeConfig::from_env())?;
    let environment = ProviderEnvironment::new(time, Arc::new(RegistryFactories::with_builtin()?));
    let provider = Saml20AssertionTokenProvider::from_options(&options, &environment)?;
    let configuration = StsConfiguration::builder("sts-cli")
        .provider(Arc::new(provider))
        .build()?;
    Ok(CoreSts::new(configuration))
}

/// Issues a bearer assertion for `args.subject`.
pub(crate) fn issue(sts: &CoreSts, args: &IssueArgs) -> CliResult<Assertion> {
    let subject = Subject::new(NameId::new(args.subject.as_str()))
        .with_confirmation(SubjectConfirmation::new(BEARER_CONFIRMATION));
    let mut request = SamlProtocolContext::new()
        .with_issuer(NameId::entity(args.issuer.as_str()))
        .with_subject(subject);
    if let Some(audience) = &args.audience {
        request = request.with_conditions(Conditions::default().with_audience(audience.as_str()));
    }

    let mut context: ProtocolContext = request.into();
    sts.issue_token(&Caller::new(args.issuer.as_str()), &mut context)?;
    context
        .saml2_assertion()
        .cloned()
        .ok_or_else(|| CliError::Invalid("no assertion was issued".to_string()))
}
