//! Issue, renew, cancel and validate through `CoreSts`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{Offset, Utc};
use sts_core::{ErrorKind, ManualClock, TokenEventType, ValidationFailure, XmlTime};
use sts_core::config::keys;
use sts_integration_tests::{IDP_ENTITY, StsFixture, init_tracing};
use sts_registry::RegistryFactories;
use sts_protocol_saml::Assertion;
use sts_protocol_saml::constants::wst_status;
use sts_token::{
    Caller, CoreSts, ProtocolContext, ProviderEnvironment, SAML20_PROVIDER_ID, SamlProtocolContext,
    StsConfiguration, StsSettings, TokenProviderFactories, TokenProviderSettings, WsTrustContext,
};

#[test]
fn validity_window_includes_skew() -> anyhow::Result<()> {
    let fx = StsFixture::new()?;
    let mut context = fx.issue("alice")?;

    fx.clock.advance_millis(6_000);
    fx.sts.validate_token(&fx.caller(), &mut context)?;

    fx.clock.advance_millis(1_001);
    let err = fx
        .sts
        .validate_token(&fx.caller(), &mut context)
        .expect_err("assertion should have expired");
    assert_eq!(err.kind(), ErrorKind::Validation(ValidationFailure::Expired));
    Ok(())
}

#[test]
fn not_on_or_after_is_exclusive() -> anyhow::Result<()> {
    let fx = StsFixture::with_options(&[
        (keys::ASSERTION_VALIDITY, "1000"),
        (keys::CLOCK_SKEW, "0"),
    ])?;
    let mut context = fx.issue("alice")?;

    fx.clock.advance_millis(999);
    fx.sts.validate_token(&fx.caller(), &mut context)?;
    fx.clock.advance_millis(1);
    assert!(fx.sts.validate_token(&fx.caller(), &mut context).is_err());
    Ok(())
}

#[test]
fn issued_ids_are_unique() -> anyhow::Result<()> {
    let fx = StsFixture::new()?;
    let mut ids = HashSet::new();
    for _ in 0..10_000 {
        let context = fx.issue("alice")?;
        ids.insert(context.token_id().map(str::to_string));
    }
    assert_eq!(ids.len(), 10_000);
    assert!(!ids.contains(&None));
    Ok(())
}

#[test]
fn renew_moves_the_window_and_keeps_the_id() -> anyhow::Result<()> {
    let fx = StsFixture::new()?;
    let mut context = fx.issue("alice")?;
    let id = context.token_id().map(str::to_string);

    fx.clock.advance_millis(4_000);
    fx.sts.renew_token(&fx.caller(), &mut context)?;
    assert_eq!(context.token_id().map(str::to_string), id);

    // Past the original window, inside the renewed one.
    fx.clock.advance_millis(4_000);
    fx.sts.validate_token(&fx.caller(), &mut context)?;
    Ok(())
}

#[test]
fn cancelled_assertion_is_invalid_and_cancel_is_idempotent() -> anyhow::Result<()> {
    let fx = StsFixture::new()?;
    let mut context = fx.issue("alice")?;

    fx.sts.cancel_token(&fx.caller(), &mut context)?;
    fx.sts.cancel_token(&fx.caller(), &mut context)?;

    let err = fx
        .sts
        .validate_token(&fx.caller(), &mut context)
        .expect_err("cancelled assertion validated");
    assert_eq!(err.kind(), ErrorKind::Validation(ValidationFailure::Invalid));

    let err = fx
        .sts
        .renew_token(&fx.caller(), &mut context)
        .expect_err("cancelled assertion renewed");
    assert_eq!(err.validation_failure(), Some(ValidationFailure::Invalid));
    Ok(())
}

#[test]
fn expired_check_comes_before_revocation() -> anyhow::Result<()> {
    let fx = StsFixture::new()?;
    let mut context = fx.issue("alice")?;
    fx.sts.cancel_token(&fx.caller(), &mut context)?;

    fx.clock.advance_millis(10_000);
    let err = fx
        .sts
        .validate_token(&fx.caller(), &mut context)
        .expect_err("expired assertion validated");
    assert_eq!(err.validation_failure(), Some(ValidationFailure::Expired));
    Ok(())
}

#[test]
fn every_operation_is_audited() -> anyhow::Result<()> {
    let fx = StsFixture::new()?;
    let mut context = fx.issue("alice")?;
    fx.sts.validate_token(&fx.caller(), &mut context)?;
    fx.sts.renew_token(&fx.caller(), &mut context)?;
    fx.sts.cancel_token(&fx.caller(), &mut context)?;
    let _ = fx.sts.validate_token(&fx.caller(), &mut context);

    assert_eq!(
        fx.events.event_types(),
        vec![
            TokenEventType::Issued,
            TokenEventType::Validated,
            TokenEventType::Renewed,
            TokenEventType::Cancelled,
            TokenEventType::ValidationFailed,
        ]
    );
    let issued = &fx.events.events()[0];
    assert_eq!(issued.token_id.as_deref(), context.token_id());
    Ok(())
}

#[test]
fn assertion_survives_xml_round_trip() -> anyhow::Result<()> {
    let fx = StsFixture::new()?;
    let context = fx.issue("alice")?;
    let xml = context
        .saml2_assertion()
        .map(|assertion| assertion.to_xml())
        .expect("issued assertion");

    let parsed = sts_protocol_saml::Assertion::from_xml(&xml)?;
    let mut replay: ProtocolContext = SamlProtocolContext::for_assertion(parsed).into();
    fx.sts.validate_token(&fx.caller(), &mut replay)?;
    Ok(())
}

fn file_backed_sts(
    dir: &std::path::Path,
    clock: Arc<ManualClock>,
) -> anyhow::Result<CoreSts> {
    let options = HashMap::from([
        (keys::TOKEN_REGISTRY.to_string(), "FILE".to_string()),
        (
            keys::TOKEN_REGISTRY_FILE.to_string(),
            dir.join("tokens.json").display().to_string(),
        ),
        (keys::REVOCATION_REGISTRY.to_string(), "FILE".to_string()),
        (
            keys::REVOCATION_REGISTRY_FILE.to_string(),
            dir.join("revoked.json").display().to_string(),
        ),
    ]);
    let settings = StsSettings {
        name: "file-backed".to_string(),
        token_providers: vec![TokenProviderSettings {
            provider: SAML20_PROVIDER_ID.to_string(),
            options,
            ..TokenProviderSettings::default()
        }],
        ..StsSettings::default()
    };

    let time = XmlTime::new(clock, Utc.fix());
    let environment = ProviderEnvironment::new(time, Arc::new(RegistryFactories::with_builtin()?));
    let factories = TokenProviderFactories::with_builtin(environment)?;
    Ok(CoreSts::new(StsConfiguration::from_settings(&settings, &factories)?))
}

#[test]
fn file_registries_persist_cancellation() -> anyhow::Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let clock = Arc::new(ManualClock::starting_now());
    let caller = Caller::new(IDP_ENTITY);

    let first = file_backed_sts(dir.path(), clock.clone())?;
    let mut context = StsFixture::new()?.request("alice");
    first.issue_token(&caller, &mut context)?;
    first.validate_token(&caller, &mut context)?;
    first.cancel_token(&caller, &mut context)?;
    drop(first);

    let second = file_backed_sts(dir.path(), clock)?;
    let err = second
        .validate_token(&caller, &mut context)
        .expect_err("cancellation was not persisted");
    assert_eq!(err.validation_failure(), Some(ValidationFailure::Invalid));
    Ok(())
}

#[test]
fn ws_trust_and_saml2_providers_share_one_sts() -> anyhow::Result<()> {
    let settings = StsSettings::from_toml_str(
        r#"
        name = "mixed"

        [[token_providers]]
        provider = "saml20-assertion"

        [[token_providers]]
        provider = "wstrust-saml20"

        [[service_providers]]
        endpoint = "https://service.example.com"
        token_type = "http://docs.oasis-open.org/wss/oasis-wss-saml-token-profile-1.1#SAMLV2.0"
        "#,
    )?;
    let clock = Arc::new(ManualClock::starting_now());
    let time = XmlTime::new(clock.clone(), Utc.fix());
    let environment = ProviderEnvironment::new(time, Arc::new(RegistryFactories::with_builtin()?));
    let factories = TokenProviderFactories::with_builtin(environment)?;
    let sts = CoreSts::new(StsConfiguration::from_settings(&settings, &factories)?);
    let caller = Caller::new("gateway");

    // Routed by AppliesTo, not by token type.
    let mut context: ProtocolContext = WsTrustContext::default()
        .with_applies_to("https://service.example.com")
        .with_token_issuer(IDP_ENTITY)
        .with_caller("gateway")
        .with_on_behalf_of("alice")
        .into();
    sts.issue_token(&caller, &mut context)?;
    sts.validate_token(&caller, &mut context)?;

    let ProtocolContext::WsTrust(ws_trust) = &context else {
        anyhow::bail!("context changed family");
    };
    assert_eq!(ws_trust.status.as_deref(), Some(wst_status::VALID));
    let assertion = Assertion::from_xml(ws_trust.security_token.as_deref().unwrap_or_default())?;
    assert_eq!(assertion.subject_name(), Some("alice"));
    assert_eq!(assertion.audiences().collect::<Vec<_>>(), ["https://service.example.com"]);

    sts.cancel_token(&caller, &mut context)?;
    let err = sts
        .validate_token(&caller, &mut context)
        .expect_err("cancelled token validated");
    assert_eq!(err.validation_failure(), Some(ValidationFailure::Invalid));
    Ok(())
}
