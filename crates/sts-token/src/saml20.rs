//! SAML 2.0 assertion token provider.

use std::collections::HashMap;

use sts_core::{ProviderConfig, StsError, StsResult, XmlTime};
use sts_protocol_saml::constants::{ASSERTION, SAML_NS};
use sts_protocol_saml::{Assertion, generate_id};

use crate::context::{ProtocolContext, QName, TokenFamily};
use crate::provider::{ProviderEnvironment, SecurityTokenProvider, TokenStore};

/// Factory id of [`Saml20AssertionTokenProvider`].
pub const SAML20_PROVIDER_ID: &str = "saml20-assertion";

/// Issues SAML 2.0 assertions valid for
/// `[issue - skew, issue + validity + skew)`.
#[derive(Debug)]
pub struct Saml20AssertionTokenProvider {
    config: ProviderConfig,
    store: TokenStore,
    time: XmlTime,
}

impl Saml20AssertionTokenProvider {
    /// Creates a provider.
    #[must_use]
    pub const fn new(config: ProviderConfig, store: TokenStore, time: XmlTime) -> Self {
        Self { config, store, time }
    }

    /// Creates a provider from its option map.
    ///
    /// ## Errors
    ///
    /// Returns a configuration error for rejected options or unknown
    /// registries.
    pub fn from_options(
        options: &HashMap<String, String>,
        environment: &ProviderEnvironment,
    ) -> StsResult<Self> {
        let config = ProviderConfig::from_options(options)?;
        let store = environment.token_store(SAML_NS, &config)?;
        Ok(Self::new(config, store, environment.time.clone()))
    }

    /// The provider's configuration.
    #[must_use]
    pub const fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// The registries the provider writes to.
    #[must_use]
    pub const fn store(&self) -> &TokenStore {
        &self.store
    }

    fn register(&self, assertion: &Assertion) -> StsResult<()> {
        let expires_at = assertion
            .conditions
            .as_ref()
            .and_then(|conditions| conditions.not_on_or_after.as_ref());
        self.store
            .register(&assertion.id, assertion.to_xml(), self.time.now(), expires_at)
    }
}

impl SecurityTokenProvider for Saml20AssertionTokenProvider {
    fn token_type(&self) -> &str {
        SAML_NS
    }

    fn supported_qname(&self) -> QName {
        QName::new(SAML_NS, ASSERTION)
    }

    fn family(&self) -> TokenFamily {
        TokenFamily::Saml2
    }

    fn issue_token(&self, context: &mut ProtocolContext) -> StsResult<()> {
        let context = context.as_saml2_mut()?;
        let issuer = context.issuer_id.clone().ok_or_else(|| {
            StsError::Configuration("issuer is required to issue an assertion".to_string())
        })?;

        let mut assertion = Assertion::new(generate_id(), issuer, self.time.issue_instant());
        assertion.subject = context.subject.clone();
        assertion.conditions = context.conditions.clone();
        assertion.statements = context.statements.clone();
        assertion.create_timed_conditions(
            self.config.assertion_validity_ms,
            self.config.clock_skew_ms,
        )?;

        self.register(&assertion)?;
        tracing::info!(
            token_id = %assertion.id,
            issuer = %assertion.issuer.value,
            subject = assertion.subject_name(),
            "issued SAML 2.0 assertion"
        );
        context.issued_assertion = Some(assertion);
        Ok(())
    }

    fn renew_token(&self, context: &mut ProtocolContext) -> StsResult<()> {
        let context = context.as_saml2_mut()?;
        let assertion = context.issued_assertion.as_mut().ok_or_else(|| {
            StsError::AssertionInvalid("no assertion to renew".to_string())
        })?;
        if assertion.id.is_empty() {
            return Err(StsError::Processing("assertion to renew has no ID".to_string()));
        }
        self.store.ensure_not_revoked(&assertion.id)?;

        assertion.update_issue_instant(self.time.issue_instant());
        assertion.create_timed_conditions(
            self.config.assertion_validity_ms,
            self.config.clock_skew_ms,
        )?;

        let assertion = &*assertion;
        self.register(assertion)?;
        tracing::info!(token_id = %assertion.id, "renewed SAML 2.0 assertion");
        Ok(())
    }

    fn cancel_token(&self, context: &mut ProtocolContext) -> StsResult<()> {
        let context = context.as_saml2_mut()?;
        let assertion = context.issued_assertion.as_ref().ok_or_else(|| {
            StsError::AssertionInvalid("no assertion to cancel".to_string())
        })?;
        self.store.cancel(&assertion.id)?;
        tracing::info!(token_id = %assertion.id, "cancelled SAML 2.0 assertion");
        Ok(())
    }

    fn validate_token(&self, context: &mut ProtocolContext) -> StsResult<()> {
        let context = context.as_saml2_mut()?;
        let assertion = context.issued_assertion.as_ref().ok_or_else(|| {
            StsError::AssertionInvalid("no assertion to validate".to_string())
        })?;
        if !assertion.is_valid_at(self.time.now()) {
            return Err(StsError::AssertionExpired(format!(
                "assertion {} is outside its conditions window",
                assertion.id
            )));
        }
        self.store.ensure_active(&assertion.id)?;
        tracing::debug!(token_id = %assertion.id, "validated SAML 2.0 assertion");
        Ok(())
    }
}
