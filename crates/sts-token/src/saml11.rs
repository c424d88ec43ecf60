//! SAML 1.1 assertion token provider.

use std::collections::HashMap;

use sts_core::{ProviderConfig, StsError, StsResult, XmlTime};
use sts_protocol_saml::constants::{ASSERTION, SAML11_NS};
use sts_protocol_saml::{Saml11Assertion, Saml11Statement, generate_id};

use crate::context::{ProtocolContext, QName, TokenFamily};
use crate::provider::{ProviderEnvironment, SecurityTokenProvider, TokenStore};

/// Factory id of [`Saml11AssertionTokenProvider`].
pub const SAML11_PROVIDER_ID: &str = "saml11-assertion";

/// Issues SAML 1.1 assertions carrying an authentication statement for the
/// context's subject.
#[derive(Debug)]
pub struct Saml11AssertionTokenProvider {
    config: ProviderConfig,
    store: TokenStore,
    time: XmlTime,
}

impl Saml11AssertionTokenProvider {
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
        let store = environment.token_store(SAML11_NS, &config)?;
        Ok(Self::new(config, store, environment.time.clone()))
    }

    /// The registries the provider writes to.
    #[must_use]
    pub const fn store(&self) -> &TokenStore {
        &self.store
    }

    fn register(&self, assertion: &Saml11Assertion) -> StsResult<()> {
        let expires_at = assertion
            .conditions
            .as_ref()
            .and_then(|conditions| conditions.not_on_or_after.as_ref());
        self.store
            .register(&assertion.id, assertion.to_xml(), self.time.now(), expires_at)
    }
}

impl SecurityTokenProvider for Saml11AssertionTokenProvider {
    fn token_type(&self) -> &str {
        SAML11_NS
    }

    fn supported_qname(&self) -> QName {
        QName::new(SAML11_NS, ASSERTION)
    }

    fn family(&self) -> TokenFamily {
        TokenFamily::Saml11
    }

    fn issue_token(&self, context: &mut ProtocolContext) -> StsResult<()> {
        let context = context.as_saml11_mut()?;
        let issuer = context.issuer_id.clone().ok_or_else(|| {
            StsError::Configuration("issuer is required to issue an assertion".to_string())
        })?;
        let issue_instant = self.time.issue_instant();

        let mut assertion = Saml11Assertion::new(generate_id(), issuer, issue_instant);
        assertion.conditions = context.conditions.clone();
        assertion.statements = context.statements.clone();
        assertion.create_timed_conditions(
            self.config.assertion_validity_ms,
            self.config.clock_skew_ms,
        )?;
        assertion.statements.push(Saml11Statement::Authentication {
            method: context.auth_method.clone(),
            instant: issue_instant,
            subject: context.subject.clone().unwrap_or_default(),
        });

        self.register(&assertion)?;
        tracing::info!(
            token_id = %assertion.id,
            issuer = %assertion.issuer,
            "issued SAML 1.1 assertion"
        );
        context.issued_assertion = Some(assertion);
        Ok(())
    }

    fn renew_token(&self, context: &mut ProtocolContext) -> StsResult<()> {
        let context = context.as_saml11_mut()?;
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
        tracing::info!(token_id = %assertion.id, "renewed SAML 1.1 assertion");
        Ok(())
    }

    fn cancel_token(&self, context: &mut ProtocolContext) -> StsResult<()> {
        let context = context.as_saml11_mut()?;
        let assertion = context.issued_assertion.as_ref().ok_or_else(|| {
            StsError::AssertionInvalid("no assertion to cancel".to_string())
        })?;
        self.store.cancel(&assertion.id)?;
        tracing::info!(token_id = %assertion.id, "cancelled SAML 1.1 assertion");
        Ok(())
    }

    fn validate_token(&self, context: &mut ProtocolContext) -> StsResult<()> {
        let context = context.as_saml11_mut()?;
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
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Offset, TimeZone, Utc};
    use sts_core::{ManualClock, ValidationFailure};
    use sts_protocol_saml::Saml11Subject;
    use sts_protocol_saml::constants::SAML11_PASSWORD_AUTHN;
    use sts_registry::{InMemoryRevocationRegistry, InMemoryTokenRegistry};

    use super::*;
    use crate::context::{SamlProtocolContext, Saml11ProtocolContext};

    fn provider() -> (Saml11AssertionTokenProvider, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        ));
        let store = TokenStore::new(
            SAML11_NS,
            Arc::new(InMemoryTokenRegistry::new()),
            Arc::new(InMemoryRevocationRegistry::new()),
        );
        let time = XmlTime::new(clock.clone(), Utc.fix());
        let config = ProviderConfig::default()
            .with_validity_ms(60_000)
            .with_clock_skew_ms(0);
        (Saml11AssertionTokenProvider::new(config, store, time), clock)
    }

    #[test]
    fn issue_adds_authentication_statement() {
        let (provider, _clock) = provider();
        let mut context: ProtocolContext = Saml11ProtocolContext::new()
            .with_issuer("https://idp.example.com")
            .with_subject(Saml11Subject::named("bob"))
            .into();
        provider.issue_token(&mut context).unwrap();

        let assertion = context.saml11_assertion().unwrap();
        assert_eq!(assertion.issuer, "https://idp.example.com");
        let [Saml11Statement::Authentication { method, subject, .. }] =
            assertion.statements.as_slice()
        else {
            panic!("expected one authentication statement");
        };
        assert_eq!(method, SAML11_PASSWORD_AUTHN);
        assert_eq!(subject.name.as_deref(), Some("bob"));

        let round_trip = Saml11Assertion::from_xml(
            &provider.store().tokens().get_token(&assertion.id).unwrap().payload,
        )
        .unwrap();
        assert_eq!(round_trip.id, assertion.id);
    }

    #[test]
    fn window_without_skew() {
        let (provider, clock) = provider();
        let mut context: ProtocolContext =
            Saml11ProtocolContext::new().with_issuer("idp").into();
        provider.issue_token(&mut context).unwrap();

        clock.advance_millis(59_999);
        provider.validate_token(&mut context).unwrap();
        clock.advance_millis(1);
        assert_eq!(
            provider.validate_token(&mut context).unwrap_err().validation_failure(),
            Some(ValidationFailure::Expired)
        );

        provider.renew_token(&mut context).unwrap();
        provider.validate_token(&mut context).unwrap();
    }

    #[test]
    fn cancel_then_renew_fails() {
        let (provider, _clock) = provider();
        let mut context: ProtocolContext =
            Saml11ProtocolContext::new().with_issuer("idp").into();
        provider.issue_token(&mut context).unwrap();
        provider.cancel_token(&mut context).unwrap();
        assert!(provider.renew_token(&mut context).is_err());
    }

    #[test]
    fn saml2_context_is_rejected() {
        let (provider, _clock) = provider();
        let mut context = ProtocolContext::from(SamlProtocolContext::new());
        assert!(provider.issue_token(&mut context).is_err());
    }
}
