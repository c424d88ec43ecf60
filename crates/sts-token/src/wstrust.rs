//! SAML 2.0 assertions issued through WS-Trust requests.
//!
//! The assertion travels as serialised XML in
//! [`WsTrustContext::security_token`]. Its subject is the on-behalf-of
//! principal (sender-vouches) when the request names one and the caller
//! (bearer) otherwise. Claimed attributes become an attribute statement.
//! Validation records a WS-Trust status URI on the context as well as
//! returning the outcome.

use std::collections::HashMap;

use sts_core::{ProviderConfig, StsError, StsResult, XmlTime};
use sts_protocol_saml::constants::{
    ASSERTION, BEARER_CONFIRMATION, SAML_NS, SAML2_TOKEN_TYPE, SENDER_VOUCHES_CONFIRMATION,
    authn_context, wst_status,
};
use sts_protocol_saml::{
    Assertion, Attribute, AttributeStatement, AuthnStatement, Conditions, NameId, Statement,
    Subject, SubjectConfirmation, generate_id,
};

use crate::context::{ProtocolContext, QName, TokenFamily, WsTrustContext};
use crate::provider::{ProviderEnvironment, SecurityTokenProvider, TokenStore};

/// Factory id of [`WsTrustSaml20TokenProvider`].
pub const WSTRUST_SAML20_PROVIDER_ID: &str = "wstrust-saml20";

/// Subject name used when the request carries no principal.
const ANONYMOUS: &str = "ANONYMOUS";

/// Issues SAML 2.0 assertions for WS-Trust `RequestSecurityToken` calls.
#[derive(Debug)]
pub struct WsTrustSaml20TokenProvider {
    config: ProviderConfig,
    store: TokenStore,
    time: XmlTime,
}

impl WsTrustSaml20TokenProvider {
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
        let store = environment.token_store(SAML2_TOKEN_TYPE, &config)?;
        Ok(Self::new(config, store, environment.time.clone()))
    }

    /// The registries the provider writes to.
    #[must_use]
    pub const fn store(&self) -> &TokenStore {
        &self.store
    }

    fn build_assertion(&self, context: &WsTrustContext) -> StsResult<Assertion> {
        let issuer = context.token_issuer.as_deref().ok_or_else(|| {
            StsError::Configuration("token issuer is required to issue an assertion".to_string())
        })?;
        let (principal, method) = match (&context.on_behalf_of, &context.caller) {
            (Some(principal), _) => (principal.as_str(), SENDER_VOUCHES_CONFIRMATION),
            (None, Some(caller)) => (caller.as_str(), BEARER_CONFIRMATION),
            (None, None) => (ANONYMOUS, BEARER_CONFIRMATION),
        };

        let instant = self.time.issue_instant();
        let mut assertion = Assertion::new(generate_id(), NameId::entity(issuer), instant.clone())
            .with_subject(
                Subject::new(NameId::new(principal))
                    .with_confirmation(SubjectConfirmation::new(method)),
            );
        if let Some(endpoint) = &context.applies_to {
            assertion.conditions = Some(Conditions::default().with_audience(endpoint.as_str()));
        }

        if !context.claimed_attributes.is_empty() {
            let mut claims: Vec<(&String, &Vec<String>)> =
                context.claimed_attributes.iter().collect();
            claims.sort_unstable_by_key(|(name, _)| *name);
            let mut statement = AttributeStatement::default();
            for (name, values) in claims {
                statement = statement.with_attribute(Attribute::multi(name.as_str(), values.clone()));
            }
            assertion.statements.push(Statement::Attribute(statement));
        }
        assertion
            .statements
            .push(Statement::Authn(AuthnStatement::new(instant, authn_context::UNSPECIFIED)));

        assertion.create_timed_conditions(
            self.config.assertion_validity_ms,
            self.config.clock_skew_ms,
        )?;
        Ok(assertion)
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

/// Parses the assertion a request presents.
fn presented_assertion(context: &WsTrustContext, operation: &str) -> StsResult<Assertion> {
    let token = context.security_token.as_deref().ok_or_else(|| {
        StsError::AssertionInvalid(format!("no security token to {operation}"))
    })?;
    Assertion::from_xml(token).map_err(|err| {
        StsError::AssertionInvalid(format!("security token is not a SAML 2.0 assertion: {err}"))
    })
}

impl SecurityTokenProvider for WsTrustSaml20TokenProvider {
    fn supports(&self, namespace: &str) -> bool {
        namespace == SAML2_TOKEN_TYPE || namespace == SAML_NS
    }

    fn token_type(&self) -> &str {
        SAML2_TOKEN_TYPE
    }

    fn supported_qname(&self) -> QName {
        QName::new(SAML_NS, ASSERTION)
    }

    fn family(&self) -> TokenFamily {
        TokenFamily::WsTrust
    }

    fn issue_token(&self, context: &mut ProtocolContext) -> StsResult<()> {
        let context = context.as_ws_trust_mut()?;
        let assertion = self.build_assertion(context)?;
        self.register(&assertion)?;
        tracing::info!(
            token_id = %assertion.id,
            issuer = %assertion.issuer.value,
            subject = assertion.subject_name(),
            applies_to = context.applies_to.as_deref(),
            "issued WS-Trust SAML 2.0 assertion"
        );
        context.qname = Some(self.supported_qname());
        context.security_token = Some(assertion.to_xml());
        context.status = None;
        Ok(())
    }

    fn renew_token(&self, context: &mut ProtocolContext) -> StsResult<()> {
        let context = context.as_ws_trust_mut()?;
        let mut assertion = presented_assertion(context, "renew")?;
        self.store.ensure_not_revoked(&assertion.id)?;

        assertion.update_issue_instant(self.time.issue_instant());
        assertion.create_timed_conditions(
            self.config.assertion_validity_ms,
            self.config.clock_skew_ms,
        )?;
        self.register(&assertion)?;
        tracing::info!(token_id = %assertion.id, "renewed WS-Trust SAML 2.0 assertion");
        context.security_token = Some(assertion.to_xml());
        Ok(())
    }

    fn cancel_token(&self, context: &mut ProtocolContext) -> StsResult<()> {
        let context = context.as_ws_trust_mut()?;
        let assertion = presented_assertion(context, "cancel")?;
        self.store.cancel(&assertion.id)?;
        tracing::info!(token_id = %assertion.id, "cancelled WS-Trust SAML 2.0 assertion");
        Ok(())
    }

    fn validate_token(&self, context: &mut ProtocolContext) -> StsResult<()> {
        let context = context.as_ws_trust_mut()?;
        let outcome = presented_assertion(context, "validate").and_then(|assertion| {
            if !assertion.is_valid_at(self.time.now()) {
                return Err(StsError::AssertionExpired(format!(
                    "assertion {} is outside its conditions window",
                    assertion.id
                )));
            }
            self.store.ensure_active(&assertion.id)?;
            Ok(assertion.id)
        });

        match outcome {
            Ok(id) => {
                tracing::debug!(token_id = %id, "validated WS-Trust SAML 2.0 assertion");
                context.status = Some(wst_status::VALID.to_string());
                Ok(())
            }
            Err(err) => {
                context.status = Some(wst_status::INVALID.to_string());
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Offset, TimeZone, Utc};
    use sts_core::{ErrorKind, ManualClock, ValidationFailure};
    use sts_registry::{InMemoryRevocationRegistry, InMemoryTokenRegistry};

    use super::*;
    use crate::context::SamlProtocolContext;

    fn provider() -> (WsTrustSaml20TokenProvider, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        ));
        let store = TokenStore::new(
            SAML2_TOKEN_TYPE,
            Arc::new(InMemoryTokenRegistry::new()),
            Arc::new(InMemoryRevocationRegistry::new()),
        );
        let time = XmlTime::new(clock.clone(), Utc.fix());
        (
            WsTrustSaml20TokenProvider::new(ProviderConfig::default(), store, time),
            clock,
        )
    }

    fn request() -> ProtocolContext {
        WsTrustContext::new(SAML2_TOKEN_TYPE)
            .with_token_issuer("https://sts.example.com")
            .with_caller("alice")
            .with_applies_to("https://service.example.com")
            .into()
    }

    fn issued(context: &ProtocolContext) -> Assertion {
        let ProtocolContext::WsTrust(context) = context else {
            panic!("context changed family");
        };
        Assertion::from_xml(context.security_token.as_deref().unwrap()).unwrap()
    }

    fn status(context: &ProtocolContext) -> Option<&str> {
        match context {
            ProtocolContext::WsTrust(context) => context.status.as_deref(),
            _ => None,
        }
    }

    #[test]
    fn issue_writes_security_token_for_caller() {
        let (provider, _clock) = provider();
        let mut context = request();
        provider.issue_token(&mut context).unwrap();

        let assertion = issued(&context);
        assert_eq!(assertion.issuer.value, "https://sts.example.com");
        assert_eq!(assertion.subject_name(), Some("alice"));
        let subject = assertion.subject.as_ref().unwrap();
        assert_eq!(subject.confirmations[0].method, BEARER_CONFIRMATION);
        let audiences: Vec<&str> = assertion.audiences().collect();
        assert_eq!(audiences, ["https://service.example.com"]);
        assert_eq!(
            assertion.conditions.as_ref().unwrap().not_on_or_after.unwrap().to_utc(),
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 7).unwrap()
        );
        assert!(matches!(assertion.statements.last(), Some(Statement::Authn(_))));
        assert_eq!(context.qname(), Some(QName::new(SAML_NS, ASSERTION)));
        assert!(provider.store().tokens().get_token(&assertion.id).is_some());
    }

    #[test]
    fn on_behalf_of_uses_sender_vouches() {
        let (provider, _clock) = provider();
        let mut context: ProtocolContext = WsTrustContext::new(SAML2_TOKEN_TYPE)
            .with_token_issuer("sts")
            .with_caller("gateway")
            .with_on_behalf_of("bob")
            .into();
        provider.issue_token(&mut context).unwrap();

        let assertion = issued(&context);
        assert_eq!(assertion.subject_name(), Some("bob"));
        assert_eq!(
            assertion.subject.as_ref().unwrap().confirmations[0].method,
            SENDER_VOUCHES_CONFIRMATION
        );
    }

    #[test]
    fn anonymous_request_gets_placeholder_subject() {
        let (provider, _clock) = provider();
        let mut context: ProtocolContext =
            WsTrustContext::new(SAML2_TOKEN_TYPE).with_token_issuer("sts").into();
        provider.issue_token(&mut context).unwrap();
        assert_eq!(issued(&context).subject_name(), Some(ANONYMOUS));
    }

    #[test]
    fn claimed_attributes_become_a_statement() {
        let (provider, _clock) = provider();
        let mut context: ProtocolContext = WsTrustContext::new(SAML2_TOKEN_TYPE)
            .with_token_issuer("sts")
            .with_claim("role", "admin")
            .with_claim("role", "user")
            .with_claim("mail", "alice@example.com")
            .into();
        provider.issue_token(&mut context).unwrap();

        let assertion = issued(&context);
        let Some(Statement::Attribute(statement)) = assertion.statements.first() else {
            panic!("no attribute statement");
        };
        let names: Vec<&str> = statement.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["mail", "role"]);
        assert_eq!(statement.attributes[1].values, ["admin", "user"]);
    }

    #[test]
    fn issue_without_issuer_fails() {
        let (provider, _clock) = provider();
        let mut context = ProtocolContext::from(WsTrustContext::new(SAML2_TOKEN_TYPE));
        let err = provider.issue_token(&mut context).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(provider.store().tokens().is_empty());
    }

    #[test]
    fn validate_sets_status() {
        let (provider, clock) = provider();
        let mut context = request();
        provider.issue_token(&mut context).unwrap();

        provider.validate_token(&mut context).unwrap();
        assert_eq!(status(&context), Some(wst_status::VALID));

        clock.advance_millis(7_000);
        let err = provider.validate_token(&mut context).unwrap_err();
        assert_eq!(err.validation_failure(), Some(ValidationFailure::Expired));
        assert_eq!(status(&context), Some(wst_status::INVALID));
    }

    #[test]
    fn garbage_token_is_invalid() {
        let (provider, _clock) = provider();
        let mut context = ProtocolContext::from(WsTrustContext::for_token(
            QName::new(SAML_NS, ASSERTION),
            "<wst:Nonsense/>",
        ));
        let err = provider.validate_token(&mut context).unwrap_err();
        assert_eq!(err.validation_failure(), Some(ValidationFailure::Invalid));
        assert_eq!(status(&context), Some(wst_status::INVALID));
    }

    #[test]
    fn renew_keeps_id_then_cancel_is_terminal() {
        let (provider, clock) = provider();
        let mut context = request();
        provider.issue_token(&mut context).unwrap();
        let original = issued(&context);

        clock.advance_millis(10_000);
        assert!(provider.validate_token(&mut context).is_err());
        provider.renew_token(&mut context).unwrap();
        let renewed = issued(&context);
        assert_eq!(renewed.id, original.id);
        assert!(renewed.issue_instant > original.issue_instant);
        assert_eq!(renewed.subject, original.subject);
        provider.validate_token(&mut context).unwrap();
        assert_eq!(status(&context), Some(wst_status::VALID));

        provider.cancel_token(&mut context).unwrap();
        assert!(provider.validate_token(&mut context).is_err());
        assert_eq!(status(&context), Some(wst_status::INVALID));
        let err = provider.renew_token(&mut context).unwrap_err();
        assert_eq!(err.validation_failure(), Some(ValidationFailure::Invalid));
    }

    #[test]
    fn saml2_contexts_are_rejected() {
        let (provider, _clock) = provider();
        let mut context = ProtocolContext::from(SamlProtocolContext::new());
        let err = provider.issue_token(&mut context).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn supports_token_type_and_assertion_namespace() {
        let (provider, _clock) = provider();
        assert!(provider.supports(SAML2_TOKEN_TYPE));
        assert!(provider.supports(SAML_NS));
        assert!(!provider.supports(sts_protocol_saml::constants::SAML11_NS));
    }
}
