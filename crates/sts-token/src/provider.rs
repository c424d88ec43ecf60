//! The token provider contract and the registry plumbing providers share.

use std::fmt::Debug;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sts_core::{ProviderConfig, StsError, StsResult, XmlDateTime, XmlTime};
use sts_registry::{RegisteredToken, RegistryFactories, RevocationRegistry, TokenRegistry};

use crate::context::{ProtocolContext, QName, TokenFamily};

/// Issues, renews, cancels and validates one kind of security token.
///
/// Per assertion the lifecycle is
/// `issue -> ISSUED -> renew -> ISSUED -> cancel -> CANCELLED`, with
/// `validate` evaluating an issued token at any point without changing it.
/// Cancellation is terminal.
pub trait SecurityTokenProvider: Send + Sync + Debug {
    /// Returns true if this provider handles tokens in `namespace`.
    ///
    /// The dispatcher consults this when no provider was configured under
    /// the namespace of the presented token element.
    fn supports(&self, namespace: &str) -> bool {
        namespace == self.token_type()
    }

    /// Token type URI the provider issues.
    fn token_type(&self) -> &str;

    /// Element name of the tokens the provider handles.
    fn supported_qname(&self) -> QName;

    /// Token family the provider serves.
    fn family(&self) -> TokenFamily;

    /// Issues a new token into `context`.
    ///
    /// ## Errors
    ///
    /// Fails if the context lacks an issuer or the token cannot be registered.
    fn issue_token(&self, context: &mut ProtocolContext) -> StsResult<()>;

    /// Refreshes the issue instant and conditions of the token in `context`,
    /// keeping its ID.
    ///
    /// ## Errors
    ///
    /// Fails if the context has no token, the token was cancelled or it
    /// cannot be re-registered.
    fn renew_token(&self, context: &mut ProtocolContext) -> StsResult<()>;

    /// Cancels the token in `context`.
    ///
    /// ## Errors
    ///
    /// Fails if the context has no token or the registries are unavailable.
    fn cancel_token(&self, context: &mut ProtocolContext) -> StsResult<()>;

    /// Checks the token in `context`.
    ///
    /// ## Errors
    ///
    /// Returns [`StsError::AssertionExpired`] outside the conditions window and
    /// [`StsError::AssertionInvalid`] for a missing, unknown or cancelled token.
    fn validate_token(&self, context: &mut ProtocolContext) -> StsResult<()>;
}

/// Registries a provider keeps its tokens in.
#[derive(Debug, Clone)]
pub struct TokenStore {
    token_type: String,
    tokens: Arc<dyn TokenRegistry>,
    revocations: Arc<dyn RevocationRegistry>,
}

impl TokenStore {
    /// Creates a store for tokens of `token_type`.
    #[must_use]
    pub fn new(
        token_type: impl Into<String>,
        tokens: Arc<dyn TokenRegistry>,
        revocations: Arc<dyn RevocationRegistry>,
    ) -> Self {
        Self {
            token_type: token_type.into(),
            tokens,
            revocations,
        }
    }

    /// The token registry.
    #[must_use]
    pub const fn tokens(&self) -> &Arc<dyn TokenRegistry> {
        &self.tokens
    }

    /// The revocation registry.
    #[must_use]
    pub const fn revocations(&self) -> &Arc<dyn RevocationRegistry> {
        &self.revocations
    }

    /// Registers (or re-registers) a serialised token.
    ///
    /// ## Errors
    ///
    /// Returns a processing error if the registry write fails.
    pub fn register(
        &self,
        id: &str,
        payload: String,
        now: DateTime<Utc>,
        expires_at: Option<&XmlDateTime>,
    ) -> StsResult<()> {
        let mut token = RegisteredToken::new(id, self.token_type.as_str(), payload, now);
        if let Some(expires_at) = expires_at {
            token = token.with_expiry(expires_at.to_utc());
        }
        self.tokens.add_token(id, token)?;
        tracing::debug!(token_type = %self.token_type, token_id = id, "registered token");
        Ok(())
    }

    /// Fails if the token was cancelled.
    ///
    /// ## Errors
    ///
    /// Returns [`StsError::AssertionInvalid`] for a cancelled token.
    pub fn ensure_not_revoked(&self, id: &str) -> StsResult<()> {
        if self.revocations.is_revoked(&self.token_type, id) {
            return Err(StsError::AssertionInvalid(format!("token {id} was cancelled")));
        }
        Ok(())
    }

    /// Fails unless the token is registered and not cancelled.
    ///
    /// ## Errors
    ///
    /// Returns [`StsError::AssertionInvalid`] otherwise.
    pub fn ensure_active(&self, id: &str) -> StsResult<()> {
        self.ensure_not_revoked(id)?;
        if self.tokens.get_token(id).is_none() {
            return Err(StsError::AssertionInvalid(format!("token {id} is not registered")));
        }
        Ok(())
    }

    /// Removes the token and records the cancellation.
    ///
    /// ## Errors
    ///
    /// Returns a processing error if either registry write fails.
    pub fn cancel(&self, id: &str) -> StsResult<()> {
        self.tokens.remove_token(id)?;
        self.revocations.revoke_token(&self.token_type, id)?;
        tracing::debug!(token_type = %self.token_type, token_id = id, "cancelled token");
        Ok(())
    }
}

/// What provider factories need beyond their option map.
#[derive(Debug, Clone)]
pub struct ProviderEnvironment {
    /// Time source for issue instants and validation.
    pub time: XmlTime,
    /// Registry back-ends providers may name in their options.
    pub registries: Arc<RegistryFactories>,
}

impl ProviderEnvironment {
    /// Creates an environment.
    #[must_use]
    pub const fn new(time: XmlTime, registries: Arc<RegistryFactories>) -> Self {
        Self { time, registries }
    }

    /// Opens the registries named by `config` for tokens of `token_type`.
    ///
    /// ## Errors
    ///
    /// Returns a configuration error for an unknown back-end and a processing
    /// error if one cannot be opened.
    pub fn token_store(&self, token_type: &str, config: &ProviderConfig) -> StsResult<TokenStore> {
        Ok(TokenStore::new(
            token_type,
            self.registries.token_registry(&config.token_registry)?,
            self.registries.revocation_registry(&config.revocation_registry)?,
        ))
    }
}
