//! The STS dispatcher.
//!
//! [`CoreSts`] picks the provider for a request, checks the caller's
//! permission, delegates the lifecycle operation and records an audit event
//! for the outcome.

use std::sync::Arc;

use sts_core::{
    Clock, EventSink, StsError, StsResult, SystemClock, TokenEvent, TokenEventType,
    TracingEventSink,
};

use crate::config::StsConfiguration;
use crate::context::ProtocolContext;
use crate::permission::{AllowAll, Caller, PermissionChecker, STS_PERMISSION};
use crate::provider::SecurityTokenProvider;

#[derive(Debug, Clone, Copy)]
enum Operation {
    Issue,
    Renew,
    Cancel,
    Validate,
}

impl Operation {
    const fn name(self) -> &'static str {
        match self {
            Self::Issue => "issue",
            Self::Renew => "renew",
            Self::Cancel => "cancel",
            Self::Validate => "validate",
        }
    }

    const fn events(self) -> (TokenEventType, TokenEventType) {
        match self {
            Self::Issue => (TokenEventType::Issued, TokenEventType::IssueError),
            Self::Renew => (TokenEventType::Renewed, TokenEventType::RenewError),
            Self::Cancel => (TokenEventType::Cancelled, TokenEventType::CancelError),
            Self::Validate => (TokenEventType::Validated, TokenEventType::ValidationFailed),
        }
    }
}

/// Routes token requests to the configured providers.
#[derive(Debug, Clone)]
pub struct CoreSts {
    configuration: Arc<StsConfiguration>,
    permissions: Arc<dyn PermissionChecker>,
    events: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
}

impl CoreSts {
    /// Creates a dispatcher that allows every caller and logs events.
    #[must_use]
    pub fn new(configuration: StsConfiguration) -> Self {
        Self {
            configuration: Arc::new(configuration),
            permissions: Arc::new(AllowAll),
            events: Arc::new(TracingEventSink),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the permission checker.
    #[must_use]
    pub fn with_permissions(mut self, permissions: Arc<dyn PermissionChecker>) -> Self {
        self.permissions = permissions;
        self
    }

    /// Replaces the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Replaces the clock used for event timestamps.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The provider configuration.
    #[must_use]
    pub fn configuration(&self) -> &StsConfiguration {
        &self.configuration
    }

    /// Issues a token, choosing the provider by the context's service name
    /// and then by its token type.
    ///
    /// ## Errors
    ///
    /// Returns a permission error for unauthorised callers, a configuration
    /// error if no provider matches, or whatever the provider reports.
    pub fn issue_token(&self, caller: &Caller, context: &mut ProtocolContext) -> StsResult<()> {
        self.dispatch(Operation::Issue, caller, context, Self::provider_for_issue)
    }

    /// Renews the token in `context`.
    ///
    /// ## Errors
    ///
    /// Returns a processing error if the context names no token element, a
    /// configuration error if no provider handles it, or whatever the
    /// provider reports.
    pub fn renew_token(&self, caller: &Caller, context: &mut ProtocolContext) -> StsResult<()> {
        self.dispatch(Operation::Renew, caller, context, Self::provider_for_element)
    }

    /// Cancels the token in `context`.
    ///
    /// ## Errors
    ///
    /// As for [`CoreSts::renew_token`].
    pub fn cancel_token(&self, caller: &Caller, context: &mut ProtocolContext) -> StsResult<()> {
        self.dispatch(Operation::Cancel, caller, context, Self::provider_for_element)
    }

    /// Validates the token in `context`.
    ///
    /// ## Errors
    ///
    /// As for [`CoreSts::renew_token`]; validation failures carry
    /// [`sts_core::ValidationFailure`] through [`StsError::kind`].
    pub fn validate_token(&self, caller: &Caller, context: &mut ProtocolContext) -> StsResult<()> {
        self.dispatch(Operation::Validate, caller, context, Self::provider_for_element)
    }

    fn dispatch<F>(
        &self,
        operation: Operation,
        caller: &Caller,
        context: &mut ProtocolContext,
        resolve: F,
    ) -> StsResult<()>
    where
        F: FnOnce(&Self, &ProtocolContext) -> StsResult<Arc<dyn SecurityTokenProvider>>,
    {
        if let Err(err) = self.permissions.check(caller, STS_PERMISSION) {
            tracing::warn!(
                operation = operation.name(),
                caller = caller.display_name(),
                "STS call refused"
            );
            self.emit(TokenEventType::PermissionDenied, caller, context, None, Some(&err));
            return Err(err);
        }

        let (succeeded, failed) = operation.events();
        let provider = match resolve(self, &*context) {
            Ok(provider) => provider,
            Err(err) => {
                self.emit(failed, caller, context, None, Some(&err));
                return Err(err);
            }
        };
        tracing::debug!(
            operation = operation.name(),
            family = %context.family(),
            token_type = provider.token_type(),
            "selected token provider"
        );

        let result = match operation {
            Operation::Issue => provider.issue_token(context),
            Operation::Renew => provider.renew_token(context),
            Operation::Cancel => provider.cancel_token(context),
            Operation::Validate => provider.validate_token(context),
        };

        match &result {
            Ok(()) => self.emit(succeeded, caller, context, Some(provider.as_ref()), None),
            Err(err) => {
                tracing::info!(
                    operation = operation.name(),
                    token_id = context.token_id(),
                    error = %err,
                    "token operation failed"
                );
                self.emit(failed, caller, context, Some(provider.as_ref()), Some(err));
            }
        }
        result
    }

    fn provider_for_issue(
        &self,
        context: &ProtocolContext,
    ) -> StsResult<Arc<dyn SecurityTokenProvider>> {
        let by_service = context
            .service_name()
            .and_then(|service| self.configuration.provider_for_service(service));
        if let Some(provider) = by_service {
            return Ok(provider.clone());
        }

        let token_type = context.token_type().ok_or_else(|| {
            StsError::Configuration(
                "request names neither a known service nor a token type".to_string(),
            )
        })?;
        self.configuration
            .provider_for_token_type(token_type)
            .cloned()
            .ok_or_else(|| {
                StsError::Configuration(format!("no provider issues tokens of type {token_type}"))
            })
    }

    /// Looks the provider up by the element namespace it was configured
    /// under, then asks each provider of the family whether it supports the
    /// namespace.
    fn provider_for_element(
        &self,
        context: &ProtocolContext,
    ) -> StsResult<Arc<dyn SecurityTokenProvider>> {
        let qname = context.qname().ok_or_else(|| {
            StsError::Processing("request does not name a token element".to_string())
        })?;
        let family = context.family();
        self.configuration
            .provider_for_element(family, &qname.namespace)
            .or_else(|| {
                self.configuration.providers().iter().find(|provider| {
                    provider.family() == family && provider.supports(&qname.namespace)
                })
            })
            .cloned()
            .ok_or_else(|| {
                StsError::Configuration(format!("no {family} provider handles {qname}"))
            })
    }

    fn emit(
        &self,
        event_type: TokenEventType,
        caller: &Caller,
        context: &ProtocolContext,
        provider: Option<&dyn SecurityTokenProvider>,
        error: Option<&StsError>,
    ) {
        let mut builder = TokenEvent::builder(event_type)
            .at(self.clock.now())
            .principal(caller.display_name())
            .detail("family", context.family().as_str());
        if let Some(token_type) = provider
            .map(|provider| provider.token_type())
            .or_else(|| context.token_type())
        {
            builder = builder.token_type(token_type);
        }
        if let Some(token_id) = context.token_id() {
            builder = builder.token_id(token_id);
        }
        if let Some(issuer) = context.issuer() {
            builder = builder.issuer(issuer);
        }
        if let Some(err) = error {
            builder = builder.failure(err.to_string());
        }
        self.events.emit(&builder.build());
    }
}
