//! Domain-based trust in message issuers.

use sts_protocol_saml::{SamlError, SamlResult};
use url::Url;

use crate::handler::{ChainConfig, HandlerOutcome, HandlerRole, SamlHandler};
use crate::request::{HandlerRequest, HandlerResponse};

/// Factory name of [`IssuerTrustHandler`].
pub const ISSUER_TRUST_HANDLER: &str = "issuer-trust";

/// Rejects messages whose issuer is outside the chain's trusted domains.
///
/// An issuer is trusted when its host equals a trusted domain or is a
/// subdomain of one. Issuers that are not URLs are compared as host names.
#[derive(Debug)]
pub struct IssuerTrustHandler {
    role: HandlerRole,
    trusted_domains: Vec<String>,
}

impl IssuerTrustHandler {
    /// Creates a handler for `role`. Domains arrive through
    /// [`SamlHandler::initialize`].
    #[must_use]
    pub const fn new(role: HandlerRole) -> Self {
        Self {
            role,
            trusted_domains: Vec::new(),
        }
    }

    /// Checks `issuer` against the trusted domains.
    ///
    /// ## Errors
    ///
    /// Returns [`SamlError::UntrustedIssuer`] if no domain matches.
    pub fn check(&self, issuer: &str) -> SamlResult<()> {
        let host = issuer_host(issuer);
        let trusted = self.trusted_domains.iter().any(|domain| {
            host == *domain
                || host
                    .strip_suffix(domain.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        });
        if trusted {
            tracing::debug!(issuer, host = %host, "issuer trusted");
            Ok(())
        } else {
            tracing::warn!(issuer, host = %host, trusted = ?self.trusted_domains, "issuer not trusted");
            Err(SamlError::UntrustedIssuer(issuer.to_string()))
        }
    }

    fn check_message(&self, request: &HandlerRequest) -> SamlResult<HandlerOutcome> {
        let Some(message) = &request.message else {
            return Ok(HandlerOutcome::Continue);
        };
        let issuer = message.issuer().ok_or_else(|| {
            SamlError::MissingElement(format!("Issuer in {}", message.kind()))
        })?;
        self.check(&issuer.value)?;
        Ok(HandlerOutcome::Continue)
    }
}

fn issuer_host(issuer: &str) -> String {
    Url::parse(issuer)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .unwrap_or_else(|| issuer.trim().to_string())
        .to_ascii_lowercase()
}

impl SamlHandler for IssuerTrustHandler {
    fn name(&self) -> &str {
        ISSUER_TRUST_HANDLER
    }

    fn role(&self) -> HandlerRole {
        self.role
    }

    fn initialize(&mut self, config: &ChainConfig) -> SamlResult<()> {
        self.trusted_domains = config
            .trusted_domains
            .iter()
            .map(|domain| domain.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|domain| !domain.is_empty())
            .collect();
        if self.trusted_domains.is_empty() {
            return Err(SamlError::Configuration(
                "issuer trust handler needs at least one trusted domain".to_string(),
            ));
        }
        Ok(())
    }

    fn handle_request_type(
        &mut self,
        request: &mut HandlerRequest,
        _response: &mut HandlerResponse,
    ) -> SamlResult<HandlerOutcome> {
        self.check_message(request)
    }

    fn handle_status_response_type(
        &mut self,
        request: &mut HandlerRequest,
        _response: &mut HandlerResponse,
    ) -> SamlResult<HandlerOutcome> {
        self.check_message(request)
    }
}
