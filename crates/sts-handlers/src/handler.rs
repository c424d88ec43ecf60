//! The handler contract.

use std::fmt::{self, Debug};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sts_protocol_saml::{SamlError, SamlResult};

use crate::request::{HandlerRequest, HandlerResponse};

/// Side of the SSO exchange a handler runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandlerRole {
    /// Identity provider.
    #[serde(rename = "IDP")]
    Idp,
    /// Service provider.
    #[serde(rename = "SP")]
    Sp,
}

impl HandlerRole {
    /// Configuration name of the role.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idp => "IDP",
            Self::Sp => "SP",
        }
    }
}

impl fmt::Display for HandlerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HandlerRole {
    type Err = SamlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "IDP" => Ok(Self::Idp),
            "SP" => Ok(Self::Sp),
            _ => Err(SamlError::Configuration(format!("unknown handler role: {s}"))),
        }
    }
}

/// What the chain does after a handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// Run the next handler.
    Continue,
    /// The response is complete; skip the remaining handlers.
    Stop,
}

impl HandlerOutcome {
    /// Returns true for [`HandlerOutcome::Stop`].
    #[must_use]
    pub const fn is_stop(&self) -> bool {
        matches!(self, Self::Stop)
    }
}

/// Largest clock skew a chain or handler accepts, one day.
pub const MAX_CLOCK_SKEW_MS: i64 = 86_400_000;

/// Checks that `millis` is a usable clock skew.
///
/// ## Errors
///
/// Returns [`SamlError::Configuration`] for a negative value or one above
/// [`MAX_CLOCK_SKEW_MS`].
pub fn check_clock_skew(setting: &str, millis: i64) -> SamlResult<i64> {
    if (0..=MAX_CLOCK_SKEW_MS).contains(&millis) {
        Ok(millis)
    } else {
        Err(SamlError::Configuration(format!(
            "{setting} must be between 0 and {MAX_CLOCK_SKEW_MS} ms, got {millis}"
        )))
    }
}

/// Settings shared by every handler of one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Role every handler of the chain must have.
    pub role: HandlerRole,
    /// Domains whose issuers are trusted.
    #[serde(default)]
    pub trusted_domains: Vec<String>,
    /// Tolerance applied when checking received assertions.
    #[serde(default)]
    pub clock_skew_ms: i64,
}

impl ChainConfig {
    /// Creates a config for `role` with no trusted domains and no skew.
    #[must_use]
    pub const fn new(role: HandlerRole) -> Self {
        Self {
            role,
            trusted_domains: Vec::new(),
            clock_skew_ms: 0,
        }
    }

    /// Trusts issuers in `domain` and its subdomains.
    #[must_use]
    pub fn trust_domain(mut self, domain: impl Into<String>) -> Self {
        self.trusted_domains.push(domain.into());
        self
    }

    /// Sets the clock skew.
    #[must_use]
    pub const fn with_clock_skew_ms(mut self, millis: i64) -> Self {
        self.clock_skew_ms = millis;
        self
    }

    /// Checks values serde cannot.
    ///
    /// ## Errors
    ///
    /// Returns [`SamlError::Configuration`] for an out-of-range clock skew.
    pub fn validate(&self) -> SamlResult<()> {
        check_clock_skew("clock_skew_ms", self.clock_skew_ms).map(|_| ())
    }
}

/// One step of a SAML2 handler chain.
///
/// Every processing method reads the shared [`HandlerRequest`], may update the
/// shared [`HandlerResponse`], and tells the chain whether to carry on.
/// Handlers ignore messages they are not interested in by returning
/// [`HandlerOutcome::Continue`] untouched.
pub trait SamlHandler: Send + Sync + Debug {
    /// Name used in logs and configuration.
    fn name(&self) -> &str;

    /// Side the handler runs on.
    fn role(&self) -> HandlerRole;

    /// Receives the chain settings once, before any message is processed.
    ///
    /// ## Errors
    ///
    /// Returns a configuration error if the settings are unusable.
    fn initialize(&mut self, _config: &ChainConfig) -> SamlResult<()> {
        Ok(())
    }

    /// Builds an outbound request.
    ///
    /// ## Errors
    ///
    /// Returns an error if the request cannot be built.
    fn generate_saml_request(
        &mut self,
        _request: &mut HandlerRequest,
        _response: &mut HandlerResponse,
    ) -> SamlResult<HandlerOutcome> {
        Ok(HandlerOutcome::Continue)
    }

    /// Processes an inbound request message.
    ///
    /// ## Errors
    ///
    /// Returns an error if the message must be rejected.
    fn handle_request_type(
        &mut self,
        _request: &mut HandlerRequest,
        _response: &mut HandlerResponse,
    ) -> SamlResult<HandlerOutcome> {
        Ok(HandlerOutcome::Continue)
    }

    /// Processes an inbound status response message.
    ///
    /// ## Errors
    ///
    /// Returns an error if the message must be rejected.
    fn handle_status_response_type(
        &mut self,
        _request: &mut HandlerRequest,
        _response: &mut HandlerResponse,
    ) -> SamlResult<HandlerOutcome> {
        Ok(HandlerOutcome::Continue)
    }

    /// Clears state accumulated while processing a message.
    fn reset(&mut self) {}
}
