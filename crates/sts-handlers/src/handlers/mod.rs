//! Built-in handlers.

mod attribute;
mod authentication;
mod issuer_trust;
mod logout;
mod signature;

pub use attribute::{ATTRIBUTE_HANDLER, AttributeHandler, AttributeManager, AttributeOptions};
pub use authentication::{AUTHENTICATION_HANDLER, AuthenticationHandler, AuthenticationOptions};
pub use issuer_trust::{ISSUER_TRUST_HANDLER, IssuerTrustHandler};
pub use logout::{LOGOUT_HANDLER, LogoutHandler};
pub use signature::{MessageSigner, SIGNATURE_GENERATION_HANDLER, SignatureGenerationHandler};

use std::collections::HashMap;

use sts_protocol_saml::{SamlError, SamlResult};

/// Handler option keys.
pub mod keys {
    /// Role of the handler, `IDP` or `SP`.
    pub const ROLE: &str = "ROLE";
    /// Where the IDP should deliver its response.
    pub const ASSERTION_CONSUMER_URL: &str = "ASSERTION_CONSUMER_URL";
    /// `NameIDPolicy` format requested by the SP.
    pub const NAMEID_FORMAT: &str = "NAMEID_FORMAT";
    /// Comma-separated attribute names that carry roles.
    pub const ROLE_KEY: &str = "ROLE_KEY";
    /// Ignore roles in received assertions.
    pub const DISABLE_ROLE_PICKING: &str = "DISABLE_ROLE_PICKING";
    /// Leave the authentication statement out of issued assertions.
    pub const DISABLE_AUTHN_STATEMENT: &str = "DISABLE_AUTHN_STATEMENT";
    /// Leave the role attribute out of issued assertions.
    pub const DISABLE_SENDING_ROLES: &str = "DISABLE_SENDING_ROLES";
    /// Comma-separated roles of which the principal needs at least one.
    pub const REQUIRED_ROLES: &str = "REQUIRED_ROLES";
    /// Clock skew for received assertions, overriding the chain's.
    pub const CLOCK_SKEW_MILIS: &str = "CLOCK_SKEW_MILIS";
    /// Comma-separated attribute names to release or collect.
    pub const ATTRIBUTE_KEYS: &str = "ATTRIBUTE_KEYS";
    /// Key collected attributes by friendly name when present.
    pub const ATTRIBUTE_CHOOSE_FRIENDLY_NAME: &str = "ATTRIBUTE_CHOOSE_FRIENDLY_NAME";
}

/// Fails on option keys outside `known`.
pub(crate) fn reject_unknown(
    handler: &str,
    options: &HashMap<String, String>,
    known: &[&str],
) -> SamlResult<()> {
    let mut unknown: Vec<&str> = options
        .keys()
        .map(String::as_str)
        .filter(|key| *key != keys::ROLE && !known.contains(key))
        .collect();
    if unknown.is_empty() {
        return Ok(());
    }
    unknown.sort_unstable();
    Err(SamlError::Configuration(format!(
        "unknown option(s) for handler {handler}: {}",
        unknown.join(", ")
    )))
}

pub(crate) fn flag(options: &HashMap<String, String>, key: &str) -> SamlResult<bool> {
    match options.get(key).map(|value| value.trim()) {
        None => Ok(false),
        Some(value) if value.eq_ignore_ascii_case("true") => Ok(true),
        Some(value) if value.eq_ignore_ascii_case("false") => Ok(false),
        Some(value) => Err(SamlError::Configuration(format!(
            "{key} must be true or false, got {value:?}"
        ))),
    }
}

pub(crate) fn list(options: &HashMap<String, String>, key: &str) -> Vec<String> {
    options
        .get(key)
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
