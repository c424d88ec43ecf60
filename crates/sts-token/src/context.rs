//! Per-request protocol contexts handed to token providers.
//!
//! A [`ProtocolContext`] is created for one request, passed to the provider
//! that handles its token family, and dropped once the response is built.
//! Providers read the requested issuer, subject and statements from it and
//! write the issued token back into it.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sts_core::{StsError, StsResult};
use sts_protocol_saml::constants::{ASSERTION, SAML_NS, SAML11_NS, SAML11_PASSWORD_AUTHN};
use sts_protocol_saml::{
    Assertion, Conditions, NameId, Saml11Assertion, Saml11Conditions, Saml11Statement,
    Saml11Subject, Statement, Subject,
};

/// Token families a provider can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenFamily {
    /// SAML 2.0 assertions.
    #[serde(rename = "SAML2")]
    Saml2,
    /// SAML 1.1 assertions.
    #[serde(rename = "SAML11")]
    Saml11,
    /// WS-Trust security tokens.
    #[serde(rename = "WS_TRUST")]
    WsTrust,
    /// OAuth tokens.
    #[serde(rename = "OAUTH")]
    OAuth,
    /// Anything else.
    #[serde(rename = "CUSTOM")]
    Custom,
}

impl TokenFamily {
    /// Every family.
    pub const ALL: [Self; 5] = [
        Self::Saml2,
        Self::Saml11,
        Self::WsTrust,
        Self::OAuth,
        Self::Custom,
    ];

    /// Configuration name of the family.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Saml2 => "SAML2",
            Self::Saml11 => "SAML11",
            Self::WsTrust => "WS_TRUST",
            Self::OAuth => "OAUTH",
            Self::Custom => "CUSTOM",
        }
    }
}

impl fmt::Display for TokenFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenFamily {
    type Err = StsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|family| family.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| StsError::Configuration(format!("unknown token family {s:?}")))
    }
}

/// A namespace-qualified element name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QName {
    /// Namespace URI.
    pub namespace: String,
    /// Local part.
    pub local_part: String,
}

impl QName {
    /// Creates a qualified name.
    #[must_use]
    pub fn new(namespace: impl Into<String>, local_part: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            local_part: local_part.into(),
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}{}", self.namespace, self.local_part)
    }
}

/// Request state for SAML 2.0 assertions.
#[derive(Debug, Clone, Default)]
pub struct SamlProtocolContext {
    /// Service the token is for, if the request names one.
    pub service_name: Option<String>,
    /// Issuer of the assertion to create.
    pub issuer_id: Option<NameId>,
    /// Subject of the assertion to create.
    pub subject: Option<Subject>,
    /// Requested conditions; audience restrictions survive issuance.
    pub conditions: Option<Conditions>,
    /// Statements to include.
    pub statements: Vec<Statement>,
    /// The issued assertion, or the assertion to renew, cancel or validate.
    pub issued_assertion: Option<Assertion>,
}

impl SamlProtocolContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A context carrying an existing assertion.
    #[must_use]
    pub fn for_assertion(assertion: Assertion) -> Self {
        Self {
            issued_assertion: Some(assertion),
            ..Self::default()
        }
    }

    /// Sets the issuer.
    #[must_use]
    pub fn with_issuer(mut self, issuer: NameId) -> Self {
        self.issuer_id = Some(issuer);
        self
    }

    /// Sets the subject.
    #[must_use]
    pub fn with_subject(mut self, subject: Subject) -> Self {
        self.subject = Some(subject);
        self
    }

    /// Sets the requested conditions.
    #[must_use]
    pub fn with_conditions(mut self, conditions: Conditions) -> Self {
        self.conditions = Some(conditions);
        self
    }

    /// Adds a statement.
    #[must_use]
    pub fn with_statement(mut self, statement: Statement) -> Self {
        self.statements.push(statement);
        self
    }

    /// Names the service the token is for.
    #[must_use]
    pub fn with_service_name(mut self, service: impl Into<String>) -> Self {
        self.service_name = Some(service.into());
        self
    }
}

/// Request state for SAML 1.1 assertions.
#[derive(Debug, Clone)]
pub struct Saml11ProtocolContext {
    /// Service the token is for.
    pub service_name: Option<String>,
    /// Issuer of the assertion to create.
    pub issuer_id: Option<String>,
    /// Subject of the authentication statement.
    pub subject: Option<Saml11Subject>,
    /// Authentication method URI of the authentication statement.
    pub auth_method: String,
    /// Requested conditions; audiences survive issuance.
    pub conditions: Option<Saml11Conditions>,
    /// Additional statements to include.
    pub statements: Vec<Saml11Statement>,
    /// The issued assertion, or the assertion to renew, cancel or validate.
    pub issued_assertion: Option<Saml11Assertion>,
}

impl Default for Saml11ProtocolContext {
    fn default() -> Self {
        Self {
            service_name: None,
            issuer_id: None,
            subject: None,
            auth_method: SAML11_PASSWORD_AUTHN.to_string(),
            conditions: None,
            statements: Vec::new(),
            issued_assertion: None,
        }
    }
}

impl Saml11ProtocolContext {
    /// Creates an empty context using password authentication.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A context carrying an existing assertion.
    #[must_use]
    pub fn for_assertion(assertion: Saml11Assertion) -> Self {
        Self {
            issued_assertion: Some(assertion),
            ..Self::default()
        }
    }

    /// Sets the issuer.
    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer_id = Some(issuer.into());
        self
    }

    /// Sets the subject.
    #[must_use]
    pub fn with_subject(mut self, subject: Saml11Subject) -> Self {
        self.subject = Some(subject);
        self
    }

    /// Sets the authentication method.
    #[must_use]
    pub fn with_auth_method(mut self, method: impl Into<String>) -> Self {
        self.auth_method = method.into();
        self
    }

    /// Adds a statement.
    #[must_use]
    pub fn with_statement(mut self, statement: Saml11Statement) -> Self {
        self.statements.push(statement);
        self
    }
}

/// Request state for a WS-Trust `RequestSecurityToken`.
#[derive(Debug, Clone, Default)]
pub struct WsTrustContext {
    /// Requested token type URI.
    pub token_type: Option<String>,
    /// `AppliesTo` endpoint.
    pub applies_to: Option<String>,
    /// Element name of the token being renewed, cancelled or validated.
    pub qname: Option<QName>,
    /// Principal that sent the request.
    pub caller: Option<String>,
    /// Principal the token is requested on behalf of.
    pub on_behalf_of: Option<String>,
    /// Issuer name for the token.
    pub token_issuer: Option<String>,
    /// Attributes claimed for the token.
    pub claimed_attributes: HashMap<String, Vec<String>>,
    /// The issued or presented token.
    pub security_token: Option<String>,
    /// Validation status URI set by the provider.
    pub status: Option<String>,
}

impl WsTrustContext {
    /// A request for a token of `token_type`.
    #[must_use]
    pub fn new(token_type: impl Into<String>) -> Self {
        Self {
            token_type: Some(token_type.into()),
            ..Self::default()
        }
    }

    /// A request carrying a previously issued token whose element is `qname`.
    #[must_use]
    pub fn for_token(qname: QName, token: impl Into<String>) -> Self {
        Self {
            qname: Some(qname),
            security_token: Some(token.into()),
            ..Self::default()
        }
    }

    /// Sets the `AppliesTo` endpoint.
    #[must_use]
    pub fn with_applies_to(mut self, endpoint: impl Into<String>) -> Self {
        self.applies_to = Some(endpoint.into());
        self
    }

    /// Sets the calling principal.
    #[must_use]
    pub fn with_caller(mut self, caller: impl Into<String>) -> Self {
        self.caller = Some(caller.into());
        self
    }

    /// Requests the token on behalf of `principal`.
    #[must_use]
    pub fn with_on_behalf_of(mut self, principal: impl Into<String>) -> Self {
        self.on_behalf_of = Some(principal.into());
        self
    }

    /// Sets the token issuer.
    #[must_use]
    pub fn with_token_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.token_issuer = Some(issuer.into());
        self
    }

    /// Claims an attribute value; repeated names accumulate values.
    #[must_use]
    pub fn with_claim(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.claimed_attributes
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }
}

/// Request state for OAuth tokens.
#[derive(Debug, Clone, Default)]
pub struct OAuthContext {
    /// Requested token type.
    pub token_type: Option<String>,
    /// Client the token is for.
    pub client_id: Option<String>,
    /// Element name of a presented token.
    pub qname: Option<QName>,
    /// Requested scopes.
    pub scopes: Vec<String>,
    /// The issued or presented token.
    pub token: Option<String>,
}

/// Request state for a deployment-specific token family.
#[derive(Debug, Clone, Default)]
pub struct CustomContext {
    /// Service the token is for.
    pub service_name: Option<String>,
    /// Requested token type.
    pub token_type: Option<String>,
    /// Element name of a presented token.
    pub qname: Option<QName>,
    /// Free-form request values.
    pub values: HashMap<String, String>,
    /// The issued or presented token.
    pub token: Option<String>,
}

/// Per-request state for one token family.
#[derive(Debug, Clone)]
pub enum ProtocolContext {
    /// SAML 2.0.
    Saml2(SamlProtocolContext),
    /// SAML 1.1.
    Saml11(Saml11ProtocolContext),
    /// WS-Trust.
    WsTrust(WsTrustContext),
    /// OAuth.
    OAuth(OAuthContext),
    /// Deployment-specific.
    Custom(CustomContext),
}

impl ProtocolContext {
    /// The token family this context belongs to.
    #[must_use]
    pub const fn family(&self) -> TokenFamily {
        match self {
            Self::Saml2(_) => TokenFamily::Saml2,
            Self::Saml11(_) => TokenFamily::Saml11,
            Self::WsTrust(_) => TokenFamily::WsTrust,
            Self::OAuth(_) => TokenFamily::OAuth,
            Self::Custom(_) => TokenFamily::Custom,
        }
    }

    /// The service the token is for, used first when picking a provider.
    #[must_use]
    pub fn service_name(&self) -> Option<&str> {
        match self {
            Self::Saml2(context) => context.service_name.as_deref(),
            Self::Saml11(context) => context.service_name.as_deref(),
            Self::WsTrust(context) => context.applies_to.as_deref(),
            Self::OAuth(context) => context.client_id.as_deref(),
            Self::Custom(context) => context.service_name.as_deref(),
        }
    }

    /// The requested token type.
    #[must_use]
    pub fn token_type(&self) -> Option<&str> {
        match self {
            Self::Saml2(_) => Some(SAML_NS),
            Self::Saml11(_) => Some(SAML11_NS),
            Self::WsTrust(context) => context.token_type.as_deref(),
            Self::OAuth(context) => context.token_type.as_deref(),
            Self::Custom(context) => context.token_type.as_deref(),
        }
    }

    /// Element name of the token the request refers to.
    #[must_use]
    pub fn qname(&self) -> Option<QName> {
        match self {
            Self::Saml2(_) => Some(QName::new(SAML_NS, ASSERTION)),
            Self::Saml11(_) => Some(QName::new(SAML11_NS, ASSERTION)),
            Self::WsTrust(context) => context.qname.clone(),
            Self::OAuth(context) => context.qname.clone(),
            Self::Custom(context) => context.qname.clone(),
        }
    }

    /// ID of the token carried by the context.
    #[must_use]
    pub fn token_id(&self) -> Option<&str> {
        match self {
            Self::Saml2(context) => context.issued_assertion.as_ref().map(|a| a.id.as_str()),
            Self::Saml11(context) => context.issued_assertion.as_ref().map(|a| a.id.as_str()),
            Self::WsTrust(_) | Self::OAuth(_) | Self::Custom(_) => None,
        }
    }

    /// Issuer named by the context.
    #[must_use]
    pub fn issuer(&self) -> Option<&str> {
        match self {
            Self::Saml2(context) => context.issuer_id.as_ref().map(|issuer| issuer.value.as_str()),
            Self::Saml11(context) => context.issuer_id.as_deref(),
            Self::WsTrust(context) => context.token_issuer.as_deref(),
            Self::OAuth(_) | Self::Custom(_) => None,
        }
    }

    /// The SAML 2.0 state.
    ///
    /// ## Errors
    ///
    /// Returns a configuration error for any other family.
    pub fn as_saml2_mut(&mut self) -> StsResult<&mut SamlProtocolContext> {
        match self {
            Self::Saml2(context) => Ok(context),
            other => Err(wrong_family(TokenFamily::Saml2, other.family())),
        }
    }

    /// The SAML 1.1 state.
    ///
    /// ## Errors
    ///
    /// Returns a configuration error for any other family.
    pub fn as_saml11_mut(&mut self) -> StsResult<&mut Saml11ProtocolContext> {
        match self {
            Self::Saml11(context) => Ok(context),
            other => Err(wrong_family(TokenFamily::Saml11, other.family())),
        }
    }

    /// The WS-Trust state.
    ///
    /// ## Errors
    ///
    /// Returns a configuration error for any other family.
    pub fn as_ws_trust_mut(&mut self) -> StsResult<&mut WsTrustContext> {
        match self {
            Self::WsTrust(context) => Ok(context),
            other => Err(wrong_family(TokenFamily::WsTrust, other.family())),
        }
    }

    /// The issued SAML 2.0 assertion, if any.
    #[must_use]
    pub fn saml2_assertion(&self) -> Option<&Assertion> {
        match self {
            Self::Saml2(context) => context.issued_assertion.as_ref(),
            _ => None,
        }
    }

    /// The issued SAML 1.1 assertion, if any.
    #[must_use]
    pub fn saml11_assertion(&self) -> Option<&Saml11Assertion> {
        match self {
            Self::Saml11(context) => context.issued_assertion.as_ref(),
            _ => None,
        }
    }
}

impl From<SamlProtocolContext> for ProtocolContext {
    fn from(context: SamlProtocolContext) -> Self {
        Self::Saml2(context)
    }
}

impl From<Saml11ProtocolContext> for ProtocolContext {
    fn from(context: Saml11ProtocolContext) -> Self {
        Self::Saml11(context)
    }
}

impl From<WsTrustContext> for ProtocolContext {
    fn from(context: WsTrustContext) -> Self {
        Self::WsTrust(context)
    }
}

impl From<OAuthContext> for ProtocolContext {
    fn from(context: OAuthContext) -> Self {
        Self::OAuth(context)
    }
}

impl From<CustomContext> for ProtocolContext {
    fn from(context: CustomContext) -> Self {
        Self::Custom(context)
    }
}

fn wrong_family(expected: TokenFamily, actual: TokenFamily) -> StsError {
    StsError::Configuration(format!(
        "provider for {expected} tokens was handed a {actual} context"
    ))
}
