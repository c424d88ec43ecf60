//! SAML 2.0 assertions.

use chrono::{DateTime, Utc};
use sts_core::time::{add, format_xml_datetime, subtract};
use sts_core::{StsError, StsResult, XmlDateTime, is_valid};

use super::{
    NameId, append_others, declare, expect_root, format_instant, instant_attr, other_attributes,
    other_children, required_instant,
};
use crate::constants::{ROLE_ATTRIBUTE, SAML_NS, XMLDSIG_NS};
use crate::error::{SamlError, SamlResult};
use crate::xml::XmlElement;

/// A SAML 2.0 assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assertion {
    /// Unique identifier, never reassigned after issuance.
    pub id: String,
    /// SAML version, `2.0`.
    pub version: String,
    /// When the assertion was (last) issued.
    pub issue_instant: XmlDateTime,
    /// The issuing entity.
    pub issuer: NameId,
    /// Who the assertion is about.
    pub subject: Option<Subject>,
    /// Validity window and audience restrictions.
    pub conditions: Option<Conditions>,
    /// Authentication, attribute and authorization statements.
    pub statements: Vec<Statement>,
    /// Attributes of the `Assertion` element not modelled above.
    pub other_attributes: Vec<(String, String)>,
    /// Child elements not modelled above, such as `ds:Signature` or `saml:Advice`.
    pub extensions: Vec<XmlElement>,
}

impl Assertion {
    /// Creates an assertion with no subject, conditions or statements.
    #[must_use]
    pub fn new(id: impl Into<String>, issuer: NameId, issue_instant: XmlDateTime) -> Self {
        Self {
            id: id.into(),
            version: "2.0".to_string(),
            issue_instant,
            issuer,
            subject: None,
            conditions: None,
            statements: Vec::new(),
            other_attributes: Vec::new(),
            extensions: Vec::new(),
        }
    }

    /// Sets the subject.
    #[must_use]
    pub fn with_subject(mut self, subject: Subject) -> Self {
        self.subject = Some(subject);
        self
    }

    /// Sets the conditions.
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

    /// Moves the issue instant. Conditions are left alone.
    pub fn update_issue_instant(&mut self, instant: XmlDateTime) {
        self.issue_instant = instant;
    }

    /// Recomputes the conditions window from the issue instant:
    /// `[issue - skew, issue + validity + skew)`.
    ///
    /// Audience and other restrictions already present are kept.
    ///
    /// ## Errors
    ///
    /// Returns a processing error if the window is not representable.
    pub fn create_timed_conditions(
        &mut self,
        validity_ms: i64,
        clock_skew_ms: i64,
    ) -> StsResult<()> {
        let upper = validity_ms.checked_add(clock_skew_ms).ok_or_else(|| {
            StsError::Processing(format!(
                "validity {validity_ms}ms plus skew {clock_skew_ms}ms overflows"
            ))
        })?;
        let not_before = subtract(&self.issue_instant, clock_skew_ms)?;
        let not_on_or_after = add(&self.issue_instant, upper)?;

        let conditions = self.conditions.get_or_insert_with(Conditions::default);
        conditions.not_before = Some(not_before);
        conditions.not_on_or_after = Some(not_on_or_after);
        Ok(())
    }

    /// Returns true if `now` falls inside the conditions window.
    ///
    /// An assertion without conditions, or a missing bound, is unrestricted on that side.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.conditions
            .as_ref()
            .is_none_or(|conditions| conditions.is_valid_at(now))
    }

    /// Returns true if `now` falls outside the conditions window.
    #[must_use]
    pub fn has_expired(&self, now: DateTime<Utc>) -> bool {
        !self.is_valid_at(now)
    }

    /// The subject's name identifier value.
    #[must_use]
    pub fn subject_name(&self) -> Option<&str> {
        self.subject
            .as_ref()
            .and_then(|subject| subject.name_id.as_ref())
            .map(|name_id| name_id.value.as_str())
    }

    /// Every audience named in the audience restrictions.
    pub fn audiences(&self) -> impl Iterator<Item = &str> {
        self.conditions
            .iter()
            .flat_map(|conditions| conditions.audience_restrictions.iter())
            .flat_map(|restriction| restriction.audiences.iter())
            .map(String::as_str)
    }

    /// The first authentication statement.
    #[must_use]
    pub fn authn_statement(&self) -> Option<&AuthnStatement> {
        self.statements.iter().find_map(|statement| match statement {
            Statement::Authn(authn) => Some(authn),
            _ => None,
        })
    }

    /// Every attribute across all attribute statements.
    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.statements
            .iter()
            .filter_map(|statement| match statement {
                Statement::Attribute(attributes) => Some(attributes),
                _ => None,
            })
            .flat_map(|statement| statement.attributes.iter())
    }

    /// Values of the role attribute.
    #[must_use]
    pub fn roles(&self) -> Vec<String> {
        self.attributes()
            .filter(|attribute| attribute.name == ROLE_ATTRIBUTE)
            .flat_map(|attribute| attribute.values.iter().cloned())
            .collect()
    }

    /// Builds the `saml:Assertion` element.
    #[must_use]
    pub fn to_element(&self) -> XmlElement {
        let mut element = XmlElement::qualified("saml", "Assertion", SAML_NS);
        declare(&mut element, "saml", SAML_NS);
        element.set_attr("ID", self.id.clone());
        element.set_attr("Version", self.version.clone());
        element.set_attr("IssueInstant", format_xml_datetime(&self.issue_instant));
        append_others(&mut element, &self.other_attributes);

        element.push(self.issuer.to_element("Issuer"));
        let (signatures, others): (Vec<&XmlElement>, Vec<&XmlElement>) = self
            .extensions
            .iter()
            .partition(|extension| extension.is(XMLDSIG_NS, "Signature"));
        for signature in signatures {
            element.push(signature.clone());
        }
        if let Some(subject) = &self.subject {
            element.push(subject.to_element());
        }
        if let Some(conditions) = &self.conditions {
            element.push(conditions.to_element());
        }
        for other in others {
            element.push(other.clone());
        }
        for statement in &self.statements {
            element.push(statement.to_element());
        }
        element
    }

    /// Reads a `saml:Assertion` element.
    ///
    /// ## Errors
    ///
    /// Returns an error if required parts are missing or malformed.
    pub fn from_element(element: &XmlElement) -> SamlResult<Self> {
        expect_root(element, SAML_NS, "Assertion")?;
        let issuer = element
            .child(SAML_NS, "Issuer")
            .map(NameId::from_element)
            .ok_or_else(|| SamlError::MissingElement("saml:Issuer".to_string()))?;

        let mut assertion = Self {
            id: element.required_attr("ID")?.to_string(),
            version: element.attr("Version").unwrap_or("2.0").to_string(),
            issue_instant: required_instant(element, "IssueInstant")?,
            issuer,
            subject: None,
            conditions: None,
            statements: Vec::new(),
            other_attributes: other_attributes(element, &["ID", "Version", "IssueInstant"]),
            extensions: Vec::new(),
        };

        for child in element.elements() {
            if child.namespace.as_deref() != Some(SAML_NS) {
                assertion.extensions.push(child.clone());
                continue;
            }
            match child.local_name() {
                "Issuer" => {}
                "Subject" => assertion.subject = Some(Subject::from_element(child)?),
                "Conditions" => assertion.conditions = Some(Conditions::from_element(child)?),
                "AuthnStatement" | "AttributeStatement" | "AuthzDecisionStatement"
                | "Statement" => assertion.statements.push(Statement::from_element(child)?),
                _ => assertion.extensions.push(child.clone()),
            }
        }
        Ok(assertion)
    }

    /// Serialises the assertion.
    #[must_use]
    pub fn to_xml(&self) -> String {
        self.to_element().to_xml()
    }

    /// Parses an assertion document.
    ///
    /// ## Errors
    ///
    /// Returns an error for malformed XML or a non-assertion root.
    pub fn from_xml(xml: &str) -> SamlResult<Self> {
        Self::from_element(&XmlElement::parse(xml)?)
    }
}

/// The subject of an assertion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subject {
    /// Name identifier.
    pub name_id: Option<NameId>,
    /// How the relying party may confirm the subject.
    pub confirmations: Vec<SubjectConfirmation>,
    /// Unmodelled attributes.
    pub other_attributes: Vec<(String, String)>,
    /// Unmodelled children, such as `saml:EncryptedID`.
    pub extensions: Vec<XmlElement>,
}

impl Subject {
    /// Creates a subject identified by `name_id`.
    #[must_use]
    pub fn new(name_id: NameId) -> Self {
        Self {
            name_id: Some(name_id),
            ..Self::default()
        }
    }

    /// Adds a confirmation.
    #[must_use]
    pub fn with_confirmation(mut self, confirmation: SubjectConfirmation) -> Self {
        self.confirmations.push(confirmation);
        self
    }

    fn to_element(&self) -> XmlElement {
        let mut element = XmlElement::qualified("saml", "Subject", SAML_NS);
        append_others(&mut element, &self.other_attributes);
        if let Some(name_id) = &self.name_id {
            element.push(name_id.to_element("NameID"));
        }
        for extension in &self.extensions {
            element.push(extension.clone());
        }
        for confirmation in &self.confirmations {
            element.push(confirmation.to_element());
        }
        element
    }

    fn from_element(element: &XmlElement) -> SamlResult<Self> {
        Ok(Self {
            name_id: element.child(SAML_NS, "NameID").map(NameId::from_element),
            confirmations: element
                .children_named(SAML_NS, "SubjectConfirmation")
                .map(SubjectConfirmation::from_element)
                .collect::<SamlResult<_>>()?,
            other_attributes: other_attributes(element, &[]),
            extensions: other_children(element, SAML_NS, &["NameID", "SubjectConfirmation"]),
        })
    }
}

/// Subject confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectConfirmation {
    /// Confirmation method URI.
    pub method: String,
    /// Constraints on the confirmation.
    pub data: Option<SubjectConfirmationData>,
    /// Unmodelled attributes.
    pub other_attributes: Vec<(String, String)>,
    /// Unmodelled children, such as a `saml:NameID` of the confirming entity.
    pub extensions: Vec<XmlElement>,
}

impl SubjectConfirmation {
    /// Creates a confirmation using `method`.
    #[must_use]
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            data: None,
            other_attributes: Vec::new(),
            extensions: Vec::new(),
        }
    }

    /// Sets the confirmation data.
    #[must_use]
    pub fn with_data(mut self, data: SubjectConfirmationData) -> Self {
        self.data = Some(data);
        self
    }

    fn to_element(&self) -> XmlElement {
        let mut element = XmlElement::qualified("saml", "SubjectConfirmation", SAML_NS)
            .with_attr("Method", self.method.clone());
        append_others(&mut element, &self.other_attributes);
        for extension in &self.extensions {
            element.push(extension.clone());
        }
        if let Some(data) = &self.data {
            element.push(data.to_element());
        }
        element
    }

    fn from_element(element: &XmlElement) -> SamlResult<Self> {
        Ok(Self {
            method: element.required_attr("Method")?.to_string(),
            data: element
                .child(SAML_NS, "SubjectConfirmationData")
                .map(SubjectConfirmationData::from_element)
                .transpose()?,
            other_attributes: other_attributes(element, &["Method"]),
            extensions: other_children(element, SAML_NS, &["SubjectConfirmationData"]),
        })
    }
}

/// Constraints on a subject confirmation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectConfirmationData {
    /// Not valid before.
    pub not_before: Option<XmlDateTime>,
    /// Not valid on or after.
    pub not_on_or_after: Option<XmlDateTime>,
    /// Where the assertion may be delivered.
    pub recipient: Option<String>,
    /// ID of the request this answers.
    pub in_response_to: Option<String>,
    /// Unmodelled attributes, `Address` among them.
    pub other_attributes: Vec<(String, String)>,
    /// Child content, such as `ds:KeyInfo` for holder-of-key.
    pub extensions: Vec<XmlElement>,
}

impl SubjectConfirmationData {
    const KNOWN: [&'static str; 4] = ["NotBefore", "NotOnOrAfter", "Recipient", "InResponseTo"];

    fn to_element(&self) -> XmlElement {
        let mut element = XmlElement::qualified("saml", "SubjectConfirmationData", SAML_NS)
            .with_opt_attr("NotBefore", format_instant(self.not_before.as_ref()))
            .with_opt_attr("NotOnOrAfter", format_instant(self.not_on_or_after.as_ref()))
            .with_opt_attr("Recipient", self.recipient.as_deref())
            .with_opt_attr("InResponseTo", self.in_response_to.as_deref());
        append_others(&mut element, &self.other_attributes);
        for extension in &self.extensions {
            element.push(extension.clone());
        }
        element
    }

    fn from_element(element: &XmlElement) -> SamlResult<Self> {
        Ok(Self {
            not_before: instant_attr(element, "NotBefore")?,
            not_on_or_after: instant_attr(element, "NotOnOrAfter")?,
            recipient: element.attr("Recipient").map(str::to_string),
            in_response_to: element.attr("InResponseTo").map(str::to_string),
            other_attributes: other_attributes(element, &Self::KNOWN),
            extensions: element.elements().cloned().collect(),
        })
    }
}

/// Assertion conditions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conditions {
    /// Start of the validity window, inclusive.
    pub not_before: Option<XmlDateTime>,
    /// End of the validity window, exclusive.
    pub not_on_or_after: Option<XmlDateTime>,
    /// Audience restrictions.
    pub audience_restrictions: Vec<AudienceRestriction>,
    /// Whether the assertion may be used once only.
    pub one_time_use: bool,
    /// Proxy restriction.
    pub proxy_restriction: Option<ProxyRestriction>,
    /// Unmodelled attributes.
    pub other_attributes: Vec<(String, String)>,
    /// Generic `saml:Condition` elements and other unmodelled children.
    pub extensions: Vec<XmlElement>,
}

impl Conditions {
    /// Restricts the assertion to `audience`.
    #[must_use]
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience_restrictions.push(AudienceRestriction {
            audiences: vec![audience.into()],
        });
        self
    }

    /// Returns true if `now` is inside the window. Missing bounds are open.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        let now = now.fixed_offset();
        match (&self.not_before, &self.not_on_or_after) {
            (Some(not_before), Some(not_on_or_after)) => {
                is_valid(&now, not_before, not_on_or_after)
            }
            (Some(not_before), None) => *not_before <= now,
            (None, Some(not_on_or_after)) => now < *not_on_or_after,
            (None, None) => true,
        }
    }

    fn to_element(&self) -> XmlElement {
        let mut element = XmlElement::qualified("saml", "Conditions", SAML_NS)
            .with_opt_attr("NotBefore", format_instant(self.not_before.as_ref()))
            .with_opt_attr(
                "NotOnOrAfter",
                format_instant(self.not_on_or_after.as_ref()),
            );
        append_others(&mut element, &self.other_attributes);
        for extension in &self.extensions {
            element.push(extension.clone());
        }
        for restriction in &self.audience_restrictions {
            let mut restriction_element =
                XmlElement::qualified("saml", "AudienceRestriction", SAML_NS);
            for audience in &restriction.audiences {
                restriction_element.push(audience_element(audience));
            }
            element.push(restriction_element);
        }
        if self.one_time_use {
            element.push(XmlElement::qualified("saml", "OneTimeUse", SAML_NS));
        }
        if let Some(proxy) = &self.proxy_restriction {
            let mut proxy_element = XmlElement::qualified("saml", "ProxyRestriction", SAML_NS)
                .with_opt_attr("Count", proxy.count.map(|count| count.to_string()));
            for audience in &proxy.audiences {
                proxy_element.push(audience_element(audience));
            }
            element.push(proxy_element);
        }
        element
    }

    fn from_element(element: &XmlElement) -> SamlResult<Self> {
        let audiences = |parent: &XmlElement| -> Vec<String> {
            parent
                .children_named(SAML_NS, "Audience")
                .map(|audience| audience.text().trim().to_string())
                .collect()
        };
        let proxy_restriction = element
            .child(SAML_NS, "ProxyRestriction")
            .map(|proxy| -> SamlResult<_> {
                let count = proxy
                    .attr("Count")
                    .map(|count| {
                        count.parse::<u32>().map_err(|err| {
                            SamlError::invalid_attribute(&proxy.name, "Count", err.to_string())
                        })
                    })
                    .transpose()?;
                Ok(ProxyRestriction {
                    count,
                    audiences: audiences(proxy),
                })
            })
            .transpose()?;

        Ok(Self {
            not_before: instant_attr(element, "NotBefore")?,
            not_on_or_after: instant_attr(element, "NotOnOrAfter")?,
            audience_restrictions: element
                .children_named(SAML_NS, "AudienceRestriction")
                .map(|restriction| AudienceRestriction {
                    audiences: audiences(restriction),
                })
                .collect(),
            one_time_use: element.child(SAML_NS, "OneTimeUse").is_some(),
            proxy_restriction,
            other_attributes: other_attributes(element, &["NotBefore", "NotOnOrAfter"]),
            extensions: other_children(
                element,
                SAML_NS,
                &["AudienceRestriction", "OneTimeUse", "ProxyRestriction"],
            ),
        })
    }
}

fn audience_element(audience: &str) -> XmlElement {
    XmlElement::qualified("saml", "Audience", SAML_NS).with_text(audience)
}

/// Audience restriction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudienceRestriction {
    /// Audience URIs; the assertion is addressed to any of them.
    pub audiences: Vec<String>,
}

/// Proxy restriction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyRestriction {
    /// Maximum number of indirections.
    pub count: Option<u32>,
    /// Audiences the assertion may be proxied to.
    pub audiences: Vec<String>,
}

/// Statement carried by an assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// Authentication statement.
    Authn(AuthnStatement),
    /// Attribute statement.
    Attribute(AttributeStatement),
    /// Authorization decision statement.
    AuthzDecision(AuthzDecisionStatement),
    /// Extension statement kept as-is.
    Other(XmlElement),
}

impl Statement {
    fn to_element(&self) -> XmlElement {
        match self {
            Self::Authn(authn) => authn.to_element(),
            Self::Attribute(attributes) => attributes.to_element(),
            Self::AuthzDecision(decision) => decision.to_element(),
            Self::Other(element) => element.clone(),
        }
    }

    fn from_element(element: &XmlElement) -> SamlResult<Self> {
        match element.local_name() {
            "AuthnStatement" => Ok(Self::Authn(AuthnStatement::from_element(element)?)),
            "AttributeStatement" => {
                Ok(Self::Attribute(AttributeStatement::from_element(element)))
            }
            "AuthzDecisionStatement" => Ok(Self::AuthzDecision(
                AuthzDecisionStatement::from_element(element)?,
            )),
            _ => Ok(Self::Other(element.clone())),
        }
    }
}

/// Authentication statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthnStatement {
    /// When the subject authenticated.
    pub authn_instant: XmlDateTime,
    /// Session index at the identity provider.
    pub session_index: Option<String>,
    /// End of the session.
    pub session_not_on_or_after: Option<XmlDateTime>,
    /// Authentication context class reference.
    pub authn_context_class_ref: Option<String>,
    /// Unmodelled attributes.
    pub other_attributes: Vec<(String, String)>,
    /// Unmodelled children, such as `saml:SubjectLocality`.
    pub extensions: Vec<XmlElement>,
}

impl AuthnStatement {
    /// Creates a statement for an authentication at `instant` using `class_ref`.
    #[must_use]
    pub fn new(instant: XmlDateTime, class_ref: impl Into<String>) -> Self {
        Self {
            authn_instant: instant,
            session_index: None,
            session_not_on_or_after: None,
            authn_context_class_ref: Some(class_ref.into()),
            other_attributes: Vec::new(),
            extensions: Vec::new(),
        }
    }

    /// Sets the session index.
    #[must_use]
    pub fn with_session_index(mut self, index: impl Into<String>) -> Self {
        self.session_index = Some(index.into());
        self
    }

    fn to_element(&self) -> XmlElement {
        let mut context = XmlElement::qualified("saml", "AuthnContext", SAML_NS);
        if let Some(class_ref) = &self.authn_context_class_ref {
            context.push(
                XmlElement::qualified("saml", "AuthnContextClassRef", SAML_NS)
                    .with_text(class_ref.clone()),
            );
        }
        let mut element = XmlElement::qualified("saml", "AuthnStatement", SAML_NS)
            .with_attr("AuthnInstant", format_xml_datetime(&self.authn_instant))
            .with_opt_attr("SessionIndex", self.session_index.as_deref())
            .with_opt_attr(
                "SessionNotOnOrAfter",
                format_instant(self.session_not_on_or_after.as_ref()),
            );
        append_others(&mut element, &self.other_attributes);
        for extension in &self.extensions {
            element.push(extension.clone());
        }
        element.with_child(context)
    }

    fn from_element(element: &XmlElement) -> SamlResult<Self> {
        Ok(Self {
            authn_instant: required_instant(element, "AuthnInstant")?,
            session_index: element.attr("SessionIndex").map(str::to_string),
            session_not_on_or_after: instant_attr(element, "SessionNotOnOrAfter")?,
            authn_context_class_ref: element
                .child(SAML_NS, "AuthnContext")
                .and_then(|context| context.child(SAML_NS, "AuthnContextClassRef"))
                .map(|class_ref| class_ref.text().trim().to_string()),
            other_attributes: other_attributes(
                element,
                &["AuthnInstant", "SessionIndex", "SessionNotOnOrAfter"],
            ),
            extensions: other_children(element, SAML_NS, &["AuthnContext"]),
        })
    }
}

/// Attribute statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeStatement {
    /// The attributes.
    pub attributes: Vec<Attribute>,
    /// Unmodelled attributes.
    pub other_attributes: Vec<(String, String)>,
    /// Unmodelled children, such as `saml:EncryptedAttribute`.
    pub extensions: Vec<XmlElement>,
}

impl AttributeStatement {
    /// Adds an attribute.
    #[must_use]
    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    fn to_element(&self) -> XmlElement {
        let mut element = XmlElement::qualified("saml", "AttributeStatement", SAML_NS);
        append_others(&mut element, &self.other_attributes);
        for attribute in &self.attributes {
            element.push(attribute.to_element());
        }
        for extension in &self.extensions {
            element.push(extension.clone());
        }
        element
    }

    fn from_element(element: &XmlElement) -> Self {
        Self {
            attributes: element
                .children_named(SAML_NS, "Attribute")
                .map(Attribute::from_element)
                .collect(),
            other_attributes: other_attributes(element, &[]),
            extensions: other_children(element, SAML_NS, &["Attribute"]),
        }
    }
}

/// A named, multi-valued attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Attribute name.
    pub name: String,
    /// Name format URI.
    pub name_format: Option<String>,
    /// Human-readable name.
    pub friendly_name: Option<String>,
    /// Values.
    pub values: Vec<String>,
    /// Unmodelled attributes.
    pub other_attributes: Vec<(String, String)>,
}

impl Attribute {
    /// Creates an attribute with one value.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::multi(name, vec![value.into()])
    }

    /// Creates an attribute with several values.
    #[must_use]
    pub fn multi(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            name_format: None,
            friendly_name: None,
            values,
            other_attributes: Vec::new(),
        }
    }

    fn to_element(&self) -> XmlElement {
        let mut element = XmlElement::qualified("saml", "Attribute", SAML_NS)
            .with_attr("Name", self.name.clone())
            .with_opt_attr("NameFormat", self.name_format.as_deref())
            .with_opt_attr("FriendlyName", self.friendly_name.as_deref());
        append_others(&mut element, &self.other_attributes);
        for value in &self.values {
            element.push(
                XmlElement::qualified("saml", "AttributeValue", SAML_NS).with_text(value.clone()),
            );
        }
        element
    }

    fn from_element(element: &XmlElement) -> Self {
        Self {
            name: element.attr("Name").unwrap_or_default().to_string(),
            name_format: element.attr("NameFormat").map(str::to_string),
            friendly_name: element.attr("FriendlyName").map(str::to_string),
            values: element
                .children_named(SAML_NS, "AttributeValue")
                .map(XmlElement::text)
                .collect(),
            other_attributes: other_attributes(element, &["Name", "NameFormat", "FriendlyName"]),
        }
    }
}

/// Authorization decision statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthzDecisionStatement {
    /// Resource URI.
    pub resource: String,
    /// `Permit`, `Deny` or `Indeterminate`.
    pub decision: String,
    /// Actions as (namespace, action) pairs.
    pub actions: Vec<(Option<String>, String)>,
    /// Unmodelled attributes.
    pub other_attributes: Vec<(String, String)>,
    /// Unmodelled children, such as `saml:Evidence`.
    pub extensions: Vec<XmlElement>,
}

impl AuthzDecisionStatement {
    fn to_element(&self) -> XmlElement {
        let mut element = XmlElement::qualified("saml", "AuthzDecisionStatement", SAML_NS)
            .with_attr("Resource", self.resource.clone())
            .with_attr("Decision", self.decision.clone());
        append_others(&mut element, &self.other_attributes);
        for (namespace, action) in &self.actions {
            element.push(
                XmlElement::qualified("saml", "Action", SAML_NS)
                    .with_opt_attr("Namespace", namespace.as_deref())
                    .with_text(action.clone()),
            );
        }
        for extension in &self.extensions {
            element.push(extension.clone());
        }
        element
    }

    fn from_element(element: &XmlElement) -> SamlResult<Self> {
        Ok(Self {
            resource: element.required_attr("Resource")?.to_string(),
            decision: element.required_attr("Decision")?.to_string(),
            actions: element
                .children_named(SAML_NS, "Action")
                .map(|action| {
                    (
                        action.attr("Namespace").map(str::to_string),
                        action.text().trim().to_string(),
                    )
                })
                .collect(),
            other_attributes: other_attributes(element, &["Resource", "Decision"]),
            extensions: other_children(element, SAML_NS, &["Action"]),
        })
    }
}
