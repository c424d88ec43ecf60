//! SAML 1.1 assertions.

use chrono::{DateTime, Utc};
use sts_core::time::{add, format_xml_datetime, subtract};
use sts_core::{StsError, StsResult, XmlDateTime, is_valid};

use super::{
    append_others, declare, expect_root, format_instant, instant_attr, other_attributes,
    required_instant,
};
use crate::constants::SAML11_NS;
use crate::error::{SamlError, SamlResult};
use crate::xml::XmlElement;

/// A SAML 1.1 assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Saml11Assertion {
    /// `AssertionID`.
    pub id: String,
    /// Issuer name; a plain string in SAML 1.1.
    pub issuer: String,
    /// When the assertion was (last) issued.
    pub issue_instant: XmlDateTime,
    /// Validity window and audiences.
    pub conditions: Option<Saml11Conditions>,
    /// Statements.
    pub statements: Vec<Saml11Statement>,
    /// Attributes of the `Assertion` element not modelled above.
    pub other_attributes: Vec<(String, String)>,
    /// Child elements not modelled above.
    pub extensions: Vec<XmlElement>,
}

impl Saml11Assertion {
    /// Creates an assertion without conditions or statements.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        issuer: impl Into<String>,
        issue_instant: XmlDateTime,
    ) -> Self {
        Self {
            id: id.into(),
            issuer: issuer.into(),
            issue_instant,
            conditions: None,
            statements: Vec::new(),
            other_attributes: Vec::new(),
            extensions: Vec::new(),
        }
    }

    /// Adds a statement.
    #[must_use]
    pub fn with_statement(mut self, statement: Saml11Statement) -> Self {
        self.statements.push(statement);
        self
    }

    /// Sets the conditions.
    #[must_use]
    pub fn with_conditions(mut self, conditions: Saml11Conditions) -> Self {
        self.conditions = Some(conditions);
        self
    }

    /// Moves the issue instant.
    pub fn update_issue_instant(&mut self, instant: XmlDateTime) {
        self.issue_instant = instant;
    }

    /// Recomputes `[issue - skew, issue + validity + skew)`, keeping audiences.
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
        let conditions = Saml11Conditions {
            not_before: Some(subtract(&self.issue_instant, clock_skew_ms)?),
            not_on_or_after: Some(add(&self.issue_instant, upper)?),
            audiences: self
                .conditions
                .take()
                .map(|conditions| conditions.audiences)
                .unwrap_or_default(),
        };
        self.conditions = Some(conditions);
        Ok(())
    }

    /// Returns true if `now` falls inside the conditions window.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        let Some(conditions) = &self.conditions else {
            return true;
        };
        let now = now.fixed_offset();
        match (&conditions.not_before, &conditions.not_on_or_after) {
            (Some(not_before), Some(not_on_or_after)) => {
                is_valid(&now, not_before, not_on_or_after)
            }
            (Some(not_before), None) => *not_before <= now,
            (None, Some(not_on_or_after)) => now < *not_on_or_after,
            (None, None) => true,
        }
    }

    /// Builds the `saml:Assertion` element.
    #[must_use]
    pub fn to_element(&self) -> XmlElement {
        let mut element = XmlElement::qualified("saml", "Assertion", SAML11_NS);
        declare(&mut element, "saml", SAML11_NS);
        element.set_attr("MajorVersion", "1");
        element.set_attr("MinorVersion", "1");
        element.set_attr("AssertionID", self.id.clone());
        element.set_attr("Issuer", self.issuer.clone());
        element.set_attr("IssueInstant", format_xml_datetime(&self.issue_instant));
        append_others(&mut element, &self.other_attributes);

        if let Some(conditions) = &self.conditions {
            let mut conditions_element = XmlElement::qualified("saml", "Conditions", SAML11_NS)
                .with_opt_attr("NotBefore", format_instant(conditions.not_before.as_ref()))
                .with_opt_attr(
                    "NotOnOrAfter",
                    format_instant(conditions.not_on_or_after.as_ref()),
                );
            if !conditions.audiences.is_empty() {
                let mut restriction = XmlElement::qualified(
                    "saml",
                    "AudienceRestrictionCondition",
                    SAML11_NS,
                );
                for audience in &conditions.audiences {
                    restriction.push(
                        XmlElement::qualified("saml", "Audience", SAML11_NS)
                            .with_text(audience.clone()),
                    );
                }
                conditions_element.push(restriction);
            }
            element.push(conditions_element);
        }
        for extension in &self.extensions {
            element.push(extension.clone());
        }
        for statement in &self.statements {
            element.push(statement.to_element());
        }
        element
    }

    /// Reads a SAML 1.1 `saml:Assertion` element.
    ///
    /// ## Errors
    ///
    /// Returns an error if required parts are missing or malformed.
    pub fn from_element(element: &XmlElement) -> SamlResult<Self> {
        expect_root(element, SAML11_NS, "Assertion")?;
        let mut assertion = Self {
            id: element.required_attr("AssertionID")?.to_string(),
            issuer: element.required_attr("Issuer")?.to_string(),
            issue_instant: required_instant(element, "IssueInstant")?,
            conditions: None,
            statements: Vec::new(),
            other_attributes: other_attributes(
                element,
                &[
                    "MajorVersion",
                    "MinorVersion",
                    "AssertionID",
                    "Issuer",
                    "IssueInstant",
                ],
            ),
            extensions: Vec::new(),
        };

        for child in element.elements() {
            if child.namespace.as_deref() != Some(SAML11_NS) {
                assertion.extensions.push(child.clone());
                continue;
            }
            match child.local_name() {
                "Conditions" => {
                    assertion.conditions = Some(Saml11Conditions {
                        not_before: instant_attr(child, "NotBefore")?,
                        not_on_or_after: instant_attr(child, "NotOnOrAfter")?,
                        audiences: child
                            .children_named(SAML11_NS, "AudienceRestrictionCondition")
                            .flat_map(|restriction| {
                                restriction.children_named(SAML11_NS, "Audience")
                            })
                            .map(|audience| audience.text().trim().to_string())
                            .collect(),
                    });
                }
                "AuthenticationStatement" | "AttributeStatement" => {
                    assertion.statements.push(Saml11Statement::from_element(child)?);
                }
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

    /// Parses a SAML 1.1 assertion document.
    ///
    /// ## Errors
    ///
    /// Returns an error for malformed XML or a non-assertion root.
    pub fn from_xml(xml: &str) -> SamlResult<Self> {
        Self::from_element(&XmlElement::parse(xml)?)
    }
}

/// SAML 1.1 conditions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Saml11Conditions {
    /// Start of the window, inclusive.
    pub not_before: Option<XmlDateTime>,
    /// End of the window, exclusive.
    pub not_on_or_after: Option<XmlDateTime>,
    /// Audiences from `AudienceRestrictionCondition`.
    pub audiences: Vec<String>,
}

/// SAML 1.1 subject.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Saml11Subject {
    /// `NameIdentifier` value.
    pub name: Option<String>,
    /// `NameIdentifier` format.
    pub format: Option<String>,
    /// Confirmation method URIs.
    pub confirmation_methods: Vec<String>,
}

impl Saml11Subject {
    /// Creates a subject named `name`.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    fn to_element(&self) -> XmlElement {
        let mut element = XmlElement::qualified("saml", "Subject", SAML11_NS);
        if let Some(name) = &self.name {
            element.push(
                XmlElement::qualified("saml", "NameIdentifier", SAML11_NS)
                    .with_opt_attr("Format", self.format.as_deref())
                    .with_text(name.clone()),
            );
        }
        if !self.confirmation_methods.is_empty() {
            let mut confirmation = XmlElement::qualified("saml", "SubjectConfirmation", SAML11_NS);
            for method in &self.confirmation_methods {
                confirmation.push(
                    XmlElement::qualified("saml", "ConfirmationMethod", SAML11_NS)
                        .with_text(method.clone()),
                );
            }
            element.push(confirmation);
        }
        element
    }

    fn from_element(element: &XmlElement) -> Self {
        let name_identifier = element.child(SAML11_NS, "NameIdentifier");
        Self {
            name: name_identifier.map(|name| name.text().trim().to_string()),
            format: name_identifier
                .and_then(|name| name.attr("Format"))
                .map(str::to_string),
            confirmation_methods: element
                .children_named(SAML11_NS, "SubjectConfirmation")
                .flat_map(|confirmation| {
                    confirmation.children_named(SAML11_NS, "ConfirmationMethod")
                })
                .map(|method| method.text().trim().to_string())
                .collect(),
        }
    }
}

/// SAML 1.1 statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Saml11Statement {
    /// Authentication statement.
    Authentication {
        /// Authentication method URI.
        method: String,
        /// When the subject authenticated.
        instant: XmlDateTime,
        /// The subject.
        subject: Saml11Subject,
    },
    /// Attribute statement with (name, values) pairs.
    Attribute {
        /// The subject.
        subject: Saml11Subject,
        /// Attributes as name and values.
        attributes: Vec<(String, Vec<String>)>,
    },
}

impl Saml11Statement {
    /// The statement's subject.
    #[must_use]
    pub const fn subject(&self) -> &Saml11Subject {
        match self {
            Self::Authentication { subject, .. } | Self::Attribute { subject, .. } => subject,
        }
    }

    fn to_element(&self) -> XmlElement {
        match self {
            Self::Authentication {
                method,
                instant,
                subject,
            } => XmlElement::qualified("saml", "AuthenticationStatement", SAML11_NS)
                .with_attr("AuthenticationMethod", method.clone())
                .with_attr("AuthenticationInstant", format_xml_datetime(instant))
                .with_child(subject.to_element()),
            Self::Attribute {
                subject,
                attributes,
            } => {
                let mut element = XmlElement::qualified("saml", "AttributeStatement", SAML11_NS)
                    .with_child(subject.to_element());
                for (name, values) in attributes {
                    let mut attribute = XmlElement::qualified("saml", "Attribute", SAML11_NS)
                        .with_attr("AttributeName", name.clone());
                    for value in values {
                        attribute.push(
                            XmlElement::qualified("saml", "AttributeValue", SAML11_NS)
                                .with_text(value.clone()),
                        );
                    }
                    element.push(attribute);
                }
                element
            }
        }
    }

    fn from_element(element: &XmlElement) -> SamlResult<Self> {
        let subject = element
            .child(SAML11_NS, "Subject")
            .map(Saml11Subject::from_element)
            .ok_or_else(|| SamlError::MissingElement("saml:Subject".to_string()))?;
        if element.local_name() == "AuthenticationStatement" {
            return Ok(Self::Authentication {
                method: element.required_attr("AuthenticationMethod")?.to_string(),
                instant: required_instant(element, "AuthenticationInstant")?,
                subject,
            });
        }
        Ok(Self::Attribute {
            subject,
            attributes: element
                .children_named(SAML11_NS, "Attribute")
                .map(|attribute| {
                    (
                        attribute.attr("AttributeName").unwrap_or_default().to_string(),
                        attribute
                            .children_named(SAML11_NS, "AttributeValue")
                            .map(XmlElement::text)
                            .collect(),
                    )
                })
                .collect(),
        })
    }
}
