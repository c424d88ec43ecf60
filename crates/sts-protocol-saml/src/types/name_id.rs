//! Name identifiers for subjects and issuers.

use serde::{Deserialize, Serialize};

use super::{append_others, other_attributes};
use crate::constants::{NameIdFormat, SAML_NS, SAMLP_NS};
use crate::xml::XmlElement;

/// SAML Name ID.
///
/// Used both for `saml:NameID` inside a subject and for `saml:Issuer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameId {
    /// The identifier value.
    pub value: String,

    /// The format URI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Security or administrative domain qualifying the name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_qualifier: Option<String>,

    /// Service provider qualifying the name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sp_name_qualifier: Option<String>,

    /// Identifier the service provider established for the principal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sp_provided_id: Option<String>,

    /// Unmodelled attributes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub other_attributes: Vec<(String, String)>,
}

impl NameId {
    /// Creates a name ID without a format.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            format: None,
            name_qualifier: None,
            sp_name_qualifier: None,
            sp_provided_id: None,
            other_attributes: Vec::new(),
        }
    }

    /// Creates an entity name ID, the usual form of an issuer.
    #[must_use]
    pub fn entity(value: impl Into<String>) -> Self {
        Self::new(value).with_format(NameIdFormat::Entity)
    }

    /// Creates a transient name ID.
    #[must_use]
    pub fn transient(value: impl Into<String>) -> Self {
        Self::new(value).with_format(NameIdFormat::Transient)
    }

    /// Sets the format.
    #[must_use]
    pub fn with_format(mut self, format: NameIdFormat) -> Self {
        self.format = Some(format.uri().to_string());
        self
    }

    /// Sets the name qualifier.
    #[must_use]
    pub fn with_name_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.name_qualifier = Some(qualifier.into());
        self
    }

    /// Returns the parsed format, `Unspecified` when absent or unknown.
    #[must_use]
    pub fn parsed_format(&self) -> NameIdFormat {
        self.format
            .as_deref()
            .and_then(NameIdFormat::from_uri)
            .unwrap_or_default()
    }

    /// Writes the name ID as `saml:{local}`.
    #[must_use]
    pub fn to_element(&self, local: &str) -> XmlElement {
        let mut element = XmlElement::qualified("saml", local, SAML_NS)
            .with_opt_attr("Format", self.format.as_deref())
            .with_opt_attr("NameQualifier", self.name_qualifier.as_deref())
            .with_opt_attr("SPNameQualifier", self.sp_name_qualifier.as_deref())
            .with_opt_attr("SPProvidedID", self.sp_provided_id.as_deref());
        append_others(&mut element, &self.other_attributes);
        element.with_text(self.value.clone())
    }

    /// Reads a `saml:NameID` or `saml:Issuer` element.
    #[must_use]
    pub fn from_element(element: &XmlElement) -> Self {
        Self {
            value: element.text().trim().to_string(),
            format: element.attr("Format").map(str::to_string),
            name_qualifier: element.attr("NameQualifier").map(str::to_string),
            sp_name_qualifier: element.attr("SPNameQualifier").map(str::to_string),
            sp_provided_id: element.attr("SPProvidedID").map(str::to_string),
            other_attributes: other_attributes(
                element,
                &["Format", "NameQualifier", "SPNameQualifier", "SPProvidedID"],
            ),
        }
    }
}

/// Constraints on the name identifier an identity provider returns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameIdPolicy {
    /// Requested format URI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Whether the identity provider may create a new identifier.
    #[serde(default)]
    pub allow_create: bool,
}

impl NameIdPolicy {
    /// Creates a policy requesting `format`.
    #[must_use]
    pub fn with_format(format: NameIdFormat) -> Self {
        Self {
            format: Some(format.uri().to_string()),
            allow_create: false,
        }
    }

    /// Allows the identity provider to create a new identifier.
    #[must_use]
    pub const fn allowing_create(mut self) -> Self {
        self.allow_create = true;
        self
    }

    pub(crate) fn to_element(&self) -> XmlElement {
        XmlElement::qualified("samlp", "NameIDPolicy", SAMLP_NS)
            .with_opt_attr("Format", self.format.as_deref())
            .with_attr("AllowCreate", self.allow_create.to_string())
    }

    pub(crate) fn from_element(element: &XmlElement) -> Self {
        Self {
            format: element.attr("Format").map(str::to_string),
            allow_create: element.attr("AllowCreate") == Some("true"),
        }
    }
}
