//! SAML 2.0 protocol messages exchanged between service and identity providers.

use sts_core::XmlDateTime;
use sts_core::time::format_xml_datetime;

use super::{
    Assertion, NameId, NameIdPolicy, Status, append_others, bool_attr, declare, expect_root,
    format_instant, generate_id, instant_attr, other_attributes, required_instant,
};
use crate::constants::{SAML_NS, SAMLP_NS};
use crate::error::{SamlError, SamlResult};
use crate::xml::XmlElement;

const COMMON_ATTRIBUTES: [&str; 4] = ["ID", "Version", "IssueInstant", "Destination"];

fn protocol_root(local: &str, id: &str, issue_instant: &XmlDateTime) -> XmlElement {
    let mut element = XmlElement::qualified("samlp", local, SAMLP_NS);
    declare(&mut element, "samlp", SAMLP_NS);
    declare(&mut element, "saml", SAML_NS);
    element.set_attr("ID", id);
    element.set_attr("Version", "2.0");
    element.set_attr("IssueInstant", format_xml_datetime(issue_instant));
    element
}

fn issuer_of(element: &XmlElement) -> Option<NameId> {
    element.child(SAML_NS, "Issuer").map(NameId::from_element)
}

fn status_of(element: &XmlElement) -> SamlResult<Status> {
    element
        .child(SAMLP_NS, "Status")
        .map(Status::from_element)
        .ok_or_else(|| SamlError::MissingElement("samlp:Status".to_string()))?
}

/// Authentication request from a service provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthnRequest {
    /// Request ID.
    pub id: String,
    /// When the request was issued.
    pub issue_instant: XmlDateTime,
    /// The requesting service provider.
    pub issuer: Option<NameId>,
    /// Where the request is sent.
    pub destination: Option<String>,
    /// Where the response should be delivered.
    pub assertion_consumer_service_url: Option<String>,
    /// Binding URI the response should use.
    pub protocol_binding: Option<String>,
    /// Name identifier constraints.
    pub name_id_policy: Option<NameIdPolicy>,
    /// Whether the identity provider must re-authenticate the user.
    pub force_authn: bool,
    /// Whether the identity provider must not interact with the user.
    pub is_passive: bool,
    /// Attributes not modelled above.
    pub other_attributes: Vec<(String, String)>,
}

impl AuthnRequest {
    /// Creates a request with a fresh ID.
    #[must_use]
    pub fn new(issuer: NameId, issue_instant: XmlDateTime) -> Self {
        Self {
            id: generate_id(),
            issue_instant,
            issuer: Some(issuer),
            destination: None,
            assertion_consumer_service_url: None,
            protocol_binding: None,
            name_id_policy: None,
            force_authn: false,
            is_passive: false,
            other_attributes: Vec::new(),
        }
    }

    /// Sets the destination.
    #[must_use]
    pub fn with_destination(mut self, url: impl Into<String>) -> Self {
        self.destination = Some(url.into());
        self
    }

    /// Sets the assertion consumer service URL.
    #[must_use]
    pub fn with_acs_url(mut self, url: impl Into<String>) -> Self {
        self.assertion_consumer_service_url = Some(url.into());
        self
    }

    /// Sets the response binding.
    #[must_use]
    pub fn with_protocol_binding(mut self, binding: impl Into<String>) -> Self {
        self.protocol_binding = Some(binding.into());
        self
    }

    /// Sets the name ID policy.
    #[must_use]
    pub fn with_name_id_policy(mut self, policy: NameIdPolicy) -> Self {
        self.name_id_policy = Some(policy);
        self
    }

    pub(crate) fn to_element(&self) -> XmlElement {
        let mut element = protocol_root("AuthnRequest", &self.id, &self.issue_instant)
            .with_opt_attr("Destination", self.destination.as_deref())
            .with_opt_attr(
                "AssertionConsumerServiceURL",
                self.assertion_consumer_service_url.as_deref(),
            )
            .with_opt_attr("ProtocolBinding", self.protocol_binding.as_deref());
        if self.force_authn {
            element.set_attr("ForceAuthn", "true");
        }
        if self.is_passive {
            element.set_attr("IsPassive", "true");
        }
        append_others(&mut element, &self.other_attributes);
        if let Some(issuer) = &self.issuer {
            element.push(issuer.to_element("Issuer"));
        }
        if let Some(policy) = &self.name_id_policy {
            element.push(policy.to_element());
        }
        element
    }

    pub(crate) fn from_element(element: &XmlElement) -> SamlResult<Self> {
        expect_root(element, SAMLP_NS, "AuthnRequest")?;
        let mut known = COMMON_ATTRIBUTES.to_vec();
        known.extend([
            "AssertionConsumerServiceURL",
            "ProtocolBinding",
            "ForceAuthn",
            "IsPassive",
        ]);
        Ok(Self {
            id: element.required_attr("ID")?.to_string(),
            issue_instant: required_instant(element, "IssueInstant")?,
            issuer: issuer_of(element),
            destination: element.attr("Destination").map(str::to_string),
            assertion_consumer_service_url: element
                .attr("AssertionConsumerServiceURL")
                .map(str::to_string),
            protocol_binding: element.attr("ProtocolBinding").map(str::to_string),
            name_id_policy: element
                .child(SAMLP_NS, "NameIDPolicy")
                .map(NameIdPolicy::from_element),
            force_authn: bool_attr(element, "ForceAuthn")?.unwrap_or(false),
            is_passive: bool_attr(element, "IsPassive")?.unwrap_or(false),
            other_attributes: other_attributes(element, &known),
        })
    }
}

/// Response carrying assertions, or an error status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Response ID.
    pub id: String,
    /// ID of the request answered.
    pub in_response_to: Option<String>,
    /// When the response was issued.
    pub issue_instant: XmlDateTime,
    /// Where the response is sent.
    pub destination: Option<String>,
    /// The responding identity provider.
    pub issuer: Option<NameId>,
    /// Outcome.
    pub status: Status,
    /// Assertions; empty on failure.
    pub assertions: Vec<Assertion>,
    /// Attributes not modelled above.
    pub other_attributes: Vec<(String, String)>,
}

impl Response {
    /// Creates a success response.
    #[must_use]
    pub fn success(issuer: NameId, issue_instant: XmlDateTime) -> Self {
        Self::with_status(issuer, issue_instant, Status::success())
    }

    /// Creates a response with `status`.
    #[must_use]
    pub fn with_status(issuer: NameId, issue_instant: XmlDateTime, status: Status) -> Self {
        Self {
            id: generate_id(),
            in_response_to: None,
            issue_instant,
            destination: None,
            issuer: Some(issuer),
            status,
            assertions: Vec::new(),
            other_attributes: Vec::new(),
        }
    }

    /// Sets the request this answers.
    #[must_use]
    pub fn in_response_to(mut self, request_id: impl Into<String>) -> Self {
        self.in_response_to = Some(request_id.into());
        self
    }

    /// Sets the destination.
    #[must_use]
    pub fn with_destination(mut self, url: impl Into<String>) -> Self {
        self.destination = Some(url.into());
        self
    }

    /// Adds an assertion.
    #[must_use]
    pub fn with_assertion(mut self, assertion: Assertion) -> Self {
        self.assertions.push(assertion);
        self
    }

    /// The first assertion.
    #[must_use]
    pub fn first_assertion(&self) -> Option<&Assertion> {
        self.assertions.first()
    }

    pub(crate) fn to_element(&self) -> XmlElement {
        let mut element = protocol_root("Response", &self.id, &self.issue_instant)
            .with_opt_attr("InResponseTo", self.in_response_to.as_deref())
            .with_opt_attr("Destination", self.destination.as_deref());
        append_others(&mut element, &self.other_attributes);
        if let Some(issuer) = &self.issuer {
            element.push(issuer.to_element("Issuer"));
        }
        element.push(self.status.to_element());
        for assertion in &self.assertions {
            element.push(assertion.to_element());
        }
        element
    }

    pub(crate) fn from_element(element: &XmlElement) -> SamlResult<Self> {
        expect_root(element, SAMLP_NS, "Response")?;
        let mut known = COMMON_ATTRIBUTES.to_vec();
        known.push("InResponseTo");
        Ok(Self {
            id: element.required_attr("ID")?.to_string(),
            in_response_to: element.attr("InResponseTo").map(str::to_string),
            issue_instant: required_instant(element, "IssueInstant")?,
            destination: element.attr("Destination").map(str::to_string),
            issuer: issuer_of(element),
            status: status_of(element)?,
            assertions: element
                .children_named(SAML_NS, "Assertion")
                .map(Assertion::from_element)
                .collect::<SamlResult<_>>()?,
            other_attributes: other_attributes(element, &known),
        })
    }
}

/// Request to end a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoutRequest {
    /// Request ID.
    pub id: String,
    /// When the request was issued.
    pub issue_instant: XmlDateTime,
    /// The requesting party.
    pub issuer: Option<NameId>,
    /// Where the request is sent.
    pub destination: Option<String>,
    /// The principal to log out.
    pub name_id: Option<NameId>,
    /// Session indexes to end.
    pub session_indexes: Vec<String>,
    /// Logout reason URI.
    pub reason: Option<String>,
    /// Request expiry.
    pub not_on_or_after: Option<XmlDateTime>,
}

impl LogoutRequest {
    /// Logout initiated by the user.
    pub const REASON_USER: &'static str = "urn:oasis:names:tc:SAML:2.0:logout:user";

    /// Creates a request with a fresh ID logging out `name_id`.
    #[must_use]
    pub fn new(issuer: NameId, name_id: NameId, issue_instant: XmlDateTime) -> Self {
        Self {
            id: generate_id(),
            issue_instant,
            issuer: Some(issuer),
            destination: None,
            name_id: Some(name_id),
            session_indexes: Vec::new(),
            reason: None,
            not_on_or_after: None,
        }
    }

    /// Sets the destination.
    #[must_use]
    pub fn with_destination(mut self, url: impl Into<String>) -> Self {
        self.destination = Some(url.into());
        self
    }

    /// Adds a session index.
    #[must_use]
    pub fn with_session_index(mut self, index: impl Into<String>) -> Self {
        self.session_indexes.push(index.into());
        self
    }

    /// Sets the reason.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub(crate) fn to_element(&self) -> XmlElement {
        let mut element = protocol_root("LogoutRequest", &self.id, &self.issue_instant)
            .with_opt_attr("Destination", self.destination.as_deref())
            .with_opt_attr("Reason", self.reason.as_deref())
            .with_opt_attr("NotOnOrAfter", format_instant(self.not_on_or_after.as_ref()));
        if let Some(issuer) = &self.issuer {
            element.push(issuer.to_element("Issuer"));
        }
        if let Some(name_id) = &self.name_id {
            element.push(name_id.to_element("NameID"));
        }
        for index in &self.session_indexes {
            element.push(
                XmlElement::qualified("samlp", "SessionIndex", SAMLP_NS).with_text(index.clone()),
            );
        }
        element
    }

    pub(crate) fn from_element(element: &XmlElement) -> SamlResult<Self> {
        expect_root(element, SAMLP_NS, "LogoutRequest")?;
        Ok(Self {
            id: element.required_attr("ID")?.to_string(),
            issue_instant: required_instant(element, "IssueInstant")?,
            issuer: issuer_of(element),
            destination: element.attr("Destination").map(str::to_string),
            name_id: element.child(SAML_NS, "NameID").map(NameId::from_element),
            session_indexes: element
                .children_named(SAMLP_NS, "SessionIndex")
                .map(|index| index.text().trim().to_string())
                .collect(),
            reason: element.attr("Reason").map(str::to_string),
            not_on_or_after: instant_attr(element, "NotOnOrAfter")?,
        })
    }
}

/// Answer to a [`LogoutRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoutResponse {
    /// Response ID.
    pub id: String,
    /// ID of the request answered.
    pub in_response_to: Option<String>,
    /// When the response was issued.
    pub issue_instant: XmlDateTime,
    /// Where the response is sent.
    pub destination: Option<String>,
    /// The responding party.
    pub issuer: Option<NameId>,
    /// Outcome.
    pub status: Status,
}

impl LogoutResponse {
    /// Creates a response with `status`.
    #[must_use]
    pub fn new(issuer: NameId, issue_instant: XmlDateTime, status: Status) -> Self {
        Self {
            id: generate_id(),
            in_response_to: None,
            issue_instant,
            destination: None,
            issuer: Some(issuer),
            status,
        }
    }

    /// Sets the request this answers.
    #[must_use]
    pub fn in_response_to(mut self, request_id: impl Into<String>) -> Self {
        self.in_response_to = Some(request_id.into());
        self
    }

    /// Sets the destination.
    #[must_use]
    pub fn with_destination(mut self, url: impl Into<String>) -> Self {
        self.destination = Some(url.into());
        self
    }

    pub(crate) fn to_element(&self) -> XmlElement {
        let mut element = protocol_root("LogoutResponse", &self.id, &self.issue_instant)
            .with_opt_attr("InResponseTo", self.in_response_to.as_deref())
            .with_opt_attr("Destination", self.destination.as_deref());
        if let Some(issuer) = &self.issuer {
            element.push(issuer.to_element("Issuer"));
        }
        element.push(self.status.to_element());
        element
    }

    pub(crate) fn from_element(element: &XmlElement) -> SamlResult<Self> {
        expect_root(element, SAMLP_NS, "LogoutResponse")?;
        Ok(Self {
            id: element.required_attr("ID")?.to_string(),
            in_response_to: element.attr("InResponseTo").map(str::to_string),
            issue_instant: required_instant(element, "IssueInstant")?,
            destination: element.attr("Destination").map(str::to_string),
            issuer: issuer_of(element),
            status: status_of(element)?,
        })
    }
}
