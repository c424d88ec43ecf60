//! Status of a SAML protocol response.

use serde::{Deserialize, Serialize};

use crate::constants::{SAMLP_NS, status_codes, sub_status_codes};
use crate::error::{SamlError, SamlResult};
use crate::xml::XmlElement;

/// SAML protocol status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    /// The status code.
    pub status_code: StatusCode,

    /// Optional status message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
}

impl Status {
    /// Creates a success status.
    #[must_use]
    pub fn success() -> Self {
        Self {
            status_code: StatusCode::new(status_codes::SUCCESS),
            status_message: None,
        }
    }

    /// Creates a requester error status.
    #[must_use]
    pub fn requester_error(message: impl Into<String>) -> Self {
        Self {
            status_code: StatusCode::new(status_codes::REQUESTER),
            status_message: Some(message.into()),
        }
    }

    /// Creates a responder error status.
    #[must_use]
    pub fn responder_error(message: impl Into<String>) -> Self {
        Self {
            status_code: StatusCode::new(status_codes::RESPONDER),
            status_message: Some(message.into()),
        }
    }

    /// Creates the status describing `err`.
    #[must_use]
    pub fn from_error(err: &SamlError) -> Self {
        let mut status_code = StatusCode::new(err.status_code());
        if let Some(sub) = err.sub_status_code() {
            status_code = status_code.with_sub_status(StatusCode::new(sub));
        }
        Self {
            status_code,
            status_message: Some(err.to_string()),
        }
    }

    /// Creates a partial-logout status.
    #[must_use]
    pub fn partial_logout() -> Self {
        Self {
            status_code: StatusCode::new(status_codes::SUCCESS)
                .with_sub_status(StatusCode::new(sub_status_codes::PARTIAL_LOGOUT)),
            status_message: None,
        }
    }

    /// Returns true if this status indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status_code.value == status_codes::SUCCESS
    }

    /// Turns a non-success status into [`SamlError::StatusFailure`].
    ///
    /// ## Errors
    ///
    /// Returns the failure if the status is not `Success`.
    pub fn ensure_success(&self) -> SamlResult<()> {
        if self.is_success() {
            Ok(())
        } else {
            Err(SamlError::StatusFailure {
                code: self.status_code.value.clone(),
                message: self.status_message.clone(),
            })
        }
    }

    pub(crate) fn to_element(&self) -> XmlElement {
        let mut element = XmlElement::qualified("samlp", "Status", SAMLP_NS)
            .with_child(self.status_code.to_element());
        if let Some(message) = &self.status_message {
            element.push(
                XmlElement::qualified("samlp", "StatusMessage", SAMLP_NS)
                    .with_text(message.clone()),
            );
        }
        element
    }

    pub(crate) fn from_element(element: &XmlElement) -> SamlResult<Self> {
        let code = element
            .child(SAMLP_NS, "StatusCode")
            .ok_or_else(|| SamlError::MissingElement("samlp:StatusCode".to_string()))?;
        Ok(Self {
            status_code: StatusCode::from_element(code)?,
            status_message: element
                .child(SAMLP_NS, "StatusMessage")
                .map(XmlElement::text),
        })
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::success()
    }
}

/// SAML status code, optionally refined by a nested code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCode {
    /// The status code URI.
    pub value: String,

    /// Nested status code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<Box<StatusCode>>,
}

impl StatusCode {
    /// Creates a status code with the given value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            status_code: None,
        }
    }

    /// Adds a nested status code.
    #[must_use]
    pub fn with_sub_status(mut self, sub: StatusCode) -> Self {
        self.status_code = Some(Box::new(sub));
        self
    }

    /// Returns the nested status code value if present.
    #[must_use]
    pub fn sub_status_value(&self) -> Option<&str> {
        self.status_code.as_ref().map(|s| s.value.as_str())
    }

    fn to_element(&self) -> XmlElement {
        let mut element = XmlElement::qualified("samlp", "StatusCode", SAMLP_NS)
            .with_attr("Value", self.value.clone());
        if let Some(sub) = &self.status_code {
            element.push(sub.to_element());
        }
        element
    }

    fn from_element(element: &XmlElement) -> SamlResult<Self> {
        Ok(Self {
            value: element.required_attr("Value")?.to_string(),
            status_code: element
                .child(SAMLP_NS, "StatusCode")
                .map(Self::from_element)
                .transpose()?
                .map(Box::new),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_status_carries_sub_code() {
        let status = Status::from_error(&SamlError::RequestDenied("nope".to_string()));
        assert!(!status.is_success());
        assert_eq!(status.status_code.value, status_codes::REQUESTER);
        assert_eq!(
            status.status_code.sub_status_value(),
            Some(sub_status_codes::REQUEST_DENIED)
        );
        assert!(matches!(
            status.ensure_success(),
            Err(SamlError::StatusFailure { .. })
        ));
    }

    #[test]
    fn nested_codes_survive_the_element_form() {
        let status = Status::partial_logout();
        let parsed = Status::from_element(&status.to_element()).unwrap();
        assert_eq!(parsed, status);
        assert!(parsed.ensure_success().is_ok());
    }

    #[test]
    fn missing_status_code_is_rejected() {
        let element = XmlElement::qualified("samlp", "Status", SAMLP_NS);
        assert!(matches!(
            Status::from_element(&element),
            Err(SamlError::MissingElement(_))
        ));
    }
}
