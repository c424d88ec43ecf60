//! SAML protocol and assertion types.
//!
//! Each type converts to and from an [`XmlElement`]; attributes the type does
//! not model are kept in `other_attributes` and written back unchanged.

mod assertion;
mod message;
mod name_id;
mod protocol;
mod saml11;
mod status;

pub use assertion::*;
pub use message::*;
pub use name_id::*;
pub use protocol::*;
pub use saml11::*;
pub use status::*;

use sts_core::XmlDateTime;
use sts_core::time::{format_xml_datetime, parse_xml_datetime};

use crate::error::{SamlError, SamlResult};
use crate::xml::XmlElement;

/// Generates a fresh message or assertion ID.
#[must_use]
pub fn generate_id() -> String {
    format!("ID_{}", uuid::Uuid::new_v4())
}

fn instant_attr(element: &XmlElement, name: &str) -> SamlResult<Option<XmlDateTime>> {
    element
        .attr(name)
        .map(|value| {
            parse_xml_datetime(value)
                .map_err(|err| SamlError::invalid_attribute(&element.name, name, err.to_string()))
        })
        .transpose()
}

fn required_instant(element: &XmlElement, name: &str) -> SamlResult<XmlDateTime> {
    instant_attr(element, name)?
        .ok_or_else(|| SamlError::invalid_attribute(&element.name, name, "missing"))
}

fn bool_attr(element: &XmlElement, name: &str) -> SamlResult<Option<bool>> {
    match element.attr(name) {
        None => Ok(None),
        Some("true" | "1") => Ok(Some(true)),
        Some("false" | "0") => Ok(Some(false)),
        Some(other) => Err(SamlError::invalid_attribute(
            &element.name,
            name,
            format!("{other:?} is not a boolean"),
        )),
    }
}

fn format_instant(instant: Option<&XmlDateTime>) -> Option<String> {
    instant.map(format_xml_datetime)
}

/// Attributes of `element` other than `known`.
fn other_attributes(element: &XmlElement, known: &[&str]) -> Vec<(String, String)> {
    element
        .attributes
        .iter()
        .filter(|(key, _)| !known.contains(&key.as_str()))
        .cloned()
        .collect()
}

/// Child elements of `element` except the `namespace` ones named in `known`.
fn other_children(element: &XmlElement, namespace: &str, known: &[&str]) -> Vec<XmlElement> {
    element
        .elements()
        .filter(|child| {
            child.namespace.as_deref() != Some(namespace) || !known.contains(&child.local_name())
        })
        .cloned()
        .collect()
}

/// Declares `prefix` for `namespace` unless the preserved attributes already do.
fn declare(element: &mut XmlElement, prefix: &str, namespace: &str) {
    let key = format!("xmlns:{prefix}");
    if element.attr(&key).is_none() {
        element.set_attr(&key, namespace);
    }
}

/// Appends preserved attributes; ones the element already carries win.
fn append_others(element: &mut XmlElement, others: &[(String, String)]) {
    for (key, value) in others {
        if element.attr(key).is_none() {
            element.attributes.push((key.clone(), value.clone()));
        }
    }
}

fn expect_root(element: &XmlElement, namespace: &str, local: &str) -> SamlResult<()> {
    if element.is(namespace, local) {
        Ok(())
    } else {
        Err(SamlError::UnsupportedMessage(format!(
            "expected {{{namespace}}}{local}, found {}",
            element.name
        )))
    }
}
