//! A small XML element tree.
//!
//! SAML documents are parsed into [`XmlElement`] trees with namespaces
//! resolved, mapped onto typed structures, and written back out. Attributes
//! keep their document order and elements the codec does not understand are
//! carried through untouched, so a parse, mutate, serialise cycle only changes
//! what was changed.

use std::fmt::Write as _;

use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};

use crate::error::{SamlError, SamlResult};

/// A node inside an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    /// Child element.
    Element(XmlElement),
    /// Character data.
    Text(String),
}

/// An XML element with its resolved namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    /// Qualified name as written (`saml:Assertion`).
    pub name: String,
    /// Namespace URI the prefix resolved to.
    pub namespace: Option<String>,
    /// Attributes in document order, namespace declarations included.
    pub attributes: Vec<(String, String)>,
    /// Child nodes.
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    /// Creates an element named `prefix:local` in `namespace`.
    #[must_use]
    pub fn qualified(prefix: &str, local: &str, namespace: &str) -> Self {
        let name = if prefix.is_empty() {
            local.to_string()
        } else {
            format!("{prefix}:{local}")
        };
        Self {
            name,
            namespace: Some(namespace.to_string()),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Returns the name without its prefix.
    #[must_use]
    pub fn local_name(&self) -> &str {
        self.name
            .split_once(':')
            .map_or(self.name.as_str(), |(_, local)| local)
    }

    /// Returns true if this element is `{namespace}local`.
    #[must_use]
    pub fn is(&self, namespace: &str, local: &str) -> bool {
        self.local_name() == local && self.namespace.as_deref() == Some(namespace)
    }

    /// Looks up an attribute by qualified name.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Returns a required attribute.
    ///
    /// ## Errors
    ///
    /// Returns [`SamlError::InvalidAttribute`] if it is absent.
    pub fn required_attr(&self, name: &str) -> SamlResult<&str> {
        self.attr(name)
            .ok_or_else(|| SamlError::invalid_attribute(&self.name, name, "missing"))
    }

    /// Sets an attribute, replacing an existing value in place.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| key == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    /// Sets an attribute.
    #[must_use]
    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Sets an attribute if `value` is present.
    #[must_use]
    pub fn with_opt_attr(mut self, name: &str, value: Option<impl Into<String>>) -> Self {
        if let Some(value) = value {
            self.set_attr(name, value);
        }
        self
    }

    /// Appends a child element.
    pub fn push(&mut self, child: Self) {
        self.children.push(XmlNode::Element(child));
    }

    /// Appends a child element.
    #[must_use]
    pub fn with_child(mut self, child: Self) -> Self {
        self.push(child);
        self
    }

    /// Appends character data.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(text.into()));
        self
    }

    /// Concatenated character data of the direct children.
    #[must_use]
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                XmlNode::Text(text) => Some(text.as_str()),
                XmlNode::Element(_) => None,
            })
            .collect()
    }

    /// Iterates over the child elements.
    pub fn elements(&self) -> impl Iterator<Item = &Self> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(element) => Some(element),
            XmlNode::Text(_) => None,
        })
    }

    /// First child element named `{namespace}local`.
    #[must_use]
    pub fn child(&self, namespace: &str, local: &str) -> Option<&Self> {
        self.elements().find(|element| element.is(namespace, local))
    }

    /// All child elements named `{namespace}local`.
    pub fn children_named<'a>(
        &'a self,
        namespace: &'a str,
        local: &'a str,
    ) -> impl Iterator<Item = &'a Self> + 'a {
        self.elements()
            .filter(move |element| element.is(namespace, local))
    }

    /// Parses a document and returns its root element.
    ///
    /// ## Errors
    ///
    /// Returns [`SamlError::XmlParse`] for malformed documents.
    pub fn parse(xml: &str) -> SamlResult<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut scopes: Vec<Vec<(String, String)>> = Vec::new();
        let mut open: Vec<Self> = Vec::new();
        let mut root = None;

        loop {
            match reader.read_event()? {
                Event::Start(start) => {
                    let element = open_element(&start, &mut scopes)?;
                    open.push(element);
                }
                Event::Empty(start) => {
                    let element = open_element(&start, &mut scopes)?;
                    scopes.pop();
                    attach(element, &mut open, &mut root)?;
                }
                Event::End(_) => {
                    scopes.pop();
                    let element = open
                        .pop()
                        .ok_or_else(|| SamlError::XmlParse("unbalanced end tag".to_string()))?;
                    attach(element, &mut open, &mut root)?;
                }
                Event::Text(text) => {
                    let text = text.unescape()?;
                    if let Some(parent) = open.last_mut() {
                        parent.children.push(XmlNode::Text(text.into_owned()));
                    }
                }
                Event::CData(data) => {
                    let text = String::from_utf8(data.into_inner().into_owned())
                        .map_err(|err| SamlError::XmlParse(err.to_string()))?;
                    if let Some(parent) = open.last_mut() {
                        parent.children.push(XmlNode::Text(text));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !open.is_empty() {
            return Err(SamlError::XmlParse("unexpected end of document".to_string()));
        }
        root.ok_or_else(|| SamlError::XmlParse("document has no root element".to_string()))
    }

    /// Serialises the element and its subtree.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write_into(&mut out);
        out
    }

    fn write_into(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attributes {
            let _ = write!(out, " {key}=\"{}\"", escape(value.as_str()));
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            match child {
                XmlNode::Element(element) => element.write_into(out),
                XmlNode::Text(text) => out.push_str(&escape(text.as_str())),
            }
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

fn open_element(
    start: &BytesStart<'_>,
    scopes: &mut Vec<Vec<(String, String)>>,
) -> SamlResult<XmlElement> {
    let name = utf8(start.name().as_ref())?;

    let mut attributes = Vec::new();
    let mut declared = Vec::new();
    for attr in start.attributes() {
        let attr = attr?;
        let key = utf8(attr.key.as_ref())?;
        let value = attr.unescape_value()?.into_owned();
        if key == "xmlns" {
            declared.push((String::new(), value.clone()));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            declared.push((prefix.to_string(), value.clone()));
        }
        attributes.push((key, value));
    }
    scopes.push(declared);

    let prefix = name.split_once(':').map_or("", |(prefix, _)| prefix);
    let namespace = resolve(scopes, prefix);
    if namespace.is_none() && !prefix.is_empty() {
        return Err(SamlError::XmlParse(format!(
            "unbound prefix {prefix:?} on {name}"
        )));
    }

    Ok(XmlElement {
        name,
        namespace,
        attributes,
        children: Vec::new(),
    })
}

fn resolve(scopes: &[Vec<(String, String)>], prefix: &str) -> Option<String> {
    scopes
        .iter()
        .rev()
        .flat_map(|scope| scope.iter())
        .find(|(declared, _)| declared == prefix)
        .map(|(_, uri)| uri.clone())
        .filter(|uri| !uri.is_empty())
}

fn attach(
    element: XmlElement,
    open: &mut [XmlElement],
    root: &mut Option<XmlElement>,
) -> SamlResult<()> {
    match open.last_mut() {
        Some(parent) => {
            parent.push(element);
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(SamlError::XmlParse("more than one root element".to_string())),
    }
}

fn utf8(bytes: &[u8]) -> SamlResult<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|err| SamlError::XmlParse(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<?xml version="1.0"?>
<saml:Assertion xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="ID_1" Custom="kept">
    <saml:Issuer>https://idp.example.com</saml:Issuer>
    <ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#"><ds:SignatureValue>abc</ds:SignatureValue></ds:Signature>
    <Extra xmlns="urn:example">a &amp; b</Extra>
</saml:Assertion>"#;

    #[test]
    fn resolves_namespaces() {
        let root = XmlElement::parse(DOC).unwrap();
        assert!(root.is("urn:oasis:names:tc:SAML:2.0:assertion", "Assertion"));
        assert_eq!(root.attr("Custom"), Some("kept"));

        let issuer = root
            .child("urn:oasis:names:tc:SAML:2.0:assertion", "Issuer")
            .unwrap();
        assert_eq!(issuer.text(), "https://idp.example.com");

        let signature = root
            .child("http://www.w3.org/2000/09/xmldsig#", "Signature")
            .unwrap();
        assert_eq!(signature.elements().count(), 1);

        let extra = root.child("urn:example", "Extra").unwrap();
        assert_eq!(extra.text(), "a & b");
    }

    #[test]
    fn serialises_what_it_parsed() {
        let root = XmlElement::parse(DOC).unwrap();
        let again = XmlElement::parse(&root.to_xml()).unwrap();
        assert_eq!(root, again);
        assert!(root.to_xml().contains("a &amp; b"));
    }

    #[test]
    fn set_attr_keeps_position() {
        let mut root = XmlElement::parse(DOC).unwrap();
        root.set_attr("ID", "ID_2");
        assert_eq!(root.attributes[1], ("ID".to_string(), "ID_2".to_string()));
        assert_eq!(root.attributes.len(), 3);
    }

    #[test]
    fn rejects_malformed_documents() {
        assert!(matches!(
            XmlElement::parse("<a><b></a>"),
            Err(SamlError::XmlParse(_))
        ));
        assert!(matches!(XmlElement::parse("<a>"), Err(SamlError::XmlParse(_))));
        assert!(matches!(XmlElement::parse(""), Err(SamlError::XmlParse(_))));
        assert!(matches!(
            XmlElement::parse("<p:a/>"),
            Err(SamlError::XmlParse(_))
        ));
    }
}
