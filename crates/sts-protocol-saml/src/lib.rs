//! SAML protocol support for the security token service.
//!
//! - [`types`] - SAML 2.0 protocol messages and assertions, SAML 1.1 assertions
//! - [`xml`] - the namespace-aware element tree the types are read from and
//!   written to
//! - [`bindings`] - HTTP-POST and HTTP-Redirect encoding
//! - [`error`] - [`SamlError`] and its mapping onto SAML status codes
//!
//! Parsing and serialising keep attributes and elements a type does not
//! model, so a document can be read, changed and written back without losing
//! content.
//!
//! # Example
//!
//! ```rust,ignore
//! use sts_protocol_saml::{Assertion, NameId};
//!
//! let mut assertion = Assertion::new(generate_id(), NameId::entity("https://idp"), now);
//! assertion.create_timed_conditions(5_000, 2_000)?;
//! let xml = assertion.to_xml();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bindings;
pub mod constants;
pub mod error;
pub mod types;
pub mod xml;

pub use error::{SamlError, SamlResult};
pub use types::*;
