//! # sts-spi
//!
//! Explicit factory registries for the pluggable parts of the security token
//! service: token providers, token and revocation registries, and SAML
//! handlers.
//!
//! A [`FactoryRegistry`] maps a discriminator (a provider id) to a
//! [`ProviderFactory`]. Deployments register the factories they ship with at
//! startup; configuration then names a factory id and gets back a typed
//! instance or a configuration error.
//!
//! - [`ProviderFactory`] - creates instances of one kind of provider
//! - [`FnFactory`] - a factory backed by a closure
//! - [`FactoryRegistry`] - id to factory lookup for one extension point

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod provider;
pub mod registry;

pub use provider::{FactoryConfig, FnFactory, ProviderFactory, ProviderMetadata, SpiError};
pub use registry::FactoryRegistry;
