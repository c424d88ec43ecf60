//! # sts-token
//!
//! Security token providers and the dispatcher that drives their lifecycle.
//!
//! A request arrives as a [`ProtocolContext`]. [`CoreSts`] checks that the
//! caller may use the STS, picks the [`SecurityTokenProvider`] configured for
//! the context and asks it to issue, renew, cancel or validate the token the
//! context carries.
//!
//! - [`context`] - per-request contexts for each token family
//! - [`provider`] - the provider contract and its registry plumbing
//! - [`saml20`] / [`saml11`] - assertion providers
//! - [`wstrust`] - SAML 2.0 assertions for WS-Trust requests
//! - [`config`] - STS settings and provider lookup tables
//! - [`factory`] - provider instantiation by factory id
//! - [`permission`] - caller authorization
//! - [`sts`] - the dispatcher

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod context;
pub mod factory;
pub mod permission;
pub mod provider;
pub mod saml11;
pub mod saml20;
pub mod sts;
pub mod wstrust;

pub use config::{
    ServiceProviderSettings, StsConfiguration, StsConfigurationBuilder, StsSettings,
    TokenProviderSettings,
};
pub use context::{
    CustomContext, OAuthContext, ProtocolContext, QName, Saml11ProtocolContext,
    SamlProtocolContext, TokenFamily, WsTrustContext,
};
pub use factory::TokenProviderFactories;
pub use permission::{
    AllowAll, Caller, DenyAll, PermissionChecker, RoleBasedPermissionChecker, STS_PERMISSION,
};
pub use provider::{ProviderEnvironment, SecurityTokenProvider, TokenStore};
pub use saml11::{SAML11_PROVIDER_ID, Saml11AssertionTokenProvider};
pub use saml20::{SAML20_PROVIDER_ID, Saml20AssertionTokenProvider};
pub use sts::CoreSts;
pub use wstrust::{WSTRUST_SAML20_PROVIDER_ID, WsTrustSaml20TokenProvider};
