//! # sts-handlers
//!
//! SAML2 handler chain for browser single sign-on and single logout.
//!
//! A [`HandlerChain`] runs its [`SamlHandler`]s in order over a
//! [`HandlerRequest`], each one contributing to the [`HandlerResponse`] or
//! stopping the chain. The same built-in handlers serve both sides of the
//! exchange, configured with [`HandlerRole::Idp`] or [`HandlerRole::Sp`].
//!
//! - [`handler`] - the handler contract and chain configuration
//! - [`request`] - request and response passed along the chain
//! - [`chain`] - ordered execution and settings-driven construction
//! - [`handlers`] - authentication, logout, issuer trust, attributes, signing
//! - [`factory`] - handler instantiation by name
//! - [`workflow`] - delivery of SP messages over the HTTP bindings

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod chain;
pub mod factory;
pub mod handler;
pub mod handlers;
pub mod request;
pub mod workflow;

pub use chain::{HandlerChain, HandlerChainSettings, HandlerSettings};
pub use factory::{HandlerEnvironment, HandlerFactories};
pub use handler::{
    ChainConfig, HandlerOutcome, HandlerRole, MAX_CLOCK_SKEW_MS, SamlHandler, check_clock_skew,
};
pub use request::{
    GenerationMode, HandlerError, HandlerRequest, HandlerResponse, RequestOptions,
};
pub use workflow::{
    BindingOutput, DefaultRedirectionHandler, RedirectionHandler, RequestParams,
    ServiceProviderSamlWorkflow,
};
