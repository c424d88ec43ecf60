//! Cross-crate scenarios: token lifecycle through the STS, SAML handler
//! chains on both sides of a browser SSO exchange, and SP message delivery.

mod expiry;
mod handler_chain;
mod sp_workflow;
mod token_lifecycle;
