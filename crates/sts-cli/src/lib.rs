//! # sts-cli
//!
//! The `sts` command-line tool:
//! - issue SAML 2.0 assertions from command-line options or a settings file
//! - check an assertion document's validity window
//! - parse cache durations
//! - encode protocol messages for the HTTP-Redirect and HTTP-POST bindings

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;

pub use cli::Cli;
pub use error::{CliError, CliResult};
