//! CLI argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Security token service tool: issue, validate and encode SAML tokens.
#[derive(Debug, Parser)]
#[command(name = "sts")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// STS settings file (TOML).
    #[arg(short, long, env = "STS_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format.
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    pub output: OutputFormat,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Issue a SAML 2.0 assertion and print it.
    Issue(IssueArgs),

    /// Check the validity window of an assertion document.
    Validate(ValidateArgs),

    /// Parse a cache duration.
    Duration {
        /// `xs:duration` value or a millisecond count.
        value: String,
    },

    /// Encode a protocol message for an HTTP binding.
    Encode(EncodeArgs),
}

/// Arguments of `sts issue`.
#[derive(Debug, clap::Args)]
pub struct IssueArgs {
    /// Issuer entity id.
    #[arg(long)]
    pub issuer: String,

    /// Subject name.
    #[arg(long)]
    pub subject: String,

    /// Audience restriction.
    #[arg(long)]
    pub audience: Option<String>,

    /// Assertion lifetime in milliseconds (ignored with --config).
    #[arg(long)]
    pub validity: Option<u64>,

    /// Clock skew in milliseconds (ignored with --config).
    #[arg(long)]
    pub skew: Option<u64>,
}

/// Arguments of `sts validate`.
#[derive(Debug, clap::Args)]
pub struct ValidateArgs {
    /// File holding the assertion XML.
    pub file: PathBuf,

    /// Instant to validate at (`xs:dateTime`), defaults to now.
    #[arg(long)]
    pub at: Option<String>,
}

/// Arguments of `sts encode`.
#[derive(Debug, clap::Args)]
pub struct EncodeArgs {
    /// Binding to encode for.
    #[arg(long, value_enum, default_value = "redirect")]
    pub binding: Binding,

    /// Endpoint the message is sent to.
    #[arg(long)]
    pub destination: String,

    /// Relay state to carry along.
    #[arg(long)]
    pub relay_state: Option<String>,

    /// File holding the message XML.
    pub file: PathBuf,
}

/// HTTP bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Binding {
    /// Deflated message in a redirect URL.
    Redirect,
    /// Base64 message in an auto-submitting form.
    Post,
}

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output.
    #[default]
    Text,
    /// JSON.
    Json,
}
