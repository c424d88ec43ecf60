//! Output formatting utilities.

use colored::Colorize;
use serde::Serialize;

use crate::cli::OutputFormat;

/// Prints a success message.
pub fn success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Prints an error message.
pub fn error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Prints a `key: value` line.
pub fn field(key: &str, value: &str) {
    println!("  {:<16} {}", format!("{key}:").bold(), value);
}

/// Prints `item` as pretty JSON when `format` asks for it.
///
/// Returns false for text output, leaving the caller to print.
pub fn json<T: Serialize>(item: &T, format: OutputFormat) -> crate::CliResult<bool> {
    if format != OutputFormat::Json {
        return Ok(false);
    }
    println!("{}", serde_json::to_string_pretty(item)?);
    Ok(true)
}
