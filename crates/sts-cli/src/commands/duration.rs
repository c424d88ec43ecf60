//! `sts duration`.

use serde::Serialize;
use sts_core::parse_as_duration;

use crate::cli::OutputFormat;
use crate::output::{field, json};
use crate::CliResult;

#[derive(Debug, Serialize)]
struct ParsedDuration {
    duration: String,
    millis: Option<i64>,
}

/// Runs `sts duration`.
pub fn run_duration(value: &str, format: OutputFormat) -> CliResult<()> {
    let duration = parse_as_duration(value)?;
    let parsed = ParsedDuration {
        duration: duration.to_string(),
        millis: duration.total_millis(),
    };
    if json(&parsed, format)? {
        return Ok(());
    }

    field("duration", &parsed.duration);
    match parsed.millis {
        Some(millis) => field("milliseconds", &millis.to_string()),
        None => field("milliseconds", "calendar dependent"),
    }
    Ok(())
}
