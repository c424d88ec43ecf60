//! `sts validate`.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sts_core::time::{format_xml_datetime, parse_xml_datetime};
use sts_protocol_saml::Assertion;

use crate::cli::{OutputFormat, ValidateArgs};
use crate::output::{field, json, success};
use crate::{CliError, CliResult};

/// Outcome of checking an assertion's window.
#[derive(Debug, Serialize)]
pub struct ValidationReport {
    /// Assertion id.
    pub id: String,
    /// Subject name, if any.
    pub subject: Option<String>,
    /// Lower bound of the window.
    pub not_before: Option<String>,
    /// Upper bound of the window.
    pub not_on_or_after: Option<String>,
    /// Instant the check was made at.
    pub checked_at: String,
    /// Whether the instant falls inside the window.
    pub valid: bool,
}

/// Runs `sts validate`. Exits with an error when the assertion is outside its window.
pub fn run_validate(args: &ValidateArgs, format: OutputFormat) -> CliResult<()> {
    let at = match &args.at {
        Some(value) => parse_xml_datetime(value)?.with_timezone(&Utc),
        None => Utc::now(),
    };
    let report = check_file(&args.file, at)?;

    if !json(&report, format)? {
        if report.valid {
            success(&format!("assertion {} is valid", report.id));
        } else {
            println!("assertion {} is outside its validity window", report.id);
        }
        if let Some(subject) = &report.subject {
            field("subject", subject);
        }
        field("not before", report.not_before.as_deref().unwrap_or("-"));
        field("not on or after", report.not_on_or_after.as_deref().unwrap_or("-"));
        field("checked at", &report.checked_at);
    }

    if report.valid {
        Ok(())
    } else {
        Err(CliError::Invalid(format!("assertion {} has expired", report.id)))
    }
}

/// Reads the assertion in `path` and checks it at `at`.
pub fn check_file(path: &Path, at: DateTime<Utc>) -> CliResult<ValidationReport> {
    let xml = std::fs::read_to_string(path)?;
    let assertion = Assertion::from_xml(&xml)?;
    Ok(check(&assertion, at))
}

fn check(assertion: &Assertion, at: DateTime<Utc>) -> ValidationReport {
    let conditions = assertion.conditions.as_ref();
    let valid = assertion.is_valid_at(at);
    tracing::debug!(id = %assertion.id, valid, "checked assertion window");
    ValidationReport {
        id: assertion.id.clone(),
        subject: assertion.subject_name().map(str::to_string),
        not_before: conditions
            .and_then(|c| c.not_before.as_ref())
            .map(format_xml_datetime),
        not_on_or_after: conditions
            .and_then(|c| c.not_on_or_after.as_ref())
            .map(format_xml_datetime),
        checked_at: format_xml_datetime(&at.fixed_offset()),
        valid,
    }
}
