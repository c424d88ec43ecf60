//! Typed configuration.
//!
//! Token providers are configured from a flat `String -> String` option map.
//! [`ProviderConfig::from_options`] turns that map into a typed struct and
//! rejects keys it does not know, so a misspelt option fails at startup
//! instead of being silently ignored.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::error::{StsError, StsResult};
use crate::time::parse_zone;

/// Environment variable overriding the issue-instant timezone.
pub const TIMEZONE_ENV: &str = "STS_TIMEZONE";

/// Default assertion validity, in milliseconds.
pub const DEFAULT_ASSERTION_VALIDITY_MS: i64 = 5_000;

/// Default clock skew, in milliseconds.
pub const DEFAULT_CLOCK_SKEW_MS: i64 = 2_000;

/// Option keys understood by token providers.
pub mod keys {
    /// Assertion lifetime in milliseconds.
    pub const ASSERTION_VALIDITY: &str = "ASSERTION_VALIDITY";
    /// Older spelling of [`ASSERTION_VALIDITY`].
    pub const ASSERTIONS_VALIDITY: &str = "ASSERTIONS_VALIDITY";
    /// Clock skew in milliseconds.
    pub const CLOCK_SKEW: &str = "CLOCK_SKEW";
    /// Token registry back-end.
    pub const TOKEN_REGISTRY: &str = "TokenRegistry";
    /// File used by the file token registry.
    pub const TOKEN_REGISTRY_FILE: &str = "TokenRegistryFile";
    /// Revocation registry back-end.
    pub const REVOCATION_REGISTRY: &str = "RevocationRegistry";
    /// File used by the file revocation registry.
    pub const REVOCATION_REGISTRY_FILE: &str = "RevocationRegistryFile";
}

/// Timezone used for issue instants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeConfig {
    /// `GMT`, `UTC`, `Z` or a `±HH:MM` offset.
    pub timezone: String,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            timezone: "GMT".to_string(),
        }
    }
}

impl TimeConfig {
    /// Creates a config for the given timezone designator.
    #[must_use]
    pub fn new(timezone: impl Into<String>) -> Self {
        Self {
            timezone: timezone.into(),
        }
    }

    /// Reads the timezone from `STS_TIMEZONE`, falling back to GMT.
    #[must_use]
    pub fn from_env() -> Self {
        std::env::var(TIMEZONE_ENV).map_or_else(|_| Self::default(), Self::new)
    }

    /// Resolves the configured timezone.
    ///
    /// ## Errors
    ///
    /// Returns an invalid-format error if the designator cannot be parsed.
    pub fn zone(&self) -> StsResult<FixedOffset> {
        parse_zone(&self.timezone)
    }
}

/// Where a registry keeps its entries.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryKind {
    /// In process memory.
    #[default]
    Memory,
    /// In a JSON file.
    File(PathBuf),
    /// A back-end registered under this id.
    Named(String),
}

impl RegistryKind {
    fn from_option(
        kind: Option<&str>,
        file: Option<&str>,
        kind_key: &str,
        file_key: &str,
    ) -> StsResult<Self> {
        let kind = kind.map(str::trim).filter(|kind| !kind.is_empty());
        match kind {
            None if file.is_some() => Err(StsError::Configuration(format!(
                "{file_key} is set but {kind_key} is not FILE"
            ))),
            None => Ok(Self::Memory),
            Some(kind)
                if kind.eq_ignore_ascii_case("MEMORY") || kind.eq_ignore_ascii_case("DEFAULT") =>
            {
                Ok(Self::Memory)
            }
            Some(kind) if kind.eq_ignore_ascii_case("FILE") => file
                .map(|path| Self::File(PathBuf::from(path)))
                .ok_or_else(|| {
                    StsError::Configuration(format!("{kind_key}=FILE requires {file_key}"))
                }),
            Some(other) => Ok(Self::Named(other.to_string())),
        }
    }
}

/// Typed per-provider configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Lifetime of issued assertions, in milliseconds.
    pub assertion_validity_ms: i64,
    /// Tolerance added to both ends of the validity window, in milliseconds.
    pub clock_skew_ms: i64,
    /// Token registry back-end.
    pub token_registry: RegistryKind,
    /// Revocation registry back-end.
    pub revocation_registry: RegistryKind,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            assertion_validity_ms: DEFAULT_ASSERTION_VALIDITY_MS,
            clock_skew_ms: DEFAULT_CLOCK_SKEW_MS,
            token_registry: RegistryKind::Memory,
            revocation_registry: RegistryKind::Memory,
        }
    }
}

impl ProviderConfig {
    /// Builds a config from a provider's option map.
    ///
    /// ## Errors
    ///
    /// Returns a configuration error for unknown keys, non-integer or negative
    /// durations, and a `FILE` registry without a file.
    pub fn from_options(options: &HashMap<String, String>) -> StsResult<Self> {
        let mut unknown: Vec<&str> = options
            .keys()
            .map(String::as_str)
            .filter(|key| !is_known_key(key))
            .collect();
        if !unknown.is_empty() {
            unknown.sort_unstable();
            return Err(StsError::Configuration(format!(
                "unknown provider option(s): {}",
                unknown.join(", ")
            )));
        }

        let get = |key: &str| options.get(key).map(String::as_str);

        let validity = match (get(keys::ASSERTION_VALIDITY), get(keys::ASSERTIONS_VALIDITY)) {
            (Some(_), Some(_)) => {
                return Err(StsError::Configuration(format!(
                    "{} and {} are both set",
                    keys::ASSERTION_VALIDITY,
                    keys::ASSERTIONS_VALIDITY
                )));
            }
            (Some(value), None) => parse_millis(keys::ASSERTION_VALIDITY, value)?,
            (None, Some(value)) => parse_millis(keys::ASSERTIONS_VALIDITY, value)?,
            (None, None) => DEFAULT_ASSERTION_VALIDITY_MS,
        };

        let skew = get(keys::CLOCK_SKEW)
            .map(|value| parse_millis(keys::CLOCK_SKEW, value))
            .transpose()?
            .unwrap_or(DEFAULT_CLOCK_SKEW_MS);

        Ok(Self {
            assertion_validity_ms: validity,
            clock_skew_ms: skew,
            token_registry: RegistryKind::from_option(
                get(keys::TOKEN_REGISTRY),
                get(keys::TOKEN_REGISTRY_FILE),
                keys::TOKEN_REGISTRY,
                keys::TOKEN_REGISTRY_FILE,
            )?,
            revocation_registry: RegistryKind::from_option(
                get(keys::REVOCATION_REGISTRY),
                get(keys::REVOCATION_REGISTRY_FILE),
                keys::REVOCATION_REGISTRY,
                keys::REVOCATION_REGISTRY_FILE,
            )?,
        })
    }

    /// Overrides the validity.
    #[must_use]
    pub const fn with_validity_ms(mut self, millis: i64) -> Self {
        self.assertion_validity_ms = millis;
        self
    }

    /// Overrides the clock skew.
    #[must_use]
    pub const fn with_clock_skew_ms(mut self, millis: i64) -> Self {
        self.clock_skew_ms = millis;
        self
    }
}

fn is_known_key(key: &str) -> bool {
    matches!(
        key,
        keys::ASSERTION_VALIDITY
            | keys::ASSERTIONS_VALIDITY
            | keys::CLOCK_SKEW
            | keys::TOKEN_REGISTRY
            | keys::TOKEN_REGISTRY_FILE
            | keys::REVOCATION_REGISTRY
            | keys::REVOCATION_REGISTRY_FILE
    )
}

fn parse_millis(key: &str, value: &str) -> StsResult<i64> {
    match value.trim().parse::<i64>() {
        Ok(millis) if millis >= 0 => Ok(millis),
        _ => Err(StsError::Configuration(format!(
            "{key} must be a non-negative number of milliseconds, got {value:?}"
        ))),
    }
}
