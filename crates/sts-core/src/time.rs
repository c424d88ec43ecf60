//! Time handling for security assertions.
//!
//! Every validity decision in the service goes through [`is_valid`], and every
//! timestamp the service writes comes from an [`XmlTime`]. The clock is always
//! injected so that the whole token lifecycle can be driven by a
//! [`ManualClock`] in tests.

use std::fmt::Debug;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, SecondsFormat, TimeDelta, Utc};
use parking_lot::RwLock;

use crate::config::TimeConfig;
use crate::error::{StsError, StsResult};

/// An XML-Schema `dateTime` value with an explicit offset.
pub type XmlDateTime = DateTime<FixedOffset>;

/// Source of the current instant.
pub trait Clock: Send + Sync + Debug {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    /// Creates a clock frozen at the current wall-clock instant.
    #[must_use]
    pub fn starting_now() -> Self {
        Self::new(Utc::now())
    }

    /// Moves the clock to `instant`.
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.write() = instant;
    }

    /// Moves the clock by `delta`. Negative deltas move it backward.
    pub fn advance(&self, delta: TimeDelta) {
        let mut now = self.now.write();
        if let Some(next) = now.checked_add_signed(delta) {
            *now = next;
        }
    }

    /// Moves the clock by `millis`.
    pub fn advance_millis(&self, millis: i64) {
        if let Some(delta) = TimeDelta::try_milliseconds(millis) {
            self.advance(delta);
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}

/// Produces issue instants in the configured timezone.
#[derive(Debug, Clone)]
pub struct XmlTime {
    clock: Arc<dyn Clock>,
    zone: FixedOffset,
}

impl XmlTime {
    /// Creates a time source from a clock and a fixed offset.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, zone: FixedOffset) -> Self {
        Self { clock, zone }
    }

    /// Wall-clock time in UTC.
    #[must_use]
    pub fn system() -> Self {
        Self::new(Arc::new(SystemClock), Utc.fix())
    }

    /// Creates a time source honoring the timezone override in `config`.
    ///
    /// ## Errors
    ///
    /// Returns an error if the configured timezone cannot be parsed.
    pub fn from_config(clock: Arc<dyn Clock>, config: &TimeConfig) -> StsResult<Self> {
        Ok(Self::new(clock, config.zone()?))
    }

    /// Returns the current instant in the configured timezone.
    #[must_use]
    pub fn issue_instant(&self) -> XmlDateTime {
        self.clock.now().with_timezone(&self.zone)
    }

    /// Returns the current instant in UTC.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Returns the configured offset.
    #[must_use]
    pub const fn zone(&self) -> FixedOffset {
        self.zone
    }

    /// Returns the underlying clock.
    #[must_use]
    pub const fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

impl Default for XmlTime {
    fn default() -> Self {
        Self::system()
    }
}

/// Returns `instant + millis`.
///
/// ## Errors
///
/// Returns a processing error if the result is not representable.
pub fn add(instant: &XmlDateTime, millis: i64) -> StsResult<XmlDateTime> {
    TimeDelta::try_milliseconds(millis)
        .and_then(|delta| instant.checked_add_signed(delta))
        .ok_or_else(|| StsError::Processing(format!("{instant} + {millis}ms overflows")))
}

/// Returns `instant - millis`.
///
/// ## Errors
///
/// Returns a processing error if the result is not representable.
pub fn subtract(instant: &XmlDateTime, millis: i64) -> StsResult<XmlDateTime> {
    TimeDelta::try_milliseconds(millis)
        .and_then(|delta| instant.checked_sub_signed(delta))
        .ok_or_else(|| StsError::Processing(format!("{instant} - {millis}ms overflows")))
}

/// Returns true iff `not_before <= now < not_on_or_after`.
#[must_use]
pub fn is_valid(
    now: &XmlDateTime,
    not_before: &XmlDateTime,
    not_on_or_after: &XmlDateTime,
) -> bool {
    not_before <= now && now < not_on_or_after
}

/// Formats an instant as an XML-Schema `dateTime`.
///
/// Fractional seconds are only written when present; a zero offset is written as `Z`.
#[must_use]
pub fn format_xml_datetime(instant: &XmlDateTime) -> String {
    instant.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Parses an XML-Schema `dateTime`.
///
/// Values without a timezone designator are read as UTC.
///
/// ## Errors
///
/// Returns an invalid-format error if `value` is not a `dateTime`.
pub fn parse_xml_datetime(value: &str) -> StsResult<XmlDateTime> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed);
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc().fixed_offset())
        .map_err(|_| StsError::InvalidFormat {
            value: value.to_string(),
            expected: "xs:dateTime",
        })
}

/// Parses a timezone designator: `GMT`, `UTC`, `Z`, `±HH:MM`, `±HHMM`, `±HH`,
/// optionally prefixed with `GMT` or `UTC`.
///
/// ## Errors
///
/// Returns an invalid-format error for anything else.
pub fn parse_zone(value: &str) -> StsResult<FixedOffset> {
    let invalid = || StsError::InvalidFormat {
        value: value.to_string(),
        expected: "timezone",
    };

    let trimmed = value.trim();
    let upper = trimmed.to_ascii_uppercase();
    let rest = upper
        .strip_prefix("GMT")
        .or_else(|| upper.strip_prefix("UTC"))
        .unwrap_or(&upper);

    if rest.is_empty() || rest == "Z" {
        return Ok(Utc.fix());
    }

    let (sign, digits) = match rest.as_bytes().first() {
        Some(b'+') => (1, &rest[1..]),
        Some(b'-') => (-1, &rest[1..]),
        _ => return Err(invalid()),
    };

    let digits: String = digits.chars().filter(|c| *c != ':').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let (hours, minutes) = match digits.len() {
        1 | 2 => (digits.parse::<i32>().map_err(|_| invalid())?, 0),
        4 => (
            digits[..2].parse::<i32>().map_err(|_| invalid())?,
            digits[2..].parse::<i32>().map_err(|_| invalid())?,
        ),
        _ => return Err(invalid()),
    };
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}
