//! XML-Schema durations.
//!
//! Metadata cache durations come in two shapes: an ISO-8601 duration such as
//! `P1Y10M3DT1H10M5S`, or a bare integer number of milliseconds left over from
//! older deployments. [`parse_as_duration`] accepts both.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{StsError, StsResult};

const MILLIS_PER_SECOND: u64 = 1_000;
const SECONDS_PER_MINUTE: u64 = 60;
const MINUTES_PER_HOUR: u64 = 60;
const HOURS_PER_DAY: u64 = 24;

/// An `xs:duration` broken into its components.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct XmlDuration {
    /// Whether the duration points into the past.
    pub negative: bool,
    /// Years.
    pub years: u64,
    /// Months.
    pub months: u64,
    /// Days.
    pub days: u64,
    /// Hours.
    pub hours: u64,
    /// Minutes.
    pub minutes: u64,
    /// Whole seconds.
    pub seconds: u64,
    /// Fractional seconds, in milliseconds.
    pub millis: u64,
}

impl XmlDuration {
    /// Builds a duration from a millisecond count, carrying into seconds,
    /// minutes, hours and days. Years and months are never produced.
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        let negative = millis < 0;
        let mut rest = millis.unsigned_abs();

        let ms = rest % MILLIS_PER_SECOND;
        rest /= MILLIS_PER_SECOND;
        let seconds = rest % SECONDS_PER_MINUTE;
        rest /= SECONDS_PER_MINUTE;
        let minutes = rest % MINUTES_PER_HOUR;
        rest /= MINUTES_PER_HOUR;
        let hours = rest % HOURS_PER_DAY;
        let days = rest / HOURS_PER_DAY;

        Self {
            negative,
            years: 0,
            months: 0,
            days,
            hours,
            minutes,
            seconds,
            millis: ms,
        }
    }

    /// Total length in milliseconds.
    ///
    /// Returns `None` when the duration has year or month components, whose
    /// length depends on the calendar, or when the total overflows.
    #[must_use]
    pub fn total_millis(&self) -> Option<i64> {
        if self.years != 0 || self.months != 0 {
            return None;
        }
        let total = self
            .days
            .checked_mul(HOURS_PER_DAY)?
            .checked_add(self.hours)?
            .checked_mul(MINUTES_PER_HOUR)?
            .checked_add(self.minutes)?
            .checked_mul(SECONDS_PER_MINUTE)?
            .checked_add(self.seconds)?
            .checked_mul(MILLIS_PER_SECOND)?
            .checked_add(self.millis)?;
        let total = i64::try_from(total).ok()?;
        Some(if self.negative { -total } else { total })
    }

    fn is_zero(&self) -> bool {
        self.years == 0
            && self.months == 0
            && self.days == 0
            && self.hours == 0
            && self.minutes == 0
            && self.seconds == 0
            && self.millis == 0
    }
}

impl fmt::Display for XmlDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return f.write_str("PT0S");
        }
        if self.negative {
            f.write_str("-")?;
        }
        f.write_str("P")?;
        if self.years != 0 {
            write!(f, "{}Y", self.years)?;
        }
        if self.months != 0 {
            write!(f, "{}M", self.months)?;
        }
        if self.days != 0 {
            write!(f, "{}D", self.days)?;
        }
        if self.hours != 0 || self.minutes != 0 || self.seconds != 0 || self.millis != 0 {
            f.write_str("T")?;
            if self.hours != 0 {
                write!(f, "{}H", self.hours)?;
            }
            if self.minutes != 0 {
                write!(f, "{}M", self.minutes)?;
            }
            if self.millis != 0 {
                write!(f, "{}.{:03}S", self.seconds, self.millis)?;
            } else if self.seconds != 0 {
                write!(f, "{}S", self.seconds)?;
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for XmlDuration {
    type Err = StsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_as_duration(s)
    }
}

/// Parses a cache duration.
///
/// A bare integer is read as milliseconds and normalised, so `"1000"` is one
/// second and `"60000"` is one minute. Anything else must be an ISO-8601
/// duration.
///
/// ## Errors
///
/// Returns [`StsError::InvalidFormat`] when `value` is neither.
pub fn parse_as_duration(value: &str) -> StsResult<XmlDuration> {
    let value = value.trim();
    if let Ok(millis) = value.parse::<i64>() {
        return Ok(XmlDuration::from_millis(millis));
    }
    parse_iso(value).ok_or_else(|| StsError::InvalidFormat {
        value: value.to_string(),
        expected: "duration",
    })
}

fn parse_iso(value: &str) -> Option<XmlDuration> {
    let mut duration = XmlDuration::default();

    let rest = match value.strip_prefix('-') {
        Some(rest) => {
            duration.negative = true;
            rest
        }
        None => value,
    };
    let rest = rest.strip_prefix('P')?;

    let (date_part, time_part) = match rest.split_once('T') {
        Some((date, time)) => {
            if time.is_empty() {
                return None;
            }
            (date, Some(time))
        }
        None => (rest, None),
    };

    let mut seen_any = false;

    // Designators must appear in this order and at most once.
    let mut date_order = ['Y', 'M', 'D'].iter();
    for (number, designator) in components(date_part)? {
        loop {
            let expected = date_order.next()?;
            if *expected == designator {
                break;
            }
        }
        let number: u64 = number.parse().ok()?;
        match designator {
            'Y' => duration.years = number,
            'M' => duration.months = number,
            'D' => duration.days = number,
            _ => return None,
        }
        seen_any = true;
    }

    if let Some(time_part) = time_part {
        let mut time_order = ['H', 'M', 'S'].iter();
        for (number, designator) in components(time_part)? {
            loop {
                let expected = time_order.next()?;
                if *expected == designator {
                    break;
                }
            }
            match designator {
                'H' => duration.hours = number.parse().ok()?,
                'M' => duration.minutes = number.parse().ok()?,
                'S' => {
                    let (whole, fraction) = match number.split_once('.') {
                        Some((whole, fraction)) => (whole, Some(fraction)),
                        None => (number, None),
                    };
                    duration.seconds = whole.parse().ok()?;
                    if let Some(fraction) = fraction {
                        duration.millis = fraction_to_millis(fraction)?;
                    }
                }
                _ => return None,
            }
            seen_any = true;
        }
    }

    seen_any.then_some(duration)
}

/// Splits `"1Y10M3D"` into `[("1", 'Y'), ("10", 'M'), ("3", 'D')]`.
fn components(part: &str) -> Option<Vec<(&str, char)>> {
    let mut out = Vec::new();
    let mut start = 0;
    for (index, c) in part.char_indices() {
        if c.is_ascii_digit() || c == '.' {
            continue;
        }
        let number = &part[start..index];
        if number.is_empty() || !c.is_ascii_uppercase() {
            return None;
        }
        out.push((number, c));
        start = index + c.len_utf8();
    }
    if start != part.len() {
        return None;
    }
    // Only seconds may carry a fraction.
    if out.iter().any(|(number, designator)| *designator != 'S' && number.contains('.')) {
        return None;
    }
    Some(out)
}

fn fraction_to_millis(fraction: &str) -> Option<u64> {
    if fraction.is_empty() || !fraction.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let padded: String = fraction.chars().chain("000".chars()).take(3).collect();
    padded.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_input_is_milliseconds() {
        let one_second = parse_as_duration("1000").unwrap();
        assert_eq!(
            one_second,
            XmlDuration {
                seconds: 1,
                ..XmlDuration::default()
            }
        );

        let one_minute = parse_as_duration("60000").unwrap();
        assert_eq!(
            one_minute,
            XmlDuration {
                minutes: 1,
                ..XmlDuration::default()
            }
        );
        assert_eq!(one_minute.to_string(), "PT1M");
    }

    #[test]
    fn numeric_input_carries_into_days() {
        let duration = parse_as_duration("90061001").unwrap();
        assert_eq!(duration.days, 1);
        assert_eq!(duration.hours, 1);
        assert_eq!(duration.minutes, 1);
        assert_eq!(duration.seconds, 1);
        assert_eq!(duration.millis, 1);
        assert_eq!(duration.total_millis(), Some(90_061_001));
    }

    #[test]
    fn iso_components() {
        let duration = parse_as_duration("P1Y10M3DT1H10M5S").unwrap();
        assert_eq!(duration.years, 1);
        assert_eq!(duration.months, 10);
        assert_eq!(duration.days, 3);
        assert_eq!(duration.hours, 1);
        assert_eq!(duration.minutes, 10);
        assert_eq!(duration.seconds, 5);
        assert!(!duration.negative);
        assert_eq!(duration.total_millis(), None);
        assert_eq!(duration.to_string(), "P1Y10M3DT1H10M5S");
    }

    #[test]
    fn iso_fraction_and_sign() {
        let duration = parse_as_duration("-PT1.5S").unwrap();
        assert!(duration.negative);
        assert_eq!(duration.seconds, 1);
        assert_eq!(duration.millis, 500);
        assert_eq!(duration.total_millis(), Some(-1_500));
    }

    #[test]
    fn rejects_garbage() {
        for value in ["X10A", "", "P", "PT", "P1H", "PT1D", "P1M1Y", "P1.5D", "1.5"] {
            let err = parse_as_duration(value).unwrap_err();
            assert!(
                matches!(err, StsError::InvalidFormat { expected: "duration", .. }),
                "{value:?} should be rejected"
            );
        }
    }
}
