//! Wall-clock time span
//!
//! Stored as total microseconds; parsed/displayed as hours, minutes,
//! seconds and milliseconds.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::TimeError;

const MICROS_PER_MILLI: u64 = 1_000;
const MICROS_PER_SECOND: u64 = 1_000_000;
const MICROS_PER_MINUTE: u64 = 60 * MICROS_PER_SECOND;
const MICROS_PER_HOUR: u64 = 60 * MICROS_PER_MINUTE;

/// Time span measured in wall-clock microseconds.
///
/// Anchor-independent as a *time* (measured from tick 0); interpreting it
/// as a *length* needs an anchor because ticks per microsecond depend on
/// the tempo in effect.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct MetricTimeSpan {
    /// Total wall-clock microseconds
    pub total_micros: u64,
}

impl MetricTimeSpan {
    pub const ZERO: Self = Self { total_micros: 0 };

    /// Construct from hour/minute/second/millisecond components
    pub fn new(hours: u64, minutes: u64, seconds: u64, millis: u64) -> Self {
        Self {
            total_micros: hours * MICROS_PER_HOUR
                + minutes * MICROS_PER_MINUTE
                + seconds * MICROS_PER_SECOND
                + millis * MICROS_PER_MILLI,
        }
    }

    pub fn from_micros(total_micros: u64) -> Self {
        Self { total_micros }
    }

    pub fn from_millis(millis: u64) -> Self {
        Self {
            total_micros: millis * MICROS_PER_MILLI,
        }
    }

    #[inline]
    pub fn as_micros(self) -> u64 {
        self.total_micros
    }

    #[inline]
    pub fn hours(self) -> u64 {
        self.total_micros / MICROS_PER_HOUR
    }

    #[inline]
    pub fn minutes(self) -> u64 {
        (self.total_micros / MICROS_PER_MINUTE) % 60
    }

    #[inline]
    pub fn seconds(self) -> u64 {
        (self.total_micros / MICROS_PER_SECOND) % 60
    }

    #[inline]
    pub fn milliseconds(self) -> u64 {
        (self.total_micros / MICROS_PER_MILLI) % 1_000
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.total_micros == 0
    }

    /// Subtract, or `None` when the result would be negative
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.total_micros
            .checked_sub(rhs.total_micros)
            .map(Self::from_micros)
    }
}

impl std::ops::Add for MetricTimeSpan {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::from_micros(self.total_micros + rhs.total_micros)
    }
}

impl std::fmt::Display for MetricTimeSpan {
    /// `h:m:s:ms` form. Microseconds below one millisecond are not printed.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.hours(),
            self.minutes(),
            self.seconds(),
            self.milliseconds()
        )
    }
}

impl FromStr for MetricTimeSpan {
    type Err = TimeError;

    /// Accepts the colon forms `m:s`, `h:m:s`, `h:m:s:ms` and the tagged
    /// compact form built from `<n>h`, `<n>m`, `<n>s`, `<n>ms` tokens
    /// (case-insensitive, whitespace between tokens allowed).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(TimeError::Format(s.to_string()));
        }
        if trimmed.contains(':') {
            parse_colon_form(trimmed).ok_or_else(|| TimeError::Format(s.to_string()))
        } else {
            parse_tagged_form(trimmed).ok_or_else(|| TimeError::Format(s.to_string()))
        }
    }
}

fn parse_colon_form(s: &str) -> Option<MetricTimeSpan> {
    let parts: Vec<u64> = s
        .split(':')
        .map(|p| p.trim().parse::<u64>().ok())
        .collect::<Option<_>>()?;
    match parts[..] {
        [m, sec] => Some(MetricTimeSpan::new(0, m, sec, 0)),
        [h, m, sec] => Some(MetricTimeSpan::new(h, m, sec, 0)),
        [h, m, sec, ms] => Some(MetricTimeSpan::new(h, m, sec, ms)),
        _ => None,
    }
}

fn parse_tagged_form(s: &str) -> Option<MetricTimeSpan> {
    let lower = s.to_ascii_lowercase();
    let bytes = lower.as_bytes();
    let mut micros: u64 = 0;
    let mut i = 0;
    let mut any = false;

    while i < bytes.len() {
        if bytes[i].is_ascii_whitespace() {
            i += 1;
            continue;
        }

        let digits_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == digits_start {
            return None;
        }
        let value: u64 = lower[digits_start..i].parse().ok()?;

        // `ms` must win over a bare `m`
        let unit = if lower[i..].starts_with("ms") {
            i += 2;
            MICROS_PER_MILLI
        } else if lower[i..].starts_with('h') {
            i += 1;
            MICROS_PER_HOUR
        } else if lower[i..].starts_with('m') {
            i += 1;
            MICROS_PER_MINUTE
        } else if lower[i..].starts_with('s') {
            i += 1;
            MICROS_PER_SECOND
        } else {
            return None;
        };

        micros += value * unit;
        any = true;
    }

    any.then(|| MetricTimeSpan::from_micros(micros))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_accessors() {
        let span = MetricTimeSpan::new(1, 2, 3, 4);
        assert_eq!(span.hours(), 1);
        assert_eq!(span.minutes(), 2);
        assert_eq!(span.seconds(), 3);
        assert_eq!(span.milliseconds(), 4);
        assert_eq!(span.as_micros(), 3_723_004_000);
    }

    #[test]
    fn parse_colon_forms() {
        assert_eq!(
            "1:2:3:4".parse::<MetricTimeSpan>().unwrap(),
            MetricTimeSpan::new(1, 2, 3, 4)
        );
        assert_eq!(
            "2:30".parse::<MetricTimeSpan>().unwrap(),
            MetricTimeSpan::new(0, 2, 30, 0)
        );
        assert_eq!(
            "1:0:15".parse::<MetricTimeSpan>().unwrap(),
            MetricTimeSpan::new(1, 0, 15, 0)
        );
        assert!("1:2:3:4:5".parse::<MetricTimeSpan>().is_err());
    }

    #[test]
    fn parse_tagged_form_variants() {
        assert_eq!(
            "1h2m3s4ms".parse::<MetricTimeSpan>().unwrap(),
            MetricTimeSpan::new(1, 2, 3, 4)
        );
        assert_eq!(
            "500MS".parse::<MetricTimeSpan>().unwrap(),
            MetricTimeSpan::from_millis(500)
        );
        assert_eq!(
            " 2m 30s ".parse::<MetricTimeSpan>().unwrap(),
            MetricTimeSpan::new(0, 2, 30, 0)
        );
        assert!("90".parse::<MetricTimeSpan>().is_err());
        assert!("1x".parse::<MetricTimeSpan>().is_err());
    }

    #[test]
    fn display_round_trip() {
        let span = MetricTimeSpan::new(1, 2, 3, 4);
        assert_eq!(span.to_string(), "1:2:3:4");
        assert_eq!(span.to_string().parse::<MetricTimeSpan>().unwrap(), span);
    }

    #[test]
    fn checked_sub_underflow() {
        let a = MetricTimeSpan::from_millis(100);
        let b = MetricTimeSpan::from_millis(250);
        assert_eq!(b.checked_sub(a), Some(MetricTimeSpan::from_millis(150)));
        assert_eq!(a.checked_sub(b), None);
    }
}
