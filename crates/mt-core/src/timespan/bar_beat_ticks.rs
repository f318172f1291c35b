//! Bar/beat/tick time span

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::TimeError;

/// Time span measured in bars, beats and ticks.
///
/// Meter sensitive: the tick size of a bar and a beat comes from the time
/// signature in effect at the point of evaluation, so a value only gains a
/// tick interpretation through the conversion engine.
///
/// Same-type arithmetic is component-wise (no carry); redistribution of
/// overflow across ticks, beats and bars happens during conversion, where
/// the meter is known.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct BarBeatTicksTimeSpan {
    pub bars: u64,
    pub beats: u64,
    pub ticks: u64,
}

impl BarBeatTicksTimeSpan {
    pub const ZERO: Self = Self {
        bars: 0,
        beats: 0,
        ticks: 0,
    };

    pub fn new(bars: u64, beats: u64, ticks: u64) -> Self {
        Self { bars, beats, ticks }
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.bars == 0 && self.beats == 0 && self.ticks == 0
    }

    /// Component-wise subtract, or `None` when any component underflows
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        Some(Self {
            bars: self.bars.checked_sub(rhs.bars)?,
            beats: self.beats.checked_sub(rhs.beats)?,
            ticks: self.ticks.checked_sub(rhs.ticks)?,
        })
    }
}

impl std::ops::Add for BarBeatTicksTimeSpan {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            bars: self.bars + rhs.bars,
            beats: self.beats + rhs.beats,
            ticks: self.ticks + rhs.ticks,
        }
    }
}

impl std::fmt::Display for BarBeatTicksTimeSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.bars, self.beats, self.ticks)
    }
}

impl FromStr for BarBeatTicksTimeSpan {
    type Err = TimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() != 3 {
            return Err(TimeError::Format(s.to_string()));
        }
        let parse = |p: &str| p.parse::<u64>().map_err(|_| TimeError::Format(s.to_string()));
        Ok(Self {
            bars: parse(parts[0])?,
            beats: parse(parts[1])?,
            ticks: parse(parts[2])?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_display_round_trip() {
        let span = BarBeatTicksTimeSpan::new(0, 10, 5);
        assert_eq!(span.to_string(), "0.10.5");
        assert_eq!("0.10.5".parse::<BarBeatTicksTimeSpan>().unwrap(), span);
        assert!("1.2".parse::<BarBeatTicksTimeSpan>().is_err());
        assert!("1.2.x".parse::<BarBeatTicksTimeSpan>().is_err());
    }

    #[test]
    fn component_ordering() {
        assert!(BarBeatTicksTimeSpan::new(1, 0, 0) > BarBeatTicksTimeSpan::new(0, 3, 400));
        assert!(BarBeatTicksTimeSpan::new(2, 1, 0) < BarBeatTicksTimeSpan::new(2, 1, 1));
    }

    #[test]
    fn component_arithmetic() {
        let a = BarBeatTicksTimeSpan::new(2, 1, 100);
        let b = BarBeatTicksTimeSpan::new(1, 1, 40);
        assert_eq!(a + b, BarBeatTicksTimeSpan::new(3, 2, 140));
        assert_eq!(a.checked_sub(b), Some(BarBeatTicksTimeSpan::new(1, 0, 60)));
        assert_eq!(b.checked_sub(a), None);
    }
}
