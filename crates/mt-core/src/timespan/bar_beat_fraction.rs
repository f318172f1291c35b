//! Bar/fractional-beat time span

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

use crate::error::TimeError;

/// Time span measured in whole bars plus a fractional beat count.
///
/// Meter sensitive like [`BarBeatTicksTimeSpan`](super::BarBeatTicksTimeSpan);
/// the `beats` field is a real number, so sub-tick beat fractions survive
/// arithmetic and only collapse to ticks at conversion time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BarBeatFractionTimeSpan {
    pub bars: u64,
    /// Fractional beat count, `>= 0` and finite
    pub beats: f64,
}

impl BarBeatFractionTimeSpan {
    pub const ZERO: Self = Self {
        bars: 0,
        beats: 0.0,
    };

    pub fn new(bars: u64, beats: f64) -> Self {
        assert!(beats.is_finite() && beats >= 0.0, "beats must be finite and >= 0");
        Self { bars, beats }
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.bars == 0 && self.beats == 0.0
    }

    /// Component-wise subtract, or `None` when any component underflows
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        if rhs.bars > self.bars || rhs.beats > self.beats {
            return None;
        }
        Some(Self {
            bars: self.bars - rhs.bars,
            beats: self.beats - rhs.beats,
        })
    }
}

impl std::ops::Add for BarBeatFractionTimeSpan {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            bars: self.bars + rhs.bars,
            beats: self.beats + rhs.beats,
        }
    }
}

impl PartialOrd for BarBeatFractionTimeSpan {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match self.bars.cmp(&other.bars) {
            Ordering::Equal => Some(self.beats.total_cmp(&other.beats)),
            ord => Some(ord),
        }
    }
}

impl std::fmt::Display for BarBeatFractionTimeSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.bars, self.beats)
    }
}

impl FromStr for BarBeatFractionTimeSpan {
    type Err = TimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (bars, beats) = trimmed
            .split_once('_')
            .ok_or_else(|| TimeError::Format(s.to_string()))?;
        let bars = bars
            .parse::<u64>()
            .map_err(|_| TimeError::Format(s.to_string()))?;
        let beats = beats
            .parse::<f64>()
            .map_err(|_| TimeError::Format(s.to_string()))?;
        if !beats.is_finite() || beats < 0.0 || beats.is_sign_negative() {
            return Err(TimeError::Format(s.to_string()));
        }
        Ok(Self { bars, beats })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_display_round_trip() {
        let span = BarBeatFractionTimeSpan::new(0, 10.5);
        assert_eq!(span.to_string(), "0_10.5");
        assert_eq!("0_10.5".parse::<BarBeatFractionTimeSpan>().unwrap(), span);
        assert!("0".parse::<BarBeatFractionTimeSpan>().is_err());
        assert!("0_-1".parse::<BarBeatFractionTimeSpan>().is_err());
    }

    #[test]
    fn ordering() {
        let zero = BarBeatFractionTimeSpan::ZERO;
        let tiny = BarBeatFractionTimeSpan::new(0, 0.01);
        let bar = BarBeatFractionTimeSpan::new(1, 0.0);
        assert!(zero < tiny);
        assert!(tiny < bar);
        assert!(zero <= zero);
        assert!(bar >= tiny);
    }

    #[test]
    fn component_arithmetic() {
        let a = BarBeatFractionTimeSpan::new(2, 1.5);
        let b = BarBeatFractionTimeSpan::new(1, 0.25);
        assert_eq!(a + b, BarBeatFractionTimeSpan::new(3, 1.75));
        assert_eq!(a.checked_sub(b), Some(BarBeatFractionTimeSpan::new(1, 1.25)));
        assert_eq!(b.checked_sub(a), None);
    }
}
