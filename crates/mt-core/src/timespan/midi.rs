//! Raw tick time span

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::TimeError;

/// Time span measured in raw scheduler ticks.
///
/// Tempo and meter independent: one tick is `1 / ticks_per_quarter_note`
/// of a quarter note on every timeline.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct MidiTimeSpan(pub u64);

impl MidiTimeSpan {
    pub const ZERO: Self = Self(0);

    pub fn new(ticks: u64) -> Self {
        Self(ticks)
    }

    #[inline]
    pub fn ticks(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Subtract, or `None` when the result would be negative
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Self)
    }
}

impl std::ops::Add for MidiTimeSpan {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl std::fmt::Display for MidiTimeSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MidiTimeSpan {
    type Err = TimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TimeError::Format(s.to_string()));
        }
        s.parse::<u64>()
            .map(Self)
            .map_err(|_| TimeError::Format(s.to_string()))
    }
}
