//! Musical fraction time span
//!
//! A fraction of one whole note. Tempo and meter independent: ticks are
//! derived from the timeline's fixed ticks-per-quarter-note scale only.
//!
//! Textual grammar:
//! - `"<num>/<den>"`, numerator optional (`"/2"` is a half note)
//! - single-letter codes `w h q e s t` (whole .. thirty-second), optionally
//!   followed by trailing dots, a trailing `t` triplet, or a bracketed
//!   custom tuplet `"[a:b]"` (`a` notes in the time of `b`)

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

use crate::error::TimeError;

/// Time span measured as a fraction of a whole note.
///
/// Fractions are not reduced on construction; equality and ordering
/// compare by rational value, so `1/5 == 2/10`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MusicalTimeSpan {
    pub numerator: u64,
    pub denominator: u64,
}

impl MusicalTimeSpan {
    pub const ZERO: Self = Self {
        numerator: 0,
        denominator: 1,
    };
    pub const WHOLE: Self = Self {
        numerator: 1,
        denominator: 1,
    };
    pub const HALF: Self = Self {
        numerator: 1,
        denominator: 2,
    };
    pub const QUARTER: Self = Self {
        numerator: 1,
        denominator: 4,
    };
    pub const EIGHTH: Self = Self {
        numerator: 1,
        denominator: 8,
    };
    pub const SIXTEENTH: Self = Self {
        numerator: 1,
        denominator: 16,
    };
    pub const THIRTY_SECOND: Self = Self {
        numerator: 1,
        denominator: 32,
    };

    pub fn new(numerator: u64, denominator: u64) -> Self {
        assert!(denominator > 0, "denominator must be > 0");
        Self {
            numerator,
            denominator,
        }
    }

    /// Apply `dots` dots; each dot multiplies the value by 3/2 cumulatively
    pub fn dotted(self, dots: u32) -> Self {
        Self {
            numerator: self.numerator * 3u64.pow(dots),
            denominator: self.denominator * 2u64.pow(dots),
        }
    }

    /// `notes` notes in the time of `space` notes (e.g. triplet is 3:2)
    pub fn tuplet(self, notes: u64, space: u64) -> Self {
        assert!(notes > 0, "tuplet note count must be > 0");
        Self {
            numerator: self.numerator * space,
            denominator: self.denominator * notes,
        }
    }

    /// Standard 3:2 triplet
    pub fn triplet(self) -> Self {
        self.tuplet(3, 2)
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.numerator == 0
    }

    /// Reduce the fraction to lowest terms
    pub fn simplify(self) -> Self {
        if self.numerator == 0 {
            return Self::ZERO;
        }
        let g = gcd(self.numerator, self.denominator);
        Self {
            numerator: self.numerator / g,
            denominator: self.denominator / g,
        }
    }

    /// Subtract, or `None` when the result would be negative
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        let lhs_scaled = self.numerator as u128 * rhs.denominator as u128;
        let rhs_scaled = rhs.numerator as u128 * self.denominator as u128;
        if lhs_scaled < rhs_scaled {
            return None;
        }
        Some(
            Self {
                numerator: (lhs_scaled - rhs_scaled) as u64,
                denominator: self.denominator * rhs.denominator,
            }
            .simplify(),
        )
    }

    /// Rational value of `self / rhs`
    pub fn ratio(self, rhs: Self) -> f64 {
        (self.numerator as f64 * rhs.denominator as f64)
            / (self.denominator as f64 * rhs.numerator as f64)
    }
}

pub(crate) fn gcd(a: u64, b: u64) -> u64 {
    let (mut a, mut b) = (a, b);
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

impl Default for MusicalTimeSpan {
    fn default() -> Self {
        Self::ZERO
    }
}

impl std::ops::Add for MusicalTimeSpan {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            numerator: self.numerator * rhs.denominator + rhs.numerator * self.denominator,
            denominator: self.denominator * rhs.denominator,
        }
        .simplify()
    }
}

impl PartialEq for MusicalTimeSpan {
    fn eq(&self, other: &Self) -> bool {
        self.numerator as u128 * other.denominator as u128
            == other.numerator as u128 * self.denominator as u128
    }
}

impl Eq for MusicalTimeSpan {}

impl PartialOrd for MusicalTimeSpan {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MusicalTimeSpan {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.numerator as u128 * other.denominator as u128)
            .cmp(&(other.numerator as u128 * self.denominator as u128))
    }
}

impl std::fmt::Display for MusicalTimeSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

impl FromStr for MusicalTimeSpan {
    type Err = TimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(TimeError::Format(s.to_string()));
        }
        let parsed = if trimmed.starts_with(|c: char| c.is_ascii_digit() || c == '/') {
            parse_fraction(trimmed)
        } else {
            parse_notation(trimmed)
        };
        parsed.ok_or_else(|| TimeError::Format(s.to_string()))
    }
}

fn parse_fraction(s: &str) -> Option<MusicalTimeSpan> {
    let (num, den) = s.split_once('/')?;
    if den.contains('/') {
        return None;
    }
    let numerator = if num.is_empty() {
        1
    } else {
        num.parse::<u64>().ok()?
    };
    let denominator = den.parse::<u64>().ok()?;
    (denominator > 0).then(|| MusicalTimeSpan::new(numerator, denominator))
}

fn parse_notation(s: &str) -> Option<MusicalTimeSpan> {
    let mut chars = s.chars();
    let base = match chars.next()? {
        'w' => MusicalTimeSpan::WHOLE,
        'h' => MusicalTimeSpan::HALF,
        'q' => MusicalTimeSpan::QUARTER,
        'e' => MusicalTimeSpan::EIGHTH,
        's' => MusicalTimeSpan::SIXTEENTH,
        't' => MusicalTimeSpan::THIRTY_SECOND,
        _ => return None,
    };

    let mut span = base;
    let mut dots = 0u32;
    let rest: Vec<char> = chars.collect();
    let mut i = 0;
    while i < rest.len() {
        match rest[i] {
            '.' => {
                dots += 1;
                i += 1;
            }
            't' => {
                span = span.triplet();
                i += 1;
            }
            '[' => {
                let close = rest[i..].iter().position(|&c| c == ']')? + i;
                let body: String = rest[i + 1..close].iter().collect();
                let (notes, space) = body.split_once(':')?;
                let notes = notes.trim().parse::<u64>().ok()?;
                let space = space.trim().parse::<u64>().ok()?;
                if notes == 0 || space == 0 {
                    return None;
                }
                span = span.tuplet(notes, space);
                i = close + 1;
            }
            _ => return None,
        }
    }

    Some(span.dotted(dots))
}
