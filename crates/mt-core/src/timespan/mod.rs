//! Time-Span Value Model
//!
//! Five immutable concrete representations of a point/duration on the
//! musical timeline, plus one deferred binary-operation node:
//! - [`MidiTimeSpan`]: raw scheduler ticks
//! - [`MetricTimeSpan`]: wall-clock microseconds
//! - [`MusicalTimeSpan`]: fraction of a whole note
//! - [`BarBeatTicksTimeSpan`]: bars + beats + ticks under the meter
//! - [`BarBeatFractionTimeSpan`]: bars + fractional beats
//! - [`MathTimeSpan`]: unevaluated Add/Subtract over two spans
//!
//! Arithmetic between spans of the same concrete type computes directly in
//! that type's native unit; mixing concrete types produces a deferred node
//! that the conversion engine resolves against a timeline.

mod bar_beat_fraction;
mod bar_beat_ticks;
mod math;
mod metric;
mod midi;
mod musical;

pub use bar_beat_fraction::*;
pub use bar_beat_ticks::*;
pub use math::*;
pub use metric::*;
pub use midi::*;
pub use musical::*;

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

use crate::error::{TimeError, TimeResult};

// ═══════════════════════════════════════════════════════════════════════════════
// KIND
// ═══════════════════════════════════════════════════════════════════════════════

/// Concrete time-span representation selector (deferred nodes have none)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeSpanKind {
    Midi,
    Metric,
    Musical,
    BarBeatTicks,
    BarBeatFraction,
}

impl std::fmt::Display for TimeSpanKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TimeSpanKind::Midi => "midi",
            TimeSpanKind::Metric => "metric",
            TimeSpanKind::Musical => "musical",
            TimeSpanKind::BarBeatTicks => "bar-beat-ticks",
            TimeSpanKind::BarBeatFraction => "bar-beat-fraction",
        };
        f.write_str(name)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TIME SPAN
// ═══════════════════════════════════════════════════════════════════════════════

/// A point or duration on the musical timeline.
///
/// Whether a value is a *time* (anchored at tick 0) or a *length* (anchor
/// supplied by the caller) is decided by the conversion call made, not
/// stored in the value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TimeSpan {
    Midi(MidiTimeSpan),
    Metric(MetricTimeSpan),
    Musical(MusicalTimeSpan),
    BarBeatTicks(BarBeatTicksTimeSpan),
    BarBeatFraction(BarBeatFractionTimeSpan),
    Math(MathTimeSpan),
}

impl TimeSpan {
    /// Concrete representation, or `None` for a deferred node
    pub fn kind(&self) -> Option<TimeSpanKind> {
        match self {
            TimeSpan::Midi(_) => Some(TimeSpanKind::Midi),
            TimeSpan::Metric(_) => Some(TimeSpanKind::Metric),
            TimeSpan::Musical(_) => Some(TimeSpanKind::Musical),
            TimeSpan::BarBeatTicks(_) => Some(TimeSpanKind::BarBeatTicks),
            TimeSpan::BarBeatFraction(_) => Some(TimeSpanKind::BarBeatFraction),
            TimeSpan::Math(_) => None,
        }
    }

    fn kind_name(&self) -> String {
        match self.kind() {
            Some(kind) => kind.to_string(),
            None => "deferred".to_string(),
        }
    }

    /// Structural zero test.
    ///
    /// Concrete spans are zero iff every numeric field is zero; deferred
    /// nodes iff both operands are recursively zero. No timeline is
    /// consulted, so `x - x` for non-zero `x` is not detected.
    pub fn is_zero(&self) -> bool {
        match self {
            TimeSpan::Midi(s) => s.is_zero(),
            TimeSpan::Metric(s) => s.is_zero(),
            TimeSpan::Musical(s) => s.is_zero(),
            TimeSpan::BarBeatTicks(s) => s.is_zero(),
            TimeSpan::BarBeatFraction(s) => s.is_zero(),
            TimeSpan::Math(s) => s.is_zero(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Add / Subtract
    // ─────────────────────────────────────────────────────────────────────────────

    /// Add two spans under the given role assignment.
    ///
    /// Same concrete types combine directly in their native unit;
    /// otherwise (and always in `TimeTime` mode, which only fails at
    /// evaluation) the result is a deferred node.
    pub fn add(self, rhs: TimeSpan, mode: SpanMode) -> TimeSpan {
        if mode != SpanMode::TimeTime {
            match (&self, &rhs) {
                (TimeSpan::Midi(a), TimeSpan::Midi(b)) => return TimeSpan::Midi(*a + *b),
                (TimeSpan::Metric(a), TimeSpan::Metric(b)) => return TimeSpan::Metric(*a + *b),
                (TimeSpan::Musical(a), TimeSpan::Musical(b)) => return TimeSpan::Musical(*a + *b),
                (TimeSpan::BarBeatTicks(a), TimeSpan::BarBeatTicks(b)) => {
                    return TimeSpan::BarBeatTicks(*a + *b)
                }
                (TimeSpan::BarBeatFraction(a), TimeSpan::BarBeatFraction(b)) => {
                    return TimeSpan::BarBeatFraction(*a + *b)
                }
                _ => {}
            }
        }
        TimeSpan::Math(MathTimeSpan::new(self, rhs, MathOperation::Add, mode))
    }

    /// Subtract `rhs` under the given role assignment.
    ///
    /// Same concrete types subtract directly and fail with
    /// [`TimeError::InvalidArgument`] when the result would be negative
    /// (spans carry no sign). Mixed types defer.
    pub fn subtract(self, rhs: TimeSpan, mode: SpanMode) -> TimeResult<TimeSpan> {
        if mode != SpanMode::TimeTime {
            let direct = match (&self, &rhs) {
                (TimeSpan::Midi(a), TimeSpan::Midi(b)) => Some(a.checked_sub(*b).map(TimeSpan::Midi)),
                (TimeSpan::Metric(a), TimeSpan::Metric(b)) => {
                    Some(a.checked_sub(*b).map(TimeSpan::Metric))
                }
                (TimeSpan::Musical(a), TimeSpan::Musical(b)) => {
                    Some(a.checked_sub(*b).map(TimeSpan::Musical))
                }
                (TimeSpan::BarBeatTicks(a), TimeSpan::BarBeatTicks(b)) => {
                    Some(a.checked_sub(*b).map(TimeSpan::BarBeatTicks))
                }
                (TimeSpan::BarBeatFraction(a), TimeSpan::BarBeatFraction(b)) => {
                    Some(a.checked_sub(*b).map(TimeSpan::BarBeatFraction))
                }
                _ => None,
            };
            if let Some(result) = direct {
                return result.ok_or_else(|| {
                    TimeError::InvalidArgument("subtraction result would be negative".to_string())
                });
            }
        }
        Ok(TimeSpan::Math(MathTimeSpan::new(
            self,
            rhs,
            MathOperation::Subtract,
            mode,
        )))
    }

    /// Explicitly deferred combination, kept lazy even for same-type spans
    pub fn deferred(
        lhs: TimeSpan,
        rhs: TimeSpan,
        operation: MathOperation,
        mode: SpanMode,
    ) -> TimeSpan {
        TimeSpan::Math(MathTimeSpan::new(lhs, rhs, operation, mode))
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Multiply / Divide
    // ─────────────────────────────────────────────────────────────────────────────

    /// Scale by a non-negative factor.
    ///
    /// Native numeric fields are scaled with midpoint rounding; musical
    /// fractions scale rationally so factors like 1.5 stay exact; deferred
    /// nodes distribute the factor over both operands.
    pub fn multiply(&self, factor: f64) -> TimeResult<TimeSpan> {
        if !factor.is_finite() || factor < 0.0 {
            return Err(TimeError::InvalidArgument(format!(
                "multiplier must be finite and >= 0, got {factor}"
            )));
        }
        Ok(self.scale(factor))
    }

    /// Divide by a positive factor
    pub fn divide(&self, divisor: f64) -> TimeResult<TimeSpan> {
        if divisor == 0.0 {
            return Err(TimeError::DivideByZero);
        }
        if !divisor.is_finite() || divisor < 0.0 {
            return Err(TimeError::InvalidArgument(format!(
                "divisor must be finite and > 0, got {divisor}"
            )));
        }
        Ok(self.scale(1.0 / divisor))
    }

    fn scale(&self, factor: f64) -> TimeSpan {
        let mul = |v: u64| (v as f64 * factor).round() as u64;
        match self {
            TimeSpan::Midi(s) => TimeSpan::Midi(MidiTimeSpan(mul(s.0))),
            TimeSpan::Metric(s) => TimeSpan::Metric(MetricTimeSpan::from_micros(mul(s.total_micros))),
            TimeSpan::Musical(s) => {
                // Dyadic approximation of the factor keeps the result an
                // exact rational for factors like 1.5 or 0.5; only
                // irrational factors are approximated.
                const SCALE_BITS: u32 = 16;
                let scale = 1u64 << SCALE_BITS;
                let steps = (factor * scale as f64).round() as u64;
                let g = gcd(steps, scale);
                TimeSpan::Musical(
                    MusicalTimeSpan::new(s.numerator * (steps / g), s.denominator * (scale / g))
                        .simplify(),
                )
            }
            TimeSpan::BarBeatTicks(s) => TimeSpan::BarBeatTicks(BarBeatTicksTimeSpan::new(
                mul(s.bars),
                mul(s.beats),
                mul(s.ticks),
            )),
            TimeSpan::BarBeatFraction(s) => TimeSpan::BarBeatFraction(
                BarBeatFractionTimeSpan::new(mul(s.bars), s.beats * factor),
            ),
            TimeSpan::Math(s) => TimeSpan::Math(MathTimeSpan::new(
                s.lhs.scale(factor),
                s.rhs.scale(factor),
                s.operation,
                s.mode,
            )),
        }
    }

    /// Ratio of two spans of the same concrete type.
    ///
    /// Self-contained in the type's native unit, so no timeline is needed.
    /// Bar/beat spans have no native total without a meter and are not
    /// supported.
    pub fn divide_by_span(&self, rhs: &TimeSpan) -> TimeResult<f64> {
        match (self, rhs) {
            (TimeSpan::Midi(a), TimeSpan::Midi(b)) => {
                if b.is_zero() {
                    return Err(TimeError::DivideByZero);
                }
                Ok(a.0 as f64 / b.0 as f64)
            }
            (TimeSpan::Metric(a), TimeSpan::Metric(b)) => {
                if b.is_zero() {
                    return Err(TimeError::DivideByZero);
                }
                Ok(a.total_micros as f64 / b.total_micros as f64)
            }
            (TimeSpan::Musical(a), TimeSpan::Musical(b)) => {
                if b.is_zero() {
                    return Err(TimeError::DivideByZero);
                }
                Ok(a.ratio(*b))
            }
            (TimeSpan::BarBeatTicks(_), TimeSpan::BarBeatTicks(_))
            | (TimeSpan::BarBeatFraction(_), TimeSpan::BarBeatFraction(_)) => {
                Err(TimeError::UnsupportedConversion(
                    "bar/beat spans have no meter-free total to take a ratio of".to_string(),
                ))
            }
            _ => Err(TimeError::TypeMismatch(format!(
                "cannot divide {} span by {} span",
                self.kind_name(),
                rhs.kind_name()
            ))),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Comparison
    // ─────────────────────────────────────────────────────────────────────────────

    /// Total order within one concrete type.
    ///
    /// Comparing different concrete types, or anything against a deferred
    /// node, fails with [`TimeError::TypeMismatch`].
    pub fn compare(&self, rhs: &TimeSpan) -> TimeResult<Ordering> {
        match (self, rhs) {
            (TimeSpan::Midi(a), TimeSpan::Midi(b)) => Ok(a.cmp(b)),
            (TimeSpan::Metric(a), TimeSpan::Metric(b)) => Ok(a.cmp(b)),
            (TimeSpan::Musical(a), TimeSpan::Musical(b)) => Ok(a.cmp(b)),
            (TimeSpan::BarBeatTicks(a), TimeSpan::BarBeatTicks(b)) => Ok(a.cmp(b)),
            (TimeSpan::BarBeatFraction(a), TimeSpan::BarBeatFraction(b)) => {
                Ok(match a.bars.cmp(&b.bars) {
                    Ordering::Equal => a.beats.total_cmp(&b.beats),
                    ord => ord,
                })
            }
            _ => Err(TimeError::TypeMismatch(format!(
                "cannot compare {} span with {} span",
                self.kind_name(),
                rhs.kind_name()
            ))),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONVERSIONS BETWEEN ENUM AND CONCRETE TYPES
// ═══════════════════════════════════════════════════════════════════════════════

macro_rules! impl_span_conversions {
    ($($variant:ident => $concrete:ty),+ $(,)?) => {
        $(
            impl From<$concrete> for TimeSpan {
                fn from(span: $concrete) -> Self {
                    TimeSpan::$variant(span)
                }
            }

            impl TryFrom<TimeSpan> for $concrete {
                type Error = TimeError;

                fn try_from(span: TimeSpan) -> Result<Self, Self::Error> {
                    match span {
                        TimeSpan::$variant(s) => Ok(s),
                        other => Err(TimeError::TypeMismatch(format!(
                            "expected {} span, got {}",
                            stringify!($variant),
                            other.kind_name()
                        ))),
                    }
                }
            }
        )+
    };
}

impl_span_conversions! {
    Midi => MidiTimeSpan,
    Metric => MetricTimeSpan,
    Musical => MusicalTimeSpan,
    BarBeatTicks => BarBeatTicksTimeSpan,
    BarBeatFraction => BarBeatFractionTimeSpan,
}

impl From<MathTimeSpan> for TimeSpan {
    fn from(span: MathTimeSpan) -> Self {
        TimeSpan::Math(span)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TEXTUAL FORM
// ═══════════════════════════════════════════════════════════════════════════════

impl std::fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeSpan::Midi(s) => s.fmt(f),
            TimeSpan::Metric(s) => s.fmt(f),
            TimeSpan::Musical(s) => s.fmt(f),
            TimeSpan::BarBeatTicks(s) => s.fmt(f),
            TimeSpan::BarBeatFraction(s) => s.fmt(f),
            TimeSpan::Math(s) => s.fmt(f),
        }
    }
}

impl FromStr for TimeSpan {
    type Err = TimeError;

    /// Try each concrete grammar in a fixed order, most specific first.
    ///
    /// Bar-beat grammars come before metric/musical so dotted and
    /// underscored literals never fall through to a laxer grammar; a bare
    /// integer is always a tick span.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(span) = s.parse::<BarBeatTicksTimeSpan>() {
            return Ok(TimeSpan::BarBeatTicks(span));
        }
        if let Ok(span) = s.parse::<BarBeatFractionTimeSpan>() {
            return Ok(TimeSpan::BarBeatFraction(span));
        }
        if let Ok(span) = s.parse::<MetricTimeSpan>() {
            return Ok(TimeSpan::Metric(span));
        }
        if let Ok(span) = s.parse::<MusicalTimeSpan>() {
            return Ok(TimeSpan::Musical(span));
        }
        if let Ok(span) = s.parse::<MidiTimeSpan>() {
            return Ok(TimeSpan::Midi(span));
        }
        Err(TimeError::Format(s.to_string()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
