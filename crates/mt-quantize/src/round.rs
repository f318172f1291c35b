//! Policy-driven snap-to-step rounding

use serde::{Deserialize, Serialize};

use mt_core::{length_from_ticks, to_length_ticks, TempoMap, TimeError, TimeResult, TimeSpan};

/// How a span is pushed onto a step grid
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundingPolicy {
    /// Leave the span untouched
    #[default]
    NoRounding,
    /// Snap to the smallest grid multiple at or above the span
    RoundUp,
    /// Snap to the largest grid multiple at or below the span
    RoundDown,
}

/// Round `span` onto a grid of `step`-sized cells measured from tick 0.
///
/// Both `span` and `step` are resolved as lengths at `anchor_ticks`, so a
/// meter-dependent step like one bar uses the signature in effect at the
/// anchor. The snapped length is re-expressed in `span`'s own
/// representation, which redistributes overflow across ticks, beats and
/// bars as needed.
///
/// A `RoundDown` landing before the anchor clamps the result to a zero
/// length. `NoRounding` and a zero-tick step return an unchanged copy
/// without re-expression, so they accept any span; otherwise deferred
/// spans carry no concrete representation to rebuild and are rejected.
pub fn round(
    span: &TimeSpan,
    policy: RoundingPolicy,
    anchor_ticks: u64,
    step: &TimeSpan,
    map: &TempoMap,
) -> TimeResult<TimeSpan> {
    if policy == RoundingPolicy::NoRounding {
        return Ok(span.clone());
    }

    let step_ticks = to_length_ticks(step, anchor_ticks, map)?;
    if step_ticks == 0 {
        return Ok(span.clone());
    }

    let kind = span.kind().ok_or_else(|| {
        TimeError::UnsupportedConversion(
            "a deferred span cannot be rounded; convert it to a concrete representation first"
                .to_string(),
        )
    })?;

    let position = anchor_ticks + to_length_ticks(span, anchor_ticks, map)?;
    let snapped = if policy == RoundingPolicy::RoundUp {
        position.div_ceil(step_ticks) * step_ticks
    } else {
        position / step_ticks * step_ticks
    };

    let length = snapped.saturating_sub(anchor_ticks);
    Ok(length_from_ticks(length, anchor_ticks, kind, map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mt_core::{
        BarBeatTicksTimeSpan, MidiTimeSpan, MusicalTimeSpan, SpanMode, TimeSignature,
    };

    fn span(ticks: u64) -> TimeSpan {
        TimeSpan::Midi(MidiTimeSpan(ticks))
    }

    #[test]
    fn no_rounding_returns_unchanged_copy() {
        let map = TempoMap::default();
        let s = span(123);
        let rounded = round(&s, RoundingPolicy::NoRounding, 0, &span(100), &map).unwrap();
        assert_eq!(rounded, s);
    }

    #[test]
    fn zero_step_returns_unchanged_copy() {
        let map = TempoMap::default();
        let s = span(123);
        let rounded = round(&s, RoundingPolicy::RoundUp, 0, &span(0), &map).unwrap();
        assert_eq!(rounded, s);
    }

    #[test]
    fn aligned_span_survives_round_up() {
        let map = TempoMap::default();
        let s = TimeSpan::BarBeatTicks(BarBeatTicksTimeSpan::new(4, 0, 1));
        let step = TimeSpan::BarBeatTicks(BarBeatTicksTimeSpan::new(0, 0, 1));
        let rounded = round(&s, RoundingPolicy::RoundUp, 0, &step, &map).unwrap();
        assert_eq!(rounded, s);
    }

    #[test]
    fn round_down_to_step_multiple() {
        let map = TempoMap::default();
        let rounded = round(&span(20), RoundingPolicy::RoundDown, 0, &span(15), &map).unwrap();
        assert_eq!(rounded, span(15));
    }

    #[test]
    fn round_up_with_musical_step() {
        let map = TempoMap::default();
        let step = TimeSpan::Musical(MusicalTimeSpan::QUARTER);
        let rounded = round(&span(500), RoundingPolicy::RoundUp, 0, &step, &map).unwrap();
        assert_eq!(rounded, span(960));
    }

    #[test]
    fn grid_is_measured_from_tick_zero_not_the_anchor() {
        let map = TempoMap::default();
        // Position 150 on a 60-tick grid snaps to 120/180; the result is
        // the length back to the anchor.
        let down = round(&span(50), RoundingPolicy::RoundDown, 100, &span(60), &map).unwrap();
        assert_eq!(down, span(20));
        let up = round(&span(50), RoundingPolicy::RoundUp, 100, &span(60), &map).unwrap();
        assert_eq!(up, span(80));
    }

    #[test]
    fn round_down_before_anchor_clamps_to_zero() {
        let map = TempoMap::default();
        let rounded = round(&span(10), RoundingPolicy::RoundDown, 100, &span(120), &map).unwrap();
        assert!(rounded.is_zero());
    }

    #[test]
    fn bar_step_uses_meter_at_anchor() {
        let mut map = TempoMap::default();
        map.set_time_signature(3840, TimeSignature::new(5, 8));

        let step = TimeSpan::BarBeatTicks(BarBeatTicksTimeSpan::new(1, 0, 0));
        // Anchored in the 5/8 region a bar step is 1200 ticks; position
        // 3840 + 1300 rounds down to the 4 * 1200 grid line.
        let rounded = round(&span(1300), RoundingPolicy::RoundDown, 3840, &step, &map).unwrap();
        assert_eq!(rounded, span(4 * 1200 - 3840));
    }

    #[test]
    fn deferred_span_is_rejected() {
        let map = TempoMap::default();
        let deferred = span(100).add(
            TimeSpan::Musical(MusicalTimeSpan::QUARTER),
            SpanMode::LengthLength,
        );
        assert!(matches!(
            round(&deferred, RoundingPolicy::RoundUp, 0, &span(10), &map),
            Err(TimeError::UnsupportedConversion(_))
        ));
    }

    #[test]
    fn no_op_policies_accept_deferred_spans() {
        let map = TempoMap::default();
        let deferred = span(100).add(
            TimeSpan::Musical(MusicalTimeSpan::QUARTER),
            SpanMode::LengthLength,
        );
        let unchanged =
            round(&deferred, RoundingPolicy::NoRounding, 0, &span(10), &map).unwrap();
        assert_eq!(unchanged, deferred);
        let unchanged = round(&deferred, RoundingPolicy::RoundUp, 0, &span(0), &map).unwrap();
        assert_eq!(unchanged, deferred);
    }
}
