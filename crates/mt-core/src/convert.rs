//! Conversion Engine
//!
//! Converts time spans between representations against a [`TempoMap`],
//! with ticks as the common intermediate:
//! - Time conversion: anchor-free, always measured from tick 0
//! - Length conversion: anchored at a caller-supplied tick, because a
//!   duration's tick count depends on the tempo/meter regime it spans
//!
//! Deferred ([`MathTimeSpan`]) nodes are resolved here: operands convert
//! to ticks under the roles named by the node's [`SpanMode`], then combine.

use crate::error::{TimeError, TimeResult};
use crate::tempo::TempoMap;
use crate::timespan::{
    gcd, BarBeatFractionTimeSpan, BarBeatTicksTimeSpan, MathOperation, MetricTimeSpan,
    MidiTimeSpan, MusicalTimeSpan, SpanMode, TimeSpan, TimeSpanKind,
};

// ═══════════════════════════════════════════════════════════════════════════════
// ENTRY POINTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Interpret `span` as a *time*: an absolute instant measured from tick 0.
pub fn to_absolute_ticks(span: &TimeSpan, map: &TempoMap) -> TimeResult<u64> {
    match span {
        TimeSpan::Midi(s) => Ok(s.0),
        TimeSpan::Metric(s) => Ok(map.ticks_for_micros(0, s.total_micros)),
        TimeSpan::Musical(s) => Ok(musical_to_ticks(s, map)),
        TimeSpan::BarBeatTicks(s) => Ok(bar_beat_ticks_to_length(s, 0, map)),
        TimeSpan::BarBeatFraction(s) => Ok(bar_beat_fraction_to_length(s, 0, map)),
        TimeSpan::Math(m) => {
            log::trace!("evaluating deferred span as time: {m}");
            match m.mode {
                SpanMode::TimeTime => Err(TimeError::TypeMismatch(
                    "sum of two absolute instants is not defined".to_string(),
                )),
                SpanMode::TimeLength => {
                    let time = to_absolute_ticks(&m.lhs, map)?;
                    match m.operation {
                        MathOperation::Add => Ok(time + to_length_ticks(&m.rhs, time, map)?),
                        MathOperation::Subtract => solve_subtract(&m.rhs, 0, time, map),
                    }
                }
                // A pure length anchored at the origin is a valid instant
                SpanMode::LengthLength => to_length_ticks(span, 0, map),
            }
        }
    }
}

/// Interpret `span` as a *length* starting at `anchor_ticks`.
///
/// Tick and musical spans are anchor-independent; metric and bar/beat
/// spans resolve tempo and meter from the anchor forward.
pub fn to_length_ticks(span: &TimeSpan, anchor_ticks: u64, map: &TempoMap) -> TimeResult<u64> {
    match span {
        TimeSpan::Midi(s) => Ok(s.0),
        TimeSpan::Metric(s) => Ok(map.ticks_for_micros(anchor_ticks, s.total_micros)),
        TimeSpan::Musical(s) => Ok(musical_to_ticks(s, map)),
        TimeSpan::BarBeatTicks(s) => Ok(bar_beat_ticks_to_length(s, anchor_ticks, map)),
        TimeSpan::BarBeatFraction(s) => Ok(bar_beat_fraction_to_length(s, anchor_ticks, map)),
        TimeSpan::Math(m) => match m.mode {
            SpanMode::TimeTime => Err(TimeError::TypeMismatch(
                "sum of two absolute instants is not defined".to_string(),
            )),
            SpanMode::TimeLength => Err(TimeError::UnsupportedConversion(
                "a time-valued expression cannot be measured as a length".to_string(),
            )),
            SpanMode::LengthLength => {
                let lhs_len = to_length_ticks(&m.lhs, anchor_ticks, map)?;
                match m.operation {
                    MathOperation::Add => {
                        Ok(lhs_len + to_length_ticks(&m.rhs, anchor_ticks + lhs_len, map)?)
                    }
                    MathOperation::Subtract => solve_subtract(&m.rhs, anchor_ticks, lhs_len, map),
                }
            }
        },
    }
}

/// Express an absolute tick position in the requested representation
pub fn time_from_ticks(ticks: u64, kind: TimeSpanKind, map: &TempoMap) -> TimeSpan {
    length_from_ticks(ticks, 0, kind, map)
}

/// Express a tick length starting at `anchor_ticks` in the requested
/// representation, redistributing overflow across ticks, beats and bars
/// (or beat fractions) under the meter at the anchor.
pub fn length_from_ticks(
    length_ticks: u64,
    anchor_ticks: u64,
    kind: TimeSpanKind,
    map: &TempoMap,
) -> TimeSpan {
    match kind {
        TimeSpanKind::Midi => TimeSpan::Midi(MidiTimeSpan(length_ticks)),
        TimeSpanKind::Metric => TimeSpan::Metric(MetricTimeSpan::from_micros(
            map.micros_between(anchor_ticks, anchor_ticks + length_ticks),
        )),
        TimeSpanKind::Musical => TimeSpan::Musical(ticks_to_musical(length_ticks, map)),
        TimeSpanKind::BarBeatTicks => {
            TimeSpan::BarBeatTicks(length_to_bar_beat_ticks(length_ticks, anchor_ticks, map))
        }
        TimeSpanKind::BarBeatFraction => {
            TimeSpan::BarBeatFraction(length_to_bar_beat_fraction(length_ticks, anchor_ticks, map))
        }
    }
}

/// Convert a span interpreted as a *time* into another representation.
///
/// Goes through ticks as the common intermediate, so conversions compose.
pub fn convert_time(span: &TimeSpan, kind: TimeSpanKind, map: &TempoMap) -> TimeResult<TimeSpan> {
    Ok(time_from_ticks(to_absolute_ticks(span, map)?, kind, map))
}

/// Convert a span interpreted as a *length* at `anchor_ticks` into another
/// representation at the same anchor.
pub fn convert_length(
    span: &TimeSpan,
    anchor_ticks: u64,
    kind: TimeSpanKind,
    map: &TempoMap,
) -> TimeResult<TimeSpan> {
    Ok(length_from_ticks(
        to_length_ticks(span, anchor_ticks, map)?,
        anchor_ticks,
        kind,
        map,
    ))
}

/// Re-express a length at a different anchor, keeping its representation.
///
/// The tick extent is resolved at `old_anchor`, then redistributed under
/// the tempo/meter in effect at `new_anchor`.
pub fn reanchor_length(
    span: &TimeSpan,
    old_anchor: u64,
    new_anchor: u64,
    map: &TempoMap,
) -> TimeResult<TimeSpan> {
    let kind = span.kind().ok_or_else(|| {
        TimeError::UnsupportedConversion(
            "a deferred span has no concrete representation to re-anchor".to_string(),
        )
    })?;
    let length = to_length_ticks(span, old_anchor, map)?;
    Ok(length_from_ticks(length, new_anchor, kind, map))
}

// ═══════════════════════════════════════════════════════════════════════════════
// MUSICAL FRACTIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Whole-note fraction to ticks; depends only on the tick resolution
fn musical_to_ticks(span: &MusicalTimeSpan, map: &TempoMap) -> u64 {
    let whole = 4 * map.ticks_per_quarter_note() as u128;
    let den = span.denominator as u128;
    ((span.numerator as u128 * whole + den / 2) / den) as u64
}

fn ticks_to_musical(ticks: u64, map: &TempoMap) -> MusicalTimeSpan {
    if ticks == 0 {
        return MusicalTimeSpan::ZERO;
    }
    let whole = 4 * map.ticks_per_quarter_note() as u64;
    let g = gcd(ticks, whole);
    MusicalTimeSpan::new(ticks / g, whole / g)
}

// ═══════════════════════════════════════════════════════════════════════════════
// BAR WALKS
// ═══════════════════════════════════════════════════════════════════════════════

/// Tick position reached after `bars` whole bars starting at `start`.
///
/// Each bar's length comes from the signature in effect at the bar's
/// start; a signature change landing mid-bar takes effect from the next
/// bar boundary.
fn advance_bars(map: &TempoMap, start: u64, bars: u64) -> u64 {
    let tpq = map.ticks_per_quarter_note();
    let mut tick = start;
    let mut remaining = bars;

    while remaining > 0 {
        let bar_len = map.time_signature_at(tick).ticks_per_bar(tpq);
        match map.time_signature_changes_after(tick).next() {
            Some(change) => {
                let full = (change.tick - tick) / bar_len;
                if full == 0 {
                    tick += bar_len;
                    remaining -= 1;
                } else {
                    let take = full.min(remaining);
                    tick += take * bar_len;
                    remaining -= take;
                }
            }
            None => {
                tick += remaining * bar_len;
                remaining = 0;
            }
        }
    }

    tick
}

/// Count whole bars between `start` and `target`; returns the bar count
/// and the tick of the last bar boundary at or before `target`.
fn split_full_bars(map: &TempoMap, start: u64, target: u64) -> (u64, u64) {
    let tpq = map.ticks_per_quarter_note();
    let mut tick = start;
    let mut bars = 0u64;

    loop {
        let bar_len = map.time_signature_at(tick).ticks_per_bar(tpq);
        if tick + bar_len > target {
            break;
        }
        let limit = map
            .time_signature_changes_after(tick)
            .next()
            .map(|c| c.tick)
            .unwrap_or(u64::MAX)
            .min(target);
        let full = (limit - tick) / bar_len;
        if full == 0 {
            // signature change lands mid-bar; the bar in progress still
            // belongs to the current meter
            tick += bar_len;
            bars += 1;
        } else {
            tick += full * bar_len;
            bars += full;
        }
    }

    (bars, tick)
}

fn bar_beat_ticks_to_length(span: &BarBeatTicksTimeSpan, anchor: u64, map: &TempoMap) -> u64 {
    let tpq = map.ticks_per_quarter_note();
    let bar_end = advance_bars(map, anchor, span.bars);
    let beat_len = map.time_signature_at(bar_end).ticks_per_beat(tpq);
    bar_end - anchor + span.beats * beat_len + span.ticks
}

fn length_to_bar_beat_ticks(length: u64, anchor: u64, map: &TempoMap) -> BarBeatTicksTimeSpan {
    let tpq = map.ticks_per_quarter_note();
    let target = anchor + length;
    let (bars, bar_start) = split_full_bars(map, anchor, target);
    let beat_len = map.time_signature_at(bar_start).ticks_per_beat(tpq);
    let rem = target - bar_start;
    BarBeatTicksTimeSpan::new(bars, rem / beat_len, rem % beat_len)
}

fn bar_beat_fraction_to_length(
    span: &BarBeatFractionTimeSpan,
    anchor: u64,
    map: &TempoMap,
) -> u64 {
    let tpq = map.ticks_per_quarter_note();
    let bar_end = advance_bars(map, anchor, span.bars);
    let beat_len = map.time_signature_at(bar_end).ticks_per_beat(tpq);
    bar_end - anchor + (span.beats * beat_len as f64).round() as u64
}

fn length_to_bar_beat_fraction(
    length: u64,
    anchor: u64,
    map: &TempoMap,
) -> BarBeatFractionTimeSpan {
    let tpq = map.ticks_per_quarter_note();
    let target = anchor + length;
    let (bars, bar_start) = split_full_bars(map, anchor, target);
    let beat_len = map.time_signature_at(bar_start).ticks_per_beat(tpq);
    BarBeatFractionTimeSpan::new(bars, (target - bar_start) as f64 / beat_len as f64)
}

// ═══════════════════════════════════════════════════════════════════════════════
// DEFERRED SUBTRACTION
// ═══════════════════════════════════════════════════════════════════════════════

/// Solve `x + length(rhs at base + x) == target` for `x`.
///
/// Used for both `Time − Length` (base 0, target is the time) and
/// `Length − Length` (base is the anchor, target the left length). The
/// measure is monotone non-decreasing in `x` — an interval starting later
/// ends later — so bisection finds the answer; if rounding leaves no exact
/// solution the closer neighbor wins.
fn solve_subtract(rhs: &TimeSpan, base: u64, target: u64, map: &TempoMap) -> TimeResult<u64> {
    let measure = |x: u64| -> TimeResult<u64> { Ok(x + to_length_ticks(rhs, base + x, map)?) };

    if measure(0)? > target {
        return Err(TimeError::InvalidArgument(
            "subtraction result would be negative".to_string(),
        ));
    }

    let mut lo = 0u64;
    let mut hi = target;
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if measure(mid)? < target {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }

    let over = measure(lo)?;
    if over > target && lo > 0 {
        let under = measure(lo - 1)?;
        if target - under < over - target {
            lo -= 1;
        }
    }

    Ok(lo)
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tempo::{Tempo, TimeSignature};

    /// Constant 120 BPM, 4/4, 480 ticks per quarter note
    fn default_map() -> TempoMap {
        TempoMap::default()
    }

    /// 4/4 switching to 5/8 at tick 3840 (two whole notes in)
    fn meter_change_map() -> TempoMap {
        let mut map = TempoMap::default();
        map.set_time_signature(3840, TimeSignature::new(5, 8));
        map
    }

    /// Tempo doubling at tick 960 and meter switching to 3/4 at tick 1920
    fn tempo_and_meter_map() -> TempoMap {
        let mut map = TempoMap::default();
        map.set_tempo(960, Tempo(250_000));
        map.set_time_signature(1920, TimeSignature::WALTZ);
        map
    }

    fn all_maps() -> Vec<TempoMap> {
        vec![default_map(), meter_change_map(), tempo_and_meter_map()]
    }

    #[test]
    fn quarter_note_is_480_ticks() {
        let map = default_map();
        let span = TimeSpan::Musical(MusicalTimeSpan::QUARTER);
        assert_eq!(to_absolute_ticks(&span, &map).unwrap(), 480);
    }

    #[test]
    fn scaled_musical_span_matches_scaled_ticks() {
        let map = default_map();
        let quarter = TimeSpan::Musical(MusicalTimeSpan::QUARTER);
        let scaled = quarter.multiply(1.5).unwrap();
        assert_eq!(to_absolute_ticks(&scaled, &map).unwrap(), 720);
        let halved = quarter.divide(2.0).unwrap();
        assert_eq!(to_absolute_ticks(&halved, &map).unwrap(), 240);
    }

    #[test]
    fn bar_position_respects_meter_change() {
        let map = meter_change_map();
        // Two 4/4 bars before the 5/8 switch.
        let span = TimeSpan::BarBeatTicks(BarBeatTicksTimeSpan::new(2, 0, 0));
        assert_eq!(to_absolute_ticks(&span, &map).unwrap(), 3840);

        // The third bar is 5/8: 5 * 240 ticks.
        let span = TimeSpan::BarBeatTicks(BarBeatTicksTimeSpan::new(3, 0, 0));
        assert_eq!(to_absolute_ticks(&span, &map).unwrap(), 3840 + 1200);

        // Beats inside the 5/8 bar are eighth-sized.
        let span = TimeSpan::BarBeatTicks(BarBeatTicksTimeSpan::new(2, 2, 10));
        assert_eq!(to_absolute_ticks(&span, &map).unwrap(), 3840 + 2 * 240 + 10);
    }

    #[test]
    fn metric_time_integrates_tempo_changes() {
        let map = tempo_and_meter_map();
        // 960 ticks at 120 BPM is one second; the next second covers
        // 1920 ticks at 240 BPM.
        let span = TimeSpan::Metric(MetricTimeSpan::new(0, 0, 2, 0));
        assert_eq!(to_absolute_ticks(&span, &map).unwrap(), 960 + 1920);
    }

    #[test]
    fn metric_length_depends_on_anchor() {
        let map = tempo_and_meter_map();
        let half_second = TimeSpan::Metric(MetricTimeSpan::from_millis(500));
        assert_eq!(to_length_ticks(&half_second, 0, &map).unwrap(), 480);
        assert_eq!(to_length_ticks(&half_second, 960, &map).unwrap(), 960);
    }

    #[test]
    fn midi_and_musical_lengths_are_anchor_independent() {
        let map = tempo_and_meter_map();
        for span in [
            TimeSpan::Midi(MidiTimeSpan(777)),
            TimeSpan::Musical(MusicalTimeSpan::new(3, 8)),
        ] {
            let at_zero = to_length_ticks(&span, 0, &map).unwrap();
            let at_anchor = to_length_ticks(&span, 2500, &map).unwrap();
            assert_eq!(at_zero, at_anchor);
        }
    }

    #[test]
    fn cyclic_conversion_is_exact_for_exact_types() {
        for map in all_maps() {
            for span in [
                TimeSpan::Midi(MidiTimeSpan(5000)),
                TimeSpan::Musical(MusicalTimeSpan::new(7, 16)),
                TimeSpan::BarBeatTicks(BarBeatTicksTimeSpan::new(3, 1, 100)),
            ] {
                let ticks = to_absolute_ticks(&span, &map).unwrap();
                let kind = span.kind().unwrap();
                let back = time_from_ticks(ticks, kind, &map);
                assert_eq!(
                    to_absolute_ticks(&back, &map).unwrap(),
                    ticks,
                    "cyclic conversion drifted for {span} on {map:?}"
                );
            }
        }
    }

    #[test]
    fn cyclic_conversion_metric_within_tolerance() {
        for map in all_maps() {
            let span = TimeSpan::Metric(MetricTimeSpan::new(0, 0, 3, 250));
            let ticks = to_absolute_ticks(&span, &map).unwrap();
            let back = time_from_ticks(ticks, TimeSpanKind::Metric, &map);
            let micros = MetricTimeSpan::try_from(back).unwrap().as_micros();
            let diff = micros.abs_diff(3_250_000);
            // Within one tick's worth of microseconds.
            assert!(diff <= 1100, "metric drifted by {diff}us");
        }
    }

    #[test]
    fn cross_type_agreement() {
        let map = default_map();
        // One 4/4 bar: 1920 ticks, one whole note, two seconds at 120 BPM.
        let representations = [
            TimeSpan::Midi(MidiTimeSpan(1920)),
            TimeSpan::Musical(MusicalTimeSpan::WHOLE),
            TimeSpan::Metric(MetricTimeSpan::new(0, 0, 2, 0)),
            TimeSpan::BarBeatTicks(BarBeatTicksTimeSpan::new(1, 0, 0)),
            TimeSpan::BarBeatFraction(BarBeatFractionTimeSpan::new(1, 0.0)),
        ];
        for a in &representations {
            for b in &representations {
                let converted = convert_time(a, b.kind().unwrap(), &map).unwrap();
                assert_eq!(&converted, b, "{a} did not convert to {b}");
            }
        }
    }

    #[test]
    fn bar_beat_fraction_splits_remainder() {
        let map = default_map();
        // 1 bar + 1.5 beats in 4/4.
        let ticks = 1920 + 720;
        let span = time_from_ticks(ticks, TimeSpanKind::BarBeatFraction, &map);
        assert_eq!(
            span,
            TimeSpan::BarBeatFraction(BarBeatFractionTimeSpan::new(1, 1.5))
        );
        assert_eq!(to_absolute_ticks(&span, &map).unwrap(), ticks);
    }

    #[test]
    fn length_anchored_in_changed_meter_uses_local_bar_size() {
        let map = meter_change_map();
        let one_bar = TimeSpan::BarBeatTicks(BarBeatTicksTimeSpan::new(1, 0, 0));
        assert_eq!(to_length_ticks(&one_bar, 0, &map).unwrap(), 1920);
        assert_eq!(to_length_ticks(&one_bar, 3840, &map).unwrap(), 1200);
    }

    #[test]
    fn deferred_time_plus_length_evaluates() {
        let map = tempo_and_meter_map();
        let span = TimeSpan::Midi(MidiTimeSpan(960)).add(
            TimeSpan::Metric(MetricTimeSpan::from_millis(500)),
            SpanMode::TimeLength,
        );
        // Half a second from tick 960 runs at 240 BPM.
        assert_eq!(to_absolute_ticks(&span, &map).unwrap(), 960 + 960);
    }

    #[test]
    fn deferred_time_time_is_rejected() {
        let map = default_map();
        let span = TimeSpan::Midi(MidiTimeSpan(1)).add(
            TimeSpan::Midi(MidiTimeSpan(2)),
            SpanMode::TimeTime,
        );
        assert!(matches!(
            to_absolute_ticks(&span, &map),
            Err(TimeError::TypeMismatch(_))
        ));
        assert!(matches!(
            to_length_ticks(&span, 0, &map),
            Err(TimeError::TypeMismatch(_))
        ));
    }

    #[test]
    fn deferred_time_valued_node_is_not_a_length() {
        let map = default_map();
        let span = TimeSpan::Midi(MidiTimeSpan(100)).add(
            TimeSpan::Metric(MetricTimeSpan::from_millis(1)),
            SpanMode::TimeLength,
        );
        assert!(matches!(
            to_length_ticks(&span, 0, &map),
            Err(TimeError::UnsupportedConversion(_))
        ));
    }

    #[test]
    fn add_then_subtract_restores_time() {
        // (a + b) - b == a across tempo and meter changes.
        for map in all_maps() {
            let a = TimeSpan::Midi(MidiTimeSpan(700));
            let b = TimeSpan::Metric(MetricTimeSpan::from_millis(750));
            let sum = a.clone().add(b.clone(), SpanMode::TimeLength);
            let diff = sum.subtract(b, SpanMode::TimeLength).unwrap();
            assert_eq!(to_absolute_ticks(&diff, &map).unwrap(), 700);
        }
    }

    #[test]
    fn add_then_subtract_restores_length() {
        for map in all_maps() {
            let anchor = 960;
            let a = TimeSpan::Musical(MusicalTimeSpan::HALF);
            let b = TimeSpan::Metric(MetricTimeSpan::from_millis(250));
            let sum = a.clone().add(b.clone(), SpanMode::LengthLength);
            let diff = sum.subtract(b, SpanMode::LengthLength).unwrap();
            assert_eq!(
                to_length_ticks(&diff, anchor, &map).unwrap(),
                to_length_ticks(&a, anchor, &map).unwrap()
            );
        }
    }

    #[test]
    fn deferred_subtract_underflow_fails() {
        let map = default_map();
        let span = TimeSpan::Midi(MidiTimeSpan(100))
            .subtract(
                TimeSpan::Metric(MetricTimeSpan::new(0, 0, 10, 0)),
                SpanMode::TimeLength,
            )
            .unwrap();
        assert!(matches!(
            to_absolute_ticks(&span, &map),
            Err(TimeError::InvalidArgument(_))
        ));
    }

    #[test]
    fn reanchor_length_moves_meter_context() {
        let map = meter_change_map();
        let one_bar = TimeSpan::BarBeatTicks(BarBeatTicksTimeSpan::new(1, 0, 0));
        // One 4/4 bar re-anchored into the 5/8 region covers more bars.
        let moved = reanchor_length(&one_bar, 0, 3840, &map).unwrap();
        assert_eq!(
            moved,
            TimeSpan::BarBeatTicks(BarBeatTicksTimeSpan::new(1, 3, 0))
        );
    }

    #[test]
    fn reanchor_rejects_deferred_nodes() {
        let map = default_map();
        let span = TimeSpan::Midi(MidiTimeSpan(1)).add(
            TimeSpan::Musical(MusicalTimeSpan::QUARTER),
            SpanMode::LengthLength,
        );
        assert!(matches!(
            reanchor_length(&span, 0, 100, &map),
            Err(TimeError::UnsupportedConversion(_))
        ));
    }

    #[test]
    fn deferred_length_length_as_time_anchors_at_origin() {
        let map = default_map();
        let span = TimeSpan::Musical(MusicalTimeSpan::QUARTER).add(
            TimeSpan::Metric(MetricTimeSpan::from_millis(500)),
            SpanMode::LengthLength,
        );
        assert_eq!(to_absolute_ticks(&span, &map).unwrap(), 960);
    }
}
