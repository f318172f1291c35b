//! Tempo and Time Signature Timeline
//!
//! Read-only tempo/meter view consumed by the conversion engine:
//! - Tempo changes (microseconds per quarter note, BPM helpers)
//! - Time signature changes
//! - Point queries (`tempo_at`, `time_signature_at`)
//! - Integration: microseconds elapsed over a tick range, and its inverse
//!
//! ## Time Units
//! - Ticks: PPQ-based (musical, `ticks_per_quarter_note` per quarter)
//! - Microseconds: Real time
//! - Bars/Beats: Derived from the time signature in effect

use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════════════
// CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Default ticks per quarter note (SMF type-0/1 common resolution)
pub const DEFAULT_TICKS_PER_QUARTER_NOTE: u32 = 480;

/// Default tempo: 120 BPM expressed in microseconds per quarter note
pub const DEFAULT_MICROS_PER_QUARTER_NOTE: u64 = 500_000;

/// Microseconds in one minute
const MICROS_PER_MINUTE: f64 = 60_000_000.0;

// ═══════════════════════════════════════════════════════════════════════════════
// TIME SIGNATURE
// ═══════════════════════════════════════════════════════════════════════════════

/// Time signature (e.g., 4/4, 3/4, 5/8)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    /// Numerator (beats per bar)
    pub numerator: u16,
    /// Denominator (note value that gets one beat)
    pub denominator: u16,
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::COMMON
    }
}

impl TimeSignature {
    pub fn new(numerator: u16, denominator: u16) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Common time (4/4)
    pub const COMMON: Self = Self {
        numerator: 4,
        denominator: 4,
    };

    /// Cut time (2/2)
    pub const CUT: Self = Self {
        numerator: 2,
        denominator: 2,
    };

    /// Waltz time (3/4)
    pub const WALTZ: Self = Self {
        numerator: 3,
        denominator: 4,
    };

    /// Ticks in one beat under this signature.
    ///
    /// A quarter note is `ticks_per_quarter` ticks; the denominator names the
    /// note value that gets one beat (4 = quarter, 8 = eighth, 2 = half).
    #[inline]
    pub fn ticks_per_beat(&self, ticks_per_quarter: u32) -> u64 {
        ticks_per_quarter as u64 * 4 / self.denominator as u64
    }

    /// Ticks in one bar under this signature
    #[inline]
    pub fn ticks_per_bar(&self, ticks_per_quarter: u32) -> u64 {
        self.ticks_per_beat(ticks_per_quarter) * self.numerator as u64
    }

    /// Is compound meter (6/8, 9/8, 12/8)
    pub fn is_compound(&self) -> bool {
        self.denominator == 8 && self.numerator % 3 == 0
    }
}

impl std::fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TEMPO
// ═══════════════════════════════════════════════════════════════════════════════

/// Tempo in microseconds per quarter note (MIDI-native representation)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tempo(pub u64);

impl Tempo {
    /// 120 BPM
    pub const DEFAULT: Self = Self(DEFAULT_MICROS_PER_QUARTER_NOTE);

    /// Construct from beats per minute
    pub fn from_bpm(bpm: f64) -> Self {
        Self((MICROS_PER_MINUTE / bpm).round() as u64)
    }

    /// Beats per minute view
    #[inline]
    pub fn as_bpm(self) -> f64 {
        MICROS_PER_MINUTE / self.0 as f64
    }

    /// Microseconds per quarter note
    #[inline]
    pub fn micros_per_quarter_note(self) -> u64 {
        self.0
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CHANGE EVENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Tempo change event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TempoChange {
    /// Position in ticks
    pub tick: u64,
    /// Tempo in effect from this tick on
    pub tempo: Tempo,
}

impl TempoChange {
    pub fn new(tick: u64, tempo: Tempo) -> Self {
        Self { tick, tempo }
    }
}

/// Time signature change event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignatureChange {
    /// Position in ticks
    pub tick: u64,
    /// Signature in effect from this tick on
    pub time_signature: TimeSignature,
}

impl TimeSignatureChange {
    pub fn new(tick: u64, time_signature: TimeSignature) -> Self {
        Self {
            tick,
            time_signature,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TEMPO MAP
// ═══════════════════════════════════════════════════════════════════════════════

/// Tempo and time signature map.
///
/// The conversion engine only reads it: point queries, change enumeration
/// and microsecond integration over tick ranges. Both event vectors stay
/// sorted by tick and always contain an event at tick 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempoMap {
    /// Fixed tick resolution for this timeline
    ticks_per_quarter_note: u32,
    /// Tempo events (sorted by tick)
    tempo_changes: Vec<TempoChange>,
    /// Time signature events (sorted by tick)
    time_signature_changes: Vec<TimeSignatureChange>,
}

impl Default for TempoMap {
    fn default() -> Self {
        Self::new(DEFAULT_TICKS_PER_QUARTER_NOTE)
    }
}

impl TempoMap {
    pub fn new(ticks_per_quarter_note: u32) -> Self {
        assert!(ticks_per_quarter_note > 0, "tick resolution must be > 0");
        Self {
            ticks_per_quarter_note,
            tempo_changes: vec![TempoChange::new(0, Tempo::DEFAULT)],
            time_signature_changes: vec![TimeSignatureChange::new(0, TimeSignature::COMMON)],
        }
    }

    /// Tick resolution of this timeline
    #[inline]
    pub fn ticks_per_quarter_note(&self) -> u32 {
        self.ticks_per_quarter_note
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Tempo
    // ─────────────────────────────────────────────────────────────────────────────

    /// Tempo in effect at `tick`
    pub fn tempo_at(&self, tick: u64) -> Tempo {
        self.tempo_changes
            .iter()
            .rev()
            .find(|c| c.tick <= tick)
            .map(|c| c.tempo)
            .unwrap_or_default()
    }

    /// Set tempo from `tick` on
    pub fn set_tempo(&mut self, tick: u64, tempo: Tempo) {
        if let Some(change) = self.tempo_changes.iter_mut().find(|c| c.tick == tick) {
            change.tempo = tempo;
        } else {
            self.tempo_changes.push(TempoChange::new(tick, tempo));
            self.tempo_changes.sort_by_key(|c| c.tick);
        }
    }

    /// Set tempo from `tick` on, in BPM
    pub fn set_bpm(&mut self, tick: u64, bpm: f64) {
        self.set_tempo(tick, Tempo::from_bpm(bpm));
    }

    /// All tempo events
    pub fn tempo_changes(&self) -> &[TempoChange] {
        &self.tempo_changes
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Time Signature
    // ─────────────────────────────────────────────────────────────────────────────

    /// Time signature in effect at `tick`
    pub fn time_signature_at(&self, tick: u64) -> TimeSignature {
        self.time_signature_changes
            .iter()
            .rev()
            .find(|c| c.tick <= tick)
            .map(|c| c.time_signature)
            .unwrap_or_default()
    }

    /// Set time signature from `tick` on
    pub fn set_time_signature(&mut self, tick: u64, time_signature: TimeSignature) {
        if let Some(change) = self
            .time_signature_changes
            .iter_mut()
            .find(|c| c.tick == tick)
        {
            change.time_signature = time_signature;
        } else {
            self.time_signature_changes
                .push(TimeSignatureChange::new(tick, time_signature));
            self.time_signature_changes.sort_by_key(|c| c.tick);
        }
    }

    /// All time signature events
    pub fn time_signature_changes(&self) -> &[TimeSignatureChange] {
        &self.time_signature_changes
    }

    /// Time signature changes strictly after `tick`, in order
    pub fn time_signature_changes_after(
        &self,
        tick: u64,
    ) -> impl Iterator<Item = &TimeSignatureChange> {
        self.time_signature_changes
            .iter()
            .filter(move |c| c.tick > tick)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Integration: Ticks <-> Microseconds
    // ─────────────────────────────────────────────────────────────────────────────

    /// Microseconds for `ticks` at a constant `tempo`, midpoint-rounded
    fn segment_micros(&self, ticks: u64, tempo: Tempo) -> u64 {
        let tpq = self.ticks_per_quarter_note as u128;
        ((ticks as u128 * tempo.0 as u128 + tpq / 2) / tpq) as u64
    }

    /// Wall-clock microseconds elapsed between two tick positions.
    ///
    /// Walks every tempo segment intersecting `[start_tick, end_tick)` and
    /// sums each segment's contribution.
    pub fn micros_between(&self, start_tick: u64, end_tick: u64) -> u64 {
        if end_tick <= start_tick {
            return 0;
        }

        let mut micros: u64 = 0;
        let mut current = start_tick;

        for change in &self.tempo_changes {
            if change.tick <= current {
                continue;
            }
            if change.tick >= end_tick {
                break;
            }
            micros += self.segment_micros(change.tick - current, self.tempo_at(current));
            current = change.tick;
        }

        micros + self.segment_micros(end_tick - current, self.tempo_at(current))
    }

    /// Tick count that spans `micros` microseconds starting at `start_tick`.
    ///
    /// Inverse of [`micros_between`](Self::micros_between): consumes whole
    /// tempo segments until the budget is exhausted, then converts the
    /// remainder under the final segment's tempo.
    pub fn ticks_for_micros(&self, start_tick: u64, micros: u64) -> u64 {
        let tpq = self.ticks_per_quarter_note as u128;
        let mut budget = micros as u128;
        let mut current = start_tick;

        for change in &self.tempo_changes {
            if change.tick <= current {
                continue;
            }
            let tempo = self.tempo_at(current);
            let segment_ticks = change.tick - current;
            let segment_micros = self.segment_micros(segment_ticks, tempo) as u128;
            if segment_micros > budget {
                break;
            }
            budget -= segment_micros;
            current = change.tick;
        }

        // Open-ended final segment
        let tempo = self.tempo_at(current).0 as u128;
        let remainder = ((budget * tpq + tempo / 2) / tempo) as u64;
        current - start_tick + remainder
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_signature_tick_sizes() {
        let ts = TimeSignature::new(4, 4);
        assert_eq!(ts.ticks_per_bar(480), 4 * 480);
        assert_eq!(ts.ticks_per_beat(480), 480);

        let ts_58 = TimeSignature::new(5, 8);
        assert_eq!(ts_58.ticks_per_beat(480), 240);
        assert_eq!(ts_58.ticks_per_bar(480), 1200);

        let ts_68 = TimeSignature::new(6, 8);
        assert!(ts_68.is_compound());
    }

    #[test]
    fn tempo_bpm_round_trip() {
        let tempo = Tempo::from_bpm(120.0);
        assert_eq!(tempo.0, 500_000);
        assert!((tempo.as_bpm() - 120.0).abs() < 1e-9);
    }

    #[test]
    fn point_queries() {
        let mut map = TempoMap::default();
        map.set_bpm(1920, 140.0);
        map.set_time_signature(3840, TimeSignature::new(5, 8));

        assert_eq!(map.tempo_at(0), Tempo::DEFAULT);
        assert_eq!(map.tempo_at(1920), Tempo::from_bpm(140.0));
        assert_eq!(map.tempo_at(5000), Tempo::from_bpm(140.0));
        assert_eq!(map.time_signature_at(0), TimeSignature::COMMON);
        assert_eq!(map.time_signature_at(3840), TimeSignature::new(5, 8));
    }

    #[test]
    fn micros_constant_tempo() {
        let map = TempoMap::default();
        // One quarter note at 120 BPM is half a second.
        assert_eq!(map.micros_between(0, 480), 500_000);
        assert_eq!(map.ticks_for_micros(0, 500_000), 480);
    }

    #[test]
    fn micros_across_tempo_change() {
        let mut map = TempoMap::default();
        map.set_tempo(480, Tempo(250_000));

        // First quarter at 120 BPM, second quarter at 240 BPM.
        assert_eq!(map.micros_between(0, 960), 750_000);
        assert_eq!(map.ticks_for_micros(0, 750_000), 960);

        // Starting mid-timeline integrates only the fast segment.
        assert_eq!(map.micros_between(480, 960), 250_000);
        assert_eq!(map.ticks_for_micros(480, 250_000), 480);
    }

    #[test]
    fn micros_round_trip_partial_segment() {
        let mut map = TempoMap::default();
        map.set_bpm(700, 97.3);

        let micros = map.micros_between(0, 1234);
        let ticks = map.ticks_for_micros(0, micros);
        assert!((ticks as i64 - 1234).abs() <= 1);
    }

    #[test]
    fn set_tempo_replaces_at_same_tick() {
        let mut map = TempoMap::default();
        map.set_tempo(0, Tempo(400_000));
        assert_eq!(map.tempo_changes().len(), 1);
        assert_eq!(map.tempo_at(0), Tempo(400_000));
    }
}
