//! Nearest-grid-point search
//!
//! Shared by snapping tools that decide separately *what* to move: the
//! search only reports where the closest grid line is and how far the
//! caller-configured strength would pull toward it.

use std::cmp::Ordering;

use mt_core::{length_from_ticks, TempoMap, TimeError, TimeResult, TimeSpan, TimeSpanKind};

/// Outcome of a nearest-grid-point search
#[derive(Debug, Clone, PartialEq)]
pub struct GridSnap {
    /// The winning candidate grid line, in absolute ticks
    pub grid_tick: u64,
    /// Distance to the grid line in raw ticks
    pub raw_distance: u64,
    /// The same distance expressed in the requested distance unit
    pub converted_distance: TimeSpan,
    /// Signed tick shift toward the grid line, already scaled by the
    /// quantizing level
    pub shift_ticks: i64,
}

/// Find the candidate in `grid_ticks` (ascending) closest to `position`.
///
/// Closeness is judged in `distance_kind`: each raw tick distance is
/// converted as a length anchored halfway toward the candidate, so a
/// metric distance respects tempo changes between the object and the
/// grid line. The scan walks candidates once and stops as soon as the
/// converted distance stops shrinking; ties keep the earlier candidate.
///
/// `level` is the quantizing strength in `0.0..=1.0`: the returned shift
/// is the full distance scaled by it, leaving the actual move (full snap
/// or partial pull) to the caller.
pub fn find_nearest_grid_point(
    grid_ticks: &[u64],
    position: u64,
    distance_kind: TimeSpanKind,
    level: f64,
    map: &TempoMap,
) -> TimeResult<GridSnap> {
    if !(0.0..=1.0).contains(&level) {
        return Err(TimeError::InvalidArgument(format!(
            "quantizing level must be within 0..=1, got {level}"
        )));
    }
    let (first, rest) = grid_ticks.split_first().ok_or_else(|| {
        TimeError::InvalidArgument("grid must contain at least one candidate".to_string())
    })?;

    let measure = |candidate: u64| {
        let raw = candidate.abs_diff(position);
        let midpoint = position.min(candidate) + raw / 2;
        (raw, length_from_ticks(raw, midpoint, distance_kind, map))
    };

    let mut grid_tick = *first;
    let (mut raw_distance, mut converted_distance) = measure(grid_tick);
    for &candidate in rest {
        let (raw, converted) = measure(candidate);
        if converted.compare(&converted_distance)? != Ordering::Less {
            // Candidates are ascending, so distances only grow from
            // here on.
            break;
        }
        grid_tick = candidate;
        raw_distance = raw;
        converted_distance = converted;
    }

    let shift_ticks = ((grid_tick as i128 - position as i128) as f64 * level).round() as i64;

    log::debug!(
        "nearest grid point for tick {position}: {grid_tick} \
         (distance {converted_distance}, shift {shift_ticks})"
    );

    Ok(GridSnap {
        grid_tick,
        raw_distance,
        converted_distance,
        shift_ticks,
    })
}
