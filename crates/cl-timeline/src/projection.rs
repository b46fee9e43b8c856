//! Mapping between global time and (segment, intra-segment time).
//!
//! Boundary rule: a time exactly on the boundary between two segments
//! belongs to the later segment's start, except `total_duration`, which
//! belongs to the last segment's end. Seek logic and auto-advance both go
//! through these functions so they agree at clip boundaries.

use crate::types::{Location, Timeline};

/// Project `global_time` onto the timeline.
///
/// The time is clamped to `[0, total_duration]`; NaN is treated as 0.
/// Returns `None` only for an empty timeline.
pub fn locate(timeline: &Timeline, global_time: f64) -> Option<Location> {
    let entries = timeline.entries();
    let last = entries.len().checked_sub(1)?;
    let total = timeline.total_duration();

    let t = if global_time.is_nan() {
        0.0
    } else {
        global_time.clamp(0.0, total)
    };

    if t >= total {
        return Some(Location {
            index: last,
            offset: entries[last].duration(),
        });
    }

    // Last entry whose start is <= t. Zero-length entries sharing a start
    // resolve to the latest of them.
    let index = entries.partition_point(|e| e.start <= t).saturating_sub(1);
    Some(Location {
        index,
        offset: (t - entries[index].start).max(0.0),
    })
}

/// Global start offset of the segment at `index`.
///
/// `index == len` yields `total_duration`, so `boundary_of(i + 1)` is the
/// end of segment `i` for every valid `i`.
pub fn boundary_of(timeline: &Timeline, index: usize) -> Option<f64> {
    match timeline.entry(index) {
        Some(entry) => Some(entry.start),
        None if index == timeline.len() => Some(timeline.total_duration()),
        None => None,
    }
}

/// Inverse of [`locate`]: global time for an intra-segment position.
///
/// The offset is clamped into the segment's extent.
pub fn global_time_of(timeline: &Timeline, location: Location) -> Option<f64> {
    let entry = timeline.entry(location.index)?;
    Some((entry.start + location.offset.max(0.0)).min(entry.end))
}
