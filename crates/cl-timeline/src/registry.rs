//! Ordered segment list with set-once duration resolution.

use std::collections::HashMap;

use cl_core::{Error, Result, Segment, SegmentId};

use crate::types::Timeline;

/// Holds the segments of one player and the timeline derived from them.
///
/// The timeline is recomputed lazily on the first read after a duration
/// update and cached until the next one.
#[derive(Debug, Clone)]
pub struct SegmentRegistry {
    segments: Vec<Segment>,
    positions: HashMap<SegmentId, usize>,
    cached: Option<Timeline>,
}

impl SegmentRegistry {
    /// Build a registry from an ordered segment list.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyTimeline`] when `segments` is empty, and
    /// [`Error::Validation`] when two segments share an id.
    pub fn register(segments: Vec<Segment>) -> Result<Self> {
        if segments.is_empty() {
            return Err(Error::EmptyTimeline);
        }

        let mut positions = HashMap::with_capacity(segments.len());
        for (index, segment) in segments.iter().enumerate() {
            if positions.insert(segment.id.clone(), index).is_some() {
                return Err(Error::Validation(format!(
                    "duplicate segment id: {}",
                    segment.id
                )));
            }
        }

        Ok(Self {
            segments,
            positions,
            cached: None,
        })
    }

    /// Record a probed duration for `id`.
    ///
    /// Only the first positive, finite value is kept. Returns `true` when the
    /// value was stored; later calls for the same id are no-ops.
    pub fn update_resolved_duration(&mut self, id: &SegmentId, seconds: f64) -> bool {
        if !seconds.is_finite() || seconds <= 0.0 {
            return false;
        }
        let Some(&index) = self.positions.get(id) else {
            tracing::debug!(segment_id = %id, "duration update for unknown segment ignored");
            return false;
        };

        let segment = &mut self.segments[index];
        if segment.resolved_duration.is_some() {
            return false;
        }

        segment.resolved_duration = Some(seconds);
        self.cached = None;
        tracing::debug!(segment_id = %id, seconds, "resolved segment duration");
        true
    }

    /// Current timeline, recomputed if a duration changed since the last read.
    pub fn timeline(&mut self) -> &Timeline {
        self.cached
            .get_or_insert_with(|| Timeline::from_segments(&self.segments))
    }

    /// Segments in timeline order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Segment at `index`.
    pub fn segment(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    /// Timeline index of the segment with `id`.
    pub fn position(&self, id: &SegmentId) -> Option<usize> {
        self.positions.get(id).copied()
    }

    /// Number of registered segments (never zero).
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always `false`; a registry cannot be empty.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}
