//! Derived timeline types.

use serde::{Deserialize, Serialize};

use cl_core::{Segment, SegmentId};

/// One segment's placement on the continuous time axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    /// Segment this entry places.
    pub segment_id: SegmentId,
    /// Global time at which the segment starts.
    pub start: f64,
    /// Global time at which the segment ends (`start + effective duration`).
    pub end: f64,
}

impl TimelineEntry {
    /// Length of the entry in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Ordered, contiguous layout of all segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    entries: Vec<TimelineEntry>,
    total_duration: f64,
}

impl Timeline {
    /// Lay segments out back to back using their effective durations.
    pub fn from_segments(segments: &[Segment]) -> Self {
        let mut entries = Vec::with_capacity(segments.len());
        let mut cursor = 0.0;
        for segment in segments {
            let start = cursor;
            let end = start + segment.effective_duration();
            entries.push(TimelineEntry {
                segment_id: segment.id.clone(),
                start,
                end,
            });
            cursor = end;
        }

        Self {
            entries,
            total_duration: cursor,
        }
    }

    /// Entries in playback order.
    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    /// Entry at `index`, if any.
    pub fn entry(&self, index: usize) -> Option<&TimelineEntry> {
        self.entries.get(index)
    }

    /// Number of segments on the timeline.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the timeline has no segments.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// End offset of the last segment (0 when empty).
    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }
}

/// Result of projecting a global time onto the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Timeline index of the segment.
    pub index: usize,
    /// Seconds into that segment.
    pub offset: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_are_contiguous() {
        let segments = vec![
            Segment::new("a", "a.webm").with_declared_duration(10.0),
            Segment::new("b", "b.webm"),
            Segment::new("c", "c.webm").with_declared_duration(15.0),
        ];
        let timeline = Timeline::from_segments(&segments);
        assert_eq!(timeline.len(), 3);
        assert_eq!(timeline.entries()[0].start, 0.0);
        assert_eq!(timeline.entries()[1].start, 10.0);
        assert_eq!(timeline.entries()[1].end, 10.0);
        assert_eq!(timeline.entries()[2].start, 10.0);
        assert_eq!(timeline.total_duration(), 25.0);
    }

    #[test]
    fn empty_timeline() {
        let timeline = Timeline::from_segments(&[]);
        assert!(timeline.is_empty());
        assert_eq!(timeline.total_duration(), 0.0);
        assert!(timeline.entry(0).is_none());
    }

    #[test]
    fn timeline_serializes() {
        let segments = vec![Segment::new("a", "a.webm").with_declared_duration(3.0)];
        let timeline = Timeline::from_segments(&segments);
        let json = serde_json::to_string(&timeline).unwrap();
        assert!(json.contains("\"total_duration\":3.0"), "got: {json}");
    }
}
