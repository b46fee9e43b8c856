//! Externally observable playback state.
//!
//! A [`Transport`] is a plain snapshot. Only the playback engine produces
//! new snapshots; everyone else reads copies.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::SegmentId;

/// Playback status of a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    Idle,
    Loading,
    Playing,
    Paused,
    Ended,
    Error,
}

impl PlaybackStatus {
    /// Whether the status is terminal for a play-through (`ended` or `error`).
    pub fn is_settled(self) -> bool {
        matches!(self, Self::Ended | Self::Error)
    }
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Loading => write!(f, "loading"),
            Self::Playing => write!(f, "playing"),
            Self::Paused => write!(f, "paused"),
            Self::Ended => write!(f, "ended"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A decoder failure recorded in the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentLoadError {
    /// Timeline index of the segment that failed.
    pub index: usize,
    /// Identifier of the segment that failed.
    pub segment_id: SegmentId,
    /// Decoder-provided description.
    pub message: String,
}

impl fmt::Display for SegmentLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "segment {} ({}) failed: {}",
            self.index, self.segment_id, self.message
        )
    }
}

impl From<SegmentLoadError> for crate::Error {
    fn from(e: SegmentLoadError) -> Self {
        crate::Error::SegmentLoad {
            index: e.index,
            segment_id: e.segment_id,
            message: e.message,
        }
    }
}

/// Snapshot of a player's transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transport {
    /// Active timeline index; `None` before any segment has been loaded.
    pub active_segment_index: Option<usize>,
    /// Seconds elapsed across the whole timeline.
    pub global_time: f64,
    /// Current total duration of the timeline.
    pub total_duration: f64,
    /// Playback status.
    pub status: PlaybackStatus,
    /// Present only while `status == Error`.
    pub last_error: Option<SegmentLoadError>,
}

impl Transport {
    /// The transport of a freshly constructed player.
    pub fn idle(total_duration: f64) -> Self {
        Self {
            active_segment_index: None,
            global_time: 0.0,
            total_duration,
            status: PlaybackStatus::Idle,
            last_error: None,
        }
    }

    /// Fraction of the timeline elapsed, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        if self.total_duration > 0.0 {
            (self.global_time / self.total_duration).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}
