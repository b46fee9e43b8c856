//! Media-domain types: segments and container formats.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::SegmentId;

// ---------------------------------------------------------------------------
// Container
// ---------------------------------------------------------------------------

/// Container formats the probers understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    /// Matroska, including WebM recordings.
    Mkv,
    /// ISO BMFF: MP4, M4A, MOV.
    Mp4,
}

impl Container {
    /// Map a file extension (without the dot) to a container.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "mkv" | "mka" | "webm" => Some(Self::Mkv),
            "mp4" | "m4a" | "m4v" | "mov" => Some(Self::Mp4),
            _ => None,
        }
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mkv => write!(f, "mkv"),
            Self::Mp4 => write!(f, "mp4"),
        }
    }
}

// ---------------------------------------------------------------------------
// Segment
// ---------------------------------------------------------------------------

/// One independently hosted media file on a stitched timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Stable identifier supplied by the caller.
    pub id: SegmentId,
    /// Locator for the media bytes (path, `file://` or `http(s)://` URL).
    #[serde(default)]
    pub source_url: Option<String>,
    /// Duration in seconds from the caller's metadata. May be absent or wrong.
    #[serde(default)]
    pub declared_duration: Option<f64>,
    /// Duration in seconds obtained by probing. Set at most once.
    #[serde(default)]
    pub resolved_duration: Option<f64>,
}

impl Segment {
    /// Create a segment with a source and no duration information.
    pub fn new(id: impl Into<SegmentId>, source_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source_url: Some(source_url.into()),
            declared_duration: None,
            resolved_duration: None,
        }
    }

    /// Builder: set the declared fallback duration.
    #[must_use]
    pub fn with_declared_duration(mut self, seconds: f64) -> Self {
        self.declared_duration = Some(seconds);
        self
    }

    /// Builder: drop the source locator.
    #[must_use]
    pub fn without_source(mut self) -> Self {
        self.source_url = None;
        self
    }

    /// Duration used for layout: resolved if known, else declared, else 0.
    pub fn effective_duration(&self) -> f64 {
        self.resolved_duration
            .or(self.declared_duration)
            .filter(|d| d.is_finite() && *d > 0.0)
            .unwrap_or(0.0)
    }

    /// Fallback duration used when a probe fails.
    pub fn fallback_duration(&self) -> f64 {
        self.declared_duration
            .filter(|d| d.is_finite() && *d > 0.0)
            .unwrap_or(0.0)
    }
}
