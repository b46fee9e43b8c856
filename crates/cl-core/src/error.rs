//! Unified error type for clipline.
//!
//! All crates funnel their failures into [`Error`]. Callers that render errors
//! (a UI, the CLI) can branch on [`Error::code`] instead of matching strings.

use crate::ids::SegmentId;

/// Unified error type covering all failure modes in clipline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A player was constructed with zero segments.
    #[error("timeline has no segments")]
    EmptyTimeline,

    /// A segment's decoder failed to initialize or play.
    #[error("failed to load segment {index} ({segment_id}): {message}")]
    SegmentLoad {
        /// Position of the segment on the timeline.
        index: usize,
        /// Identifier of the offending segment.
        segment_id: SegmentId,
        /// Human-readable error description.
        message: String,
    },

    /// Duration probing failed.
    #[error("Probe error: {0}")]
    Probe(String),

    /// Caller input failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// A remote fetch failed.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The player was torn down; no further operations are accepted.
    #[error("player has been destroyed")]
    Destroyed,

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Error::EmptyTimeline => "empty_timeline",
            Error::SegmentLoad { .. } => "segment_load",
            Error::Probe(_) => "probe",
            Error::Validation(_) => "validation",
            Error::Io { .. } => "io",
            Error::Http(_) => "http",
            Error::Destroyed => "destroyed",
            Error::Internal(_) => "internal",
        }
    }

    /// Convenience constructor for [`Error::SegmentLoad`].
    pub fn segment_load(index: usize, segment_id: SegmentId, message: impl Into<String>) -> Self {
        Error::SegmentLoad {
            index,
            segment_id,
            message: message.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
