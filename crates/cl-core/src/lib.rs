//! cl-core: shared types, IDs, errors, configuration, and transport events.
//!
//! This crate is the foundational dependency for all other cl-* crates,
//! providing typed identifiers, a unified error type, the segment data
//! model, the transport snapshot, configuration, and a broadcast event bus.

pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod media;
pub mod transport;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use ids::*;
pub use media::*;
pub use transport::{PlaybackStatus, SegmentLoadError, Transport};
