//! # cl-timeline
//!
//! Layout of independently hosted segments on one continuous time axis.
//!
//! - [`SegmentRegistry`] owns the ordered segment list and applies probed
//!   durations with set-once semantics.
//! - [`Timeline`] is the derived offset table.
//! - [`projection`] maps global time to a segment and intra-segment time and
//!   back. It is pure and shared by seeking and auto-advance.

pub mod projection;
pub mod registry;
pub mod types;

// Re-export key types at crate root for convenience.
pub use projection::{boundary_of, global_time_of, locate};
pub use registry::SegmentRegistry;
pub use types::{Location, Timeline, TimelineEntry};
