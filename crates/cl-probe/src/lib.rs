//! # cl-probe
//!
//! Metadata-only duration probing for media segments.
//!
//! - [`DurationProber`] is the async seam every prober implements.
//! - [`ContainerProber`] reads MKV/WebM (via `matroska`) and MP4/M4A (via
//!   `mp4parse`) headers from local files.
//! - [`HttpProber`] fetches remote sources with `reqwest` and parses the
//!   same headers from memory.
//! - [`CompositeProber`] layers several probers.
//! - [`DurationResolver`] probes a whole segment list concurrently,
//!   tolerating individual failures, and streams progress.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use cl_probe::{CompositeProber, ContainerProber, DurationResolver};
//! use cl_core::Segment;
//! use tokio_stream::StreamExt;
//!
//! # async fn run() {
//! let prober = Arc::new(CompositeProber::new(vec![Box::new(ContainerProber::new())]));
//! let resolver = DurationResolver::new(prober);
//! let segments = vec![Segment::new("part-1", "/recordings/part-1.webm")];
//! let mut progress = resolver.resolve_all(&segments);
//! while let Some(event) = progress.next().await {
//!     println!("{:.0}% {}", event.progress() * 100.0, event.segment_id);
//! }
//! # }
//! ```

pub mod composite;
pub mod container;
pub mod http;
pub mod prober;
pub mod resolver;

// Re-export key types at crate root for convenience.
pub use composite::CompositeProber;
pub use container::{duration_from_bytes, duration_from_file, ContainerProber};
pub use http::HttpProber;
pub use prober::DurationProber;
pub use resolver::{DurationResolver, ProbeOutcome, ProgressEvent};

use cl_core::config::ProbeConfig;

/// The default prober stack: local files first, then HTTP(S).
pub fn default_prober(config: &ProbeConfig) -> cl_core::Result<CompositeProber> {
    Ok(CompositeProber::new(vec![
        Box::new(ContainerProber::new()),
        Box::new(HttpProber::new(config)?),
    ]))
}
