//! The decoder seam: one media-playback resource per loaded segment.
//!
//! A [`DecoderFactory`] starts loading a segment and returns a [`Decoder`]
//! handle immediately. Everything asynchronous (readiness, position ticks,
//! natural end, failure) comes back as [`DecoderEvent`]s through the
//! [`DecoderEvents`] sink the engine hands to the factory. Each sink is
//! stamped with a [`RequestToken`], which is how the engine tells current
//! events from stale ones. A seek within the loaded segment hands the decoder
//! a fresh sink, so reports queued before the seek are dropped too.

use cl_core::{RequestToken, Segment};
use tokio::sync::mpsc;

/// What a decoder reports.
#[derive(Debug, Clone, PartialEq)]
pub enum DecoderEventKind {
    /// The source is loaded and playable. `duration` is the length the
    /// decoder discovered from the media itself, if any.
    Ready { duration: Option<f64> },
    /// Current intra-segment position while playing.
    TimeUpdate { position: f64 },
    /// Playback reached the natural end of the segment.
    Ended,
    /// Loading or playback failed.
    Failed { message: String },
}

/// A decoder report tagged with the load it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct DecoderEvent {
    pub token: RequestToken,
    pub kind: DecoderEventKind,
}

/// Sending half handed to a decoder for one load.
#[derive(Debug, Clone)]
pub struct DecoderEvents {
    token: RequestToken,
    tx: mpsc::UnboundedSender<DecoderEvent>,
}

impl DecoderEvents {
    /// Create a sink for the load identified by `token`.
    pub fn new(token: RequestToken, tx: mpsc::UnboundedSender<DecoderEvent>) -> Self {
        Self { token, tx }
    }

    /// Token of the load this sink reports for.
    pub fn token(&self) -> RequestToken {
        self.token
    }

    /// Report an event. Returns `false` once the engine has gone away.
    pub fn emit(&self, kind: DecoderEventKind) -> bool {
        self.tx
            .send(DecoderEvent {
                token: self.token,
                kind,
            })
            .is_ok()
    }
}

/// Parameters of a single load.
#[derive(Debug, Clone, Copy)]
pub struct LoadRequest<'a> {
    /// Timeline index of the segment.
    pub index: usize,
    /// The segment to load.
    pub segment: &'a Segment,
    /// Token stamped on every event of this load.
    pub token: RequestToken,
}

/// Handle to an attached decoder.
///
/// Methods must not block; results arrive as events.
pub trait Decoder: Send {
    /// Start or resume playback from the current position.
    fn play(&mut self) -> cl_core::Result<()>;

    /// Pause playback, keeping the position.
    fn pause(&mut self);

    /// Move to `seconds` into the segment and report through `events` from
    /// now on. A decoder that was playing keeps playing from the new
    /// position, even if it had already reached the end.
    fn set_position(&mut self, seconds: f64, events: DecoderEvents);

    /// Stop all activity and free resources. After this returns the decoder
    /// must not emit further events (stray ones are discarded by token).
    fn release(&mut self);
}

/// Creates decoders.
pub trait DecoderFactory: Send + Sync {
    /// Begin loading `request.segment` and return its handle.
    ///
    /// Synchronous failures (e.g. a segment without a source) are returned
    /// directly; later failures are reported as
    /// [`DecoderEventKind::Failed`].
    fn open(
        &self,
        request: LoadRequest<'_>,
        events: DecoderEvents,
    ) -> cl_core::Result<Box<dyn Decoder>>;
}
