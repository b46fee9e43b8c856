//! Async runtime around [`PlaybackEngine`].
//!
//! A [`Player`] owns the engine behind a mutex and a background task that
//! drains decoder events into it. Commands are plain synchronous calls that
//! return as soon as the engine has updated its state; loading, readiness
//! and position ticks all arrive later through the transport.

use std::sync::Arc;

use cl_core::config::PlayerConfig;
use cl_core::{PlayerId, Result, Segment, SegmentId, Transport};
use cl_probe::{DurationResolver, ProbeOutcome, ProgressEvent};
use cl_timeline::{SegmentRegistry, Timeline};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::decoder::{DecoderEvent, DecoderFactory};
use crate::engine::PlaybackEngine;
use crate::transport::TransportHandle;

/// A segmented-timeline player.
///
/// Must be created inside a tokio runtime. Dropping the player destroys it.
pub struct Player {
    id: PlayerId,
    engine: Arc<Mutex<PlaybackEngine>>,
    transport: TransportHandle,
    shutdown: CancellationToken,
    pump: Option<JoinHandle<()>>,
}

impl Player {
    /// Build a player over `segments`, which must be non-empty.
    ///
    /// Construction loads nothing; the first decoder is attached on `play`
    /// or `seek`.
    pub fn new(
        segments: Vec<Segment>,
        factory: Arc<dyn DecoderFactory>,
        config: &PlayerConfig,
    ) -> Result<Self> {
        let registry = SegmentRegistry::register(segments)?;
        let id = PlayerId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let engine = PlaybackEngine::new(id, registry, factory, tx, config);
        let transport = engine.handle();
        let engine = Arc::new(Mutex::new(engine));
        let shutdown = CancellationToken::new();

        let pump = tokio::spawn(pump_decoder_events(
            Arc::clone(&engine),
            rx,
            shutdown.clone(),
        ));

        tracing::debug!(player_id = %id, "player created");
        Ok(Self {
            id,
            engine,
            transport,
            shutdown,
            pump: Some(pump),
        })
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    /// Start or resume playback.
    pub fn play(&self) -> Result<()> {
        self.engine.lock().play()
    }

    /// Pause playback.
    pub fn pause(&self) -> Result<()> {
        self.engine.lock().pause()
    }

    /// Seek to a global time in seconds.
    pub fn seek(&self, global_time: f64) -> Result<()> {
        self.engine.lock().seek(global_time)
    }

    /// Latest transport snapshot.
    pub fn snapshot(&self) -> Transport {
        self.transport.snapshot()
    }

    /// Read-only transport handle for observers.
    pub fn transport(&self) -> TransportHandle {
        self.transport.clone()
    }

    /// Current timeline layout.
    pub fn timeline(&self) -> Timeline {
        self.engine.lock().timeline()
    }

    /// Segments in timeline order, with any durations resolved so far.
    pub fn segments(&self) -> Vec<Segment> {
        self.engine.lock().segments().to_vec()
    }

    /// Record a known duration for one segment. Returns `true` if the
    /// timeline changed.
    pub fn apply_resolved_duration(&self, id: &SegmentId, seconds: f64) -> bool {
        self.engine.lock().apply_resolved_duration(id, seconds)
    }

    /// Probe every segment's duration in the background.
    ///
    /// Successful probes are applied to the timeline as they complete; the
    /// returned stream yields every outcome with running progress. Failed
    /// probes leave the segment on its declared duration.
    pub fn resolve_durations(&self, resolver: &DurationResolver) -> ReceiverStream<ProgressEvent> {
        let segments = self.segments();
        let mut upstream = resolver.resolve_all(&segments);
        let (tx, rx) = mpsc::channel(segments.len().max(1));
        let engine = Arc::downgrade(&self.engine);
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            while let Some(event) = upstream.next().await {
                if shutdown.is_cancelled() {
                    break;
                }
                if let ProbeOutcome::Resolved { seconds } = &event.outcome {
                    if let Some(engine) = engine.upgrade() {
                        engine
                            .lock()
                            .apply_resolved_duration(&event.segment_id, *seconds);
                    }
                }
                // The caller may have dropped the stream; keep applying.
                let _ = tx.send(event).await;
            }
        });

        ReceiverStream::new(rx)
    }

    /// Release the decoder and stop all background activity. Idempotent.
    ///
    /// No transport change is published after the final `Destroyed` event.
    pub fn destroy(&self) {
        self.engine.lock().destroy();
        self.shutdown.cancel();
    }

    pub fn is_destroyed(&self) -> bool {
        self.engine.lock().is_destroyed()
    }

    /// Destroy the player and wait for its event pump to exit.
    pub async fn shutdown(mut self) {
        self.destroy();
        if let Some(pump) = self.pump.take() {
            if let Err(e) = pump.await {
                tracing::warn!(error = %e, "decoder event pump ended abnormally");
            }
        }
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("id", &self.id)
            .field("transport", &self.transport.snapshot())
            .finish_non_exhaustive()
    }
}

async fn pump_decoder_events(
    engine: Arc<Mutex<PlaybackEngine>>,
    mut rx: mpsc::UnboundedReceiver<DecoderEvent>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            event = rx.recv() => match event {
                Some(event) => engine.lock().handle_decoder_event(event),
                None => break,
            },
        }
    }
    tracing::trace!("decoder event pump stopped");
}
