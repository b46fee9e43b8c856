//! The playback state machine.
//!
//! [`PlaybackEngine`] is synchronous: every operation runs to completion
//! without awaiting, and decoder activity is fed back in through
//! [`PlaybackEngine::handle_decoder_event`]. The async [`crate::Player`]
//! wraps it in a mutex and pumps decoder events into it.
//!
//! Global time is never stored. The engine keeps the active segment index
//! and the intra-segment position, and derives global time from the current
//! timeline on every publication, so duration updates to earlier segments
//! shift the global clock without moving playback.

use std::sync::Arc;

use cl_core::config::PlayerConfig;
use cl_core::events::TransportChange;
use cl_core::{
    Error, PlaybackStatus, PlayerId, RequestToken, Result, SegmentId, SegmentLoadError, Transport,
};
use cl_timeline::{global_time_of, locate, Location, SegmentRegistry, Timeline};
use tokio::sync::mpsc;

use crate::decoder::{
    Decoder, DecoderEvent, DecoderEventKind, DecoderEvents, DecoderFactory, LoadRequest,
};
use crate::transport::{TransportHandle, TransportState};

/// What the user last asked for; applied once a pending load is ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Intent {
    Play,
    Pause,
}

/// Owns the segments, the single active decoder and the transport.
pub struct PlaybackEngine {
    registry: SegmentRegistry,
    factory: Arc<dyn DecoderFactory>,
    decoder_tx: mpsc::UnboundedSender<DecoderEvent>,
    state: TransportState,

    decoder: Option<Box<dyn Decoder>>,
    token: RequestToken,
    ready: bool,

    active: Option<usize>,
    position: f64,
    status: PlaybackStatus,
    intent: Intent,
    last_error: Option<SegmentLoadError>,

    end_tolerance: f64,
    destroyed: bool,
}

impl PlaybackEngine {
    /// Create an idle engine. Decoder events for it must be delivered from
    /// the receiving half of `decoder_tx`.
    pub fn new(
        player_id: PlayerId,
        mut registry: SegmentRegistry,
        factory: Arc<dyn DecoderFactory>,
        decoder_tx: mpsc::UnboundedSender<DecoderEvent>,
        config: &PlayerConfig,
    ) -> Self {
        let total = registry.timeline().total_duration();
        let state = TransportState::new(
            player_id,
            Transport::idle(total),
            config.event_capacity.max(1),
            config.recent_events,
        );

        Self {
            registry,
            factory,
            decoder_tx,
            state,
            decoder: None,
            token: RequestToken::ZERO,
            ready: false,
            active: None,
            position: 0.0,
            status: PlaybackStatus::Idle,
            intent: Intent::Pause,
            last_error: None,
            end_tolerance: config.end_tolerance_secs.max(0.0),
            destroyed: false,
        }
    }

    /// Read-only view of the transport.
    pub fn handle(&self) -> TransportHandle {
        self.state.handle()
    }

    /// Current snapshot, derived from the live timeline.
    pub fn transport(&mut self) -> Transport {
        self.snapshot()
    }

    /// Current timeline layout.
    pub fn timeline(&mut self) -> Timeline {
        self.registry.timeline().clone()
    }

    /// Registered segments in timeline order.
    pub fn segments(&self) -> &[cl_core::Segment] {
        self.registry.segments()
    }

    /// Token of the load currently allowed to report.
    pub fn current_token(&self) -> RequestToken {
        self.token
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Start or resume playback.
    pub fn play(&mut self) -> Result<()> {
        self.ensure_alive()?;
        match self.status {
            PlaybackStatus::Idle => {
                self.intent = Intent::Play;
                let index = self.active.unwrap_or(0);
                let position = self.position;
                self.load(index, position);
            }
            PlaybackStatus::Loading => self.intent = Intent::Play,
            PlaybackStatus::Playing => {}
            PlaybackStatus::Paused => {
                self.intent = Intent::Play;
                self.start_decoder();
            }
            PlaybackStatus::Ended => {
                // Re-arm at the last frame; the decoder reports the end again.
                self.intent = Intent::Play;
                self.start_decoder();
            }
            PlaybackStatus::Error => {
                self.intent = Intent::Play;
                let index = self.active.unwrap_or(0);
                let position = self.position;
                tracing::info!(index, position, "retrying failed segment");
                self.load(index, position);
            }
        }
        Ok(())
    }

    /// Pause playback. A no-op unless playing or loading.
    pub fn pause(&mut self) -> Result<()> {
        self.ensure_alive()?;
        match self.status {
            PlaybackStatus::Playing => {
                self.intent = Intent::Pause;
                if let Some(decoder) = self.decoder.as_mut() {
                    decoder.pause();
                }
                self.set_status(PlaybackStatus::Paused);
            }
            PlaybackStatus::Loading => self.intent = Intent::Pause,
            PlaybackStatus::Idle
            | PlaybackStatus::Paused
            | PlaybackStatus::Ended
            | PlaybackStatus::Error => {}
        }
        Ok(())
    }

    /// Move playback to `global_time`, clamped to `[0, total_duration]`.
    ///
    /// Play/pause intent is preserved across the seek. Seeking into another
    /// segment releases the current decoder and loads the target; the most
    /// recent seek always wins.
    pub fn seek(&mut self, global_time: f64) -> Result<()> {
        self.ensure_alive()?;
        if global_time.is_nan() {
            return Err(Error::Validation("seek target is NaN".into()));
        }

        let timeline = self.registry.timeline();
        let total = timeline.total_duration();
        let target = global_time.clamp(0.0, total);
        let Location { index, offset } = locate(timeline, target).ok_or(Error::EmptyTimeline)?;

        match self.status {
            PlaybackStatus::Playing => self.intent = Intent::Play,
            PlaybackStatus::Idle | PlaybackStatus::Paused | PlaybackStatus::Ended => {
                self.intent = Intent::Pause
            }
            PlaybackStatus::Loading | PlaybackStatus::Error => {}
        }

        let same_segment = self.active == Some(index) && self.decoder.is_some();
        tracing::debug!(target, index, offset, same_segment, status = %self.status, "seek");

        if same_segment && self.status == PlaybackStatus::Loading {
            // Applied when the pending load reports ready.
            self.position = offset;
        } else if same_segment && self.status != PlaybackStatus::Error {
            // Reports the decoder queued before the seek (a natural end in
            // particular) must not act on the new position.
            self.token = self.token.next();
            let events = self.events();
            if let Some(decoder) = self.decoder.as_mut() {
                decoder.set_position(offset, events);
            }
            self.position = offset;
            if self.status == PlaybackStatus::Ended && target < total {
                self.set_status(PlaybackStatus::Paused);
            }
        } else {
            self.load(index, offset);
        }

        self.publish(TransportChange::Seeked { target });
        Ok(())
    }

    /// Record a duration discovered outside the decoder (e.g. by a probe).
    ///
    /// Returns `true` if the timeline changed. Playback stays on the same
    /// segment at the same intra-segment position.
    pub fn apply_resolved_duration(&mut self, id: &SegmentId, seconds: f64) -> bool {
        if self.destroyed {
            return false;
        }
        self.record_duration(id, seconds)
    }

    /// Release the decoder and stop publishing. Idempotent.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.release_decoder();
        self.token = self.token.next();
        self.publish(TransportChange::Destroyed);
        self.destroyed = true;
        tracing::debug!(player_id = %self.state.handle().player_id(), "player destroyed");
    }

    // -----------------------------------------------------------------------
    // Decoder events
    // -----------------------------------------------------------------------

    /// Apply one decoder report. Reports from superseded loads are dropped.
    pub fn handle_decoder_event(&mut self, event: DecoderEvent) {
        if self.destroyed || event.token != self.token {
            tracing::trace!(
                token = %event.token,
                current = %self.token,
                kind = ?event.kind,
                "discarding stale decoder event"
            );
            return;
        }

        match event.kind {
            DecoderEventKind::Ready { duration } => self.on_ready(duration),
            DecoderEventKind::TimeUpdate { position } => self.on_time_update(position),
            DecoderEventKind::Ended => self.on_ended(),
            DecoderEventKind::Failed { message } => {
                let index = self.active.unwrap_or(0);
                self.fail(index, message);
            }
        }
    }

    fn on_ready(&mut self, duration: Option<f64>) {
        if self.ready || self.status != PlaybackStatus::Loading {
            return;
        }
        self.ready = true;

        if let (Some(seconds), Some(id)) = (duration, self.active_id()) {
            self.record_duration(&id, seconds);
        }

        let position = self.clamp_position(self.position);
        self.position = position;
        let events = self.events();
        if let Some(decoder) = self.decoder.as_mut() {
            decoder.set_position(position, events);
        }

        match self.intent {
            Intent::Play => self.start_decoder(),
            Intent::Pause => self.set_status(PlaybackStatus::Paused),
        }
    }

    fn on_time_update(&mut self, position: f64) {
        if self.status != PlaybackStatus::Playing || !position.is_finite() {
            return;
        }
        let duration = self.active_duration();
        let mut position = position.max(0.0);
        if duration > 0.0 && (position > duration || duration - position <= self.end_tolerance) {
            position = duration;
        }
        self.position = position;
        self.publish(TransportChange::TimeUpdate);
    }

    fn on_ended(&mut self) {
        if self.status != PlaybackStatus::Playing {
            return;
        }
        let Some(index) = self.active else {
            return;
        };

        let next = index + 1;
        if next < self.registry.len() {
            tracing::debug!(from = index, to = next, "auto-advancing to next segment");
            self.intent = Intent::Play;
            self.load(next, 0.0);
        } else {
            let duration = self.active_duration();
            if duration > 0.0 {
                self.position = duration;
            }
            self.intent = Intent::Pause;
            self.set_status(PlaybackStatus::Ended);
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn ensure_alive(&self) -> Result<()> {
        if self.destroyed {
            Err(Error::Destroyed)
        } else {
            Ok(())
        }
    }

    /// Tear down the current decoder and attach a fresh one for `index`.
    fn load(&mut self, index: usize, position: f64) {
        self.release_decoder();
        self.token = self.token.next();
        self.ready = false;

        let previous = self.active.replace(index);
        self.position = position.max(0.0);
        if previous != Some(index) {
            self.publish(TransportChange::SegmentChanged {
                from: previous,
                to: index,
            });
        }
        self.set_status(PlaybackStatus::Loading);

        let Some(segment) = self.registry.segment(index).cloned() else {
            self.fail(index, format!("no segment at index {index}"));
            return;
        };

        tracing::debug!(
            index,
            segment_id = %segment.id,
            token = %self.token,
            position = self.position,
            "loading segment"
        );

        let request = LoadRequest {
            index,
            segment: &segment,
            token: self.token,
        };
        match self.factory.open(request, self.events()) {
            Ok(decoder) => self.decoder = Some(decoder),
            Err(e) => self.fail(index, e.to_string()),
        }
    }

    fn start_decoder(&mut self) {
        let Some(decoder) = self.decoder.as_mut() else {
            let index = self.active.unwrap_or(0);
            let position = self.position;
            self.load(index, position);
            return;
        };
        match decoder.play() {
            Ok(()) => self.set_status(PlaybackStatus::Playing),
            Err(e) => {
                let index = self.active.unwrap_or(0);
                self.fail(index, e.to_string());
            }
        }
    }

    fn fail(&mut self, index: usize, message: String) {
        self.release_decoder();
        self.token = self.token.next();

        let segment_id = self
            .registry
            .segment(index)
            .map(|s| s.id.clone())
            .unwrap_or_else(|| SegmentId::new(format!("#{index}")));
        let error = SegmentLoadError {
            index,
            segment_id,
            message,
        };
        tracing::warn!(index, segment_id = %error.segment_id, error = %error.message, "segment failed");

        self.last_error = Some(error.clone());
        self.set_status(PlaybackStatus::Error);
        self.publish(TransportChange::Failed { error });
    }

    /// Sink stamped with the current token.
    fn events(&self) -> DecoderEvents {
        DecoderEvents::new(self.token, self.decoder_tx.clone())
    }

    fn release_decoder(&mut self) {
        if let Some(mut decoder) = self.decoder.take() {
            decoder.release();
        }
        self.ready = false;
    }

    fn record_duration(&mut self, id: &SegmentId, seconds: f64) -> bool {
        if !self.registry.update_resolved_duration(id, seconds) {
            return false;
        }
        tracing::debug!(segment_id = %id, seconds, "segment duration resolved");
        self.publish(TransportChange::DurationResolved {
            segment_id: id.clone(),
            seconds,
        });
        true
    }

    fn set_status(&mut self, status: PlaybackStatus) {
        if self.status == status {
            return;
        }
        let from = self.status;
        self.status = status;
        if status != PlaybackStatus::Error {
            self.last_error = None;
        }
        tracing::debug!(%from, to = %status, "status changed");
        self.publish(TransportChange::StatusChanged { from, to: status });
    }

    fn publish(&mut self, change: TransportChange) {
        if self.destroyed {
            return;
        }
        let snapshot = self.snapshot();
        self.state.publish(change, snapshot);
    }

    fn snapshot(&mut self) -> Transport {
        let active = self.active;
        let position = self.position;
        let timeline = self.registry.timeline();
        let global_time = active
            .and_then(|index| global_time_of(timeline, Location { index, offset: position }))
            .unwrap_or(0.0);

        Transport {
            active_segment_index: active,
            global_time,
            total_duration: timeline.total_duration(),
            status: self.status,
            last_error: self.last_error.clone(),
        }
    }

    fn active_id(&self) -> Option<SegmentId> {
        self.active
            .and_then(|i| self.registry.segment(i))
            .map(|s| s.id.clone())
    }

    fn active_duration(&mut self) -> f64 {
        let Some(index) = self.active else {
            return 0.0;
        };
        self.registry
            .timeline()
            .entry(index)
            .map(|e| e.duration())
            .unwrap_or(0.0)
    }

    fn clamp_position(&mut self, position: f64) -> f64 {
        let duration = self.active_duration();
        if duration > 0.0 {
            position.clamp(0.0, duration)
        } else {
            position.max(0.0)
        }
    }
}

impl std::fmt::Debug for PlaybackEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackEngine")
            .field("status", &self.status)
            .field("active", &self.active)
            .field("position", &self.position)
            .field("token", &self.token)
            .field("destroyed", &self.destroyed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cl_core::Segment;
    use parking_lot::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Play,
        Pause,
        SetPosition(f64),
        Release,
    }

    #[derive(Default)]
    struct Log {
        opened: Vec<(usize, RequestToken)>,
        calls: Vec<(RequestToken, Call)>,
        attached: usize,
        max_attached: usize,
        fail_open: Option<usize>,
    }

    #[derive(Clone, Default)]
    struct ScriptedFactory {
        log: Arc<Mutex<Log>>,
    }

    struct ScriptedDecoder {
        token: RequestToken,
        log: Arc<Mutex<Log>>,
        released: bool,
    }

    impl Decoder for ScriptedDecoder {
        fn play(&mut self) -> Result<()> {
            self.log.lock().calls.push((self.token, Call::Play));
            Ok(())
        }
        fn pause(&mut self) {
            self.log.lock().calls.push((self.token, Call::Pause));
        }
        fn set_position(&mut self, seconds: f64, events: DecoderEvents) {
            self.token = events.token();
            self.log.lock().calls.push((self.token, Call::SetPosition(seconds)));
        }
        fn release(&mut self) {
            if !self.released {
                self.released = true;
                let mut log = self.log.lock();
                log.attached -= 1;
                log.calls.push((self.token, Call::Release));
            }
        }
    }

    impl DecoderFactory for ScriptedFactory {
        fn open(&self, request: LoadRequest<'_>, events: DecoderEvents) -> Result<Box<dyn Decoder>> {
            let mut log = self.log.lock();
            if log.fail_open == Some(request.index) {
                return Err(Error::segment_load(
                    request.index,
                    request.segment.id.clone(),
                    "refused",
                ));
            }
            log.opened.push((request.index, events.token()));
            log.attached += 1;
            log.max_attached = log.max_attached.max(log.attached);
            Ok(Box::new(ScriptedDecoder {
                token: events.token(),
                log: Arc::clone(&self.log),
                released: false,
            }))
        }
    }

    struct Harness {
        engine: PlaybackEngine,
        factory: ScriptedFactory,
        _rx: mpsc::UnboundedReceiver<DecoderEvent>,
    }

    impl Harness {
        fn new(segments: Vec<Segment>) -> Self {
            let factory = ScriptedFactory::default();
            let (tx, rx) = mpsc::unbounded_channel();
            let registry = SegmentRegistry::register(segments).unwrap();
            let engine = PlaybackEngine::new(
                PlayerId::new(),
                registry,
                Arc::new(factory.clone()),
                tx,
                &PlayerConfig::default(),
            );
            Self {
                engine,
                factory,
                _rx: rx,
            }
        }

        fn three() -> Self {
            Self::new(vec![
                Segment::new("a", "a.webm").with_declared_duration(10.0),
                Segment::new("b", "b.webm").with_declared_duration(12.0),
                Segment::new("c", "c.webm").with_declared_duration(15.0),
            ])
        }

        fn token(&self) -> RequestToken {
            self.engine.current_token()
        }

        fn send(&mut self, token: RequestToken, kind: DecoderEventKind) {
            self.engine.handle_decoder_event(DecoderEvent { token, kind });
        }

        fn ready(&mut self) {
            let token = self.token();
            self.send(token, DecoderEventKind::Ready { duration: None });
        }

        fn tick(&mut self, position: f64) {
            let token = self.token();
            self.send(token, DecoderEventKind::TimeUpdate { position });
        }

        fn end(&mut self) {
            let token = self.token();
            self.send(token, DecoderEventKind::Ended);
        }

        fn t(&mut self) -> Transport {
            self.engine.transport()
        }

        fn opened(&self) -> Vec<usize> {
            self.factory.log.lock().opened.iter().map(|(i, _)| *i).collect()
        }
    }

    #[test]
    fn new_engine_is_idle() {
        let mut h = Harness::three();
        let t = h.t();
        assert_eq!(t.status, PlaybackStatus::Idle);
        assert_eq!(t.total_duration, 37.0);
        assert_eq!(t.active_segment_index, None);
        assert!(h.opened().is_empty());
    }

    #[test]
    fn play_from_idle_loads_first_segment_then_plays_on_ready() {
        let mut h = Harness::three();
        h.engine.play().unwrap();
        assert_eq!(h.t().status, PlaybackStatus::Loading);
        assert_eq!(h.t().active_segment_index, Some(0));
        assert_eq!(h.opened(), vec![0]);

        h.ready();
        assert_eq!(h.t().status, PlaybackStatus::Playing);

        h.tick(4.0);
        assert_eq!(h.t().global_time, 4.0);
    }

    #[test]
    fn pause_while_loading_lands_paused() {
        let mut h = Harness::three();
        h.engine.play().unwrap();
        h.engine.pause().unwrap();
        h.ready();
        assert_eq!(h.t().status, PlaybackStatus::Paused);
    }

    #[test]
    fn pause_and_resume() {
        let mut h = Harness::three();
        h.engine.play().unwrap();
        h.ready();
        h.tick(3.0);
        h.engine.pause().unwrap();
        assert_eq!(h.t().status, PlaybackStatus::Paused);
        assert_eq!(h.t().global_time, 3.0);

        h.engine.play().unwrap();
        assert_eq!(h.t().status, PlaybackStatus::Playing);
        assert_eq!(h.opened(), vec![0]);
    }

    #[test]
    fn pause_is_noop_when_idle() {
        let mut h = Harness::three();
        h.engine.pause().unwrap();
        assert_eq!(h.t().status, PlaybackStatus::Idle);
        assert!(h.engine.handle().recent_events(10).is_empty());
    }

    #[test]
    fn seek_into_later_segment_while_paused() {
        let mut h = Harness::three();
        h.engine.seek(25.0).unwrap();
        let t = h.t();
        assert_eq!(t.active_segment_index, Some(2));
        assert_eq!(t.global_time, 25.0);
        assert_eq!(t.status, PlaybackStatus::Loading);

        h.ready();
        assert_eq!(h.t().status, PlaybackStatus::Paused);
        let calls = h.factory.log.lock().calls.clone();
        assert!(calls.contains(&(h.token(), Call::SetPosition(3.0))));
    }

    #[test]
    fn seek_on_boundary_selects_later_segment() {
        let mut h = Harness::three();
        h.engine.seek(22.0).unwrap();
        let t = h.t();
        assert_eq!(t.active_segment_index, Some(2));
        assert_eq!(t.global_time, 22.0);
    }

    #[test]
    fn seek_clamps_out_of_range_targets() {
        let mut h = Harness::three();
        h.engine.seek(-5.0).unwrap();
        assert_eq!(h.t().global_time, 0.0);
        assert_eq!(h.t().active_segment_index, Some(0));

        h.engine.seek(1_000.0).unwrap();
        assert_eq!(h.t().global_time, 37.0);
        assert_eq!(h.t().active_segment_index, Some(2));
    }

    #[test]
    fn seek_rejects_nan() {
        let mut h = Harness::three();
        let err = h.engine.seek(f64::NAN).unwrap_err();
        assert_eq!(err.code(), "validation");
    }

    #[test]
    fn seek_within_segment_reuses_decoder() {
        let mut h = Harness::three();
        h.engine.play().unwrap();
        h.ready();
        h.engine.seek(7.5).unwrap();
        assert_eq!(h.opened(), vec![0]);
        assert_eq!(h.t().global_time, 7.5);
        assert_eq!(h.t().status, PlaybackStatus::Playing);
    }

    #[test]
    fn queued_end_does_not_override_seek_within_segment() {
        let mut h = Harness::three();
        h.engine.play().unwrap();
        h.ready();
        h.tick(9.9);
        let before = h.token();

        h.engine.seek(3.0).unwrap();
        assert_ne!(h.token(), before);
        let calls = h.factory.log.lock().calls.clone();
        assert!(calls.contains(&(h.token(), Call::SetPosition(3.0))));

        h.send(before, DecoderEventKind::TimeUpdate { position: 10.0 });
        h.send(before, DecoderEventKind::Ended);
        let t = h.t();
        assert_eq!(t.active_segment_index, Some(0));
        assert_eq!(t.global_time, 3.0);
        assert_eq!(t.status, PlaybackStatus::Playing);
        assert_eq!(h.opened(), vec![0]);

        h.tick(4.0);
        assert_eq!(h.t().global_time, 4.0);
    }

    #[test]
    fn play_after_end_stays_on_last_frame() {
        let mut h = Harness::three();
        h.engine.seek(30.0).unwrap();
        h.engine.play().unwrap();
        h.ready();
        h.end();
        assert_eq!(h.t().status, PlaybackStatus::Ended);

        h.engine.play().unwrap();
        let t = h.t();
        assert_eq!(t.status, PlaybackStatus::Playing);
        assert_eq!(t.global_time, 37.0);
        assert_eq!(t.active_segment_index, Some(2));
        assert_eq!(h.opened(), vec![2]);

        h.end();
        let t = h.t();
        assert_eq!(t.status, PlaybackStatus::Ended);
        assert_eq!(t.global_time, 37.0);
        assert_eq!(t.active_segment_index, Some(2));
    }

    #[test]
    fn seek_preserves_playing_intent_across_segments() {
        let mut h = Harness::three();
        h.engine.play().unwrap();
        h.ready();
        h.engine.seek(12.0).unwrap();
        assert_eq!(h.t().status, PlaybackStatus::Loading);
        h.ready();
        assert_eq!(h.t().status, PlaybackStatus::Playing);
        assert_eq!(h.t().global_time, 12.0);
    }

    #[test]
    fn last_seek_wins_over_stale_ready() {
        let mut h = Harness::three();
        h.engine.seek(5.0).unwrap();
        let first = h.token();
        h.engine.seek(30.0).unwrap();
        let second = h.token();
        assert_ne!(first, second);

        h.send(first, DecoderEventKind::Ready { duration: Some(99.0) });
        h.send(first, DecoderEventKind::TimeUpdate { position: 5.0 });
        let t = h.t();
        assert_eq!(t.active_segment_index, Some(2));
        assert_eq!(t.global_time, 30.0);
        assert_eq!(t.status, PlaybackStatus::Loading);
        assert_eq!(t.total_duration, 37.0);

        h.send(second, DecoderEventKind::Ready { duration: None });
        assert_eq!(h.t().status, PlaybackStatus::Paused);
        assert_eq!(h.t().global_time, 30.0);
    }

    #[test]
    fn seek_within_loading_segment_updates_pending_position() {
        let mut h = Harness::three();
        h.engine.seek(11.0).unwrap();
        h.engine.seek(20.0).unwrap();
        assert_eq!(h.opened(), vec![1]);
        h.ready();
        let calls = h.factory.log.lock().calls.clone();
        assert!(calls.contains(&(h.token(), Call::SetPosition(10.0))));
        assert_eq!(h.t().global_time, 20.0);
    }

    #[test]
    fn at_most_one_decoder_attached() {
        let mut h = Harness::three();
        h.engine.play().unwrap();
        h.ready();
        for target in [11.0, 25.0, 1.0, 36.0, 12.0] {
            h.engine.seek(target).unwrap();
        }
        h.ready();
        h.end();
        h.ready();
        h.end();

        let log = h.factory.log.lock();
        assert_eq!(log.max_attached, 1);
        assert_eq!(log.attached, 1);
    }

    #[test]
    fn natural_end_advances_to_next_segment() {
        let mut h = Harness::three();
        h.engine.play().unwrap();
        h.ready();
        h.tick(10.0);
        h.end();

        let t = h.t();
        assert_eq!(t.active_segment_index, Some(1));
        assert_eq!(t.global_time, 10.0);
        assert_eq!(t.status, PlaybackStatus::Loading);

        h.ready();
        assert_eq!(h.t().status, PlaybackStatus::Playing);
        assert_eq!(h.opened(), vec![0, 1]);
    }

    #[test]
    fn end_of_last_segment_ends_timeline() {
        let mut h = Harness::three();
        h.engine.seek(30.0).unwrap();
        h.engine.play().unwrap();
        h.ready();
        assert_eq!(h.t().status, PlaybackStatus::Playing);
        h.end();

        let t = h.t();
        assert_eq!(t.status, PlaybackStatus::Ended);
        assert_eq!(t.global_time, 37.0);
        assert_eq!(t.active_segment_index, Some(2));
    }

    #[test]
    fn ended_then_seek_back_pauses() {
        let mut h = Harness::three();
        h.engine.seek(30.0).unwrap();
        h.engine.play().unwrap();
        h.ready();
        h.end();

        h.engine.pause().unwrap();
        assert_eq!(h.t().status, PlaybackStatus::Ended);

        h.engine.seek(31.0).unwrap();
        assert_eq!(h.t().status, PlaybackStatus::Paused);
        assert_eq!(h.t().global_time, 31.0);

        h.engine.seek(3.0).unwrap();
        assert_eq!(h.t().active_segment_index, Some(0));
        h.ready();
        assert_eq!(h.t().status, PlaybackStatus::Paused);
    }

    #[test]
    fn failure_sets_error_and_preserves_time() {
        let mut h = Harness::three();
        h.engine.play().unwrap();
        h.ready();
        h.tick(10.0);
        h.end();
        let token = h.token();
        h.send(
            token,
            DecoderEventKind::Failed {
                message: "403 Forbidden".into(),
            },
        );

        let t = h.t();
        assert_eq!(t.status, PlaybackStatus::Error);
        assert_eq!(t.global_time, 10.0);
        let error = t.last_error.unwrap();
        assert_eq!(error.index, 1);
        assert_eq!(error.segment_id.as_str(), "b");
        assert_eq!(h.factory.log.lock().attached, 0);
    }

    #[test]
    fn play_after_error_retries_same_segment() {
        let mut h = Harness::three();
        h.engine.seek(15.0).unwrap();
        let token = h.token();
        h.send(token, DecoderEventKind::Failed { message: "boom".into() });
        assert_eq!(h.t().status, PlaybackStatus::Error);

        h.engine.play().unwrap();
        let t = h.t();
        assert_eq!(t.status, PlaybackStatus::Loading);
        assert!(t.last_error.is_none());
        assert_eq!(h.opened(), vec![1, 1]);

        h.ready();
        assert_eq!(h.t().status, PlaybackStatus::Playing);
        assert_eq!(h.t().global_time, 15.0);
    }

    #[test]
    fn synchronous_open_failure_is_reported() {
        let mut h = Harness::three();
        h.factory.log.lock().fail_open = Some(0);
        h.engine.play().unwrap();
        let t = h.t();
        assert_eq!(t.status, PlaybackStatus::Error);
        assert_eq!(t.last_error.unwrap().index, 0);
    }

    #[test]
    fn decoder_reported_duration_updates_timeline() {
        let mut h = Harness::new(vec![
            Segment::new("a", "a.webm"),
            Segment::new("b", "b.webm").with_declared_duration(5.0),
        ]);
        assert_eq!(h.t().total_duration, 5.0);
        h.engine.play().unwrap();
        let token = h.token();
        h.send(token, DecoderEventKind::Ready { duration: Some(8.0) });
        assert_eq!(h.t().total_duration, 13.0);
    }

    #[test]
    fn resolved_duration_keeps_intra_segment_position() {
        let mut h = Harness::three();
        h.engine.seek(25.0).unwrap();
        h.ready();
        assert_eq!(h.t().global_time, 25.0);

        assert!(h.engine.apply_resolved_duration(&SegmentId::new("a"), 20.0));
        let t = h.t();
        assert_eq!(t.active_segment_index, Some(2));
        assert_eq!(t.global_time, 35.0);
        assert_eq!(t.total_duration, 47.0);

        assert!(!h.engine.apply_resolved_duration(&SegmentId::new("a"), 30.0));
    }

    #[test]
    fn end_tolerance_snaps_time_updates() {
        let factory = ScriptedFactory::default();
        let (tx, _rx) = mpsc::unbounded_channel();
        let registry =
            SegmentRegistry::register(vec![Segment::new("a", "a.webm").with_declared_duration(10.0)])
                .unwrap();
        let config = PlayerConfig {
            end_tolerance_secs: 0.25,
            ..PlayerConfig::default()
        };
        let mut engine =
            PlaybackEngine::new(PlayerId::new(), registry, Arc::new(factory), tx, &config);
        engine.play().unwrap();
        let token = engine.current_token();
        engine.handle_decoder_event(DecoderEvent {
            token,
            kind: DecoderEventKind::Ready { duration: None },
        });
        engine.handle_decoder_event(DecoderEvent {
            token,
            kind: DecoderEventKind::TimeUpdate { position: 9.8 },
        });
        assert_eq!(engine.transport().global_time, 10.0);
    }

    #[test]
    fn destroy_releases_and_rejects_commands() {
        let mut h = Harness::three();
        h.engine.play().unwrap();
        let token = h.token();
        h.engine.destroy();
        assert_eq!(h.factory.log.lock().attached, 0);

        let before = h.engine.handle().recent_events(1)[0].sequence;
        h.send(token, DecoderEventKind::Ready { duration: None });
        assert_eq!(h.engine.handle().recent_events(1)[0].sequence, before);
        assert!(matches!(h.engine.play(), Err(Error::Destroyed)));
        assert!(matches!(h.engine.seek(1.0), Err(Error::Destroyed)));

        h.engine.destroy();
        assert_eq!(h.engine.handle().recent_events(1)[0].sequence, before);
    }

    #[test]
    fn status_changes_are_published_in_order() {
        let mut h = Harness::three();
        let mut rx = h.engine.handle().subscribe();
        h.engine.play().unwrap();
        h.ready();

        let mut statuses = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let TransportChange::StatusChanged { to, .. } = event.change {
                statuses.push(to);
            }
        }
        assert_eq!(statuses, vec![PlaybackStatus::Loading, PlaybackStatus::Playing]);
    }

    #[test]
    fn global_time_stays_within_active_segment() {
        let mut h = Harness::three();
        h.engine.seek(12.0).unwrap();
        h.engine.play().unwrap();
        h.ready();
        h.tick(50.0);
        let t = h.t();
        assert_eq!(t.active_segment_index, Some(1));
        assert_eq!(t.global_time, 22.0);
    }
}
