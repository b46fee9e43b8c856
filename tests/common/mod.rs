//! Shared test harness for integration tests.
//!
//! Provides [`FakeDecoderFactory`], which hands out inert decoders and
//! records every attach and release, and [`ScriptedProber`], which answers
//! duration probes from a fixed table.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use cl_core::config::PlayerConfig;
use cl_core::{Error, RequestToken, Segment, Transport};
use cl_player::{
    Decoder, DecoderEventKind, DecoderEvents, DecoderFactory, LoadRequest, Player, TransportHandle,
};
use cl_probe::DurationProber;

/// Three segments laid out at 0-10, 10-22 and 22-37.
pub fn three_segments() -> Vec<Segment> {
    vec![
        Segment::new("a", "a.webm").with_declared_duration(10.0),
        Segment::new("b", "b.webm").with_declared_duration(12.0),
        Segment::new("c", "c.webm").with_declared_duration(15.0),
    ]
}

/// Await a snapshot matching `predicate`, failing the test after 5 seconds.
pub async fn wait_for<F>(transport: &TransportHandle, predicate: F) -> Transport
where
    F: Fn(&Transport) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), transport.wait_for(predicate))
        .await
        .expect("timed out waiting for transport state")
}

// ---------------------------------------------------------------------------
// Fake decoder
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct DecoderLog {
    /// `(segment index, token)` for every open, in order.
    pub opened: Vec<(usize, RequestToken)>,
    /// Event sinks by token, so tests can speak for a decoder.
    pub sinks: HashMap<RequestToken, DecoderEvents>,
    /// Token of the sink handed out most recently, by an open or a seek.
    pub latest: Option<RequestToken>,
    pub attached: usize,
    pub max_attached: usize,
    pub released: usize,
    pub plays: usize,
}

/// Hands out decoders that do nothing until the test emits events for them.
#[derive(Clone, Default)]
pub struct FakeDecoderFactory {
    pub log: Arc<Mutex<DecoderLog>>,
    /// Report `Ready` as soon as a decoder is opened.
    pub auto_ready: bool,
}

impl FakeDecoderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn auto_ready() -> Self {
        Self {
            auto_ready: true,
            ..Self::default()
        }
    }

    /// Token the engine currently accepts reports under.
    pub fn latest_token(&self) -> RequestToken {
        self.log.lock().latest.expect("no decoder opened yet")
    }

    /// Segment indices in the order they were opened.
    pub fn opened_indices(&self) -> Vec<usize> {
        self.log.lock().opened.iter().map(|(i, _)| *i).collect()
    }

    /// Emit `kind` on behalf of the decoder opened with `token`.
    pub fn emit(&self, token: RequestToken, kind: DecoderEventKind) {
        let sink = self
            .log
            .lock()
            .sinks
            .get(&token)
            .cloned()
            .expect("unknown token");
        sink.emit(kind);
    }

    /// Emit `kind` on behalf of the most recently opened decoder.
    pub fn emit_latest(&self, kind: DecoderEventKind) {
        self.emit(self.latest_token(), kind);
    }

    pub fn attached(&self) -> usize {
        self.log.lock().attached
    }

    pub fn max_attached(&self) -> usize {
        self.log.lock().max_attached
    }

    /// Build a player over `segments` backed by this factory.
    pub fn player(&self, segments: Vec<Segment>) -> Player {
        Player::new(segments, Arc::new(self.clone()), &PlayerConfig::default())
            .expect("failed to build player")
    }
}

impl DecoderFactory for FakeDecoderFactory {
    fn open(
        &self,
        request: LoadRequest<'_>,
        events: DecoderEvents,
    ) -> cl_core::Result<Box<dyn Decoder>> {
        let token = events.token();
        {
            let mut log = self.log.lock();
            log.opened.push((request.index, token));
            log.sinks.insert(token, events.clone());
            log.latest = Some(token);
            log.attached += 1;
            log.max_attached = log.max_attached.max(log.attached);
        }
        if self.auto_ready {
            events.emit(DecoderEventKind::Ready { duration: None });
        }
        Ok(Box::new(FakeDecoder {
            log: Arc::clone(&self.log),
            released: false,
        }))
    }
}

struct FakeDecoder {
    log: Arc<Mutex<DecoderLog>>,
    released: bool,
}

impl Decoder for FakeDecoder {
    fn play(&mut self) -> cl_core::Result<()> {
        self.log.lock().plays += 1;
        Ok(())
    }

    fn pause(&mut self) {}

    fn set_position(&mut self, _seconds: f64, events: DecoderEvents) {
        let mut log = self.log.lock();
        log.latest = Some(events.token());
        log.sinks.insert(events.token(), events);
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            let mut log = self.log.lock();
            log.attached -= 1;
            log.released += 1;
        }
    }
}

// ---------------------------------------------------------------------------
// Scripted prober
// ---------------------------------------------------------------------------

/// Answers probes from a table; unknown sources fail.
#[derive(Default)]
pub struct ScriptedProber {
    answers: HashMap<String, Result<f64, String>>,
    delay: Duration,
    in_flight: Mutex<(usize, usize)>,
}

impl ScriptedProber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ok(mut self, source: &str, seconds: f64) -> Self {
        self.answers.insert(source.to_string(), Ok(seconds));
        self
    }

    pub fn fail(mut self, source: &str, message: &str) -> Self {
        self.answers
            .insert(source.to_string(), Err(message.to_string()));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Highest number of probes observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.in_flight.lock().1
    }
}

#[async_trait]
impl DurationProber for ScriptedProber {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn supports(&self, _source: &str) -> bool {
        true
    }

    async fn probe(&self, source: &str) -> cl_core::Result<f64> {
        {
            let mut in_flight = self.in_flight.lock();
            in_flight.0 += 1;
            in_flight.1 = in_flight.1.max(in_flight.0);
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.lock().0 -= 1;

        match self.answers.get(source) {
            Some(Ok(seconds)) => Ok(*seconds),
            Some(Err(message)) => Err(Error::Http(message.clone())),
            None => Err(Error::Probe(format!("no scripted answer for {source}"))),
        }
    }
}
