//! A headless decoder driven by the tokio clock.
//!
//! [`ClockDecoder`] renders nothing. It learns the segment length (from a
//! [`DurationProber`] when one is configured, otherwise from the segment's
//! declared duration), reports ready, then advances a virtual playhead,
//! emitting time updates on every tick and `Ended` when it reaches the end.
//! The CLI uses it to walk a timeline; tests use it with a paused clock.

use std::sync::Arc;
use std::time::Duration;

use cl_core::config::ClockConfig;
use cl_core::{Error, Result};
use cl_probe::DurationProber;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::decoder::{Decoder, DecoderEventKind, DecoderEvents, DecoderFactory, LoadRequest};

/// Creates [`ClockDecoder`]s.
#[derive(Clone)]
pub struct ClockDecoderFactory {
    prober: Option<Arc<dyn DurationProber>>,
    tick: Duration,
    load_delay: Duration,
    rate: f64,
}

impl ClockDecoderFactory {
    pub fn new(config: &ClockConfig) -> Self {
        Self {
            prober: None,
            tick: config.tick(),
            load_delay: config.load_delay(),
            rate: 1.0,
        }
    }

    /// Discover each segment's length with `prober` while loading. A failed
    /// probe fails the load.
    #[must_use]
    pub fn with_prober(mut self, prober: Arc<dyn DurationProber>) -> Self {
        self.prober = Some(prober);
        self
    }

    /// Playback speed multiplier. Non-positive or non-finite values reset
    /// it to 1.
    #[must_use]
    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = if rate.is_finite() && rate > 0.0 { rate } else { 1.0 };
        self
    }
}

impl DecoderFactory for ClockDecoderFactory {
    fn open(&self, request: LoadRequest<'_>, events: DecoderEvents) -> Result<Box<dyn Decoder>> {
        let segment = request.segment;
        let source = segment.source_url.clone().ok_or_else(|| {
            Error::segment_load(request.index, segment.id.clone(), "segment has no source")
        })?;

        let clock = Arc::new(Mutex::new(Clock::default()));
        let loader = tokio::spawn(load(
            source,
            segment.effective_duration(),
            self.prober.clone(),
            self.load_delay,
            Arc::clone(&clock),
            events.clone(),
        ));

        Ok(Box::new(ClockDecoder {
            clock,
            events,
            tick: self.tick,
            rate: self.rate,
            loader: Some(loader),
            ticker: None,
            playing: false,
        }))
    }
}

#[derive(Debug, Default)]
struct Clock {
    duration: Option<f64>,
    /// Position at `started`, or the held position while paused.
    anchor: f64,
    started: Option<Instant>,
    released: bool,
}

impl Clock {
    fn position(&self, rate: f64) -> f64 {
        let duration = self.duration.unwrap_or(f64::INFINITY);
        match self.started {
            Some(at) => (self.anchor + at.elapsed().as_secs_f64() * rate).min(duration),
            None => self.anchor.min(duration),
        }
    }
}

async fn load(
    source: String,
    fallback: f64,
    prober: Option<Arc<dyn DurationProber>>,
    delay: Duration,
    clock: Arc<Mutex<Clock>>,
    events: DecoderEvents,
) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let (duration, discovered) = match prober {
        Some(prober) => match prober.probe(&source).await {
            Ok(seconds) if seconds.is_finite() && seconds > 0.0 => (seconds, true),
            Ok(_) if fallback > 0.0 => (fallback, false),
            Ok(seconds) => {
                events.emit(DecoderEventKind::Failed {
                    message: format!("unusable duration {seconds} for {source}"),
                });
                return;
            }
            Err(e) => {
                events.emit(DecoderEventKind::Failed {
                    message: e.to_string(),
                });
                return;
            }
        },
        None if fallback > 0.0 => (fallback, false),
        None => {
            events.emit(DecoderEventKind::Failed {
                message: format!("duration of {source} is unknown"),
            });
            return;
        }
    };

    {
        let mut clock = clock.lock();
        if clock.released {
            return;
        }
        clock.duration = Some(duration);
    }

    tracing::trace!(source = %source, duration, discovered, "clock decoder ready");
    events.emit(DecoderEventKind::Ready {
        duration: discovered.then_some(duration),
    });
}

async fn run(clock: Arc<Mutex<Clock>>, events: DecoderEvents, tick: Duration, rate: f64) {
    loop {
        let (position, remaining) = {
            let mut clock = clock.lock();
            if clock.released || clock.started.is_none() {
                return;
            }
            let duration = clock.duration.unwrap_or(0.0);
            let position = clock.position(rate);
            if position >= duration {
                clock.anchor = duration;
                clock.started = None;
                drop(clock);
                events.emit(DecoderEventKind::TimeUpdate { position: duration });
                events.emit(DecoderEventKind::Ended);
                return;
            }
            (position, (duration - position) / rate)
        };

        events.emit(DecoderEventKind::TimeUpdate { position });
        tokio::time::sleep(tick.min(Duration::from_secs_f64(remaining))).await;
    }
}

/// Virtual playhead for one segment.
pub struct ClockDecoder {
    clock: Arc<Mutex<Clock>>,
    events: DecoderEvents,
    tick: Duration,
    rate: f64,
    loader: Option<JoinHandle<()>>,
    ticker: Option<JoinHandle<()>>,
    /// Set by `play`, cleared by `pause`. Survives the ticker reaching the end.
    playing: bool,
}

impl ClockDecoder {
    fn start_ticker(&mut self) {
        self.stop_ticker();
        self.ticker = Some(tokio::spawn(run(
            Arc::clone(&self.clock),
            self.events.clone(),
            self.tick,
            self.rate,
        )));
    }

    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

impl Decoder for ClockDecoder {
    fn play(&mut self) -> Result<()> {
        {
            let mut clock = self.clock.lock();
            if clock.released {
                return Err(Error::Internal("decoder already released".into()));
            }
            if clock.duration.is_none() {
                return Err(Error::Internal("decoder is not ready".into()));
            }
            self.playing = true;
            if clock.started.is_some() {
                return Ok(());
            }
            clock.started = Some(Instant::now());
        }

        self.start_ticker();
        Ok(())
    }

    fn pause(&mut self) {
        self.playing = false;
        self.stop_ticker();
        let mut clock = self.clock.lock();
        if clock.started.is_some() {
            let position = clock.position(self.rate);
            clock.anchor = position;
            clock.started = None;
        }
    }

    fn set_position(&mut self, seconds: f64, events: DecoderEvents) {
        self.stop_ticker();
        self.events = events;

        let resume = {
            let mut clock = self.clock.lock();
            if clock.released {
                return;
            }
            let duration = clock.duration.unwrap_or(f64::INFINITY);
            clock.anchor = if seconds.is_finite() {
                seconds.clamp(0.0, duration)
            } else {
                0.0
            };
            let resume = self.playing && clock.duration.is_some();
            clock.started = resume.then(Instant::now);
            resume
        };

        if resume {
            self.start_ticker();
        }
    }

    fn release(&mut self) {
        self.playing = false;
        {
            let mut clock = self.clock.lock();
            clock.released = true;
            clock.started = None;
        }
        self.stop_ticker();
        if let Some(loader) = self.loader.take() {
            loader.abort();
        }
    }
}

impl Drop for ClockDecoder {
    fn drop(&mut self) {
        self.release();
    }
}
