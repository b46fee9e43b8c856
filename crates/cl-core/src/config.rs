//! Configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries the
//! player, probe and headless-clock sections. Every section defaults sensibly
//! so a completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::Result;
use crate::events::DEFAULT_RECENT_EVENTS;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub player: PlayerConfig,
    pub probe: ProbeConfig,
    pub clock: ClockConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path.
    ///
    /// Unlike [`Config::load_or_default`], a missing or malformed file is an
    /// error.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.player.event_capacity < 16 {
            warnings.push(format!(
                "player.event_capacity is {}; slow subscribers will lag",
                self.player.event_capacity
            ));
        }

        if !self.player.end_tolerance_secs.is_finite() || self.player.end_tolerance_secs < 0.0 {
            warnings.push("player.end_tolerance_secs must be a non-negative number".into());
        }

        if self.probe.concurrency == 0 {
            warnings.push("probe.concurrency is 0; all probes will run at once".into());
        }

        if self.probe.timeout_secs == Some(0) {
            warnings.push("probe.timeout_secs is 0; every probe will time out".into());
        }

        if self.probe.max_bytes == 0 {
            warnings.push("probe.max_bytes is 0; HTTP probes cannot read any data".into());
        }

        if self.probe.header_bytes == 0 || self.probe.header_bytes > self.probe.max_bytes {
            warnings.push(format!(
                "probe.header_bytes is {}; HTTP probes will request {} bytes first",
                self.probe.header_bytes,
                self.probe.first_range_bytes()
            ));
        }

        if self.clock.tick_millis == 0 {
            warnings.push("clock.tick_millis is 0; using 1ms ticks".into());
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Playback engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Broadcast buffer size for transport events.
    pub event_capacity: usize,
    /// Number of recent transport events kept for late subscribers.
    pub recent_events: usize,
    /// Time updates within this many seconds of a segment end snap to it.
    pub end_tolerance_secs: f64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            event_capacity: 256,
            recent_events: DEFAULT_RECENT_EVENTS,
            end_tolerance_secs: 0.0,
        }
    }
}

/// Duration probing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Maximum probes in flight; 0 means unbounded.
    pub concurrency: usize,
    /// Per-probe timeout. A timed-out probe falls back like any failure.
    pub timeout_secs: Option<u64>,
    /// Size of the first ranged request the HTTP prober makes. Widened
    /// (up to `max_bytes`) only when the header does not fit.
    pub header_bytes: u64,
    /// Upper bound on bytes fetched by the HTTP prober.
    pub max_bytes: u64,
    /// User agent sent by the HTTP prober.
    pub user_agent: String,
}

impl ProbeConfig {
    /// The configured timeout as a [`Duration`].
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// `header_bytes` clamped to `1..=max_bytes`.
    pub fn first_range_bytes(&self) -> u64 {
        self.header_bytes.clamp(1, self.max_bytes.max(1))
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            timeout_secs: None,
            header_bytes: 256 * 1024,
            max_bytes: 64 * 1024 * 1024,
            user_agent: concat!("clipline/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Headless clock decoder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Interval between time updates while playing.
    pub tick_millis: u64,
    /// Simulated latency between a load request and readiness.
    pub load_delay_millis: u64,
}

impl ClockConfig {
    /// Tick interval, never zero.
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_millis.max(1))
    }

    /// Simulated load latency.
    pub fn load_delay(&self) -> Duration {
        Duration::from_millis(self.load_delay_millis)
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            tick_millis: 250,
            load_delay_millis: 0,
        }
    }
}
