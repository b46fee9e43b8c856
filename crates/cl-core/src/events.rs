//! Transport change notifications.
//!
//! [`EventBus`] wraps a `tokio::sync::broadcast` channel with a bounded
//! ring-buffer of recent events so that late subscribers can catch up.
//! Every event carries the full transport snapshot taken right after the
//! change, plus a per-player sequence number.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::broadcast;

use crate::ids::{PlayerId, SegmentId};
use crate::transport::{PlaybackStatus, SegmentLoadError, Transport};

/// Default number of events retained in the ring buffer.
pub const DEFAULT_RECENT_EVENTS: usize = 100;

// ---------------------------------------------------------------------------
// TransportChange
// ---------------------------------------------------------------------------

/// What changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportChange {
    StatusChanged {
        from: PlaybackStatus,
        to: PlaybackStatus,
    },
    TimeUpdate,
    SegmentChanged {
        from: Option<usize>,
        to: usize,
    },
    Seeked {
        target: f64,
    },
    DurationResolved {
        segment_id: SegmentId,
        seconds: f64,
    },
    Failed {
        error: SegmentLoadError,
    },
    Destroyed,
}

// ---------------------------------------------------------------------------
// TransportEvent
// ---------------------------------------------------------------------------

/// A timestamped, sequenced transport change ready for broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportEvent {
    /// Player that produced the event.
    pub player_id: PlayerId,
    /// Strictly increasing per player, starting at 1.
    pub sequence: u64,
    /// When the change was published.
    pub timestamp: DateTime<Utc>,
    /// What changed.
    pub change: TransportChange,
    /// Transport state after the change.
    pub snapshot: Transport,
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

struct Recent {
    sequence: u64,
    events: VecDeque<TransportEvent>,
}

/// Broadcast channel with a bounded ring buffer of recent events.
pub struct EventBus {
    player_id: PlayerId,
    tx: broadcast::Sender<TransportEvent>,
    recent: Mutex<Recent>,
    recent_capacity: usize,
}

impl EventBus {
    /// Create a new event bus for one player.
    ///
    /// `capacity` controls the broadcast channel buffer; subscribers that fall
    /// further behind receive `RecvError::Lagged`. `recent_capacity` bounds
    /// the ring buffer returned by [`EventBus::recent_events`].
    pub fn new(player_id: PlayerId, capacity: usize, recent_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            player_id,
            tx,
            recent: Mutex::new(Recent {
                sequence: 0,
                events: VecDeque::with_capacity(recent_capacity),
            }),
            recent_capacity,
        }
    }

    /// Player this bus belongs to.
    pub fn player_id(&self) -> PlayerId {
        self.player_id
    }

    /// Subscribe to the broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.tx.subscribe()
    }

    /// Publish a change to all current subscribers and store it in the
    /// ring buffer. Returns the assigned sequence number.
    pub fn publish(&self, change: TransportChange, snapshot: Transport) -> u64 {
        // Sequence assignment and send happen under one lock so subscribers
        // observe events in sequence order.
        let mut recent = self.recent.lock();
        recent.sequence += 1;
        let event = TransportEvent {
            player_id: self.player_id,
            sequence: recent.sequence,
            timestamp: Utc::now(),
            change,
            snapshot,
        };

        if self.recent_capacity > 0 {
            if recent.events.len() >= self.recent_capacity {
                recent.events.pop_back();
            }
            recent.events.push_front(event.clone());
        }

        // Ignore send errors (no subscribers).
        let _ = self.tx.send(event);
        recent.sequence
    }

    /// Return the `n` most recent events (newest first).
    pub fn recent_events(&self, n: usize) -> Vec<TransportEvent> {
        let recent = self.recent.lock();
        recent.events.iter().take(n).cloned().collect()
    }

    /// Sequence number of the last published event (0 if none).
    pub fn last_sequence(&self) -> u64 {
        self.recent.lock().sequence
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("player_id", &self.player_id)
            .field("recent_capacity", &self.recent_capacity)
            .finish_non_exhaustive()
    }
}
