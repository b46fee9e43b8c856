//! Single-writer publication of the transport snapshot.
//!
//! [`TransportState`] is the write side and is only reachable from the
//! playback engine. Callers get a [`TransportHandle`], which can read the
//! latest snapshot and subscribe to changes but cannot mutate anything.

use std::sync::Arc;

use cl_core::events::{EventBus, TransportChange, TransportEvent};
use cl_core::{PlaybackStatus, PlayerId, Transport};
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

struct Shared {
    current: RwLock<Transport>,
    bus: EventBus,
}

/// Write side, owned by the playback engine.
pub(crate) struct TransportState {
    shared: Arc<Shared>,
}

impl TransportState {
    pub(crate) fn new(player_id: PlayerId, initial: Transport, capacity: usize, recent: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                current: RwLock::new(initial),
                bus: EventBus::new(player_id, capacity, recent),
            }),
        }
    }

    /// Store `snapshot` as current and notify subscribers.
    pub(crate) fn publish(&self, change: TransportChange, snapshot: Transport) {
        *self.shared.current.write() = snapshot.clone();
        self.shared.bus.publish(change, snapshot);
    }

    pub(crate) fn handle(&self) -> TransportHandle {
        TransportHandle {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Read-only view of a player's transport.
#[derive(Clone)]
pub struct TransportHandle {
    shared: Arc<Shared>,
}

impl TransportHandle {
    /// Player this transport belongs to.
    pub fn player_id(&self) -> PlayerId {
        self.shared.bus.player_id()
    }

    /// Latest snapshot.
    pub fn snapshot(&self) -> Transport {
        self.shared.current.read().clone()
    }

    /// Subscribe to every subsequent change, in publication order.
    ///
    /// The channel holds `player.event_capacity` events. A receiver that
    /// falls further behind gets [`RecvError::Lagged`] and loses the oldest
    /// ones; it can catch up from [`recent_events`](Self::recent_events),
    /// whose sequence numbers show the gap, or settle for
    /// [`snapshot`](Self::snapshot), which is always current.
    pub fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.shared.bus.subscribe()
    }

    /// The `n` most recent events, newest first.
    pub fn recent_events(&self, n: usize) -> Vec<TransportEvent> {
        self.shared.bus.recent_events(n)
    }

    /// Resolve with the first snapshot satisfying `predicate`, starting with
    /// the current one.
    ///
    /// Never resolves if no matching change is ever published; wrap it in
    /// `tokio::time::timeout` when that matters.
    pub async fn wait_for<F>(&self, predicate: F) -> Transport
    where
        F: Fn(&Transport) -> bool,
    {
        let mut rx = self.subscribe();
        let current = self.snapshot();
        if predicate(&current) {
            return current;
        }

        loop {
            match rx.recv().await {
                Ok(event) => {
                    if predicate(&event.snapshot) {
                        return event.snapshot;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "transport subscriber lagged");
                    let current = self.snapshot();
                    if predicate(&current) {
                        return current;
                    }
                }
                Err(RecvError::Closed) => return self.snapshot(),
            }
        }
    }

    /// Shorthand for waiting until the status equals `status`.
    pub async fn wait_for_status(&self, status: PlaybackStatus) -> Transport {
        self.wait_for(|t| t.status == status).await
    }
}

impl std::fmt::Debug for TransportHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportHandle")
            .field("player_id", &self.player_id())
            .field("snapshot", &self.snapshot())
            .finish()
    }
}
