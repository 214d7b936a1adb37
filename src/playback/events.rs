//! Replay events published to session subscribers.

use tokio::sync::broadcast;

use crate::core::phase::Phase;
use crate::core::time::TimeMs;
use crate::error::TrackError;

/// Event observed on a replay session
#[derive(Debug, Clone, PartialEq)]
pub enum ReplayEvent {
    /// The logical phase of the whole replay changed
    Phase(Phase),
    /// Every track finished the seek to this position
    SeekCompleted(TimeMs),
    /// Periodic position report while playing
    Position { time_ms: TimeMs, duration_ms: TimeMs },
    /// A track surfaced an engine error
    TrackError { track: String, error: TrackError },
    /// The session was closed; no further events follow
    Closed,
}

/// Fan-out of replay events to any number of subscribers.
///
/// Publishing never blocks; slow subscribers lose the oldest events.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ReplayEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event, ignoring the case where nobody listens
    pub fn publish(&self, event: ReplayEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReplayEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
