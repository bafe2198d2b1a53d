//! Typed multi-subscriber fan-out of `RuntimeEnvelope`s from the
//! filesystem, git, and forge actors and from pane runtimes.
//!
//! Backed by a `tokio::sync::broadcast` channel: every subscriber sees
//! every envelope in publish order and filters by variant, rather than
//! each source keeping only its latest value (a `watch` channel would
//! lose intermediate topology events a subscriber falls behind on).

use crate::envelope::RuntimeEnvelope;
use tokio::sync::broadcast;

/// Deep enough to absorb a burst of topology events at boot (a large repo
/// tree can register dozens of worktrees) without a slow subscriber
/// missing any before it catches up.
pub const DEFAULT_CAPACITY: usize = 256;

pub struct EventBus {
    tx: broadcast::Sender<RuntimeEnvelope>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publishes to every current subscriber. Returns the number of
    /// subscribers the envelope was delivered to; `0` with no receivers
    /// connected is not an error — publishing is fire-and-forget.
    pub fn publish(&self, envelope: RuntimeEnvelope) -> usize {
        self.tx.send(envelope).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RuntimeEnvelope> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
