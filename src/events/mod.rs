//! # Status Event Bus
//!
//! Broadcast channel of announcement lifecycle transitions:
//! `Scheduled → Delivering → {Completed, Failed}`. One channel
//! interleaves events for all in-flight announcements; every event
//! carries the announcement ID so consumers can attribute transitions
//! when several announcements are live at once.
//!
//! A `Completed` event is the sole trigger for a reactive
//! reconciliation sweep.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Events carry the announcement ID and failure text
//! - 1.0.0: Initial lifecycle enum over a broadcast channel

use log::debug;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Broadcast channel capacity for lifecycle events. Event volume is
/// bounded by the scheduler limits, so lagging receivers only occur if a
/// subscriber stops polling entirely.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Lifecycle transition of one announcement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StatusEvent {
    /// Every backend call for the announcement succeeded.
    Scheduled { id: i64, occurrences: usize },
    /// An occurrence fired and delivery has started.
    Delivering { id: i64 },
    /// Delivery finished. Terminal for this occurrence.
    Completed { id: i64 },
    /// Delivery threw. Terminal for this occurrence.
    Failed { id: i64, error: String },
}

/// Multi-subscriber broadcast bus for [`StatusEvent`]s.
#[derive(Clone)]
pub struct StatusBus {
    tx: broadcast::Sender<StatusEvent>,
}

impl StatusBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        StatusBus { tx }
    }

    /// Subscribe to lifecycle events. Each receiver sees every event
    /// published after the call.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Publishing with no live subscribers is fine —
    /// the event is simply dropped.
    pub fn publish(&self, event: StatusEvent) {
        debug!("Status event: {event:?}");
        let _ = self.tx.send(event);
    }
}

impl Default for StatusBus {
    fn default() -> Self {
        Self::new()
    }
}
