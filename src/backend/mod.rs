//! # Notification Backend
//!
//! Capability trait for the platform notification service: schedule an
//! entry to fire at a time, cancel entries, and report the set of entry
//! IDs still pending. The backend is authoritative for the delivery
//! lifecycle and is assumed to silently drop an ID once it fires — there
//! is no durable "was this delivered" query, which is why the
//! reconciliation engine exists.
//!
//! [`LocalTimerBackend`] is the in-process implementation: one tokio
//! sleep task per entry, with the pending set held in a concurrent map.
//! Any OS notification service or push relay can satisfy the same trait.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false

use async_trait::async_trait;
use chrono::{DateTime, Local};
use dashmap::DashMap;
use log::debug;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Platform notification service collaborator.
#[async_trait]
pub trait NotificationBackend: Send + Sync {
    /// Request that entry `id` fires at `time`. `payload` is the text
    /// the platform should render or hand to the delivery callback.
    async fn schedule_at(&self, id: i64, time: DateTime<Local>, payload: &str)
        -> anyhow::Result<()>;

    /// Cancel entry `id`. Cancelling an unknown or already-fired entry
    /// is not an error.
    async fn cancel(&self, id: i64) -> anyhow::Result<()>;

    /// Cancel every pending entry.
    async fn cancel_all(&self) -> anyhow::Result<()>;

    /// The set of entry IDs the backend still holds.
    async fn pending_ids(&self) -> anyhow::Result<HashSet<i64>>;
}

/// Tokio-timer implementation of [`NotificationBackend`].
///
/// Each scheduled entry is a sleep task that removes its own ID from the
/// pending map when the timer elapses, matching the silent-drop behavior
/// of platform backends.
pub struct LocalTimerBackend {
    pending: Arc<DashMap<i64, JoinHandle<()>>>,
}

impl LocalTimerBackend {
    pub fn new() -> Self {
        LocalTimerBackend {
            pending: Arc::new(DashMap::new()),
        }
    }
}

impl Default for LocalTimerBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationBackend for LocalTimerBackend {
    async fn schedule_at(
        &self,
        id: i64,
        time: DateTime<Local>,
        payload: &str,
    ) -> anyhow::Result<()> {
        let delay = (time - Local::now()).to_std().unwrap_or(Duration::ZERO);
        debug!("Arming local timer {id} in {delay:?} ({payload})");

        // The task must not fire before its handle is in the map, so it
        // waits for the armed signal sent after insertion.
        let (armed_tx, armed_rx) = oneshot::channel::<()>();
        let pending = self.pending.clone();
        let handle = tokio::spawn(async move {
            let _ = armed_rx.await;
            tokio::time::sleep(delay).await;
            pending.remove(&id);
            debug!("Local timer {id} fired");
        });

        if let Some(replaced) = self.pending.insert(id, handle) {
            replaced.abort();
        }
        let _ = armed_tx.send(());
        Ok(())
    }

    async fn cancel(&self, id: i64) -> anyhow::Result<()> {
        if let Some((_, handle)) = self.pending.remove(&id) {
            handle.abort();
            debug!("Cancelled local timer {id}");
        }
        Ok(())
    }

    async fn cancel_all(&self) -> anyhow::Result<()> {
        let ids: Vec<i64> = self.pending.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            if let Some((_, handle)) = self.pending.remove(&id) {
                handle.abort();
            }
        }
        Ok(())
    }

    async fn pending_ids(&self) -> anyhow::Result<HashSet<i64>> {
        Ok(self.pending.iter().map(|entry| *entry.key()).collect())
    }
}

impl Drop for LocalTimerBackend {
    fn drop(&mut self) {
        for entry in self.pending.iter() {
            entry.value().abort();
        }
    }
}
