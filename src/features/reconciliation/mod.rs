//! # Feature: Reconciliation Engine
//!
//! The synchronization point between the metadata store's rich records
//! and the notification backend's coarse pending-ID set. The backend
//! silently drops an entry once it fires, so without this sweep the
//! store would accumulate records for announcements that were already
//! delivered or cancelled through another path.
//!
//! A sweep runs on every listing request and reactively after a
//! `Completed` lifecycle event (debounced against back-to-back sweeps).
//! A record survives when ANY entry ID in its derived range is still
//! pending; evicted records are removed from the store best-effort,
//! never blocking the read.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false

use log::{debug, info, warn};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::backend::NotificationBackend;
use crate::core::{HeraldError, Result};
use crate::features::announcements::ScheduledAnnouncement;
use crate::storage::{MetadataStore, ANNOUNCEMENTS_KEY};

/// Reactive sweeps closer together than this are skipped.
pub const SWEEP_DEBOUNCE: Duration = Duration::from_secs(2);

/// Split stored records into those still backed by a pending entry and
/// those that went stale, and count pending entries owned by nobody.
pub fn partition(
    stored: Vec<ScheduledAnnouncement>,
    pending: &HashSet<i64>,
    horizon_days: u32,
) -> (Vec<ScheduledAnnouncement>, Vec<ScheduledAnnouncement>, usize) {
    let (keep, stale): (Vec<_>, Vec<_>) = stored
        .into_iter()
        .partition(|a| pending.iter().any(|id| a.covers_entry(*id, horizon_days)));

    let orphans = pending
        .iter()
        .filter(|id| !keep.iter().any(|a| a.covers_entry(**id, horizon_days)))
        .count();

    (keep, stale, orphans)
}

/// Aligns the metadata store with the backend's pending-ID set.
pub struct ReconciliationEngine {
    store: Arc<dyn MetadataStore>,
    backend: Arc<dyn NotificationBackend>,
    horizon_days: u32,
    last_sweep: Mutex<Option<Instant>>,
}

impl ReconciliationEngine {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        backend: Arc<dyn NotificationBackend>,
        horizon_days: u32,
    ) -> Self {
        ReconciliationEngine {
            store,
            backend,
            horizon_days,
            last_sweep: Mutex::new(None),
        }
    }

    /// Read the persisted announcement list. Read failures and corrupted
    /// documents degrade to an empty list; they never propagate.
    pub async fn load_stored(&self) -> Vec<ScheduledAnnouncement> {
        match self.store.get(ANNOUNCEMENTS_KEY).await {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(list) => list,
                Err(e) => {
                    warn!("Stored announcement list is corrupted, treating as empty: {e}");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("Metadata store read failed, treating as empty: {e}");
                Vec::new()
            }
        }
    }

    /// Persist the announcement list. Write failures propagate.
    pub async fn save(&self, list: &[ScheduledAnnouncement]) -> Result<()> {
        let value = serde_json::to_value(list)?;
        self.store
            .set(ANNOUNCEMENTS_KEY, value)
            .await
            .map_err(HeraldError::store_write)
    }

    /// Drop every persisted record. Write failures propagate.
    pub async fn clear(&self) -> Result<()> {
        self.store.clear().await.map_err(HeraldError::store_write)
    }

    /// Run a full reconciliation pass and return the live announcement
    /// list, sorted ascending by scheduled time.
    ///
    /// If the backend's pending query fails, the sweep is skipped for
    /// this cycle and the last-known stored list comes back unfiltered —
    /// a degraded read beats an empty one.
    pub async fn reconciled(&self) -> Vec<ScheduledAnnouncement> {
        let stored = self.load_stored().await;

        let pending = match self.backend.pending_ids().await {
            Ok(pending) => pending,
            Err(e) => {
                warn!("Pending-ID query failed, returning unfiltered records: {e}");
                let mut degraded = stored;
                degraded.sort_by_key(|a| a.scheduled_time);
                return degraded;
            }
        };

        let (mut keep, stale, orphans) = partition(stored, &pending, self.horizon_days);

        if orphans > 0 {
            // Foreign backend entries; diagnostics only, never cancelled.
            debug!("{orphans} pending entr(ies) have no metadata record");
        }

        if !stale.is_empty() {
            info!(
                "Evicting {} stale announcement record(s): {:?}",
                stale.len(),
                stale.iter().map(|a| a.id).collect::<Vec<_>>()
            );
            if let Err(e) = self.save(&keep).await {
                warn!("Stale-record eviction failed, will retry next sweep: {e}");
            }
        }

        keep.sort_by_key(|a| a.scheduled_time);
        keep
    }

    /// Reactive sweep entry point for `Completed` events. Sweeps landing
    /// within [`SWEEP_DEBOUNCE`] of the previous one are skipped.
    pub async fn sweep_after_completion(&self) {
        {
            let mut last = match self.last_sweep.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Some(at) = *last {
                if at.elapsed() < SWEEP_DEBOUNCE {
                    debug!("Skipping redundant reconciliation sweep");
                    return;
                }
            }
            *last = Some(Instant::now());
        }
        let kept = self.reconciled().await;
        debug!("Post-completion sweep kept {} record(s)", kept.len());
    }
}
