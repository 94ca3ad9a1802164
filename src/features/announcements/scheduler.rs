//! Announcement scheduler facade.
//!
//! Ties the validation gate, recurrence calculator, ID allocator,
//! notification backend, metadata store, and status bus together behind
//! the public scheduling API.
//!
//! Scheduling order matters: every check runs before the first backend
//! call, and the metadata record is written only after ALL backend calls
//! for the announcement succeed. A partial backend failure therefore
//! never produces an orphaned record; leftover backend entries are swept
//! up by the next reconciliation pass.

use chrono::{DateTime, Local, NaiveTime, Utc};
use dashmap::DashMap;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::ids;
use super::record::ScheduledAnnouncement;
use crate::backend::NotificationBackend;
use crate::core::{HeraldError, Result, SchedulerLimits, ValidationError};
use crate::delivery::Announcer;
use crate::events::{StatusBus, StatusEvent};
use crate::features::reconciliation::ReconciliationEngine;
use crate::features::recurrence::{self, RecurrencePattern};
use crate::features::validation;
use crate::storage::MetadataStore;

/// The announcement scheduling core.
///
/// One logical instance owns the metadata store, the backend handle, the
/// status bus, and the registry of outstanding local delivery timers.
pub struct AnnouncementScheduler {
    limits: SchedulerLimits,
    backend: Arc<dyn NotificationBackend>,
    announcer: Arc<dyn Announcer>,
    engine: Arc<ReconciliationEngine>,
    bus: StatusBus,
    /// Outstanding delivery timers, keyed by backend entry ID.
    timers: Arc<DashMap<i64, JoinHandle<()>>>,
}

impl AnnouncementScheduler {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        backend: Arc<dyn NotificationBackend>,
        announcer: Arc<dyn Announcer>,
        limits: SchedulerLimits,
    ) -> Self {
        let engine = Arc::new(ReconciliationEngine::new(
            store,
            backend.clone(),
            limits.max_horizon_days,
        ));
        AnnouncementScheduler {
            limits,
            backend,
            announcer,
            engine,
            bus: StatusBus::new(),
            timers: Arc::new(DashMap::new()),
        }
    }

    pub fn limits(&self) -> &SchedulerLimits {
        &self.limits
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.bus.subscribe()
    }

    // ========================================================================
    // Scheduling
    // ========================================================================

    /// Schedule a recurring announcement at `time_of_day` on the days the
    /// pattern matches, pre-scheduled over the configured horizon. With
    /// no pattern this degenerates to a one-time announcement at the
    /// next matching wall-clock time.
    ///
    /// Returns the root announcement ID.
    pub async fn schedule_recurring(
        &self,
        content: &str,
        time_of_day: NaiveTime,
        pattern: Option<RecurrencePattern>,
        custom_days: &[u8],
        id: Option<i64>,
        metadata: Option<HashMap<String, String>>,
    ) -> Result<i64> {
        let now = Local::now();
        validation::check_content(content)?;
        if pattern == Some(RecurrencePattern::Custom) {
            recurrence::validate_custom_days(custom_days)?;
        }

        let occurrences = recurrence::expand(
            time_of_day,
            pattern,
            custom_days,
            &now,
            self.limits.max_horizon_days,
        )?;
        let Some(first) = occurrences.first().copied() else {
            return Err(ValidationError::NoUpcomingOccurrences {
                horizon_days: self.limits.max_horizon_days,
            }
            .into());
        };

        let existing = self.engine.reconciled().await;
        validation::check_limits(&occurrences, &existing, &self.limits, &now)?;

        let root = id.unwrap_or_else(|| ids::generate_root_id(&Utc::now()));
        let entry_ids = ids::entry_ids(root, occurrences.len())?;

        self.arm_backend(&entry_ids, &occurrences, content).await?;

        let record = ScheduledAnnouncement {
            id: root,
            content: content.trim().to_string(),
            scheduled_time: first,
            recurrence: pattern,
            custom_days: if pattern == Some(RecurrencePattern::Custom) {
                custom_days.to_vec()
            } else {
                Vec::new()
            },
            is_active: true,
            metadata: metadata.unwrap_or_default(),
            created_at: Utc::now(),
        };
        self.persist_record(record).await?;

        for (entry_id, at) in entry_ids.iter().zip(&occurrences) {
            self.spawn_delivery_timer(*entry_id, root, content.trim().to_string(), *at);
        }

        self.bus.publish(StatusEvent::Scheduled {
            id: root,
            occurrences: occurrences.len(),
        });
        info!(
            "Scheduled announcement {root} ({} occurrence(s), pattern {:?})",
            occurrences.len(),
            pattern
        );
        Ok(root)
    }

    /// Schedule a one-time announcement at an absolute instant.
    ///
    /// Returns the announcement ID, which is also its single backend
    /// entry ID.
    pub async fn schedule_once(
        &self,
        content: &str,
        when: DateTime<Local>,
        id: Option<i64>,
        metadata: Option<HashMap<String, String>>,
    ) -> Result<i64> {
        let now = Local::now();
        validation::check_content(content)?;
        validation::check_future(&when, &now)?;

        let existing = self.engine.reconciled().await;
        let occurrences = [when];
        validation::check_limits(&occurrences, &existing, &self.limits, &now)?;

        let root = id.unwrap_or_else(|| ids::generate_root_id(&Utc::now()));
        self.arm_backend(&[root], &occurrences, content).await?;

        let record = ScheduledAnnouncement {
            id: root,
            content: content.trim().to_string(),
            scheduled_time: when,
            recurrence: None,
            custom_days: Vec::new(),
            is_active: true,
            metadata: metadata.unwrap_or_default(),
            created_at: Utc::now(),
        };
        self.persist_record(record).await?;

        self.spawn_delivery_timer(root, root, content.trim().to_string(), when);

        self.bus.publish(StatusEvent::Scheduled {
            id: root,
            occurrences: 1,
        });
        info!("Scheduled one-time announcement {root} at {when}");
        Ok(root)
    }

    /// Issue one backend call per occurrence. The first failure aborts
    /// and surfaces as a single [`HeraldError::Backend`]; no record has
    /// been written at that point, so earlier successful calls leave at
    /// most backend-side leftovers for the next sweep.
    async fn arm_backend(
        &self,
        entry_ids: &[i64],
        occurrences: &[DateTime<Local>],
        content: &str,
    ) -> Result<()> {
        for (entry_id, at) in entry_ids.iter().zip(occurrences) {
            self.backend
                .schedule_at(*entry_id, *at, content)
                .await
                .map_err(|e| HeraldError::backend("schedule_at", e))?;
        }
        Ok(())
    }

    /// Write the record, replacing any stored record with the same ID.
    async fn persist_record(&self, record: ScheduledAnnouncement) -> Result<()> {
        let mut list = self.engine.load_stored().await;
        if list.iter().any(|a| a.id == record.id) {
            debug!("Replacing stored announcement {}", record.id);
            list.retain(|a| a.id != record.id);
        }
        list.push(record);
        self.engine.save(&list).await
    }

    // ========================================================================
    // Cancellation
    // ========================================================================

    /// Cancel one announcement: every backend entry in its derived ID
    /// range, its local timers, and its metadata record. Returns false
    /// when no record with that ID exists.
    pub async fn cancel(&self, id: i64) -> Result<bool> {
        let mut list = self.engine.load_stored().await;
        let Some(position) = list.iter().position(|a| a.id == id) else {
            debug!("Cancel: no stored announcement with id {id}");
            return Ok(false);
        };
        let record = list.remove(position);

        let range = record.entry_range(self.limits.max_horizon_days);
        for entry_id in range.clone() {
            self.backend
                .cancel(entry_id)
                .await
                .map_err(|e| HeraldError::backend("cancel", e))?;
        }
        for entry_id in range {
            if let Some((_, handle)) = self.timers.remove(&entry_id) {
                handle.abort();
            }
        }

        self.engine.save(&list).await?;
        info!("Cancelled announcement {id}");
        Ok(true)
    }

    /// Cancel everything: backend, local timers, and the store.
    pub async fn cancel_all(&self) -> Result<()> {
        self.backend
            .cancel_all()
            .await
            .map_err(|e| HeraldError::backend("cancel_all", e))?;

        for entry in self.timers.iter() {
            entry.value().abort();
        }
        self.timers.clear();

        self.engine.clear().await?;
        info!("Cancelled all announcements");
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// The reconciled announcement list, sorted ascending by scheduled
    /// time. Never fails: store reads degrade to empty, backend failures
    /// degrade to the unfiltered stored list.
    pub async fn list_scheduled(&self) -> Vec<ScheduledAnnouncement> {
        self.engine.reconciled().await
    }

    // ========================================================================
    // Delivery
    // ========================================================================

    /// Entry point for backend delivery callbacks: an occurrence with
    /// `entry_id` fired. Looks up the owning record and runs the
    /// delivery lifecycle.
    pub async fn handle_delivery(&self, entry_id: i64) {
        let stored = self.engine.load_stored().await;
        let Some(record) = stored
            .iter()
            .find(|a| a.covers_entry(entry_id, self.limits.max_horizon_days))
        else {
            warn!("Delivery callback for unknown entry {entry_id}");
            return;
        };

        run_delivery(
            self.announcer.as_ref(),
            &self.bus,
            &self.engine,
            record.id,
            &record.content,
        )
        .await;

        if let Some((_, handle)) = self.timers.remove(&entry_id) {
            handle.abort();
        }
    }

    /// Arm a cancellable local timer that delivers the announcement when
    /// the occurrence comes due, independent of the backend's own
    /// callback path.
    fn spawn_delivery_timer(
        &self,
        entry_id: i64,
        root_id: i64,
        content: String,
        at: DateTime<Local>,
    ) {
        let delay = (at - Local::now()).to_std().unwrap_or(Duration::ZERO);
        let announcer = self.announcer.clone();
        let bus = self.bus.clone();
        let engine = self.engine.clone();
        let timers = self.timers.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            run_delivery(announcer.as_ref(), &bus, &engine, root_id, &content).await;
            timers.remove(&entry_id);
        });

        if let Some(replaced) = self.timers.insert(entry_id, handle) {
            replaced.abort();
        }
    }
}

impl Drop for AnnouncementScheduler {
    fn drop(&mut self) {
        for entry in self.timers.iter() {
            entry.value().abort();
        }
    }
}

/// The delivery lifecycle for one fired occurrence: `Delivering`, then
/// the announcer, then `Completed` (which triggers a debounced
/// reconciliation sweep) or `Failed`.
async fn run_delivery(
    announcer: &dyn Announcer,
    bus: &StatusBus,
    engine: &ReconciliationEngine,
    root_id: i64,
    content: &str,
) {
    bus.publish(StatusEvent::Delivering { id: root_id });
    match announcer.speak(content).await {
        Ok(()) => {
            bus.publish(StatusEvent::Completed { id: root_id });
            engine.sweep_after_completion().await;
        }
        Err(e) => {
            warn!("Delivery of announcement {root_id} failed: {e}");
            bus.publish(StatusEvent::Failed {
                id: root_id,
                error: e.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::LogAnnouncer;
    use crate::storage::{MemoryStore, ANNOUNCEMENTS_KEY};
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    /// Backend double recording every call; entries stay pending until
    /// cancelled.
    #[derive(Default)]
    struct RecordingBackend {
        scheduled: StdMutex<Vec<(i64, DateTime<Local>)>>,
        cancelled: StdMutex<Vec<i64>>,
        pending: StdMutex<HashSet<i64>>,
        /// Fail the nth schedule_at call (0-based), if set.
        fail_on_call: Option<usize>,
    }

    impl RecordingBackend {
        fn failing_on(call: usize) -> Self {
            RecordingBackend {
                fail_on_call: Some(call),
                ..Default::default()
            }
        }

        fn scheduled_ids(&self) -> Vec<i64> {
            self.scheduled.lock().unwrap().iter().map(|(id, _)| *id).collect()
        }
    }

    #[async_trait]
    impl NotificationBackend for RecordingBackend {
        async fn schedule_at(
            &self,
            id: i64,
            time: DateTime<Local>,
            _payload: &str,
        ) -> anyhow::Result<()> {
            let mut scheduled = self.scheduled.lock().unwrap();
            if self.fail_on_call == Some(scheduled.len()) {
                anyhow::bail!("platform rejected entry {id}");
            }
            scheduled.push((id, time));
            self.pending.lock().unwrap().insert(id);
            Ok(())
        }

        async fn cancel(&self, id: i64) -> anyhow::Result<()> {
            self.cancelled.lock().unwrap().push(id);
            self.pending.lock().unwrap().remove(&id);
            Ok(())
        }

        async fn cancel_all(&self) -> anyhow::Result<()> {
            self.pending.lock().unwrap().clear();
            Ok(())
        }

        async fn pending_ids(&self) -> anyhow::Result<HashSet<i64>> {
            Ok(self.pending.lock().unwrap().clone())
        }
    }

    struct FailingAnnouncer;

    #[async_trait]
    impl Announcer for FailingAnnouncer {
        async fn speak(&self, _text: &str) -> anyhow::Result<()> {
            anyhow::bail!("speech synthesis offline")
        }
    }

    struct CountingAnnouncer {
        spoken: AtomicUsize,
    }

    #[async_trait]
    impl Announcer for CountingAnnouncer {
        async fn speak(&self, _text: &str) -> anyhow::Result<()> {
            self.spoken.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn init_logs() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn limits(max_per_day: usize, max_total: usize, horizon: u32) -> SchedulerLimits {
        SchedulerLimits {
            max_per_day,
            max_total,
            min_interval_minutes: 0,
            max_horizon_days: horizon,
        }
    }

    fn scheduler_with(
        backend: Arc<RecordingBackend>,
        limits: SchedulerLimits,
    ) -> (AnnouncementScheduler, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let scheduler = AnnouncementScheduler::new(
            store.clone(),
            backend,
            Arc::new(LogAnnouncer),
            limits,
        );
        (scheduler, store)
    }

    /// A future local time `days` out at the top of an hour.
    fn future_at(days: i64, hour: u32) -> DateTime<Local> {
        use chrono::{NaiveTime, TimeZone};
        let date = (Local::now() + ChronoDuration::days(days)).date_naive();
        Local
            .from_local_datetime(&date.and_time(NaiveTime::from_hms_opt(hour, 0, 0).unwrap()))
            .earliest()
            .unwrap()
    }

    // ---- scheduling ----

    #[tokio::test]
    async fn test_recurring_entry_ids_are_contiguous_in_occurrence_order() {
        init_logs();
        let backend = Arc::new(RecordingBackend::default());
        let (scheduler, _) = scheduler_with(backend.clone(), limits(16, 64, 3));

        let anchor = Local::now() + ChronoDuration::hours(1);
        let root = scheduler
            .schedule_recurring(
                "daily digest",
                anchor.time(),
                Some(RecurrencePattern::Daily),
                &[],
                Some(1000),
                None,
            )
            .await
            .unwrap();
        assert_eq!(root, 1000);

        // Near midnight the +1h anchor falls on tomorrow, which costs
        // the day-0 occurrence; either way the IDs are contiguous from
        // the root in occurrence order.
        let expected = if anchor.date_naive() == Local::now().date_naive() {
            vec![1000, 1001, 1002]
        } else {
            vec![1000, 1001]
        };
        assert_eq!(backend.scheduled_ids(), expected);

        let times: Vec<DateTime<Local>> = backend
            .scheduled
            .lock()
            .unwrap()
            .iter()
            .map(|(_, t)| *t)
            .collect();
        assert!(times.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_schedule_once_writes_record_and_arms_backend() {
        let backend = Arc::new(RecordingBackend::default());
        let (scheduler, _) = scheduler_with(backend.clone(), limits(16, 64, 14));

        let when = future_at(2, 9);
        let id = scheduler
            .schedule_once("dentist", when, None, None)
            .await
            .unwrap();

        assert_eq!(backend.scheduled_ids(), vec![id]);
        let listed = scheduler.list_scheduled().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, id);
        assert_eq!(listed[0].content, "dentist");
        assert_eq!(listed[0].scheduled_time, when);
        assert!(listed[0].is_active);
    }

    #[tokio::test]
    async fn test_generated_ids_differ_between_announcements() {
        let backend = Arc::new(RecordingBackend::default());
        let (scheduler, _) = scheduler_with(backend, limits(16, 64, 14));

        let a = scheduler
            .schedule_once("one", future_at(1, 9), None, None)
            .await
            .unwrap();
        let b = scheduler
            .schedule_once("two", future_at(1, 10), None, None)
            .await
            .unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_metadata_rides_along() {
        let backend = Arc::new(RecordingBackend::default());
        let (scheduler, _) = scheduler_with(backend, limits(16, 64, 14));

        let mut meta = HashMap::new();
        meta.insert("voice".to_string(), "calm".to_string());
        scheduler
            .schedule_once("hydrate", future_at(1, 9), Some(5), Some(meta))
            .await
            .unwrap();

        let listed = scheduler.list_scheduled().await;
        assert_eq!(listed[0].metadata.get("voice"), Some(&"calm".to_string()));
    }

    // ---- validation wiring ----

    #[tokio::test]
    async fn test_empty_content_is_rejected_before_any_backend_call() {
        let backend = Arc::new(RecordingBackend::default());
        let (scheduler, store) = scheduler_with(backend.clone(), limits(16, 64, 14));

        let err = scheduler
            .schedule_once("   ", future_at(1, 9), None, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HeraldError::Validation(ValidationError::EmptyContent)
        ));
        assert!(backend.scheduled_ids().is_empty());
        assert_eq!(store.get(ANNOUNCEMENTS_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_past_time_is_rejected() {
        let backend = Arc::new(RecordingBackend::default());
        let (scheduler, _) = scheduler_with(backend, limits(16, 64, 14));

        let err = scheduler
            .schedule_once("too late", Local::now() - ChronoDuration::minutes(5), None, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HeraldError::Validation(ValidationError::PastScheduledTime { .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_custom_days_are_rejected() {
        let backend = Arc::new(RecordingBackend::default());
        let (scheduler, _) = scheduler_with(backend.clone(), limits(16, 64, 14));

        let err = scheduler
            .schedule_recurring(
                "stretch",
                chrono::NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                Some(RecurrencePattern::Custom),
                &[0, 8],
                None,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HeraldError::Validation(ValidationError::InvalidCustomDays { .. })
        ));
        assert!(backend.scheduled_ids().is_empty());
    }

    #[tokio::test]
    async fn test_daily_limit_enforced_per_calendar_date() {
        let backend = Arc::new(RecordingBackend::default());
        let (scheduler, _) = scheduler_with(backend, limits(3, 64, 14));

        for hour in [8, 12, 18] {
            scheduler
                .schedule_once(&format!("meal {hour}"), future_at(2, hour), None, None)
                .await
                .unwrap();
        }

        // fourth on the same date fails
        let err = scheduler
            .schedule_once("snack", future_at(2, 20), None, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HeraldError::Validation(ValidationError::DailyLimitExceeded { .. })
        ));

        // fourth on a different date succeeds
        scheduler
            .schedule_once("snack", future_at(3, 20), None, None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_total_limit_enforced() {
        let backend = Arc::new(RecordingBackend::default());
        let (scheduler, _) = scheduler_with(backend, limits(16, 2, 14));

        scheduler
            .schedule_once("a", future_at(1, 9), None, None)
            .await
            .unwrap();
        scheduler
            .schedule_once("b", future_at(2, 9), None, None)
            .await
            .unwrap();

        let err = scheduler
            .schedule_once("c", future_at(3, 9), None, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HeraldError::Validation(ValidationError::TotalLimitExceeded { .. })
        ));
    }

    // ---- partial failure ----

    #[tokio::test]
    async fn test_partial_backend_failure_writes_no_record() {
        let backend = Arc::new(RecordingBackend::failing_on(2));
        let store = Arc::new(MemoryStore::new());
        let scheduler = AnnouncementScheduler::new(
            store.clone(),
            backend.clone(),
            Arc::new(LogAnnouncer),
            limits(16, 64, 5),
        );

        let err = scheduler
            .schedule_recurring(
                "doomed",
                (Local::now() + ChronoDuration::hours(1)).time(),
                Some(RecurrencePattern::Daily),
                &[],
                Some(3000),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, HeraldError::Backend { .. }));

        // two calls succeeded before the failure, but no record exists
        assert_eq!(backend.scheduled_ids().len(), 2);
        assert_eq!(store.get(ANNOUNCEMENTS_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_store_write_failure_propagates() {
        struct ReadOnlyStore;

        #[async_trait]
        impl MetadataStore for ReadOnlyStore {
            async fn get(&self, _key: &str) -> anyhow::Result<Option<serde_json::Value>> {
                Ok(None)
            }
            async fn set(&self, _key: &str, _value: serde_json::Value) -> anyhow::Result<()> {
                anyhow::bail!("read-only filesystem")
            }
            async fn remove(&self, _key: &str) -> anyhow::Result<()> {
                Ok(())
            }
            async fn clear(&self) -> anyhow::Result<()> {
                Ok(())
            }
        }

        let scheduler = AnnouncementScheduler::new(
            Arc::new(ReadOnlyStore),
            Arc::new(RecordingBackend::default()),
            Arc::new(LogAnnouncer),
            limits(16, 64, 14),
        );

        let err = scheduler
            .schedule_once("unsaveable", future_at(1, 9), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, HeraldError::StoreWrite { .. }));
    }

    // ---- cancellation ----

    #[tokio::test]
    async fn test_cancel_removes_full_range_and_record() {
        let backend = Arc::new(RecordingBackend::default());
        let (scheduler, _) = scheduler_with(backend.clone(), limits(16, 64, 3));

        scheduler
            .schedule_recurring(
                "workout",
                (Local::now() + ChronoDuration::hours(1)).time(),
                Some(RecurrencePattern::Daily),
                &[],
                Some(2000),
                None,
            )
            .await
            .unwrap();

        assert!(scheduler.cancel(2000).await.unwrap());

        // the entire derived range is cancelled, armed or not
        assert_eq!(*backend.cancelled.lock().unwrap(), vec![2000, 2001, 2002]);
        assert!(backend.pending_ids().await.unwrap().is_empty());
        assert!(scheduler.list_scheduled().await.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_unknown_id_returns_false() {
        let backend = Arc::new(RecordingBackend::default());
        let (scheduler, _) = scheduler_with(backend.clone(), limits(16, 64, 14));

        assert!(!scheduler.cancel(424242).await.unwrap());
        assert!(backend.cancelled.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_all_clears_backend_store_and_timers() {
        let backend = Arc::new(RecordingBackend::default());
        let (scheduler, store) = scheduler_with(backend.clone(), limits(16, 64, 14));

        scheduler
            .schedule_once("a", future_at(1, 9), None, None)
            .await
            .unwrap();
        scheduler
            .schedule_once("b", future_at(2, 9), None, None)
            .await
            .unwrap();

        scheduler.cancel_all().await.unwrap();

        assert!(backend.pending_ids().await.unwrap().is_empty());
        assert_eq!(store.get(ANNOUNCEMENTS_KEY).await.unwrap(), None);
        assert!(scheduler.list_scheduled().await.is_empty());
        assert!(scheduler.timers.is_empty());
    }

    // ---- reconciliation through the facade ----

    #[tokio::test]
    async fn test_listing_reflects_backend_evictions() {
        let backend = Arc::new(RecordingBackend::default());
        let (scheduler, store) = scheduler_with(backend.clone(), limits(16, 64, 14));

        let a = scheduler
            .schedule_once("a", future_at(1, 9), None, None)
            .await
            .unwrap();
        let b = scheduler
            .schedule_once("b", future_at(2, 9), None, None)
            .await
            .unwrap();

        // the platform silently drops entry `a`
        backend.pending.lock().unwrap().remove(&a);

        let listed = scheduler.list_scheduled().await;
        assert_eq!(listed.iter().map(|r| r.id).collect::<Vec<_>>(), vec![b]);

        // and the store was rewritten without it
        let raw = store.get(ANNOUNCEMENTS_KEY).await.unwrap().unwrap();
        let remaining: Vec<ScheduledAnnouncement> = serde_json::from_value(raw).unwrap();
        assert_eq!(remaining.iter().map(|r| r.id).collect::<Vec<_>>(), vec![b]);
    }

    #[tokio::test]
    async fn test_listing_is_sorted_by_scheduled_time() {
        let backend = Arc::new(RecordingBackend::default());
        let (scheduler, _) = scheduler_with(backend, limits(16, 64, 14));

        scheduler
            .schedule_once("later", future_at(3, 9), Some(10), None)
            .await
            .unwrap();
        scheduler
            .schedule_once("sooner", future_at(1, 9), Some(20), None)
            .await
            .unwrap();

        let listed = scheduler.list_scheduled().await;
        assert_eq!(listed.iter().map(|r| r.id).collect::<Vec<_>>(), vec![20, 10]);
    }

    // ---- delivery lifecycle ----

    #[tokio::test]
    async fn test_delivery_emits_lifecycle_and_sweeps() {
        init_logs();
        let store = Arc::new(MemoryStore::new());
        let backend = Arc::new(crate::backend::LocalTimerBackend::new());
        let announcer = Arc::new(CountingAnnouncer {
            spoken: AtomicUsize::new(0),
        });
        let scheduler = AnnouncementScheduler::new(
            store,
            backend,
            announcer.clone(),
            limits(16, 64, 14),
        );
        let mut events = scheduler.subscribe();

        let id = scheduler
            .schedule_once(
                "stand-up",
                Local::now() + ChronoDuration::milliseconds(80),
                None,
                None,
            )
            .await
            .unwrap();

        let mut seen = Vec::new();
        while let Ok(Ok(event)) =
            tokio::time::timeout(Duration::from_secs(2), events.recv()).await
        {
            let done = matches!(event, StatusEvent::Completed { .. });
            seen.push(event);
            if done {
                break;
            }
        }

        assert!(seen.contains(&StatusEvent::Scheduled { id, occurrences: 1 }));
        assert!(seen.contains(&StatusEvent::Delivering { id }));
        assert!(seen.contains(&StatusEvent::Completed { id }));
        assert_eq!(announcer.spoken.load(Ordering::SeqCst), 1);

        // the fired entry is gone from the backend, so listing evicts it
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(scheduler.list_scheduled().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_delivery_emits_failed_event() {
        let store = Arc::new(MemoryStore::new());
        let backend = Arc::new(crate::backend::LocalTimerBackend::new());
        let scheduler = AnnouncementScheduler::new(
            store,
            backend,
            Arc::new(FailingAnnouncer),
            limits(16, 64, 14),
        );
        let mut events = scheduler.subscribe();

        let id = scheduler
            .schedule_once(
                "mumble",
                Local::now() + ChronoDuration::milliseconds(60),
                None,
                None,
            )
            .await
            .unwrap();

        let mut failure = None;
        while let Ok(Ok(event)) =
            tokio::time::timeout(Duration::from_secs(2), events.recv()).await
        {
            if let StatusEvent::Failed { id: failed_id, error } = event {
                failure = Some((failed_id, error));
                break;
            }
        }

        let (failed_id, error) = failure.expect("no Failed event");
        assert_eq!(failed_id, id);
        assert!(error.contains("speech synthesis offline"));
    }

    #[tokio::test]
    async fn test_handle_delivery_runs_lifecycle_for_known_entry() {
        let backend = Arc::new(RecordingBackend::default());
        let (scheduler, _) = scheduler_with(backend, limits(16, 64, 14));
        let mut events = scheduler.subscribe();

        let id = scheduler
            .schedule_once("callback", future_at(1, 9), None, None)
            .await
            .unwrap();
        // drain the Scheduled event
        let _ = events.recv().await;

        scheduler.handle_delivery(id).await;

        assert_eq!(
            events.recv().await.unwrap(),
            StatusEvent::Delivering { id }
        );
        assert_eq!(events.recv().await.unwrap(), StatusEvent::Completed { id });
    }

    #[tokio::test]
    async fn test_handle_delivery_ignores_unknown_entry() {
        let backend = Arc::new(RecordingBackend::default());
        let (scheduler, _) = scheduler_with(backend, limits(16, 64, 14));

        // must not panic or publish anything
        scheduler.handle_delivery(987654).await;
    }

    // ---- duplicate ids ----

    #[tokio::test]
    async fn test_rescheduling_same_id_replaces_record() {
        let backend = Arc::new(RecordingBackend::default());
        let (scheduler, _) = scheduler_with(backend, limits(16, 64, 14));

        scheduler
            .schedule_once("v1", future_at(1, 9), Some(7), None)
            .await
            .unwrap();
        scheduler
            .schedule_once("v2", future_at(2, 9), Some(7), None)
            .await
            .unwrap();

        let listed = scheduler.list_scheduled().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].content, "v2");
    }
}
