//! The persisted announcement record.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::RangeInclusive;

use super::ids;
use crate::features::recurrence::RecurrencePattern;

/// One scheduled announcement as persisted in the metadata store.
///
/// The record is the locally-held richer view of what the notification
/// backend only knows as a handful of pending entry IDs; the
/// reconciliation engine keeps the two aligned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledAnnouncement {
    /// Root announcement ID; also the first backend entry ID.
    pub id: i64,

    /// Text handed to the delivery collaborator when an occurrence fires.
    pub content: String,

    /// Anchor timestamp. For recurring announcements this is the first
    /// occurrence produced at scheduling time.
    pub scheduled_time: DateTime<Local>,

    /// Recurrence pattern; absent for one-time announcements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<RecurrencePattern>,

    /// ISO weekday numbers (1=Monday..7=Sunday). Non-empty exactly when
    /// `recurrence` is `Custom`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_days: Vec<u8>,

    /// True until cancelled or expired.
    pub is_active: bool,

    /// Caller-defined key-value pairs; the core imposes no semantics.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,

    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

impl ScheduledAnnouncement {
    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_some()
    }

    /// The contiguous backend entry-ID range this announcement occupies.
    pub fn entry_range(&self, horizon_days: u32) -> RangeInclusive<i64> {
        ids::derived_range(self.id, self.is_recurring(), horizon_days)
    }

    /// Whether `entry_id` belongs to this announcement's derived range.
    pub fn covers_entry(&self, entry_id: i64, horizon_days: u32) -> bool {
        self.entry_range(horizon_days).contains(&entry_id)
    }
}
