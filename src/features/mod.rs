//! # Features Layer
//!
//! The scheduling core's feature modules: recurrence expansion, the
//! validation gate, announcement scheduling, and store/backend
//! reconciliation.

pub mod announcements;
pub mod reconciliation;
pub mod recurrence;
pub mod validation;

// Re-export feature items
pub use announcements::{AnnouncementScheduler, ScheduledAnnouncement};
pub use reconciliation::ReconciliationEngine;
pub use recurrence::RecurrencePattern;
