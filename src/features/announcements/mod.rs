//! # Feature: Announcements
//!
//! The scheduling feature itself: the persisted announcement record,
//! deterministic entry-ID allocation, and the scheduler facade that ties
//! validation, recurrence expansion, the notification backend, the
//! metadata store, and the status bus together.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: true

pub mod ids;
pub mod record;
pub mod scheduler;

pub use record::ScheduledAnnouncement;
pub use scheduler::AnnouncementScheduler;
