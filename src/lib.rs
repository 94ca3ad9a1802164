// Core layer - configuration and error types
pub mod core;

// Collaborator interfaces - persistence, platform backend, delivery
pub mod backend;
pub mod delivery;
pub mod storage;

// Status event bus
pub mod events;

// Features layer - scheduling, recurrence, validation, reconciliation
pub mod features;

// Re-export the public surface
pub use self::core::{HeraldError, Result, SchedulerLimits, ValidationError};

pub use backend::{LocalTimerBackend, NotificationBackend};
pub use delivery::{Announcer, LogAnnouncer};
pub use events::{StatusBus, StatusEvent};
pub use storage::{JsonFileStore, MemoryStore, MetadataStore};

pub use features::{
    AnnouncementScheduler, ReconciliationEngine, RecurrencePattern, ScheduledAnnouncement,
};
