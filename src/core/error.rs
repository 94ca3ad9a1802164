//! Typed error surface for the scheduling core.
//!
//! Validation failures get one variant per gate check so callers can tell
//! exactly what to fix. Collaborator failures (backend, store) carry the
//! underlying cause verbatim.

use chrono::{DateTime, Local, NaiveDate};
use thiserror::Error;

/// Result type alias using [`HeraldError`].
pub type Result<T> = std::result::Result<T, HeraldError>;

/// A scheduling request was rejected before any side effect occurred.
///
/// Fully recoverable: the caller can adjust the request and retry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("announcement content is empty")]
    EmptyContent,

    #[error("scheduled time {requested} is not in the future (now: {now})")]
    PastScheduledTime {
        requested: DateTime<Local>,
        now: DateTime<Local>,
    },

    #[error("custom recurrence days are invalid: {reason}")]
    InvalidCustomDays { reason: String },

    #[error("active announcement limit reached ({active} active, limit {max_total})")]
    TotalLimitExceeded { active: usize, max_total: usize },

    #[error(
        "daily limit reached for {date}: {existing} existing + {added} new exceeds {max_per_day}"
    )]
    DailyLimitExceeded {
        date: NaiveDate,
        existing: usize,
        added: usize,
        max_per_day: usize,
    },

    #[error("occurrence is within {min_interval_minutes} min of an existing one at {conflict}")]
    IntervalTooTight {
        min_interval_minutes: u32,
        conflict: DateTime<Local>,
    },

    #[error("no occurrence falls within the next {horizon_days} day(s)")]
    NoUpcomingOccurrences { horizon_days: u32 },

    #[error("entry id range starting at {root} would overflow")]
    IdRangeOverflow { root: i64 },
}

/// Top-level error type for the scheduling core.
#[derive(Error, Debug)]
pub enum HeraldError {
    /// The request failed a pre-mutation check.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The notification backend rejected a schedule or cancel call.
    /// Surfaced verbatim; the core never retries.
    #[error("notification backend failed during {operation}: {source}")]
    Backend {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// A metadata store write failed. Writes must propagate: silently
    /// losing a just-validated reservation would leave backend entries
    /// with no matching record.
    #[error("metadata store write failed: {source}")]
    StoreWrite {
        #[source]
        source: anyhow::Error,
    },

    /// Announcement records could not be (de)serialized.
    #[error("announcement record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HeraldError {
    pub fn backend(operation: &'static str, source: anyhow::Error) -> Self {
        Self::Backend { operation, source }
    }

    pub fn store_write(source: anyhow::Error) -> Self {
        Self::StoreWrite { source }
    }
}
