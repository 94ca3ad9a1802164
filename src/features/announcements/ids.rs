//! Deterministic backend entry-ID allocation.
//!
//! One announcement owns a small contiguous ID range: the root ID for a
//! one-time announcement, `root + i` per occurrence for a recurring one.
//! The range is bounded by the scheduling horizon, so it can be
//! reconstructed from the root alone for cancel and reconciliation.

use chrono::{DateTime, Utc};
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::core::ValidationError;

/// Highest root ID issued by this process.
static LAST_ISSUED: AtomicI64 = AtomicI64::new(0);

/// Minimum spacing between generated root IDs. Wider than any sane
/// scheduling horizon, so the derived entry-ID ranges of two generated
/// announcements can never overlap no matter how quickly they were
/// created.
const ROOT_ID_STRIDE: i64 = 64;

/// Generate a root announcement ID from the current instant, as epoch
/// milliseconds. Coarse enough to stay readable; when the clock has not
/// advanced past the previous ID plus [`ROOT_ID_STRIDE`], the ID is
/// nudged forward instead.
pub fn generate_root_id(now: &DateTime<Utc>) -> i64 {
    let millis = now.timestamp_millis();
    let mut last = LAST_ISSUED.load(Ordering::Relaxed);
    loop {
        let floor = last.saturating_add(ROOT_ID_STRIDE);
        let candidate = if millis >= floor { millis } else { floor };
        match LAST_ISSUED.compare_exchange(last, candidate, Ordering::SeqCst, Ordering::Relaxed) {
            Ok(_) => return candidate,
            Err(actual) => last = actual,
        }
    }
}

/// Derive the backend entry IDs for `count` occurrences, in the same
/// order the recurrence calculator produced them.
pub fn entry_ids(root: i64, count: usize) -> Result<Vec<i64>, ValidationError> {
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let id = root
            .checked_add(i as i64)
            .ok_or(ValidationError::IdRangeOverflow { root })?;
        out.push(id);
    }
    Ok(out)
}

/// The contiguous entry-ID range an announcement occupies. Recurring
/// announcements own the full horizon-wide range regardless of how many
/// occurrences the pattern actually produced; cancelling a never-armed
/// ID is a harmless no-op at the backend.
pub fn derived_range(root: i64, recurring: bool, horizon_days: u32) -> RangeInclusive<i64> {
    if recurring {
        let width = i64::from(horizon_days.saturating_sub(1));
        root..=root.saturating_add(width)
    } else {
        root..=root
    }
}
