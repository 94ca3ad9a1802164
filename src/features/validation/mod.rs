//! # Feature: Validation Gate
//!
//! Pre-mutation checks for scheduling requests. Runs strictly before
//! any backend or store call, so a rejected request leaves no partial
//! side effects: no IDs reserved, no entries armed, nothing written.
//!
//! Check order: content, future time (one-time), custom days, total
//! limit, per-date limit, minimum same-date spacing. The per-date
//! bucket is keyed by calendar date, not by the weekday of a pattern.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false

use chrono::{DateTime, Duration, Local};
use log::warn;

use crate::core::{SchedulerLimits, ValidationError};
use crate::features::announcements::ScheduledAnnouncement;
use crate::features::recurrence;

/// Check 1: content must be non-empty after trimming.
pub fn check_content(content: &str) -> Result<(), ValidationError> {
    if content.trim().is_empty() {
        return Err(ValidationError::EmptyContent);
    }
    Ok(())
}

/// Check 2: a one-time announcement must be strictly in the future.
pub fn check_future(when: &DateTime<Local>, now: &DateTime<Local>) -> Result<(), ValidationError> {
    if when <= now {
        return Err(ValidationError::PastScheduledTime {
            requested: *when,
            now: *now,
        });
    }
    Ok(())
}

/// Checks 4-6: load limits against the current reconciled announcement
/// set. `new_occurrences` is the recurrence calculator's output for the
/// incoming request.
pub fn check_limits(
    new_occurrences: &[DateTime<Local>],
    existing: &[ScheduledAnnouncement],
    limits: &SchedulerLimits,
    now: &DateTime<Local>,
) -> Result<(), ValidationError> {
    let active = existing.iter().filter(|a| a.is_active).count();
    if active + 1 > limits.max_total {
        return Err(ValidationError::TotalLimitExceeded {
            active,
            max_total: limits.max_total,
        });
    }

    let Some(first) = new_occurrences.first() else {
        return Ok(());
    };
    let target_date = first.date_naive();

    let existing_occurrences: Vec<DateTime<Local>> = existing
        .iter()
        .filter(|a| a.is_active)
        .flat_map(|a| occurrences_for(a, now, limits.max_horizon_days))
        .collect();

    let existing_on_date = existing_occurrences
        .iter()
        .filter(|t| t.date_naive() == target_date)
        .count();
    let added_on_date = new_occurrences
        .iter()
        .filter(|t| t.date_naive() == target_date)
        .count();
    if existing_on_date + added_on_date > limits.max_per_day {
        return Err(ValidationError::DailyLimitExceeded {
            date: target_date,
            existing: existing_on_date,
            added: added_on_date,
            max_per_day: limits.max_per_day,
        });
    }

    if limits.min_interval_minutes > 0 {
        let min_gap = Duration::minutes(i64::from(limits.min_interval_minutes));
        for new_occ in new_occurrences {
            for old in existing_occurrences
                .iter()
                .filter(|t| t.date_naive() == new_occ.date_naive())
            {
                if (*new_occ - *old).abs() < min_gap {
                    return Err(ValidationError::IntervalTooTight {
                        min_interval_minutes: limits.min_interval_minutes,
                        conflict: *old,
                    });
                }
            }
        }
    }

    Ok(())
}

/// The concrete occurrences an existing record contributes within the
/// horizon. One-time records contribute their anchor; recurring records
/// are re-expanded from now.
fn occurrences_for(
    announcement: &ScheduledAnnouncement,
    now: &DateTime<Local>,
    horizon_days: u32,
) -> Vec<DateTime<Local>> {
    match announcement.recurrence {
        None => vec![announcement.scheduled_time],
        Some(pattern) => recurrence::expand(
            announcement.scheduled_time.time(),
            Some(pattern),
            &announcement.custom_days,
            now,
            horizon_days,
        )
        .unwrap_or_else(|e| {
            warn!(
                "Stored announcement {} no longer expands: {e}",
                announcement.id
            );
            Vec::new()
        }),
    }
}
