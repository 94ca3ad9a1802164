//! # Feature: Recurrence Calculator
//!
//! Expands a time-of-day plus an optional recurrence pattern into the
//! concrete future timestamps inside a bounded horizon. All arithmetic
//! is wall-clock aware: candidates are built as naive local date-times
//! and resolved through the timezone, so the literal hour:minute is
//! preserved across daylight-saving transitions. An ambiguous local time
//! (fall-back) resolves to the earlier instant; a local time erased by a
//! spring-forward gap is skipped for that day.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false

use chrono::{DateTime, Datelike, Days, NaiveTime, TimeZone};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::core::ValidationError;

/// Recurrence pattern for an announcement. Days use ISO numbering:
/// 1 = Monday .. 7 = Sunday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurrencePattern {
    /// Every day.
    Daily,
    /// Monday through Friday.
    Weekdays,
    /// Saturday and Sunday.
    Weekends,
    /// A caller-supplied day set.
    Custom,
}

impl std::fmt::Display for RecurrencePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecurrencePattern::Daily => write!(f, "daily"),
            RecurrencePattern::Weekdays => write!(f, "weekdays"),
            RecurrencePattern::Weekends => write!(f, "weekends"),
            RecurrencePattern::Custom => write!(f, "custom"),
        }
    }
}

impl std::str::FromStr for RecurrencePattern {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(RecurrencePattern::Daily),
            "weekdays" => Ok(RecurrencePattern::Weekdays),
            "weekends" => Ok(RecurrencePattern::Weekends),
            "custom" => Ok(RecurrencePattern::Custom),
            _ => Err(anyhow::anyhow!("Invalid recurrence pattern: {s}")),
        }
    }
}

/// Check that a custom day set is non-empty and within 1..=7.
pub fn validate_custom_days(days: &[u8]) -> Result<(), ValidationError> {
    if days.is_empty() {
        return Err(ValidationError::InvalidCustomDays {
            reason: "no days selected".to_string(),
        });
    }
    if let Some(bad) = days.iter().find(|d| !(1..=7).contains(*d)) {
        return Err(ValidationError::InvalidCustomDays {
            reason: format!("day {bad} is outside 1-7 (Monday-Sunday)"),
        });
    }
    Ok(())
}

/// Resolve a pattern to the ISO weekday set it matches.
pub fn effective_day_set(
    pattern: RecurrencePattern,
    custom_days: &[u8],
) -> Result<BTreeSet<u8>, ValidationError> {
    match pattern {
        RecurrencePattern::Daily => Ok((1..=7).collect()),
        RecurrencePattern::Weekdays => Ok((1..=5).collect()),
        RecurrencePattern::Weekends => Ok([6, 7].into_iter().collect()),
        RecurrencePattern::Custom => {
            validate_custom_days(custom_days)?;
            Ok(custom_days.iter().copied().collect())
        }
    }
}

/// Expand a time-of-day into concrete future occurrences.
///
/// With no pattern this is the one-time roll-forward: today at
/// `time_of_day`, or the next day on which that local time exists if it
/// already passed. With a pattern, every day-offset in `0..horizon_days`
/// whose weekday is in the effective day set contributes one occurrence;
/// a day-0 candidate that is not strictly in the future is skipped.
///
/// Occurrences come back ordered ascending, which is also the order the
/// ID allocator assigns entry IDs in.
pub fn expand<Tz: TimeZone>(
    time_of_day: NaiveTime,
    pattern: Option<RecurrencePattern>,
    custom_days: &[u8],
    now: &DateTime<Tz>,
    horizon_days: u32,
) -> Result<Vec<DateTime<Tz>>, ValidationError> {
    let tz = now.timezone();
    let today = now.date_naive();

    let Some(pattern) = pattern else {
        // One-time: today, else the next day the local time exists on.
        for offset in 0..=2u64 {
            let Some(date) = today.checked_add_days(Days::new(offset)) else {
                continue;
            };
            if let Some(candidate) = tz.from_local_datetime(&date.and_time(time_of_day)).earliest()
            {
                if candidate > *now {
                    return Ok(vec![candidate]);
                }
            }
        }
        return Ok(Vec::new());
    };

    let day_set = effective_day_set(pattern, custom_days)?;
    let mut occurrences = Vec::new();
    for offset in 0..u64::from(horizon_days) {
        let Some(date) = today.checked_add_days(Days::new(offset)) else {
            break;
        };
        if !day_set.contains(&(date.weekday().number_from_monday() as u8)) {
            continue;
        }
        let Some(candidate) = tz.from_local_datetime(&date.and_time(time_of_day)).earliest() else {
            debug!("Skipping {date}: {time_of_day} does not exist locally");
            continue;
        };
        if offset == 0 && candidate <= *now {
            continue;
        }
        occurrences.push(candidate);
    }
    Ok(occurrences)
}
