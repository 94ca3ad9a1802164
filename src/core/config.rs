//! # Scheduler Limits Configuration
//!
//! Load limits enforced by the validation gate before any backend or
//! store mutation. Loadable from environment variables with sane
//! defaults; malformed values are logged and ignored.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false

use log::warn;
use serde::{Deserialize, Serialize};

/// Default maximum announcements per calendar date.
pub const DEFAULT_MAX_PER_DAY: usize = 16;

/// Default maximum simultaneously active announcements.
pub const DEFAULT_MAX_TOTAL: usize = 64;

/// Default minimum spacing between same-date occurrences, in minutes.
/// 0 disables the spacing check.
pub const DEFAULT_MIN_INTERVAL_MINUTES: u32 = 0;

/// Default scheduling horizon in days. Bounded by the notification
/// backend's own scheduling window, so recurring announcements are only
/// pre-scheduled this far ahead.
pub const DEFAULT_HORIZON_DAYS: u32 = 14;

/// Load limits for the scheduling core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerLimits {
    /// Maximum occurrences allowed on one calendar date.
    pub max_per_day: usize,
    /// Maximum simultaneously active announcements.
    pub max_total: usize,
    /// Minimum spacing between occurrences on the same date (0 = off).
    pub min_interval_minutes: u32,
    /// How many days ahead recurring occurrences are pre-scheduled.
    pub max_horizon_days: u32,
}

impl Default for SchedulerLimits {
    fn default() -> Self {
        SchedulerLimits {
            max_per_day: DEFAULT_MAX_PER_DAY,
            max_total: DEFAULT_MAX_TOTAL,
            min_interval_minutes: DEFAULT_MIN_INTERVAL_MINUTES,
            max_horizon_days: DEFAULT_HORIZON_DAYS,
        }
    }
}

impl SchedulerLimits {
    /// Read limits from `HERALD_*` environment variables.
    ///
    /// Unset variables fall back to the defaults; values that fail to
    /// parse are logged and ignored.
    pub fn from_env() -> Self {
        SchedulerLimits {
            max_per_day: env_parse("HERALD_MAX_PER_DAY", DEFAULT_MAX_PER_DAY),
            max_total: env_parse("HERALD_MAX_TOTAL", DEFAULT_MAX_TOTAL),
            min_interval_minutes: env_parse(
                "HERALD_MIN_INTERVAL_MINUTES",
                DEFAULT_MIN_INTERVAL_MINUTES,
            ),
            max_horizon_days: env_parse("HERALD_MAX_HORIZON_DAYS", DEFAULT_HORIZON_DAYS),
        }
    }
}

/// Parse an environment variable, falling back to `default` when the
/// variable is unset or malformed.
fn env_parse<T>(name: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!("Ignoring invalid {name}={raw}, using default {default}");
                default
            }
        },
        Err(_) => default,
    }
}
