//! # Core Module
//!
//! Configuration and error types shared by every layer of the
//! scheduling core.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false

pub mod config;
pub mod error;

// Re-export commonly used items
pub use config::{SchedulerLimits, DEFAULT_HORIZON_DAYS};
pub use error::{HeraldError, Result, ValidationError};
