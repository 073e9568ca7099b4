//! Constants for AquaGuard Core
//!
//! Centralized numeric values used across the telemetry engine. Acceptable
//! sensor ranges, time conversions and dataset conventions live here so the
//! processing modules never carry magic numbers.
//!
//! ## Organization
//!
//! - **Time**: unit conversions and named bucket widths
//! - **Thresholds**: acceptable water-quality and growing-environment ranges
//! - **Dataset**: file naming, default identifiers and replay anchor

/// Time unit conversions and bucket widths.
pub mod time;

/// Acceptable sensor ranges for the fish tank and plant tray.
pub mod thresholds;

/// Dataset file conventions and defaults.
pub mod dataset;

pub use dataset::{DEFAULT_SYSTEM_ID, REPLAY_START};
pub use time::{MS_PER_DAY, MS_PER_HOUR, MS_PER_MINUTE, MS_PER_SECOND};
