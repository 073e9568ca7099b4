//! Time-Related Constants
//!
//! Conversion factors and the fixed bucket widths accepted as granularity
//! names (`1min`, `5min`, `10min`, `30min`).

// ===== TIME UNIT CONVERSIONS =====

/// Milliseconds per second.
pub const MS_PER_SECOND: i64 = 1000;

/// Milliseconds per minute.
pub const MS_PER_MINUTE: i64 = 60 * MS_PER_SECOND;

/// Milliseconds per hour.
pub const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;

/// Milliseconds per day.
pub const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;

// ===== NAMED INTERVALS =====

/// `1min` bucket width (milliseconds).
pub const ONE_MINUTE_MS: u64 = MS_PER_MINUTE as u64;

/// `5min` bucket width (milliseconds).
pub const FIVE_MINUTES_MS: u64 = 5 * ONE_MINUTE_MS;

/// `10min` bucket width (milliseconds).
///
/// Also the native cadence of the recorded datasets, so it is the step used
/// for synthetic series when no granularity is requested.
pub const TEN_MINUTES_MS: u64 = 10 * ONE_MINUTE_MS;

/// `30min` bucket width (milliseconds).
pub const THIRTY_MINUTES_MS: u64 = 30 * ONE_MINUTE_MS;

// ===== SYNTHETIC SERIES STEPS =====

/// Point spacing for synthetic series at `day` granularity.
pub const SYNTHETIC_DAY_STEP_MS: u64 = 6 * MS_PER_HOUR as u64;

/// Point spacing for synthetic series at `week` granularity.
pub const SYNTHETIC_WEEK_STEP_MS: u64 = MS_PER_DAY as u64;

/// Point spacing for synthetic series at `month` granularity.
pub const SYNTHETIC_MONTH_STEP_MS: u64 = 3 * MS_PER_DAY as u64;

/// Upper bound on points generated for a single synthetic series.
pub const SYNTHETIC_MAX_POINTS: usize = 10_000;
