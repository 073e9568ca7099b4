//! Core telemetry engine for AquaGuard
//!
//! Turns raw aquaponics sensor readings (fish tank and plant tray) into
//! chart-ready series, alert decisions and merged model forecasts.
//!
//! Everything in this crate is synchronous and side-effect free apart from
//! dataset loading and optional diagnostic logging:
//! - [`aggregation`] groups readings into time buckets and averages them
//! - [`thresholds`] checks a reading against per-group acceptable ranges
//! - [`ensemble`] merges two model predictions by confidence
//! - [`accuracy`] scores predictions against observed data (MAPE)
//! - [`dataset`] loads immutable CSV snapshots
//!
//! ```no_run
//! use aquaguard_core::{aggregate, Granularity, TelemetryReading};
//!
//! let readings = vec![
//!     TelemetryReading::new("2024-03-07T00:02:00Z").with_value("phLevel", 7.0),
//!     TelemetryReading::new("2024-03-07T00:07:00Z").with_value("phLevel", 7.2),
//! ];
//!
//! let points = aggregate(&readings, Granularity::Hour);
//! assert_eq!(points.len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

// Macros for optional logging
#[cfg(feature = "log")]
macro_rules! log_warn {
    ($($arg:tt)*) => { log::warn!($($arg)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! log_warn {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "log")]
macro_rules! log_debug {
    ($($arg:tt)*) => { log::debug!($($arg)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! log_debug {
    ($($arg:tt)*) => {};
}

pub mod accuracy;
pub mod aggregation;
pub mod constants;
pub mod dataset;
pub mod ensemble;
pub mod errors;
pub mod replay;
pub mod synthetic;
pub mod telemetry;
pub mod thresholds;
pub mod time;

// Public API
pub use accuracy::{percentage_accuracy, AccuracyReport};
pub use aggregation::{aggregate, aggregate_with_stats, AggregatedPoint, AggregationStats, Resampled};
pub use dataset::{DatasetLoader, TelemetrySnapshot};
pub use ensemble::{combine, model_weights, ConfidenceScore, EnsemblePrediction, ModelPrediction};
pub use errors::{DatasetError, EnsembleError, TelemetryError, TelemetryResult};
pub use replay::{CurrentTelemetry, ReplayCursor};
pub use synthetic::{SinusoidalSource, SyntheticSource};
pub use telemetry::{DatasetKind, SensorGroup, TelemetryReading};
pub use thresholds::{evaluate, AlertEvaluation, ThresholdRange, ThresholdTable, Violation};
pub use time::{parse_timestamp, Granularity};

/// Crate version, reported by the server health endpoint
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
