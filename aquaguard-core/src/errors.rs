//! Error Types for Telemetry Processing
//!
//! ## Design Philosophy
//!
//! Most failures in the telemetry path are *not* fatal. A reading with a
//! broken timestamp is dropped and logged, an unknown granularity falls back
//! to hourly buckets, and an empty range produces an empty series. Errors are
//! reserved for situations the caller has to act on:
//!
//! 1. **Reading-level problems** (`TelemetryError`): surfaced by parsing
//!    helpers so callers can decide whether to drop or reject.
//! 2. **Ensemble failures** (`EnsembleError`): neither model produced a
//!    prediction. The caller picks a fallback (cached or synthetic data).
//! 3. **Dataset loading** (`DatasetError`): the snapshot could not be built.
//!
//! ## Error Handling Strategy
//!
//! ```rust
//! use aquaguard_core::{combine, EnsembleError};
//!
//! match combine(None, None) {
//!     Ok(prediction) => {
//!         // Use merged forecast
//!         let _ = prediction;
//!     }
//!     Err(EnsembleError::NoPredictionsAvailable) => {
//!         // Both models failed - serve synthetic or cached data instead
//!     }
//! }
//! ```

use thiserror_no_std::Error;

/// Result type for reading-level operations
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Problems with an individual reading or query parameter
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TelemetryError {
    /// Reading carries no timestamp at all
    #[error("Reading has no timestamp")]
    MissingTimestamp,

    /// Timestamp present but not parseable
    #[error("Malformed timestamp: {0}")]
    MalformedTimestamp(String),

    /// Timestamp parsed but falls outside the representable calendar range
    #[error("Timestamp out of range: {0}")]
    TimestampOutOfRange(String),

    /// Granularity name not recognized
    #[error("Unknown granularity: {0}")]
    UnknownGranularity(String),

    /// Sensor group name not recognized
    #[error("Unknown sensor group: {0}")]
    UnknownGroup(String),

    /// Dataset name not recognized
    #[error("Unknown dataset: {0}")]
    UnknownDataset(String),
}

/// Ensemble combination failures
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsembleError {
    /// Neither model produced a prediction
    #[error("No model predictions available")]
    NoPredictionsAvailable,
}

/// Dataset loading failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DatasetError {
    /// File could not be opened or read
    #[error("Failed to read {path}: {reason}")]
    Io {
        /// Path of the offending file
        path: String,
        /// Underlying I/O error message
        reason: String,
    },

    /// CSV structure could not be interpreted
    #[error("CSV format error in {source_name} line {line}: {reason}")]
    Format {
        /// File or stream name
        source_name: String,
        /// 1-based line number
        line: usize,
        /// What went wrong
        reason: &'static str,
    },

    /// None of the expected dataset files contained any readings
    #[error("No telemetry data could be loaded from {0}")]
    NoData(String),
}
