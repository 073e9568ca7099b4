//! Acceptable Sensor Ranges
//!
//! Inclusive `[min, max]` bounds used by the alert evaluator. Values on the
//! boundary are acceptable.

// ===== FISH TANK (WATER QUALITY) =====

/// pH lower bound.
pub const FISH_PH_MIN: f64 = 6.5;
/// pH upper bound.
pub const FISH_PH_MAX: f64 = 8.5;

/// Water temperature lower bound (°C).
pub const FISH_TEMP_MIN_C: f64 = 20.0;
/// Water temperature upper bound (°C).
pub const FISH_TEMP_MAX_C: f64 = 30.0;

/// Total dissolved solids lower bound (ppm).
pub const FISH_TDS_MIN_PPM: f64 = 100.0;
/// Total dissolved solids upper bound (ppm).
pub const FISH_TDS_MAX_PPM: f64 = 500.0;

/// Turbidity lower bound (NTU).
pub const FISH_TURBIDITY_MIN_NTU: f64 = 0.0;
/// Turbidity upper bound (NTU).
pub const FISH_TURBIDITY_MAX_NTU: f64 = 25.0;

/// Electrical conductivity lower bound (mS/cm).
pub const FISH_EC_MIN_MS_CM: f64 = 0.5;
/// Electrical conductivity upper bound (mS/cm).
pub const FISH_EC_MAX_MS_CM: f64 = 3.0;

// ===== PLANT TRAY (GROWING ENVIRONMENT) =====

/// Root-zone pressure lower bound (kPa).
pub const PLANT_PRESSURE_MIN_KPA: f64 = 0.5;
/// Root-zone pressure upper bound (kPa).
pub const PLANT_PRESSURE_MAX_KPA: f64 = 5.0;

/// Air temperature lower bound (°C).
pub const PLANT_TEMP_MIN_C: f64 = 18.0;
/// Air temperature upper bound (°C).
pub const PLANT_TEMP_MAX_C: f64 = 28.0;

/// Relative humidity lower bound (%).
pub const PLANT_HUMIDITY_MIN_PCT: f64 = 50.0;
/// Relative humidity upper bound (%).
pub const PLANT_HUMIDITY_MAX_PCT: f64 = 85.0;
