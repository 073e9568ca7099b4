//! Common test utilities for integration tests
//!
//! - Reading builders anchored at the replay start
//! - Dataset directory fixtures written to temp dirs

#![allow(dead_code)]

use std::fs;
use std::path::Path;

use aquaguard_core::TelemetryReading;
use chrono::{Duration, TimeZone, Utc};

/// Fish reading `minutes` after 2024-03-07T00:00:00Z.
pub fn fish_at(minutes: i64, ph: f64) -> TelemetryReading {
    let base = Utc.with_ymd_and_hms(2024, 3, 7, 0, 0, 0).unwrap();
    let at = base + Duration::minutes(minutes);
    TelemetryReading::new(at.to_rfc3339())
        .with_value("phLevel", ph)
        .with_value("temperatureLevel", 24.0)
}

/// Write a CSV dataset file into `dir`.
pub fn write_dataset(dir: &Path, name: &str, lines: &[&str]) {
    let mut body = lines.join("\n");
    body.push('\n');
    fs::write(dir.join(name), body).unwrap();
}

/// Header used by the recorded fish datasets.
pub const FISH_HEADER: &str =
    "Timestamp,pH Level (pH),Temperature Level (°C),TDS Level (ppm),Turbidity Level (NTU),EC Level (mS/cm)";

/// Header used by the recorded plant datasets.
pub const PLANT_HEADER: &str = "Timestamp,Pressure Level (kPa),Temperature Level (°C),Humidity Level (%)";
