//! Alert Threshold Evaluation
//!
//! ## Overview
//!
//! Each sensor group has a table of acceptable inclusive ranges. A reading
//! violates the table when any of its numeric fields lies strictly below
//! the minimum or strictly above the maximum of that field's range.
//!
//! | Group | Field | Range | Display name |
//! |-------|-------|-------|--------------|
//! | fish | `phLevel` | 6.5 – 8.5 | pH Level |
//! | fish | `temperatureLevel` | 20 – 30 °C | Temperature |
//! | fish | `tdsLevel` | 100 – 500 ppm | TDS Level |
//! | fish | `turbidityLevel` | 0 – 25 NTU | Turbidity Level |
//! | fish | `ecLevel` | 0.5 – 3.0 mS/cm | EC Level |
//! | plant | `pressureLevel` | 0.5 – 5.0 kPa | Pressure Level |
//! | plant | `temperatureLevel` | 18 – 28 °C | Temperature |
//! | plant | `humidityLevel` | 50 – 85 % | Humidity Level |
//!
//! [`ThresholdTable::evaluate`] walks the reading's fields in source order
//! and reports the first violation only, which is what the dashboard alert
//! banner shows. [`ThresholdTable::violations`] reports all of them.
//!
//! Tables are fixed-capacity (`heapless::FnvIndexMap`) since the set of
//! monitored fields is small and known up front.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use heapless::FnvIndexMap;

use crate::constants::thresholds::*;
use crate::telemetry::{SensorGroup, TelemetryReading};

/// Maximum number of monitored fields per table (power of two).
pub const MAX_THRESHOLD_FIELDS: usize = 16;

/// Acceptable inclusive range for one field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdRange {
    /// Lowest acceptable value
    pub min: f64,
    /// Highest acceptable value
    pub max: f64,
    /// Name shown in alert messages
    pub name: &'static str,
    /// Unit suffix, empty for dimensionless values
    pub unit: &'static str,
}

impl ThresholdRange {
    /// Range with a display name and unit.
    pub const fn new(min: f64, max: f64, name: &'static str, unit: &'static str) -> Self {
        Self { min, max, name, unit }
    }

    /// Check whether a value lies within `[min, max]`.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Alert text for an out-of-range value.
    pub fn message(&self, value: f64) -> String {
        format!(
            "{} is out of range: {} (should be between {} and {})",
            self.name, value, self.min, self.max
        )
    }
}

/// One field outside its acceptable range.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    /// Offending field
    pub field_name: String,
    /// Observed value
    pub value: f64,
    /// Acceptable minimum
    pub min: f64,
    /// Acceptable maximum
    pub max: f64,
    /// Unit of the value
    pub unit: &'static str,
    /// Human-readable alert text
    pub message: String,
}

impl Violation {
    fn new(field: &str, value: f64, range: &ThresholdRange) -> Self {
        Self {
            field_name: field.to_string(),
            value,
            min: range.min,
            max: range.max,
            unit: range.unit,
            message: range.message(value),
        }
    }
}

/// Outcome of checking a reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertEvaluation {
    /// Whether any field is out of range
    pub violated: bool,
    /// First offending field
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
    /// Alert text for the first offending field
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Alert title, present only when violated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip)]
    group: SensorGroup,
}

impl AlertEvaluation {
    fn clear(group: SensorGroup) -> Self {
        Self { violated: false, field_name: None, message: None, title: None, group }
    }

    fn from_violation(group: SensorGroup, violation: Violation) -> Self {
        Self {
            violated: true,
            field_name: Some(violation.field_name),
            message: Some(violation.message),
            title: Some(alert_title(group).to_string()),
            group,
        }
    }

    /// Alert title for the evaluated group.
    pub fn title(&self) -> &'static str {
        alert_title(self.group)
    }

    /// Group the reading was evaluated against.
    pub fn group(&self) -> SensorGroup {
        self.group
    }
}

fn alert_title(group: SensorGroup) -> &'static str {
    match group {
        SensorGroup::Fish => "Fish Tank Alert!",
        SensorGroup::Plant => "Plant Tray Alert!",
    }
}

/// Acceptable ranges for one sensor group.
#[derive(Debug, Clone)]
pub struct ThresholdTable {
    group: SensorGroup,
    ranges: FnvIndexMap<&'static str, ThresholdRange, MAX_THRESHOLD_FIELDS>,
}

impl ThresholdTable {
    /// Table with no ranges; every reading passes.
    pub fn empty(group: SensorGroup) -> Self {
        Self { group, ranges: FnvIndexMap::new() }
    }

    /// Default water-quality ranges.
    pub fn fish() -> Self {
        Self::empty(SensorGroup::Fish)
            .with_range("phLevel", ThresholdRange::new(FISH_PH_MIN, FISH_PH_MAX, "pH Level", ""))
            .with_range(
                "temperatureLevel",
                ThresholdRange::new(FISH_TEMP_MIN_C, FISH_TEMP_MAX_C, "Temperature", "°C"),
            )
            .with_range("tdsLevel", ThresholdRange::new(FISH_TDS_MIN_PPM, FISH_TDS_MAX_PPM, "TDS Level", "ppm"))
            .with_range(
                "turbidityLevel",
                ThresholdRange::new(FISH_TURBIDITY_MIN_NTU, FISH_TURBIDITY_MAX_NTU, "Turbidity Level", "NTU"),
            )
            .with_range("ecLevel", ThresholdRange::new(FISH_EC_MIN_MS_CM, FISH_EC_MAX_MS_CM, "EC Level", "mS/cm"))
    }

    /// Default growing-environment ranges.
    pub fn plant() -> Self {
        Self::empty(SensorGroup::Plant)
            .with_range(
                "pressureLevel",
                ThresholdRange::new(PLANT_PRESSURE_MIN_KPA, PLANT_PRESSURE_MAX_KPA, "Pressure Level", "kPa"),
            )
            .with_range(
                "temperatureLevel",
                ThresholdRange::new(PLANT_TEMP_MIN_C, PLANT_TEMP_MAX_C, "Temperature", "°C"),
            )
            .with_range(
                "humidityLevel",
                ThresholdRange::new(PLANT_HUMIDITY_MIN_PCT, PLANT_HUMIDITY_MAX_PCT, "Humidity Level", "%"),
            )
    }

    /// Default table for a group.
    pub fn for_group(group: SensorGroup) -> Self {
        match group {
            SensorGroup::Fish => Self::fish(),
            SensorGroup::Plant => Self::plant(),
        }
    }

    /// Add or replace the range of a field.
    ///
    /// A new field beyond [`MAX_THRESHOLD_FIELDS`] is ignored with a warning.
    pub fn with_range(mut self, field: &'static str, range: ThresholdRange) -> Self {
        if self.ranges.insert(field, range).is_err() {
            log_warn!("Threshold table for {} is full, ignoring {}", self.group, field);
        }
        self
    }

    /// Group this table applies to.
    pub fn group(&self) -> SensorGroup {
        self.group
    }

    /// Range of a field, if monitored.
    pub fn get(&self, field: &str) -> Option<&ThresholdRange> {
        self.ranges.get(field)
    }

    /// Monitored fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ThresholdRange)> + '_ {
        self.ranges.iter().map(|(field, range)| (*field, range))
    }

    /// Every violated field, in the reading's field order.
    pub fn violations(&self, reading: &TelemetryReading) -> Vec<Violation> {
        reading
            .numeric_fields()
            .filter_map(|(field, value)| {
                let range = self.get(field)?;
                (!range.contains(value)).then(|| Violation::new(field, value, range))
            })
            .collect()
    }

    /// First violation in the reading's field order.
    pub fn evaluate(&self, reading: &TelemetryReading) -> AlertEvaluation {
        let first = reading.numeric_fields().find_map(|(field, value)| {
            let range = self.get(field)?;
            (!range.contains(value)).then(|| Violation::new(field, value, range))
        });

        match first {
            Some(violation) => AlertEvaluation::from_violation(self.group, violation),
            None => AlertEvaluation::clear(self.group),
        }
    }
}

impl Serialize for ThresholdTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.ranges.len()))?;
        for (field, range) in self.iter() {
            map.serialize_entry(field, range)?;
        }
        map.end()
    }
}

/// Check a reading against the default table of its group.
pub fn evaluate(reading: &TelemetryReading, group: SensorGroup) -> AlertEvaluation {
    ThresholdTable::for_group(group).evaluate(reading)
}

/// Every violation of the default table of a group.
pub fn violations(reading: &TelemetryReading, group: SensorGroup) -> Vec<Violation> {
    ThresholdTable::for_group(group).violations(reading)
}
