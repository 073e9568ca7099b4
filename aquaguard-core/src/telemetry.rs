//! Telemetry Readings
//!
//! A [`TelemetryReading`] is one timestamped row of sensor values from either
//! the fish tank or the plant tray. Readings are schema-light: apart from
//! `timestamp` and `systemId`, every key is a sensor field whose name comes
//! from the dataset header or the posted JSON.
//!
//! Field order is preserved (`serde_json` is built with `preserve_order`).
//! Threshold evaluation walks fields in that order, so the first violation it
//! reports is deterministic for a given source.

use core::fmt;
use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::constants::DEFAULT_SYSTEM_ID;
use crate::errors::{TelemetryError, TelemetryResult};
use crate::time::parse_timestamp;

/// Keys that are never treated as sensor fields.
pub const RESERVED_FIELDS: [&str; 2] = ["timestamp", "systemId"];

/// One sensor reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryReading {
    /// Raw timestamp as received; integers are stored as their decimal text
    #[serde(
        default,
        deserialize_with = "deserialize_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<String>,

    /// Identifier of the aquaponics system that produced the reading
    #[serde(rename = "systemId", default = "default_system_id")]
    pub system_id: String,

    /// Sensor fields in source order
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

fn default_system_id() -> String {
    DEFAULT_SYSTEM_ID.into()
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(ms) => Some(ms.to_string()),
            None => n.as_f64().map(|ms| (ms.trunc() as i64).to_string()),
        },
        // Kept verbatim so it is reported as malformed later
        Some(other) => Some(other.to_string()),
    })
}

impl TelemetryReading {
    /// Reading with the given timestamp and the default system id.
    pub fn new(timestamp: impl Into<String>) -> Self {
        Self {
            timestamp: Some(timestamp.into()),
            system_id: default_system_id(),
            fields: Map::new(),
        }
    }

    /// Reading without a timestamp.
    pub fn untimed() -> Self {
        Self {
            timestamp: None,
            system_id: default_system_id(),
            fields: Map::new(),
        }
    }

    /// Set the system id.
    pub fn with_system_id(mut self, system_id: impl Into<String>) -> Self {
        self.system_id = system_id.into();
        self
    }

    /// Append a numeric field.
    pub fn with_value(self, field: impl Into<String>, value: f64) -> Self {
        self.with_field(field, Value::from(value))
    }

    /// Append an arbitrary field. Reserved keys are ignored.
    pub fn with_field(mut self, field: impl Into<String>, value: Value) -> Self {
        let field = field.into();
        if !RESERVED_FIELDS.contains(&field.as_str()) {
            self.fields.insert(field, value);
        }
        self
    }

    /// Parsed timestamp.
    pub fn parsed_timestamp(&self) -> TelemetryResult<DateTime<Utc>> {
        match &self.timestamp {
            Some(raw) => parse_timestamp(raw),
            None => Err(TelemetryError::MissingTimestamp),
        }
    }

    /// Finite numeric value of a field.
    pub fn numeric(&self, field: &str) -> Option<f64> {
        self.fields.get(field).and_then(as_finite)
    }

    /// Finite numeric fields in source order.
    pub fn numeric_fields(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.fields
            .iter()
            .filter_map(|(name, value)| as_finite(value).map(|v| (name.as_str(), v)))
    }
}

fn as_finite(value: &Value) -> Option<f64> {
    value.as_f64().filter(|v| v.is_finite())
}

/// Sensor group a reading belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorGroup {
    /// Fish tank water quality
    Fish,
    /// Plant tray growing environment
    Plant,
}

impl SensorGroup {
    /// Both groups, fish first.
    pub const ALL: [SensorGroup; 2] = [SensorGroup::Fish, SensorGroup::Plant];

    /// Lowercase name used in routes and file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorGroup::Fish => "fish",
            SensorGroup::Plant => "plant",
        }
    }

    /// Human-facing name of the monitored unit.
    pub fn display_name(&self) -> &'static str {
        match self {
            SensorGroup::Fish => "Fish Tank",
            SensorGroup::Plant => "Plant Tray",
        }
    }
}

impl FromStr for SensorGroup {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fish" => Ok(SensorGroup::Fish),
            "plant" => Ok(SensorGroup::Plant),
            _ => Err(TelemetryError::UnknownGroup(s.into())),
        }
    }
}

impl fmt::Display for SensorGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which recorded dataset to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    /// Training / live-replay data
    Initial,
    /// Held-out data used for accuracy scoring
    Validate,
}

impl DatasetKind {
    /// Lowercase name used in file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetKind::Initial => "initial",
            DatasetKind::Validate => "validate",
        }
    }

    /// `isValidation` query flag to dataset.
    pub fn from_validation_flag(is_validation: bool) -> Self {
        if is_validation {
            DatasetKind::Validate
        } else {
            DatasetKind::Initial
        }
    }
}

impl FromStr for DatasetKind {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "initial" => Ok(DatasetKind::Initial),
            "validate" | "validation" => Ok(DatasetKind::Validate),
            _ => Err(TelemetryError::UnknownDataset(s.into())),
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
