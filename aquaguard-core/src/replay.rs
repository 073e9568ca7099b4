//! Live-telemetry replay over the recorded initial datasets.
//!
//! The dashboard polls for a "current" reading. Without live sensors, the
//! recorded fish-initial series is replayed one reading per poll and paired
//! with the plant reading closest to it in time. The cursor wraps around at
//! the end of the series.
//!
//! The cursor is a plain value owned by the caller; nothing here is global.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::constants::REPLAY_START;
use crate::dataset::{closest_to, TelemetrySnapshot};
use crate::telemetry::{DatasetKind, SensorGroup, TelemetryReading};
use crate::time::parse_timestamp;

/// Paired fish and plant readings at one replay step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentTelemetry {
    /// Fish-tank reading at the cursor
    pub fish: TelemetryReading,
    /// Plant-tray reading closest in time, if any plant data exists
    pub plant: Option<TelemetryReading>,
    /// Timestamp of the fish reading
    pub timestamp: Option<String>,
}

/// Position in the fish-initial series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayCursor {
    index: usize,
}

impl ReplayCursor {
    /// Cursor at the first reading at or after the default replay start.
    pub fn new(snapshot: &TelemetrySnapshot) -> Self {
        match parse_timestamp(REPLAY_START) {
            Ok(start) => Self::starting_at(snapshot, start),
            Err(_) => Self::default(),
        }
    }

    /// Cursor at the first fish-initial reading at or after `start`, or at
    /// the beginning when there is none.
    pub fn starting_at(snapshot: &TelemetrySnapshot, start: DateTime<Utc>) -> Self {
        let index = snapshot
            .dataset(SensorGroup::Fish, DatasetKind::Initial)
            .iter()
            .position(|r| r.parsed_timestamp().map_or(false, |at| at >= start))
            .unwrap_or(0);
        Self { index }
    }

    /// Index of the next reading to be served.
    pub fn position(&self) -> usize {
        self.index
    }

    /// Readings at the cursor without moving it.
    pub fn current(&self, snapshot: &TelemetrySnapshot) -> Option<CurrentTelemetry> {
        let fish_series = snapshot.dataset(SensorGroup::Fish, DatasetKind::Initial);
        if fish_series.is_empty() {
            return None;
        }
        let fish = &fish_series[self.index % fish_series.len()];

        let plant_series = snapshot.dataset(SensorGroup::Plant, DatasetKind::Initial);
        let plant = match fish.parsed_timestamp() {
            Ok(at) => closest_to(plant_series, at),
            Err(_) => plant_series.first(),
        };

        Some(CurrentTelemetry {
            fish: fish.clone(),
            plant: plant.cloned(),
            timestamp: fish.timestamp.clone(),
        })
    }

    /// Readings at the cursor, then step forward (wrapping).
    pub fn advance(&mut self, snapshot: &TelemetrySnapshot) -> Option<CurrentTelemetry> {
        let current = self.current(snapshot)?;
        let len = snapshot.dataset(SensorGroup::Fish, DatasetKind::Initial).len();
        self.index = (self.index % len + 1) % len;
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> TelemetrySnapshot {
        let fish = vec![
            TelemetryReading::new("2024-03-06T23:50:00Z").with_value("phLevel", 6.9),
            TelemetryReading::new("2024-03-07T00:00:00Z").with_value("phLevel", 7.0),
            TelemetryReading::new("2024-03-07T00:10:00Z").with_value("phLevel", 7.1),
        ];
        let plant = vec![
            TelemetryReading::new("2024-03-07T00:01:00Z").with_value("humidityLevel", 60.0),
            TelemetryReading::new("2024-03-07T00:12:00Z").with_value("humidityLevel", 62.0),
        ];
        TelemetrySnapshot::default()
            .with_dataset(SensorGroup::Fish, DatasetKind::Initial, fish)
            .with_dataset(SensorGroup::Plant, DatasetKind::Initial, plant)
    }

    #[test]
    fn starts_at_replay_anchor() {
        let snapshot = snapshot();
        let cursor = ReplayCursor::new(&snapshot);
        assert_eq!(cursor.position(), 1);

        let current = cursor.current(&snapshot).unwrap();
        assert_eq!(current.fish.numeric("phLevel"), Some(7.0));
        assert_eq!(current.timestamp.as_deref(), Some("2024-03-07T00:00:00Z"));
        assert_eq!(current.plant.and_then(|p| p.numeric("humidityLevel")), Some(60.0));
    }

    #[test]
    fn advances_and_wraps() {
        let snapshot = snapshot();
        let mut cursor = ReplayCursor::new(&snapshot);

        let seen: Vec<f64> = (0..4)
            .filter_map(|_| cursor.advance(&snapshot))
            .filter_map(|c| c.fish.numeric("phLevel"))
            .collect();
        assert_eq!(seen, [7.0, 7.1, 6.9, 7.0]);
    }

    #[test]
    fn pairs_with_closest_plant_reading() {
        let snapshot = snapshot();
        let mut cursor = ReplayCursor::new(&snapshot);
        cursor.advance(&snapshot);

        let current = cursor.current(&snapshot).unwrap();
        assert_eq!(current.plant.and_then(|p| p.numeric("humidityLevel")), Some(62.0));
    }

    #[test]
    fn empty_snapshot_has_nothing_to_replay() {
        let snapshot = TelemetrySnapshot::default();
        let mut cursor = ReplayCursor::new(&snapshot);
        assert_eq!(cursor.position(), 0);
        assert!(cursor.advance(&snapshot).is_none());
    }

    #[test]
    fn anchor_after_all_data_starts_at_beginning() {
        let snapshot = snapshot();
        let late = parse_timestamp("2030-01-01T00:00:00Z").unwrap();
        assert_eq!(ReplayCursor::starting_at(&snapshot, late).position(), 0);
    }
}
