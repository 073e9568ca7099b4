//! Synthetic Telemetry
//!
//! ## Overview
//!
//! Demo deployments and model outages still need something to draw. All
//! made-up data comes from a [`SyntheticSource`] so the rest of the system
//! never mixes fabricated values into recorded ones by accident.
//!
//! [`SinusoidalSource`] is deterministic: values are a pure function of the
//! timestamp, so the same range always yields the same series.
//!
//! ```text
//! phLevel          = 7.0  + 0.4 × sin(t / day)
//! temperatureLevel = 24.0 + 2.0 × sin(t / day)
//! tdsLevel         = 350  + 50  × sin(t / day)
//! turbidityLevel   = 10   + 5   × cos(t / day)
//! ...
//! ```

use chrono::{DateTime, Utc};

use crate::constants::time::{SYNTHETIC_MAX_POINTS, TEN_MINUTES_MS};
use crate::constants::{DEFAULT_SYSTEM_ID, MS_PER_DAY, MS_PER_HOUR};
use crate::ensemble::ModelPrediction;
use crate::telemetry::{SensorGroup, TelemetryReading};
use crate::time::{from_epoch_ms, Granularity};

/// Source of fabricated telemetry and fallback forecasts.
pub trait SyntheticSource {
    /// Series covering `[start, end]`, spaced by the granularity's synthetic
    /// step (ten minutes when `None`).
    fn series(
        &self,
        group: SensorGroup,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        granularity: Option<Granularity>,
    ) -> Vec<TelemetryReading>;

    /// Forecast to serve when a model is unavailable.
    fn prediction(&self, group: SensorGroup, model: &str) -> ModelPrediction;
}

/// Deterministic sine/cosine waveforms around typical operating values.
#[derive(Debug, Clone)]
pub struct SinusoidalSource {
    system_id: String,
    max_points: usize,
}

impl Default for SinusoidalSource {
    fn default() -> Self {
        Self {
            system_id: DEFAULT_SYSTEM_ID.to_string(),
            max_points: SYNTHETIC_MAX_POINTS,
        }
    }
}

impl SinusoidalSource {
    /// Source with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the system id stamped on generated readings.
    pub fn with_system_id(mut self, system_id: impl Into<String>) -> Self {
        self.system_id = system_id.into();
        self
    }

    /// Cap the number of points per series.
    pub fn with_max_points(mut self, max_points: usize) -> Self {
        self.max_points = max_points;
        self
    }

    /// Single reading at `at`.
    pub fn reading_at(&self, group: SensorGroup, at: DateTime<Utc>) -> TelemetryReading {
        let ms = at.timestamp_millis() as f64;
        let daily = ms / MS_PER_DAY as f64;
        let half_daily = ms / (12 * MS_PER_HOUR) as f64;
        let (sin, cos) = (daily.sin(), daily.cos());

        let reading = TelemetryReading::new(at.to_rfc3339()).with_system_id(self.system_id.clone());
        match group {
            SensorGroup::Fish => reading
                .with_value("phLevel", 7.0 + sin * 0.4)
                .with_value("temperatureLevel", 24.0 + sin * 2.0)
                .with_value("tdsLevel", 350.0 + sin * 50.0)
                .with_value("turbidityLevel", 10.0 + cos * 5.0)
                .with_value("ecLevel", 1.5 + sin * 0.3)
                .with_value("dissolvedOxygen", 6.5 + cos * 0.5)
                .with_value("ammonia", 0.1 + sin.abs() * 0.05)
                .with_value("nitrate", 20.0 + cos * 10.0),
            SensorGroup::Plant => reading
                .with_value("moistureLevel", 65.0 + sin * 10.0)
                .with_value("nutrientLevel", 75.0 + cos * 8.0)
                .with_value("lightLevel", 70.0 + half_daily.sin() * 15.0)
                .with_value("temperatureLevel", 22.0 + sin * 3.0)
                .with_value("humidityLevel", 65.0 + cos * 10.0)
                .with_value("pressureLevel", 2.5 + sin * 1.0),
        }
    }
}

impl SyntheticSource for SinusoidalSource {
    fn series(
        &self,
        group: SensorGroup,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        granularity: Option<Granularity>,
    ) -> Vec<TelemetryReading> {
        let step = granularity.map_or(TEN_MINUTES_MS, |g| g.synthetic_step_ms());
        let step = i64::try_from(step).unwrap_or(i64::MAX);
        let (first, last) = (start.timestamp_millis(), end.timestamp_millis());

        let mut readings = Vec::new();
        let mut ms = first;
        while ms <= last && readings.len() < self.max_points {
            if let Ok(at) = from_epoch_ms(ms) {
                readings.push(self.reading_at(group, at));
            }
            ms = match ms.checked_add(step) {
                Some(next) => next,
                None => break,
            };
        }

        if ms <= last {
            log_warn!("Synthetic {} series truncated at {} points", group, self.max_points);
        }
        readings
    }

    fn prediction(&self, group: SensorGroup, model: &str) -> ModelPrediction {
        let deepseek = model.to_ascii_lowercase().contains("deepseek");
        let pick = |a: f64, b: f64| if deepseek { b } else { a };

        let prediction = ModelPrediction::new(pick(0.82, 0.89)).with_explanation(format!(
            "Synthetic {} forecast: no live model response was available.",
            group.display_name().to_lowercase()
        ));

        match group {
            SensorGroup::Fish => prediction
                .with_value("phLevel", pick(6.9, 7.1))
                .with_value("temperatureLevel", pick(24.1, 23.8))
                .with_value("tdsLevel", pick(435.0, 428.0))
                .with_value("turbidityLevel", pick(11.8, 12.0))
                .with_value("ecLevel", pick(0.96, 0.945)),
            SensorGroup::Plant => prediction
                .with_value("pressureLevel", pick(2.6, 2.5))
                .with_value("temperatureLevel", pick(23.4, 23.1))
                .with_value("humidityLevel", pick(68.0, 67.2)),
        }
    }
}
