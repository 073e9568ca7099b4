//! Prediction Workflow
//!
//! ## Overview
//!
//! A prediction request names the models to use and optionally supplies
//! recorded series. For each sensor group:
//!
//! ```text
//! latest initial reading ──► model(s) ──► forecast ──► accuracy vs validation
//!                               │
//!                               └─ all failed ──► synthetic fallback
//! ```
//!
//! Series missing from the request are taken from the loaded snapshot. A
//! group with no reading anywhere is skipped. The forecast is a single value
//! per field 24 hours ahead, so accuracy treats it as constant over the
//! validation series.

use std::collections::BTreeMap;

use aquaguard_connectors::models::{DEEPSEEK_R1, O1_MINI};
use aquaguard_connectors::{EnsembleRunner, ModelConnector};
use aquaguard_core::dataset::{numeric_columns, sort_by_timestamp};
use aquaguard_core::{
    combine, AccuracyReport, DatasetKind, SensorGroup, SinusoidalSource, SyntheticSource,
    TelemetryReading, TelemetrySnapshot,
};
use chrono::Utc;
use serde::Deserialize;

use crate::error::ApiError;
use crate::history::{AnalysisRecord, GroupAnalysis, ModelType};

/// Readings per sensor group
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroupSeries {
    /// Fish tank readings
    #[serde(default)]
    pub fish: Vec<TelemetryReading>,
    /// Plant tray readings
    #[serde(default)]
    pub plant: Vec<TelemetryReading>,
}

impl GroupSeries {
    /// Readings for one group
    pub fn get(&self, group: SensorGroup) -> &[TelemetryReading] {
        match group {
            SensorGroup::Fish => &self.fish,
            SensorGroup::Plant => &self.plant,
        }
    }
}

/// Body of `POST /api/ai/predict`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictRequest {
    /// Series the forecast starts from
    #[serde(default)]
    pub initial_data: GroupSeries,
    /// Series the forecast is scored against
    #[serde(default)]
    pub validation_data: GroupSeries,
    /// Models to query
    #[serde(default)]
    pub model_type: ModelType,
}

/// Runs prediction requests against the configured models.
pub struct Analyzer<'a> {
    runner: &'a EnsembleRunner,
    synthetic: &'a SinusoidalSource,
    snapshot: &'a TelemetrySnapshot,
}

impl<'a> Analyzer<'a> {
    /// Analyzer over a runner, fallback source and recorded data
    pub fn new(runner: &'a EnsembleRunner, synthetic: &'a SinusoidalSource, snapshot: &'a TelemetrySnapshot) -> Self {
        Self { runner, synthetic, snapshot }
    }

    /// Forecast both groups and assemble the record.
    pub async fn analyze(&self, request: &PredictRequest) -> Result<AnalysisRecord, ApiError> {
        let fish = self.analyze_group(SensorGroup::Fish, request).await;
        let plant = self.analyze_group(SensorGroup::Plant, request).await;

        if fish.is_none() && plant.is_none() {
            return Err(ApiError::BadRequest("No telemetry available for prediction".into()));
        }

        let groups: Vec<&GroupAnalysis> = fish.iter().chain(plant.iter()).collect();

        let accuracies: Vec<f64> = groups
            .iter()
            .filter_map(|g| g.accuracy.as_ref().map(|a| a.overall))
            .collect();
        let overall_accuracy =
            (!accuracies.is_empty()).then(|| accuracies.iter().sum::<f64>() / accuracies.len() as f64);

        let confidences: Vec<f64> = groups
            .iter()
            .flat_map(|g| g.models.values())
            .map(|p| p.confidence().as_float())
            .collect();
        let confidence_score = if confidences.is_empty() {
            0.0
        } else {
            confidences.iter().sum::<f64>() / confidences.len() as f64
        };

        let fallback = groups.iter().any(|g| g.fallback);

        Ok(AnalysisRecord {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            model_type: request.model_type,
            model_used: request.model_type.display_name().to_string(),
            fish,
            plant,
            overall_accuracy,
            confidence_score,
            fallback,
        })
    }

    async fn analyze_group(&self, group: SensorGroup, request: &PredictRequest) -> Option<GroupAnalysis> {
        let reading = self.input_reading(group, request)?;

        let mut analysis = match request.model_type {
            ModelType::Ensemble => self.ensemble(group, &reading).await,
            ModelType::DeepseekR1 => self.single(DEEPSEEK_R1, group, &reading).await,
            ModelType::O1Mini => self.single(O1_MINI, group, &reading).await,
        };
        analysis.input_timestamp = reading.timestamp.clone();

        let validation = match request.validation_data.get(group) {
            [] => self.snapshot.dataset(group, DatasetKind::Validate),
            supplied => supplied,
        };
        if !validation.is_empty() && !analysis.predicted.is_empty() {
            let actual = numeric_columns(validation);
            analysis.accuracy = Some(AccuracyReport::against_constant(&actual, &analysis.predicted));
        }

        Some(analysis)
    }

    fn input_reading(&self, group: SensorGroup, request: &PredictRequest) -> Option<TelemetryReading> {
        let supplied = request.initial_data.get(group);
        if supplied.is_empty() {
            return self.snapshot.latest(group).cloned();
        }

        let mut sorted = supplied.to_vec();
        sort_by_timestamp(&mut sorted);
        sorted
            .iter()
            .rev()
            .find(|r| r.parsed_timestamp().is_ok())
            .or_else(|| sorted.last())
            .cloned()
    }

    async fn ensemble(&self, group: SensorGroup, reading: &TelemetryReading) -> GroupAnalysis {
        let outcome = self.runner.run(group, reading).await;
        let [first, second] = self.runner.models();

        let mut models = BTreeMap::new();
        if let Some(p) = &outcome.first {
            models.insert(first.model_id().to_string(), p.clone());
        }
        if let Some(p) = &outcome.second {
            models.insert(second.model_id().to_string(), p.clone());
        }

        match outcome.ensemble {
            Ok(merged) => GroupAnalysis {
                models,
                predicted: merged.predicted,
                weights: Some(merged.weights),
                ..Default::default()
            },
            Err(e) => {
                log::warn!("{} ensemble unavailable ({}), using synthetic forecast", group, e);
                self.synthetic_ensemble(group, first.model_id(), second.model_id())
            }
        }
    }

    async fn single(&self, model_id: &str, group: SensorGroup, reading: &TelemetryReading) -> GroupAnalysis {
        match self.runner.run_single(model_id, group, reading).await {
            Ok(prediction) => GroupAnalysis {
                predicted: prediction.predicted.clone(),
                models: BTreeMap::from([(model_id.to_string(), prediction)]),
                ..Default::default()
            },
            Err(e) => {
                log::warn!("{} forecast from {} failed ({}), using synthetic forecast", group, model_id, e);
                let prediction = self.synthetic.prediction(group, model_id);
                GroupAnalysis {
                    predicted: prediction.predicted.clone(),
                    models: BTreeMap::from([(model_id.to_string(), prediction)]),
                    fallback: true,
                    ..Default::default()
                }
            }
        }
    }

    fn synthetic_ensemble(&self, group: SensorGroup, first_id: &str, second_id: &str) -> GroupAnalysis {
        let first = self.synthetic.prediction(group, first_id);
        let second = self.synthetic.prediction(group, second_id);

        let mut analysis = GroupAnalysis { fallback: true, ..Default::default() };
        if let Ok(merged) = combine(Some(&first), Some(&second)) {
            analysis.predicted = merged.predicted;
            analysis.weights = Some(merged.weights);
        }
        analysis.models.insert(first_id.to_string(), first);
        analysis.models.insert(second_id.to_string(), second);
        analysis
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aquaguard_connectors::{SyntheticModel, UnconfiguredModel};
    use std::sync::Arc;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap()
    }

    fn snapshot() -> TelemetrySnapshot {
        TelemetrySnapshot::default()
            .with_dataset(
                SensorGroup::Fish,
                DatasetKind::Initial,
                vec![
                    TelemetryReading::new("2024-03-07T00:00:00Z").with_value("phLevel", 7.0),
                    TelemetryReading::new("2024-03-07T01:00:00Z").with_value("phLevel", 7.2),
                ],
            )
            .with_dataset(
                SensorGroup::Fish,
                DatasetKind::Validate,
                vec![TelemetryReading::new("2024-03-08T01:00:00Z").with_value("phLevel", 7.0)],
            )
    }

    #[test]
    fn unconfigured_models_fall_back() {
        let runner = EnsembleRunner::new(
            Arc::new(UnconfiguredModel::new(O1_MINI)),
            Arc::new(UnconfiguredModel::new(DEEPSEEK_R1)),
        );
        let synthetic = SinusoidalSource::new();
        let snapshot = snapshot();
        let analyzer = Analyzer::new(&runner, &synthetic, &snapshot);

        let record = runtime().block_on(analyzer.analyze(&PredictRequest::default())).unwrap();
        assert!(record.fallback);
        assert!(record.plant.is_none());

        let fish = record.fish.unwrap();
        assert_eq!(fish.input_timestamp.as_deref(), Some("2024-03-07T01:00:00Z"));
        assert_eq!(fish.models.len(), 2);
        let weights = fish.weights.unwrap();
        assert!((weights[0] - 0.82 / 1.71).abs() < 1e-9);
        assert!(fish.accuracy.is_some());
    }

    #[test]
    fn single_model_uses_supplied_series() {
        let runner = EnsembleRunner::new(
            Arc::new(SyntheticModel::new(O1_MINI)),
            Arc::new(SyntheticModel::new(DEEPSEEK_R1)),
        );
        let synthetic = SinusoidalSource::new();
        let snapshot = TelemetrySnapshot::default();
        let analyzer = Analyzer::new(&runner, &synthetic, &snapshot);

        let request = PredictRequest {
            initial_data: GroupSeries {
                plant: vec![TelemetryReading::new("2024-03-07T00:00:00Z").with_value("humidityLevel", 67.2)],
                ..Default::default()
            },
            validation_data: GroupSeries {
                plant: vec![TelemetryReading::new("2024-03-08T00:00:00Z").with_value("humidityLevel", 67.2)],
                ..Default::default()
            },
            model_type: ModelType::DeepseekR1,
        };

        let record = runtime().block_on(analyzer.analyze(&request)).unwrap();
        assert!(!record.fallback);
        assert!(record.fish.is_none());

        let plant = record.plant.unwrap();
        assert_eq!(plant.predicted["humidityLevel"], 67.2);
        assert!(plant.weights.is_none());
        assert_eq!(plant.accuracy.unwrap().fields["humidityLevel"], 100.0);
        assert_eq!(record.overall_accuracy, Some(100.0));
        assert!((record.confidence_score - 0.89).abs() < 1e-9);
    }

    #[test]
    fn nothing_to_forecast_is_rejected() {
        let runner = EnsembleRunner::new(
            Arc::new(SyntheticModel::new(O1_MINI)),
            Arc::new(SyntheticModel::new(DEEPSEEK_R1)),
        );
        let synthetic = SinusoidalSource::new();
        let snapshot = TelemetrySnapshot::default();
        let analyzer = Analyzer::new(&runner, &synthetic, &snapshot);

        let result = runtime().block_on(analyzer.analyze(&PredictRequest::default()));
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }
}
