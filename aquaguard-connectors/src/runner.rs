//! Ensemble orchestration.
//!
//! [`EnsembleRunner`] queries two [`ModelConnector`]s concurrently for the
//! same reading. A failing model contributes no prediction; the combiner in
//! `aquaguard-core` decides the weights from whatever came back.

use std::sync::Arc;

use aquaguard_core::{
    combine, EnsembleError, EnsemblePrediction, ModelPrediction, SensorGroup, SinusoidalSource, SyntheticSource,
    TelemetryReading,
};

use crate::{ConnectionStats, ConnectorError, ModelConnector};

/// Both model answers and their merge.
#[derive(Debug, Clone)]
pub struct EnsembleOutcome {
    /// Group the forecast is for
    pub group: SensorGroup,
    /// Prediction of the first model, absent when it failed
    pub first: Option<ModelPrediction>,
    /// Prediction of the second model, absent when it failed
    pub second: Option<ModelPrediction>,
    /// Merge of the available predictions
    pub ensemble: Result<EnsemblePrediction, EnsembleError>,
}

impl EnsembleOutcome {
    /// Both models failed.
    pub fn is_empty(&self) -> bool {
        self.first.is_none() && self.second.is_none()
    }
}

/// Runs a pair of models side by side.
#[derive(Clone)]
pub struct EnsembleRunner {
    first: Arc<dyn ModelConnector>,
    second: Arc<dyn ModelConnector>,
}

impl EnsembleRunner {
    /// Runner over two connectors. Weights are reported in this order.
    pub fn new(first: Arc<dyn ModelConnector>, second: Arc<dyn ModelConnector>) -> Self {
        Self { first, second }
    }

    /// Connectors in weight order.
    pub fn models(&self) -> [&Arc<dyn ModelConnector>; 2] {
        [&self.first, &self.second]
    }

    /// Connector with the given id.
    pub fn by_id(&self, model_id: &str) -> Option<&Arc<dyn ModelConnector>> {
        self.models().into_iter().find(|m| m.model_id() == model_id)
    }

    /// Query both models and merge their answers.
    pub async fn run(&self, group: SensorGroup, reading: &TelemetryReading) -> EnsembleOutcome {
        let (first, second) = tokio::join!(
            self.first.predict(group, reading),
            self.second.predict(group, reading)
        );

        let first = settle(self.first.model_id(), first);
        let second = settle(self.second.model_id(), second);
        let ensemble = combine(first.as_ref(), second.as_ref());

        if ensemble.is_err() {
            log::warn!("No model produced a {} forecast", group);
        }

        EnsembleOutcome { group, first, second, ensemble }
    }

    /// Query a single model by id.
    pub async fn run_single(
        &self,
        model_id: &str,
        group: SensorGroup,
        reading: &TelemetryReading,
    ) -> Result<ModelPrediction, ConnectorError> {
        let model = self
            .by_id(model_id)
            .ok_or_else(|| ConnectorError::UnknownModel(model_id.to_string()))?;
        model.predict(group, reading).await
    }
}

fn settle(model_id: &str, result: Result<ModelPrediction, ConnectorError>) -> Option<ModelPrediction> {
    match result {
        Ok(prediction) => Some(prediction),
        Err(ConnectorError::NotConfigured(_)) => {
            log::debug!("Skipping {}: no credentials configured", model_id);
            None
        }
        Err(e) => {
            log::warn!("Model {} failed: {}", model_id, e);
            None
        }
    }
}

/// Offline model answering with the synthetic source's fallback forecast.
pub struct SyntheticModel {
    id: String,
    source: SinusoidalSource,
}

impl SyntheticModel {
    /// Synthetic stand-in for the model with this id.
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), source: SinusoidalSource::new() }
    }
}

#[async_trait::async_trait]
impl ModelConnector for SyntheticModel {
    fn model_id(&self) -> &str {
        &self.id
    }

    async fn predict(
        &self,
        group: SensorGroup,
        _reading: &TelemetryReading,
    ) -> Result<ModelPrediction, ConnectorError> {
        Ok(self.source.prediction(group, &self.id))
    }

    fn stats(&self) -> ConnectionStats {
        ConnectionStats::default()
    }
}

/// Placeholder for a model whose credentials are missing.
pub struct UnconfiguredModel {
    id: String,
}

impl UnconfiguredModel {
    /// Placeholder for the model with this id.
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[async_trait::async_trait]
impl ModelConnector for UnconfiguredModel {
    fn model_id(&self) -> &str {
        &self.id
    }

    async fn predict(
        &self,
        _group: SensorGroup,
        _reading: &TelemetryReading,
    ) -> Result<ModelPrediction, ConnectorError> {
        Err(ConnectorError::NotConfigured(self.id.clone()))
    }

    fn stats(&self) -> ConnectionStats {
        ConnectionStats::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str, ModelPrediction);

    #[async_trait::async_trait]
    impl ModelConnector for Fixed {
        fn model_id(&self) -> &str {
            self.0
        }

        async fn predict(&self, _: SensorGroup, _: &TelemetryReading) -> Result<ModelPrediction, ConnectorError> {
            Ok(self.1.clone())
        }

        fn stats(&self) -> ConnectionStats {
            ConnectionStats::default()
        }
    }

    struct Broken;

    #[async_trait::async_trait]
    impl ModelConnector for Broken {
        fn model_id(&self) -> &str {
            "broken"
        }

        async fn predict(&self, _: SensorGroup, _: &TelemetryReading) -> Result<ModelPrediction, ConnectorError> {
            Err(ConnectorError::NoJson)
        }

        fn stats(&self) -> ConnectionStats {
            ConnectionStats::default()
        }
    }

    fn reading() -> TelemetryReading {
        TelemetryReading::new("2024-03-07T00:00:00Z").with_value("phLevel", 7.0)
    }

    #[tokio::test]
    async fn merges_both_answers() {
        let runner = EnsembleRunner::new(
            Arc::new(Fixed("a", ModelPrediction::new(0.5).with_value("phLevel", 7.0))),
            Arc::new(Fixed("b", ModelPrediction::new(0.5).with_value("phLevel", 8.0))),
        );

        let outcome = runner.run(SensorGroup::Fish, &reading()).await;
        let merged = outcome.ensemble.unwrap();
        assert_eq!(merged.weights, [0.5, 0.5]);
        assert!((merged.predicted["phLevel"] - 7.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn failed_model_gets_no_weight() {
        let runner = EnsembleRunner::new(
            Arc::new(Broken),
            Arc::new(Fixed("b", ModelPrediction::new(0.4).with_value("phLevel", 7.3))),
        );

        let outcome = runner.run(SensorGroup::Fish, &reading()).await;
        assert!(outcome.first.is_none());
        let merged = outcome.ensemble.unwrap();
        assert_eq!(merged.weights, [0.0, 1.0]);
        assert_eq!(merged.predicted["phLevel"], 7.3);
    }

    #[tokio::test]
    async fn all_failures_surface_as_ensemble_error() {
        let runner = EnsembleRunner::new(Arc::new(Broken), Arc::new(UnconfiguredModel::new("deepseek-r1")));

        let outcome = runner.run(SensorGroup::Plant, &reading()).await;
        assert!(outcome.is_empty());
        assert_eq!(outcome.ensemble, Err(EnsembleError::NoPredictionsAvailable));
    }

    #[tokio::test]
    async fn single_model_lookup() {
        let runner = EnsembleRunner::new(
            Arc::new(SyntheticModel::new("o1-mini")),
            Arc::new(SyntheticModel::new("deepseek-r1")),
        );

        let prediction = runner.run_single("deepseek-r1", SensorGroup::Fish, &reading()).await.unwrap();
        assert_eq!(prediction.confidence_score, Some(0.89));

        let unknown = runner.run_single("gpt", SensorGroup::Fish, &reading()).await;
        assert!(matches!(unknown, Err(ConnectorError::UnknownModel(_))));
    }
}
