//! Multi-Model Ensemble Combiner
//!
//! ## Overview
//!
//! Two forecasting models each return a [`ModelPrediction`]: predicted field
//! values plus a self-reported confidence in `[0, 1]`. The ensemble merges
//! them with confidence-proportional weights:
//!
//! ```text
//! w_i       = c_i / (c_1 + c_2)
//! merged[f] = w_1 × p_1[f] + w_2 × p_2[f]      for f in both predictions
//! ```
//!
//! ## Degenerate cases
//!
//! | Inputs | Weights | Result |
//! |--------|---------|--------|
//! | both, `c_1 + c_2 = 0` | `[0.5, 0.5]` | plain average |
//! | only first | `[1, 0]` | first passes through unchanged |
//! | only second | `[0, 1]` | second passes through unchanged |
//! | neither | n/a | [`EnsembleError::NoPredictionsAvailable`] |
//!
//! Missing or non-finite confidences count as zero. Fields predicted by only
//! one of two models are dropped from the merge.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::errors::EnsembleError;

/// Model confidence clamped to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize)]
pub struct ConfidenceScore(f64);

impl ConfidenceScore {
    /// No confidence.
    pub const ZERO: Self = Self(0.0);

    /// High confidence threshold (90%).
    pub const HIGH_THRESHOLD: Self = Self(0.9);

    /// Clamp a raw score; non-finite values become zero.
    pub fn from_float(confidence: f64) -> Self {
        if confidence.is_finite() {
            Self(confidence.clamp(0.0, 1.0))
        } else {
            Self::ZERO
        }
    }

    /// Score as a float in `[0, 1]`.
    pub fn as_float(&self) -> f64 {
        self.0
    }

    /// At or above [`ConfidenceScore::HIGH_THRESHOLD`].
    pub fn is_high(&self) -> bool {
        *self >= Self::HIGH_THRESHOLD
    }
}

/// Forecast returned by one model.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelPrediction {
    /// Predicted value per field
    #[serde(default, deserialize_with = "deserialize_numeric_map")]
    pub predicted: BTreeMap<String, f64>,

    /// Free-text reasoning from the model
    #[serde(default)]
    pub explanation: String,

    /// Self-reported confidence; absent when the model did not give one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,
}

fn deserialize_numeric_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .filter_map(|(field, value)| {
            let number = match value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            number.filter(|v| v.is_finite()).map(|v| (field, v))
        })
        .collect())
}

impl ModelPrediction {
    /// Prediction with the given confidence.
    pub fn new(confidence: f64) -> Self {
        Self { confidence_score: Some(confidence), ..Default::default() }
    }

    /// Add a predicted field value.
    pub fn with_value(mut self, field: impl Into<String>, value: f64) -> Self {
        self.predicted.insert(field.into(), value);
        self
    }

    /// Attach an explanation.
    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = explanation.into();
        self
    }

    /// Clamped confidence; zero when absent.
    pub fn confidence(&self) -> ConfidenceScore {
        self.confidence_score.map_or(ConfidenceScore::ZERO, ConfidenceScore::from_float)
    }
}

/// Merged forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsemblePrediction {
    /// Weighted values for fields both models agreed to predict
    pub predicted: BTreeMap<String, f64>,
    /// Weight of each model, summing to 1
    pub weights: [f64; 2],
}

/// Normalized weights for two confidences.
pub fn model_weights(first: Option<f64>, second: Option<f64>) -> [f64; 2] {
    let c1 = first.map_or(0.0, |c| ConfidenceScore::from_float(c).as_float());
    let c2 = second.map_or(0.0, |c| ConfidenceScore::from_float(c).as_float());
    let total = c1 + c2;

    if total > 0.0 {
        [c1 / total, c2 / total]
    } else {
        [0.5, 0.5]
    }
}

/// Merge the predictions of two models. `None` marks a model that failed.
pub fn combine(
    first: Option<&ModelPrediction>,
    second: Option<&ModelPrediction>,
) -> Result<EnsemblePrediction, EnsembleError> {
    match (first, second) {
        (None, None) => Err(EnsembleError::NoPredictionsAvailable),
        (Some(only), None) => Ok(EnsemblePrediction { predicted: only.predicted.clone(), weights: [1.0, 0.0] }),
        (None, Some(only)) => Ok(EnsemblePrediction { predicted: only.predicted.clone(), weights: [0.0, 1.0] }),
        (Some(a), Some(b)) => {
            let weights = model_weights(a.confidence_score, b.confidence_score);
            let predicted = a
                .predicted
                .iter()
                .filter_map(|(field, va)| {
                    let vb = b.predicted.get(field)?;
                    Some((field.clone(), weights[0] * va + weights[1] * vb))
                })
                .collect();

            log_debug!("Ensemble weights {:.3} / {:.3}", weights[0], weights[1]);
            Ok(EnsemblePrediction { predicted, weights })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn weights_follow_confidence() {
        let a = ModelPrediction::new(0.82).with_value("phLevel", 6.9);
        let b = ModelPrediction::new(0.89).with_value("phLevel", 7.1);

        let merged = combine(Some(&a), Some(&b)).unwrap();
        assert!(close(merged.weights[0], 0.82 / 1.71));
        assert!(close(merged.weights[0] + merged.weights[1], 1.0));
        let expected = (0.82 * 6.9 + 0.89 * 7.1) / 1.71;
        assert!(close(merged.predicted["phLevel"], expected));
    }

    #[test]
    fn zero_confidences_weigh_equally() {
        let a = ModelPrediction::new(0.0).with_value("phLevel", 7.0);
        let b = ModelPrediction::default().with_value("phLevel", 8.0);

        let merged = combine(Some(&a), Some(&b)).unwrap();
        assert_eq!(merged.weights, [0.5, 0.5]);
        assert!(close(merged.predicted["phLevel"], 7.5));
    }

    #[test]
    fn one_zero_confidence_gives_full_weight_to_other() {
        assert_eq!(model_weights(Some(0.0), Some(0.6)), [0.0, 1.0]);
        assert_eq!(model_weights(Some(0.4), None), [1.0, 0.0]);
        assert_eq!(model_weights(Some(f64::NAN), Some(0.3)), [0.0, 1.0]);
    }

    #[test]
    fn confidences_are_clamped() {
        assert_eq!(model_weights(Some(4.0), Some(1.0)), [0.5, 0.5]);
        assert_eq!(ConfidenceScore::from_float(-2.0), ConfidenceScore::ZERO);
        assert!(ConfidenceScore::from_float(0.95).is_high());
    }

    #[test]
    fn single_prediction_passes_through() {
        let b = ModelPrediction::new(0.3).with_value("tdsLevel", 420.0).with_value("ecLevel", 1.1);

        let merged = combine(None, Some(&b)).unwrap();
        assert_eq!(merged.weights, [0.0, 1.0]);
        assert_eq!(merged.predicted, b.predicted);

        let merged = combine(Some(&b), None).unwrap();
        assert_eq!(merged.weights, [1.0, 0.0]);
    }

    #[test]
    fn lone_confident_model_takes_full_weight() {
        let a = ModelPrediction::new(0.9).with_value("phLevel", 7.2).with_value("temperatureLevel", 24.5);

        let merged = combine(Some(&a), None).unwrap();
        assert_eq!(merged.weights, [1.0, 0.0]);
        assert_eq!(merged.predicted, a.predicted);
        assert_eq!(merged.predicted["phLevel"], 7.2);
        assert_eq!(merged.predicted["temperatureLevel"], 24.5);
    }

    #[test]
    fn no_predictions_is_an_error() {
        assert_eq!(combine(None, None), Err(EnsembleError::NoPredictionsAvailable));
    }

    #[test]
    fn only_shared_fields_are_merged() {
        let a = ModelPrediction::new(0.5).with_value("phLevel", 7.0).with_value("tdsLevel", 400.0);
        let b = ModelPrediction::new(0.5).with_value("phLevel", 7.2).with_value("ecLevel", 1.0);

        let merged = combine(Some(&a), Some(&b)).unwrap();
        assert_eq!(merged.predicted.len(), 1);
        assert!(close(merged.predicted["phLevel"], 7.1));
    }

    #[test]
    fn lenient_prediction_parsing() {
        let parsed: ModelPrediction = serde_json::from_str(
            r#"{"predicted":{"phLevel":7.0,"tdsLevel":"430","note":null},"explanation":"stable","confidenceScore":0.8}"#,
        )
        .unwrap();
        assert_eq!(parsed.predicted.len(), 2);
        assert_eq!(parsed.predicted["tdsLevel"], 430.0);
        assert_eq!(parsed.confidence_score, Some(0.8));

        let bare: ModelPrediction = serde_json::from_str("{}").unwrap();
        assert!(bare.predicted.is_empty());
        assert_eq!(bare.confidence(), ConfidenceScore::ZERO);
    }
}
