//! Prediction accuracy scoring.
//!
//! Accuracy is `100 × (1 − MAPE)`, where MAPE is the mean absolute
//! percentage error over paired observations. Observations equal to zero
//! contribute no error term but still count towards `n`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Percentage accuracy of `predicted` against `actual`.
///
/// Returns `0.0` when the series are empty or differ in length.
pub fn percentage_accuracy(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() || actual.len() != predicted.len() {
        return 0.0;
    }

    let error: f64 = actual
        .iter()
        .zip(predicted)
        .filter(|(a, _)| **a != 0.0)
        .map(|(a, p)| ((a - p) / a).abs())
        .sum();

    (1.0 - error / actual.len() as f64) * 100.0
}

/// Per-field accuracy and overall mean.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccuracyReport {
    /// Accuracy per field, percent
    pub fields: BTreeMap<String, f64>,
    /// Mean of the per-field accuracies, percent; 0 with no fields
    pub overall: f64,
}

impl AccuracyReport {
    /// Score each field's predicted series against its observed series.
    ///
    /// Fields missing from either side are skipped.
    pub fn from_fields(
        actual: &BTreeMap<String, Vec<f64>>,
        predicted: &BTreeMap<String, Vec<f64>>,
    ) -> Self {
        let fields: BTreeMap<String, f64> = actual
            .iter()
            .filter_map(|(field, observed)| {
                let forecast = predicted.get(field)?;
                Some((field.clone(), percentage_accuracy(observed, forecast)))
            })
            .collect();

        let overall = if fields.is_empty() {
            0.0
        } else {
            fields.values().sum::<f64>() / fields.len() as f64
        };

        Self { fields, overall }
    }

    /// Score one constant forecast per field against an observed series.
    ///
    /// Observed fields match forecast fields ignoring case (`pHLevel` scores
    /// against `phLevel`) and are reported under the forecast's name.
    pub fn against_constant(actual: &BTreeMap<String, Vec<f64>>, forecast: &BTreeMap<String, f64>) -> Self {
        let mut observed = BTreeMap::new();
        let mut predicted = BTreeMap::new();

        for (field, series) in actual {
            let matched = forecast
                .get_key_value(field)
                .or_else(|| forecast.iter().find(|(name, _)| name.eq_ignore_ascii_case(field)));
            if let Some((name, value)) = matched {
                predicted.insert(name.clone(), vec![*value; series.len()]);
                observed.insert(name.clone(), series.clone());
            }
        }

        Self::from_fields(&observed, &predicted)
    }
}
