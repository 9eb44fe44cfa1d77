//! Named attribution of a single prediction.

use serde::{Deserialize, Serialize};

use crate::schema::FEATURES;

/// Contribution of one feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub feature: String,
    /// Signed contribution in t/ha.
    pub value: f64,
}

/// Decomposition of one prediction into per-feature contributions.
///
/// `baseline + Σ contributions == prediction` within floating-point
/// tolerance. Contributions are in schema order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionResult {
    /// Expected model output over the training data.
    pub baseline: f64,
    pub contributions: Vec<Contribution>,
    pub prediction: f64,
}

impl AttributionResult {
    /// Pair raw contributions (schema order) with feature names.
    pub fn from_values(baseline: f64, values: &[f64], prediction: f64) -> Self {
        debug_assert_eq!(values.len(), FEATURES.len());
        let contributions = FEATURES
            .iter()
            .zip(values)
            .map(|(spec, &value)| Contribution { feature: spec.name.to_owned(), value })
            .collect();
        Self { baseline, contributions, prediction }
    }

    /// Contribution of a feature by canonical name.
    pub fn contribution(&self, feature: &str) -> Option<f64> {
        self.contributions
            .iter()
            .find(|c| c.feature == feature)
            .map(|c| c.value)
    }

    pub fn total_contribution(&self) -> f64 {
        self.contributions.iter().map(|c| c.value).sum()
    }

    /// `|baseline + Σ contributions - prediction|`.
    pub fn additivity_gap(&self) -> f64 {
        (self.baseline + self.total_contribution() - self.prediction).abs()
    }

    /// Contributions ordered by decreasing magnitude.
    pub fn by_magnitude(&self) -> Vec<&Contribution> {
        let mut sorted: Vec<&Contribution> = self.contributions.iter().collect();
        sorted.sort_by(|a, b| b.value.abs().total_cmp(&a.value.abs()));
        sorted
    }
}
