//! Global feature importance from forest structure.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::repr::{Forest, NodeId};

/// Which node statistic to aggregate per feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportanceType {
    /// Number of splits on the feature.
    Split,
    /// Total squared-error reduction of splits on the feature.
    #[default]
    Gain,
    /// Gain divided by split count.
    AverageGain,
    /// Total cover of nodes splitting on the feature.
    Cover,
    /// Cover divided by split count.
    AverageCover,
}

impl fmt::Display for ImportanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImportanceType::Split => "split",
            ImportanceType::Gain => "gain",
            ImportanceType::AverageGain => "average_gain",
            ImportanceType::Cover => "cover",
            ImportanceType::AverageCover => "average_cover",
        };
        f.write_str(name)
    }
}

/// Per-feature importance scores, in schema order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureImportance {
    kind: ImportanceType,
    names: Vec<String>,
    values: Vec<f64>,
}

impl FeatureImportance {
    pub fn kind(&self) -> ImportanceType {
        self.kind
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Score of a feature by name.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.names.iter().position(|n| n == name).map(|i| self.values[i])
    }

    /// Scores scaled to sum to 1 (all zeros stay zero).
    pub fn normalized(&self) -> Vec<f64> {
        let total: f64 = self.values.iter().sum();
        if total > 0.0 {
            self.values.iter().map(|v| v / total).collect()
        } else {
            self.values.clone()
        }
    }

    /// The `k` most important features, descending. Ties keep schema order.
    pub fn top_k(&self, k: usize) -> Vec<(&str, f64)> {
        let mut ranked: Vec<(&str, f64)> = self
            .names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(k);
        ranked
    }
}

/// Aggregate split statistics of every tree per feature.
pub fn compute_forest_importance(
    forest: &Forest,
    kind: ImportanceType,
    feature_names: Vec<String>,
) -> FeatureImportance {
    let n_features = forest.n_features();
    let mut counts = vec![0.0; n_features];
    let mut gains = vec![0.0; n_features];
    let mut covers = vec![0.0; n_features];

    for tree in forest.trees() {
        for node in 0..tree.n_nodes() as NodeId {
            if tree.is_leaf(node) {
                continue;
            }
            let f = tree.split_feature(node);
            counts[f] += 1.0;
            gains[f] += tree.gain(node);
            covers[f] += tree.cover(node);
        }
    }

    let average = |totals: Vec<f64>| -> Vec<f64> {
        totals
            .iter()
            .zip(&counts)
            .map(|(&t, &c)| if c > 0.0 { t / c } else { 0.0 })
            .collect()
    };

    let values = match kind {
        ImportanceType::Split => counts.clone(),
        ImportanceType::Gain => gains,
        ImportanceType::AverageGain => average(gains),
        ImportanceType::Cover => covers,
        ImportanceType::AverageCover => average(covers),
    };

    FeatureImportance { kind, names: feature_names, values }
}
