//! Held-out evaluation.

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use super::metrics::{Mae, MetricFn, RSquared, Rmse};
use crate::data::TrainingDataset;
use crate::model::YieldModel;

/// Evaluation could not be computed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("test set is empty")]
    EmptyTestSet,

    #[error("{predictions} predictions for {targets} targets")]
    LengthMismatch { predictions: usize, targets: usize },
}

/// Held-out accuracy of a model. Not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Mean absolute error, t/ha.
    pub mae: f64,
    /// Root mean squared error, t/ha.
    pub rmse: f64,
    /// Coefficient of determination.
    pub r2: f64,
    /// Number of held-out rows.
    pub n_samples: usize,
}

impl EvaluationReport {
    /// Compute the report from predictions and observed targets.
    pub fn from_predictions(
        predictions: ArrayView1<'_, f64>,
        targets: ArrayView1<'_, f64>,
    ) -> Result<Self, EvalError> {
        if predictions.len() != targets.len() {
            return Err(EvalError::LengthMismatch {
                predictions: predictions.len(),
                targets: targets.len(),
            });
        }
        if targets.is_empty() {
            return Err(EvalError::EmptyTestSet);
        }
        Ok(Self {
            mae: Mae.compute(predictions, targets),
            rmse: Rmse.compute(predictions, targets),
            r2: RSquared.compute(predictions, targets),
            n_samples: targets.len(),
        })
    }

    /// Metric values keyed by metric name, in report order.
    pub fn metrics(&self) -> [(&'static str, f64); 3] {
        [(Mae.name(), self.mae), (Rmse.name(), self.rmse), (RSquared.name(), self.r2)]
    }
}

/// Predict every test row and report MAE, RMSE and R².
///
/// Emits one `info!` summary line.
pub fn evaluate(model: &YieldModel, test: &TrainingDataset) -> Result<EvaluationReport, EvalError> {
    let predictions = model.predict_dataset(test);
    let report = EvaluationReport::from_predictions(predictions.view(), test.targets())?;
    let summary: Vec<String> = report
        .metrics()
        .iter()
        .map(|(name, value)| format!("{name}={value:.4}"))
        .collect();
    info!(n = report.n_samples, "evaluation: {}", summary.join(" "));
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array1};

    #[test]
    fn report_from_predictions() {
        let p = array![1.0, 2.0, 3.0, 4.0];
        let l = array![1.0, 2.0, 3.0, 6.0];
        let report = EvaluationReport::from_predictions(p.view(), l.view()).unwrap();
        assert_eq!(report.n_samples, 4);
        assert_abs_diff_eq!(report.mae, 0.5);
        assert_abs_diff_eq!(report.rmse, 1.0);
        assert!(report.r2 > 0.0 && report.r2 < 1.0);
    }

    #[test]
    fn metrics_are_named() {
        let p = array![1.0, 2.0];
        let l = array![1.0, 4.0];
        let report = EvaluationReport::from_predictions(p.view(), l.view()).unwrap();
        let metrics = report.metrics();
        assert_eq!(metrics.map(|(name, _)| name), ["mae", "rmse", "r2"]);
        assert_eq!(metrics[0].1, report.mae);
        assert_eq!(metrics[2].1, report.r2);
    }

    #[test]
    fn empty_set_is_an_error() {
        let e = Array1::<f64>::zeros(0);
        assert_eq!(
            EvaluationReport::from_predictions(e.view(), e.view()),
            Err(EvalError::EmptyTestSet)
        );
    }

    #[test]
    fn mismatched_lengths() {
        let p = array![1.0];
        let l = array![1.0, 2.0];
        assert!(matches!(
            EvaluationReport::from_predictions(p.view(), l.view()),
            Err(EvalError::LengthMismatch { predictions: 1, targets: 2 })
        ));
    }
}
