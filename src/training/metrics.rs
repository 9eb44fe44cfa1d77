//! Regression metrics.

use ndarray::ArrayView1;

/// A metric over predictions and observed targets.
pub trait MetricFn: Send + Sync {
    /// Compute the metric. Both views have the same length.
    fn compute(&self, predictions: ArrayView1<'_, f64>, targets: ArrayView1<'_, f64>) -> f64;

    /// Name of the metric (for logging).
    fn name(&self) -> &'static str;
}

// =============================================================================
// RMSE (Root Mean Squared Error)
// =============================================================================

/// Root Mean Squared Error: sqrt(mean((pred - label)²))
#[derive(Debug, Clone, Copy, Default)]
pub struct Rmse;

impl MetricFn for Rmse {
    fn compute(&self, predictions: ArrayView1<'_, f64>, targets: ArrayView1<'_, f64>) -> f64 {
        let n = predictions.len();
        if n == 0 {
            return 0.0;
        }
        let sum_sq: f64 = predictions
            .iter()
            .zip(targets.iter())
            .map(|(&p, &l)| (p - l) * (p - l))
            .sum();
        (sum_sq / n as f64).sqrt()
    }

    fn name(&self) -> &'static str {
        "rmse"
    }
}

// =============================================================================
// MAE (Mean Absolute Error)
// =============================================================================

/// Mean Absolute Error: mean(|pred - label|)
///
/// Reported in t/ha, the headline accuracy figure.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mae;

impl MetricFn for Mae {
    fn compute(&self, predictions: ArrayView1<'_, f64>, targets: ArrayView1<'_, f64>) -> f64 {
        let n = predictions.len();
        if n == 0 {
            return 0.0;
        }
        let sum_ae: f64 = predictions
            .iter()
            .zip(targets.iter())
            .map(|(&p, &l)| (p - l).abs())
            .sum();
        sum_ae / n as f64
    }

    fn name(&self) -> &'static str {
        "mae"
    }
}

// =============================================================================
// R² (coefficient of determination)
// =============================================================================

/// Coefficient of determination: 1 - SS_res / SS_tot.
///
/// A constant target gives 1.0 for a perfect fit and 0.0 otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct RSquared;

impl MetricFn for RSquared {
    fn compute(&self, predictions: ArrayView1<'_, f64>, targets: ArrayView1<'_, f64>) -> f64 {
        let n = targets.len();
        if n == 0 {
            return 0.0;
        }
        let mean = targets.sum() / n as f64;
        let ss_tot: f64 = targets.iter().map(|&l| (l - mean) * (l - mean)).sum();
        let ss_res: f64 = predictions
            .iter()
            .zip(targets.iter())
            .map(|(&p, &l)| (p - l) * (p - l))
            .sum();
        if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else if ss_res == 0.0 {
            1.0
        } else {
            0.0
        }
    }

    fn name(&self) -> &'static str {
        "r2"
    }
}
