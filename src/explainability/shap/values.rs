//! SHAP values container for a batch of rows.

/// Per-sample, per-feature SHAP contributions.
///
/// Layout is `[samples × (features + 1)]`; the extra slot per sample holds the
/// base value.
#[derive(Clone, Debug, PartialEq)]
pub struct ShapValues {
    values: Vec<f64>,
    n_samples: usize,
    n_features: usize,
}

impl ShapValues {
    /// Container initialized to zeros.
    pub fn zeros(n_samples: usize, n_features: usize) -> Self {
        let values = vec![0.0; n_samples * (n_features + 1)];
        Self { values, n_samples, n_features }
    }

    #[inline]
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Number of features (not including base value).
    #[inline]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    #[inline]
    fn index(&self, sample: usize, feature: usize) -> usize {
        sample * (self.n_features + 1) + feature
    }

    #[inline]
    pub fn get(&self, sample: usize, feature: usize) -> f64 {
        self.values[self.index(sample, feature)]
    }

    #[inline]
    pub fn set(&mut self, sample: usize, feature: usize, value: f64) {
        let idx = self.index(sample, feature);
        self.values[idx] = value;
    }

    /// Base value (expected output) for a sample.
    #[inline]
    pub fn base_value(&self, sample: usize) -> f64 {
        self.get(sample, self.n_features)
    }

    #[inline]
    pub fn set_base_value(&mut self, sample: usize, value: f64) {
        self.set(sample, self.n_features, value);
    }

    /// Feature contributions of one sample (base value excluded).
    pub fn feature_shap(&self, sample: usize) -> Vec<f64> {
        let start = self.index(sample, 0);
        self.values[start..start + self.n_features].to_vec()
    }

    /// Verify `base + Σ contributions ≈ prediction` for every sample.
    pub fn verify(&self, predictions: &[f64], tolerance: f64) -> bool {
        if predictions.len() != self.n_samples {
            return false;
        }
        predictions.iter().enumerate().all(|(sample, &pred)| {
            let sum: f64 = self.base_value(sample) + self.feature_shap(sample).iter().sum::<f64>();
            (sum - pred).abs() <= tolerance
        })
    }

    /// Mean absolute contribution of each feature across samples.
    ///
    /// A global importance measure derived from local attributions.
    pub fn mean_abs(&self) -> Vec<f64> {
        if self.n_samples == 0 {
            return vec![0.0; self.n_features];
        }
        let mut out = vec![0.0; self.n_features];
        for sample in 0..self.n_samples {
            for (f, o) in out.iter_mut().enumerate() {
                *o += self.get(sample, f).abs();
            }
        }
        out.iter_mut().for_each(|o| *o /= self.n_samples as f64);
        out
    }

    /// Raw values slice.
    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout() {
        let mut shap = ShapValues::zeros(2, 3);
        assert_eq!(shap.values().len(), 2 * 4);

        shap.set(0, 0, 1.0);
        shap.set(1, 2, 3.0);
        shap.set_base_value(1, 0.5);
        assert_eq!(shap.get(0, 0), 1.0);
        assert_eq!(shap.get(0, 2), 0.0);
        assert_eq!(shap.feature_shap(1), vec![0.0, 0.0, 3.0]);
        assert_eq!(shap.base_value(1), 0.5);
    }

    #[test]
    fn verify_sum() {
        let mut shap = ShapValues::zeros(1, 2);
        shap.set(0, 0, 0.5);
        shap.set(0, 1, 0.3);
        shap.set_base_value(0, 0.2);

        assert!(shap.verify(&[1.0], 1e-9));
        assert!(!shap.verify(&[1.5], 0.01));
        assert!(!shap.verify(&[1.0, 1.0], 0.01));
    }

    #[test]
    fn mean_abs() {
        let mut shap = ShapValues::zeros(2, 2);
        shap.set(0, 0, -1.0);
        shap.set(1, 0, 3.0);
        shap.set(1, 1, 0.5);
        assert_eq!(shap.mean_abs(), vec![2.0, 0.25]);
    }
}
