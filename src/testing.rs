//! Seeded synthetic data for unit tests, integration tests and benches.
//!
//! ```
//! use maize_yield::testing::synthetic_dataset;
//!
//! let data = synthetic_dataset(100, 0.1, 42);
//! assert_eq!(data.n_samples(), 100);
//! ```

use std::fmt::Write as _;

use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_distr::Normal;

use crate::data::TrainingDataset;
use crate::repr::{Forest, NodeId, Tree};
use crate::schema::{FeatureVector, FEATURES, N_FEATURES};

/// Number of distinct regions produced by [`synthetic_dataset`].
pub const N_REGIONS: usize = 4;

/// Random feature rows, each value uniform in its documented range.
pub fn random_features(rows: usize, seed: u64) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::from_shape_fn((rows, N_FEATURES), |(_, c)| {
        let spec = &FEATURES[c];
        spec.min + rng.gen::<f64>() * (spec.max - spec.min)
    })
}

/// One random in-range feature vector.
pub fn random_feature_vector(seed: u64) -> FeatureVector {
    let row = random_features(1, seed);
    let mut values = [0.0; N_FEATURES];
    values.iter_mut().zip(row.iter()).for_each(|(v, &x)| *v = x);
    FeatureVector::from_finite(values)
}

/// Plausible yield response to the features, in t/ha.
///
/// Driven mostly by vegetation index and rainfall, with smaller temperature,
/// soil and planting-date effects.
pub fn yield_response(x: &[f64]) -> f64 {
    let scaled = |c: usize| (x[c] - FEATURES[c].min) / (FEATURES[c].max - FEATURES[c].min);
    0.5 + 2.5 * scaled(0) + 1.2 * scaled(1) - 0.6 * (scaled(2) - 0.5).powi(2)
        + 0.3 * scaled(4)
        - 0.2 * scaled(7)
}

/// Synthetic dataset of `rows` records with Gaussian label noise of standard
/// deviation `noise`. Regions cycle through `region_0..region_3`.
pub fn synthetic_dataset(rows: usize, noise: f64, seed: u64) -> TrainingDataset {
    let features = random_features(rows, seed);
    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(1));
    assert!(noise >= 0.0, "noise must be non-negative");
    let normal = Normal::new(0.0, noise).expect("valid noise level");
    let targets: Array1<f64> = features
        .rows()
        .into_iter()
        .map(|row| {
            let row = row.to_vec();
            yield_response(&row) + normal.sample(&mut rng)
        })
        .collect();
    let regions = (0..rows).map(|i| format!("region_{}", i % N_REGIONS)).collect();
    TrainingDataset::new(features, targets, regions).expect("synthetic data is valid")
}

/// Render a dataset as CSV with the canonical header.
pub fn to_csv(dataset: &TrainingDataset) -> String {
    let mut out = String::from("region");
    for spec in FEATURES.iter() {
        out.push(',');
        out.push_str(spec.name);
    }
    out.push_str(",yield_t_ha\n");
    for i in 0..dataset.n_samples() {
        out.push_str(&dataset.regions()[i]);
        for v in dataset.row(i) {
            let _ = write!(out, ",{v}");
        }
        let _ = writeln!(out, ",{}", dataset.targets()[i]);
    }
    out
}

// =============================================================================
// Reference Shapley values
// =============================================================================

/// Expected output of `tree` when only the features flagged in `present` are
/// known: known features follow `x`, unknown ones average both children by
/// training cover.
pub fn conditional_expectation(tree: &Tree, x: &[f64], present: &[bool]) -> f64 {
    fn walk(tree: &Tree, node: NodeId, x: &[f64], present: &[bool]) -> f64 {
        if tree.is_leaf(node) {
            return tree.leaf_value(node);
        }
        let f = tree.split_feature(node);
        if present[f] {
            return walk(tree, tree.next_node(node, x[f]), x, present);
        }
        let (l, r) = (tree.left_child(node), tree.right_child(node));
        (tree.cover(l) * walk(tree, l, x, present) + tree.cover(r) * walk(tree, r, x, present))
            / tree.cover(node)
    }
    walk(tree, 0, x, present)
}

/// Shapley values of the forest's path-dependent value function, by
/// enumerating every feature subset. Exponential in the feature count.
pub fn path_dependent_shapley(forest: &Forest, x: &[f64]) -> Vec<f64> {
    let n = forest.n_features();
    assert!(n <= 16, "brute force is limited to 16 features");
    let n_masks = 1usize << n;

    let value: Vec<f64> = (0..n_masks)
        .map(|mask| {
            let present: Vec<bool> = (0..n).map(|f| mask & (1 << f) != 0).collect();
            let sum: f64 = forest.trees().map(|t| conditional_expectation(t, x, &present)).sum();
            sum / forest.n_trees() as f64
        })
        .collect();

    let factorial = |k: usize| (1..=k).map(|v| v as f64).product::<f64>();
    let weights: Vec<f64> = (0..n)
        .map(|s| factorial(s) * factorial(n - s - 1) / factorial(n))
        .collect();

    (0..n)
        .map(|i| {
            (0..n_masks)
                .filter(|mask| mask & (1 << i) == 0)
                .map(|mask| weights[mask.count_ones() as usize] * (value[mask | (1 << i)] - value[mask]))
                .sum()
        })
        .collect()
}
