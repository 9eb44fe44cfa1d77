//! CART tree growth for squared-error regression.
//!
//! [`TreeBuilder`] assembles the node arrays incrementally; [`TreeGrower`]
//! decides the splits. Splits are exact: for every candidate feature the
//! node's rows are sorted by value and every boundary between two distinct
//! values is scored by its reduction in sum of squared errors.

use ndarray::{ArrayView1, ArrayView2};
use rand::Rng;

use super::sampling::FeatureSampler;
use crate::repr::tree::NO_CHILD;
use crate::repr::{NodeId, Tree};

// =============================================================================
// TreeBuilder
// =============================================================================

/// Mutable tree under construction.
#[derive(Clone, Debug, Default)]
pub struct TreeBuilder {
    split_features: Vec<u32>,
    thresholds: Vec<f64>,
    left_children: Vec<NodeId>,
    right_children: Vec<NodeId>,
    is_leaf: Vec<bool>,
    leaf_values: Vec<f64>,
    covers: Vec<f64>,
    gains: Vec<f64>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset and allocate the root. Returns its ID (always 0).
    pub fn init_root(&mut self, cover: f64) -> NodeId {
        *self = Self::default();
        self.alloc(cover)
    }

    fn alloc(&mut self, cover: f64) -> NodeId {
        let id = self.is_leaf.len() as NodeId;
        self.split_features.push(0);
        self.thresholds.push(0.0);
        self.left_children.push(NO_CHILD);
        self.right_children.push(NO_CHILD);
        self.is_leaf.push(true);
        self.leaf_values.push(0.0);
        self.covers.push(cover);
        self.gains.push(0.0);
        id
    }

    /// Turn `node` into a split and allocate its two children.
    ///
    /// Returns `(left_id, right_id)`.
    pub fn apply_split(
        &mut self,
        node: NodeId,
        split: &SplitCandidate,
        left_cover: f64,
        right_cover: f64,
    ) -> (NodeId, NodeId) {
        let left = self.alloc(left_cover);
        let right = self.alloc(right_cover);
        let idx = node as usize;
        self.is_leaf[idx] = false;
        self.split_features[idx] = split.feature as u32;
        self.thresholds[idx] = split.threshold;
        self.gains[idx] = split.gain;
        self.left_children[idx] = left;
        self.right_children[idx] = right;
        (left, right)
    }

    /// Set a node as a leaf with the given value.
    pub fn make_leaf(&mut self, node: NodeId, value: f64) {
        let idx = node as usize;
        self.is_leaf[idx] = true;
        self.leaf_values[idx] = value;
        self.left_children[idx] = NO_CHILD;
        self.right_children[idx] = NO_CHILD;
    }

    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.is_leaf.len()
    }

    /// Consume the builder and return an immutable tree.
    pub fn finish(self) -> Tree {
        Tree::new(
            self.split_features,
            self.thresholds,
            self.left_children,
            self.right_children,
            self.is_leaf,
            self.leaf_values,
            self.covers,
            self.gains,
        )
    }
}

// =============================================================================
// Split search
// =============================================================================

/// Best split found for a node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SplitCandidate {
    pub feature: usize,
    /// Rows with `x < threshold` go left.
    pub threshold: f64,
    /// Reduction in sum of squared errors.
    pub gain: f64,
}

/// Stopping rules for a single tree.
#[derive(Clone, Copy, Debug)]
pub struct GrowerParams {
    pub max_depth: u32,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

/// Sum and count of targets over a set of rows.
#[derive(Clone, Copy, Debug, Default)]
struct NodeStats {
    sum: f64,
    sum_sq: f64,
    n: usize,
}

impl NodeStats {
    fn of(y: ArrayView1<'_, f64>, rows: &[usize]) -> Self {
        rows.iter().fold(Self::default(), |acc, &r| {
            let v = y[r];
            Self { sum: acc.sum + v, sum_sq: acc.sum_sq + v * v, n: acc.n + 1 }
        })
    }

    #[inline]
    fn mean(&self) -> f64 {
        self.sum / self.n as f64
    }

    #[inline]
    fn sse(&self) -> f64 {
        (self.sum_sq - self.sum * self.sum / self.n as f64).max(0.0)
    }
}

/// Grows one regression tree on a set of (possibly repeated) rows.
#[derive(Clone, Debug)]
pub struct TreeGrower {
    params: GrowerParams,
    feature_sampler: FeatureSampler,
}

impl TreeGrower {
    pub fn new(params: GrowerParams, feature_sampler: FeatureSampler) -> Self {
        Self { params, feature_sampler }
    }

    /// Grow a tree.
    ///
    /// `rows` indexes into `x`/`y`; duplicates are separate samples and count
    /// towards covers. `rows` must not be empty.
    pub fn grow<R: Rng + ?Sized>(
        &self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        mut rows: Vec<usize>,
        rng: &mut R,
    ) -> Tree {
        let n_features = x.ncols();
        let mut builder = TreeBuilder::new();
        let root = builder.init_root(rows.len() as f64);

        let mut candidates = Vec::with_capacity(n_features);
        let mut scratch: Vec<(f64, f64)> = Vec::with_capacity(rows.len());

        // (node, start, end, depth) over `rows`
        let mut stack = vec![(root, 0usize, rows.len(), 0u32)];
        while let Some((node, start, end, depth)) = stack.pop() {
            let node_rows = &mut rows[start..end];
            let stats = NodeStats::of(y, node_rows);

            let splittable = depth < self.params.max_depth
                && stats.n >= self.params.min_samples_split
                && stats.n >= 2 * self.params.min_samples_leaf
                && stats.sse() > f64::EPSILON * stats.n as f64;
            if !splittable {
                builder.make_leaf(node, stats.mean());
                continue;
            }

            self.feature_sampler.sample(rng, &mut candidates);
            let mut best = self.best_split(x, y, node_rows, &candidates, stats, &mut scratch);
            if best.is_none() && candidates.len() < n_features {
                // Sampled features could not separate the node: try the rest.
                let rest: Vec<usize> =
                    (0..n_features).filter(|f| !candidates.contains(f)).collect();
                best = self.best_split(x, y, node_rows, &rest, stats, &mut scratch);
            }

            let Some(split) = best else {
                builder.make_leaf(node, stats.mean());
                continue;
            };

            let n_left = partition(x, node_rows, &split);
            let (left, right) =
                builder.apply_split(node, &split, n_left as f64, (stats.n - n_left) as f64);
            stack.push((right, start + n_left, end, depth + 1));
            stack.push((left, start, start + n_left, depth + 1));
        }

        builder.finish()
    }

    fn best_split(
        &self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        rows: &[usize],
        features: &[usize],
        parent: NodeStats,
        scratch: &mut Vec<(f64, f64)>,
    ) -> Option<SplitCandidate> {
        let mut best: Option<SplitCandidate> = None;
        for &feature in features {
            if let Some(c) = self.best_split_for_feature(x, y, rows, feature, parent, scratch) {
                if best.map_or(true, |b| c.gain > b.gain) {
                    best = Some(c);
                }
            }
        }
        best
    }

    fn best_split_for_feature(
        &self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        rows: &[usize],
        feature: usize,
        parent: NodeStats,
        scratch: &mut Vec<(f64, f64)>,
    ) -> Option<SplitCandidate> {
        scratch.clear();
        scratch.extend(rows.iter().map(|&r| (x[[r, feature]], y[r])));
        scratch.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

        let n = parent.n;
        let min_leaf = self.params.min_samples_leaf;
        let parent_term = parent.sum * parent.sum / n as f64;

        let mut best: Option<SplitCandidate> = None;
        let mut sum_left = 0.0;
        for i in 0..n - 1 {
            sum_left += scratch[i].1;
            let n_left = i + 1;
            let n_right = n - n_left;
            let (lo, hi) = (scratch[i].0, scratch[i + 1].0);
            if lo == hi || n_left < min_leaf || n_right < min_leaf {
                continue;
            }
            let sum_right = parent.sum - sum_left;
            let gain = sum_left * sum_left / n_left as f64
                + sum_right * sum_right / n_right as f64
                - parent_term;
            if gain > 0.0 && best.map_or(true, |b| gain > b.gain) {
                let mid = lo + (hi - lo) / 2.0;
                let threshold = if mid > lo { mid } else { hi };
                best = Some(SplitCandidate { feature, threshold, gain });
            }
        }
        best
    }
}

/// Reorder `rows` so rows going left come first. Returns the left count.
fn partition(x: ArrayView2<'_, f64>, rows: &mut [usize], split: &SplitCandidate) -> usize {
    let mut n_left = 0;
    for j in 0..rows.len() {
        if x[[rows[j], split.feature]] < split.threshold {
            rows.swap(n_left, j);
            n_left += 1;
        }
    }
    n_left
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2};
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn params(max_depth: u32) -> GrowerParams {
        GrowerParams { max_depth, min_samples_split: 2, min_samples_leaf: 1 }
    }

    fn grow(x: &Array2<f64>, y: &ndarray::Array1<f64>, max_depth: u32) -> Tree {
        let grower = TreeGrower::new(params(max_depth), FeatureSampler::new(x.ncols(), x.ncols()));
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
        grower.grow(x.view(), y.view(), (0..y.len()).collect(), &mut rng)
    }

    #[test]
    fn builder_simple() {
        let mut builder = TreeBuilder::new();
        let root = builder.init_root(3.0);
        builder.make_leaf(root, 1.5);
        let tree = builder.finish();
        assert_eq!(tree.n_nodes(), 1);
        assert_eq!(tree.leaf_value(0), 1.5);
        assert_eq!(tree.cover(0), 3.0);
    }

    #[test]
    fn builder_with_split() {
        let mut builder = TreeBuilder::new();
        let root = builder.init_root(4.0);
        let split = SplitCandidate { feature: 1, threshold: 0.5, gain: 2.0 };
        let (l, r) = builder.apply_split(root, &split, 1.0, 3.0);
        builder.make_leaf(l, -1.0);
        builder.make_leaf(r, 1.0);
        let tree = builder.finish();
        assert_eq!((l, r), (1, 2));
        assert_eq!(tree.split_feature(0), 1);
        assert_eq!(tree.gain(0), 2.0);
        assert!(tree.validate(2).is_ok());
    }

    #[test]
    fn finds_step_function() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = array![1.0, 1.0, 5.0, 5.0];
        let tree = grow(&x, &y, 4);
        assert_eq!(tree.n_nodes(), 3);
        assert_eq!(tree.split_feature(0), 0);
        assert_abs_diff_eq!(tree.threshold(0), 1.5);
        // SSE 16 -> 0
        assert_abs_diff_eq!(tree.gain(0), 16.0, epsilon = 1e-12);
        assert_eq!(tree.predict_row(&[0.5]), 1.0);
        assert_eq!(tree.predict_row(&[2.5]), 5.0);
    }

    #[test]
    fn covers_count_duplicates() {
        let x = array![[0.0], [1.0]];
        let y = array![0.0, 10.0];
        let grower = TreeGrower::new(params(3), FeatureSampler::new(1, 1));
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
        let tree = grower.grow(x.view(), y.view(), vec![0, 0, 0, 1], &mut rng);
        assert_eq!(tree.cover(0), 4.0);
        assert_eq!(tree.cover(tree.left_child(0)), 3.0);
        assert_eq!(tree.cover(tree.right_child(0)), 1.0);
        assert_abs_diff_eq!(tree.expected_value(), 2.5);
    }

    #[test]
    fn respects_max_depth() {
        let x = Array2::from_shape_fn((64, 1), |(i, _)| i as f64);
        let y = x.column(0).mapv(|v| v * v);
        let tree = grow(&x, &y, 3);
        assert!(tree.depth() <= 4);
        assert!(tree.validate(1).is_ok());
    }

    #[test]
    fn respects_min_samples_leaf() {
        let x = Array2::from_shape_fn((20, 1), |(i, _)| i as f64);
        let y = x.column(0).to_owned();
        let grower = TreeGrower::new(
            GrowerParams { max_depth: 10, min_samples_split: 2, min_samples_leaf: 4 },
            FeatureSampler::new(1, 1),
        );
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
        let tree = grower.grow(x.view(), y.view(), (0..20).collect(), &mut rng);
        for node in 0..tree.n_nodes() as NodeId {
            if tree.is_leaf(node) {
                assert!(tree.cover(node) >= 4.0);
            }
        }
    }

    #[test]
    fn constant_target_is_single_leaf() {
        let x = array![[0.0], [1.0], [2.0]];
        let y = array![2.0, 2.0, 2.0];
        let tree = grow(&x, &y, 5);
        assert_eq!(tree.n_nodes(), 1);
        assert_eq!(tree.leaf_value(0), 2.0);
    }

    #[test]
    fn constant_feature_cannot_split() {
        let x = array![[1.0], [1.0], [1.0]];
        let y = array![0.0, 1.0, 2.0];
        let tree = grow(&x, &y, 5);
        assert_eq!(tree.n_nodes(), 1);
        assert_abs_diff_eq!(tree.leaf_value(0), 1.0);
    }

    #[test]
    fn falls_back_to_unsampled_features() {
        // Feature 0 is constant; with k = 1 the sampler may pick it.
        let x = array![[1.0, 0.0], [1.0, 1.0], [1.0, 2.0], [1.0, 3.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];
        let grower = TreeGrower::new(params(2), FeatureSampler::new(2, 1));
        for seed in 0..8 {
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
            let tree = grower.grow(x.view(), y.view(), (0..4).collect(), &mut rng);
            assert_eq!(tree.split_feature(0), 1);
        }
    }

    #[test]
    fn adjacent_floats_threshold_separates() {
        let lo = 1.0f64;
        let hi = f64::from_bits(lo.to_bits() + 1);
        let x = array![[lo], [hi]];
        let y = array![0.0, 1.0];
        let tree = grow(&x, &y, 1);
        assert_eq!(tree.predict_row(&[lo]), 0.0);
        assert_eq!(tree.predict_row(&[hi]), 1.0);
    }
}
