//! Row and feature sampling for forest training.
//!
//! - [`RowSampler`]: per-tree bootstrap (with replacement) or subsample
//!   (without replacement)
//! - [`FeatureSampler`]: per-node random feature subset
//!
//! Both draw from a caller-owned RNG so a tree's entire randomness comes from
//! one seeded stream.

use rand::seq::index;
use rand::Rng;

/// Tree seed derived from the forest seed and the tree index.
///
/// Independent of thread scheduling, so the forest is identical for any
/// thread count.
#[inline]
pub fn tree_seed(seed: u64, tree_idx: usize) -> u64 {
    // splitmix64 finaliser over (seed, idx)
    let mut z = seed ^ (tree_idx as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

// ============================================================================
// RowSampler
// ============================================================================

/// Draws the rows a tree is grown on.
#[derive(Debug, Clone, Copy)]
pub struct RowSampler {
    n_rows: usize,
    sample_size: usize,
    bootstrap: bool,
}

impl RowSampler {
    pub fn new(n_rows: usize, subsample: f64, bootstrap: bool) -> Self {
        let sample_size = ((n_rows as f64 * subsample).round() as usize).clamp(1, n_rows.max(1));
        Self { n_rows, sample_size, bootstrap }
    }

    /// Number of rows drawn per tree (duplicates counted).
    #[inline]
    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    /// Draw row indices. With bootstrap the result may contain duplicates;
    /// each duplicate counts towards node covers.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<usize> {
        if self.bootstrap {
            (0..self.sample_size)
                .map(|_| rng.gen_range(0..self.n_rows))
                .collect()
        } else if self.sample_size >= self.n_rows {
            (0..self.n_rows).collect()
        } else {
            let mut rows = index::sample(rng, self.n_rows, self.sample_size).into_vec();
            rows.sort_unstable();
            rows
        }
    }
}

// ============================================================================
// FeatureSampler
// ============================================================================

/// Picks the candidate features for one node.
#[derive(Debug, Clone, Copy)]
pub struct FeatureSampler {
    n_features: usize,
    k: usize,
}

impl FeatureSampler {
    pub fn new(n_features: usize, k: usize) -> Self {
        Self { n_features, k: k.clamp(1, n_features.max(1)) }
    }

    /// Fill `out` with `k` distinct features in ascending order.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, out: &mut Vec<usize>) {
        out.clear();
        if self.k >= self.n_features {
            out.extend(0..self.n_features);
        } else {
            out.extend(index::sample(rng, self.n_features, self.k).iter());
            out.sort_unstable();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn tree_seeds_differ() {
        let seeds: std::collections::HashSet<_> = (0..100).map(|i| tree_seed(42, i)).collect();
        assert_eq!(seeds.len(), 100);
        assert_eq!(tree_seed(42, 3), tree_seed(42, 3));
        assert_ne!(tree_seed(42, 3), tree_seed(43, 3));
    }

    #[test]
    fn bootstrap_draws_with_replacement() {
        let sampler = RowSampler::new(50, 1.0, true);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
        let rows = sampler.sample(&mut rng);
        assert_eq!(rows.len(), 50);
        assert!(rows.iter().all(|&r| r < 50));
        let distinct: std::collections::HashSet<_> = rows.iter().collect();
        assert!(distinct.len() < 50);
    }

    #[test]
    fn subsample_without_replacement() {
        let sampler = RowSampler::new(100, 0.3, false);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let rows = sampler.sample(&mut rng);
        assert_eq!(rows.len(), 30);
        assert!(rows.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn no_sampling_uses_all_rows() {
        let sampler = RowSampler::new(10, 1.0, false);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        assert_eq!(sampler.sample(&mut rng), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn feature_subset_is_sorted_and_distinct() {
        let sampler = FeatureSampler::new(8, 3);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
        let mut out = Vec::new();
        for _ in 0..20 {
            sampler.sample(&mut rng, &mut out);
            assert_eq!(out.len(), 3);
            assert!(out.windows(2).all(|w| w[0] < w[1]));
            assert!(out.iter().all(|&f| f < 8));
        }
    }

    #[test]
    fn all_features_when_k_is_n() {
        let sampler = FeatureSampler::new(8, 8);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
        let mut out = Vec::new();
        sampler.sample(&mut rng, &mut out);
        assert_eq!(out, (0..8).collect::<Vec<_>>());
    }
}
