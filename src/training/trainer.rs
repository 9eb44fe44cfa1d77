//! Bagged forest trainer.

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use thiserror::Error;
use tracing::{debug, info};

use super::config::{ConfigError, ForestConfig};
use super::grower::{GrowerParams, TreeGrower};
use super::sampling::{tree_seed, FeatureSampler, RowSampler};
use crate::data::TrainingDataset;
use crate::repr::{Forest, Tree};
use crate::utils::{run_with_threads, Parallelism};

/// Training failed before any tree was produced.
#[derive(Debug, Error)]
pub enum TrainError {
    #[error("invalid forest config: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to create thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Trains a [`Forest`] from a [`TrainingDataset`].
///
/// Each tree is grown from its own RNG seeded with
/// [`tree_seed`]`(config.seed, tree_idx)`, so the result is identical for any
/// `n_threads`.
#[derive(Debug, Clone)]
pub struct ForestTrainer {
    config: ForestConfig,
}

impl ForestTrainer {
    pub fn new(config: ForestConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    /// Train the forest.
    pub fn train(&self, dataset: &TrainingDataset) -> Result<Forest, TrainError> {
        self.config.validate()?;
        let forest = run_with_threads(self.config.n_threads, |parallelism| {
            self.grow_forest(dataset, parallelism)
        })?;
        Ok(forest)
    }

    /// Grow every tree under an already-installed pool. The config must be
    /// valid.
    pub(crate) fn grow_forest(&self, dataset: &TrainingDataset, parallelism: Parallelism) -> Forest {
        let config = &self.config;
        let x = dataset.features();
        let y = dataset.targets();
        let n_features = x.ncols();

        let row_sampler = RowSampler::new(dataset.n_samples(), config.subsample, config.bootstrap);
        let k = config.max_features.resolve(n_features);
        let grower = TreeGrower::new(
            GrowerParams {
                max_depth: config.max_depth,
                min_samples_split: config.min_samples_split,
                min_samples_leaf: config.min_samples_leaf,
            },
            FeatureSampler::new(n_features, k),
        );

        info!(
            n_trees = config.n_trees,
            n_samples = dataset.n_samples(),
            sample_size = row_sampler.sample_size(),
            max_features = k,
            max_depth = config.max_depth,
            "training forest"
        );

        let grow_one = |tree_idx: usize| -> Tree {
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(tree_seed(config.seed, tree_idx));
            let rows = row_sampler.sample(&mut rng);
            let tree = grower.grow(x, y, rows, &mut rng);
            debug!(
                tree_idx,
                n_nodes = tree.n_nodes(),
                n_leaves = tree.n_leaves(),
                depth = tree.depth(),
                "grew tree"
            );
            tree
        };

        let n_trees = config.n_trees as usize;
        let trees = parallelism.maybe_par_map(0..n_trees, grow_one);

        let forest = Forest::from_trees(trees, n_features);
        info!(
            n_trees = forest.n_trees(),
            max_depth = forest.max_depth(),
            "forest trained"
        );
        forest
    }
}
