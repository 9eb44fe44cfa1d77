//! Shared helpers for integration tests.
//!
//! Data generators live in `maize_yield::testing`.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use maize_yield::testing::{synthetic_dataset, to_csv};
use maize_yield::{ForestConfig, TrainingDataset, YieldModel};

/// Small, single-threaded forest config.
pub fn quick_forest(n_trees: u32, max_depth: u32) -> ForestConfig {
    ForestConfig::builder()
        .n_trees(n_trees)
        .max_depth(max_depth)
        .n_threads(1)
        .build()
        .unwrap()
}

/// Fit a model on seeded synthetic data.
pub fn trained_model(rows: usize, n_trees: u32, max_depth: u32) -> YieldModel {
    YieldModel::fit(&synthetic_dataset(rows, 0.1, 17), quick_forest(n_trees, max_depth)).unwrap()
}

/// Write a synthetic training CSV into `dir` and return its path.
pub fn write_training_csv(dir: &Path, rows: usize, noise: f64, seed: u64) -> PathBuf {
    write_dataset_csv(dir, &synthetic_dataset(rows, noise, seed))
}

/// Write `dataset` as `maize_yield.csv` in `dir` and return its path.
pub fn write_dataset_csv(dir: &Path, dataset: &TrainingDataset) -> PathBuf {
    let path = dir.join("maize_yield.csv");
    std::fs::write(&path, to_csv(dataset)).unwrap();
    path
}
