//! Reproducible region-stratified train/test split.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use tracing::debug;

use super::{DataError, TrainingDataset};

/// Row indices of the two partitions, each in original row order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

impl SplitIndices {
    /// Compute the partition without materialising the datasets.
    ///
    /// For each region, in sorted order, the region's rows are shuffled and
    /// `round(n_region * test_fraction)` of them are moved to the test side.
    /// Regions with a single row always stay in train.
    pub fn stratified(
        regions: &[String],
        test_fraction: f64,
        seed: u64,
    ) -> Result<Self, DataError> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(DataError::InvalidSplit(test_fraction));
        }

        let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (idx, region) in regions.iter().enumerate() {
            groups.entry(region.as_str()).or_default().push(idx);
        }

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let mut is_test = vec![false; regions.len()];
        for (region, mut rows) in groups {
            if rows.len() < 2 {
                continue;
            }
            rows.shuffle(&mut rng);
            let n_test = ((rows.len() as f64) * test_fraction).round() as usize;
            let n_test = n_test.min(rows.len() - 1);
            debug!(region, n_rows = rows.len(), n_test, "stratum");
            for &idx in &rows[..n_test] {
                is_test[idx] = true;
            }
        }

        let (test, train): (Vec<usize>, Vec<usize>) =
            (0..regions.len()).partition(|&i| is_test[i]);
        Ok(Self { train, test })
    }
}

/// Split a dataset into `(train, test)`, stratified by region.
///
/// Fails with [`DataError::InvalidSplit`] unless `0 < test_fraction < 1`, and
/// with [`DataError::Empty`] if either side ends up empty.
pub fn stratified_split(
    dataset: &TrainingDataset,
    test_fraction: f64,
    seed: u64,
) -> Result<(TrainingDataset, TrainingDataset), DataError> {
    let SplitIndices { train, test } =
        SplitIndices::stratified(dataset.regions(), test_fraction, seed)?;
    Ok((dataset.select(&train)?, dataset.select(&test)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn regions(spec: &[(&str, usize)]) -> Vec<String> {
        // Interleave regions so the original order is not grouped.
        let mut out = Vec::new();
        let max = spec.iter().map(|s| s.1).max().unwrap_or(0);
        for i in 0..max {
            for &(name, n) in spec {
                if i < n {
                    out.push(name.to_string());
                }
            }
        }
        out
    }

    #[test]
    fn same_seed_same_partition() {
        let r = regions(&[("kenya", 30), ("malawi", 20), ("zambia", 11)]);
        let a = SplitIndices::stratified(&r, 0.2, 7).unwrap();
        let b = SplitIndices::stratified(&r, 0.2, 7).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_seed_changes_partition() {
        let r = regions(&[("kenya", 50), ("malawi", 50)]);
        let a = SplitIndices::stratified(&r, 0.3, 1).unwrap();
        let b = SplitIndices::stratified(&r, 0.3, 2).unwrap();
        assert_ne!(a.test, b.test);
    }

    #[test]
    fn each_region_contributes_its_share() {
        let r = regions(&[("kenya", 30), ("malawi", 20), ("zambia", 10)]);
        let split = SplitIndices::stratified(&r, 0.2, 42).unwrap();
        let count = |name: &str| split.test.iter().filter(|&&i| r[i] == name).count();
        assert_eq!(count("kenya"), 6);
        assert_eq!(count("malawi"), 4);
        assert_eq!(count("zambia"), 2);
        assert_eq!(split.train.len() + split.test.len(), 60);
    }

    #[test]
    fn partitions_keep_original_order_and_are_disjoint() {
        let r = regions(&[("a", 9), ("b", 7)]);
        let split = SplitIndices::stratified(&r, 0.4, 3).unwrap();
        assert!(split.train.windows(2).all(|w| w[0] < w[1]));
        assert!(split.test.windows(2).all(|w| w[0] < w[1]));
        let mut all: Vec<_> = split.train.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..r.len()).collect::<Vec<_>>());
    }

    #[test]
    fn singleton_region_stays_in_train() {
        let r = regions(&[("big", 10), ("lonely", 1)]);
        let split = SplitIndices::stratified(&r, 0.5, 0).unwrap();
        let lonely = r.iter().position(|x| x == "lonely").unwrap();
        assert!(split.train.contains(&lonely));
    }

    #[rstest]
    #[case(0.0)]
    #[case(1.0)]
    #[case(-0.1)]
    #[case(f64::NAN)]
    fn rejects_invalid_fraction(#[case] fraction: f64) {
        let r = regions(&[("a", 10)]);
        assert!(matches!(
            SplitIndices::stratified(&r, fraction, 0),
            Err(DataError::InvalidSplit(_))
        ));
    }
}
