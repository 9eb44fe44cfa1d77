//! Attribution properties on trained forests.

mod common;

use std::collections::HashMap;
use std::sync::OnceLock;

use approx::assert_abs_diff_eq;
use proptest::prelude::*;

use maize_yield::testing::{path_dependent_shapley, random_feature_vector};
use maize_yield::{FeatureVector, SchemaError, YieldModel, FEATURES, N_FEATURES};

use common::trained_model;

fn shared_model() -> &'static YieldModel {
    static MODEL: OnceLock<YieldModel> = OnceLock::new();
    MODEL.get_or_init(|| trained_model(200, 15, 6))
}

fn in_range(unit: &[f64]) -> FeatureVector {
    let mut values = [0.0; N_FEATURES];
    for ((v, u), spec) in values.iter_mut().zip(unit).zip(FEATURES.iter()) {
        *v = spec.min + u * (spec.max - spec.min);
    }
    FeatureVector::new(values).unwrap()
}

proptest! {
    #[test]
    fn contributions_sum_to_prediction(unit in proptest::collection::vec(0.0f64..1.0, N_FEATURES)) {
        let model = shared_model();
        let x = in_range(&unit);
        let attribution = model.explain(&x);
        prop_assert_eq!(attribution.contributions.len(), N_FEATURES);
        prop_assert!((attribution.prediction - model.predict(&x)).abs() < 1e-12);
        prop_assert!(attribution.additivity_gap() < 1e-9);
    }

    #[test]
    fn out_of_range_inputs_still_explain(unit in proptest::collection::vec(-2.0f64..3.0, N_FEATURES)) {
        let model = shared_model();
        let attribution = model.explain(&in_range(&unit));
        prop_assert!(attribution.additivity_gap() < 1e-9);
    }
}

#[test]
fn matches_brute_force_shapley() {
    let model = trained_model(80, 4, 4);
    for seed in 0..4 {
        let x = random_feature_vector(seed);
        let expected = path_dependent_shapley(model.forest(), x.as_slice());
        let attribution = model.explain(&x);
        for (c, e) in attribution.contributions.iter().zip(&expected) {
            assert_abs_diff_eq!(c.value, *e, epsilon = 1e-9);
        }
    }
}

#[test]
fn baseline_is_training_expectation() {
    let model = shared_model();
    let x = random_feature_vector(11);
    let attribution = model.explain(&x);
    assert_abs_diff_eq!(attribution.baseline, model.baseline(), epsilon = 1e-12);
    // baseline is independent of the input
    assert_eq!(model.explain(&random_feature_vector(12)).baseline, attribution.baseline);
}

#[test]
fn explain_is_deterministic() {
    let x = random_feature_vector(5);
    let a = trained_model(100, 8, 5).explain(&x);
    let b = trained_model(100, 8, 5).explain(&x);
    assert_eq!(a, b);
}

#[test]
fn unused_feature_gets_zero() {
    // demo targets ignore every feature but the first two
    let model = YieldModel::demo();
    let importance = model.feature_importance(maize_yield::ImportanceType::Split);
    let x = FeatureVector::new([0.3, 0.8, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5]).unwrap();
    let attribution = model.explain(&x);
    for (c, &splits) in attribution.contributions.iter().zip(importance.values()) {
        if splits == 0.0 {
            assert_eq!(c.value, 0.0, "{}", c.feature);
        }
    }
}

#[test]
fn feature_map_validation() {
    let mut fields: HashMap<String, f64> =
        FEATURES.iter().map(|spec| (spec.name.to_owned(), spec.min)).collect();
    assert!(FeatureVector::try_from(fields.clone()).is_ok());

    fields.remove("slope");
    assert_eq!(FeatureVector::try_from(fields.clone()), Err(SchemaError::MissingField("slope")));

    fields.insert("slope".into(), f64::INFINITY);
    assert!(matches!(
        FeatureVector::try_from(fields.clone()),
        Err(SchemaError::NonFinite { field: "slope", .. })
    ));

    fields.insert("slope".into(), 1.0);
    fields.insert("humidity".into(), 40.0);
    assert_eq!(
        FeatureVector::try_from(fields),
        Err(SchemaError::UnknownField("humidity".into()))
    );

    assert_eq!(
        FeatureVector::from_slice(&[1.0, 2.0]),
        Err(SchemaError::WrongLength { expected: N_FEATURES, actual: 2 })
    );
}
