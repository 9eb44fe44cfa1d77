//! Feature schema shared by training, persistence and inference.
//!
//! The order of [`FEATURES`] is the column order of every feature matrix in
//! this crate, the split-index space of every tree, and the order in which
//! attributions are reported. It is defined here and nowhere else.

use std::collections::HashMap;
use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of input features.
pub const N_FEATURES: usize = 8;

/// Static description of one input feature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureSpec {
    /// Canonical column / field name.
    pub name: &'static str,
    /// Alternative column names accepted when loading training data.
    pub aliases: &'static [&'static str],
    /// Unit, for display.
    pub unit: &'static str,
    /// Documented input range at the inference boundary (advisory).
    pub min: f64,
    pub max: f64,
}

impl FeatureSpec {
    /// Documented input range.
    pub fn range(&self) -> RangeInclusive<f64> {
        self.min..=self.max
    }

    /// Returns true if `name` is the canonical name or one of the aliases.
    pub fn matches(&self, name: &str) -> bool {
        self.name == name || self.aliases.contains(&name)
    }
}

/// The fixed feature order.
pub static FEATURES: [FeatureSpec; N_FEATURES] = [
    FeatureSpec {
        name: "vegetation_index",
        aliases: &["ndvi_peak", "ndvi"],
        unit: "",
        min: 0.2,
        max: 0.9,
    },
    FeatureSpec {
        name: "rainfall_60d",
        aliases: &["rain_cum_60d"],
        unit: "mm",
        min: 100.0,
        max: 800.0,
    },
    FeatureSpec {
        name: "mean_temp",
        aliases: &["temp_mean"],
        unit: "°C",
        min: 15.0,
        max: 32.0,
    },
    FeatureSpec {
        name: "soil_ph",
        aliases: &[],
        unit: "",
        min: 4.5,
        max: 8.0,
    },
    FeatureSpec {
        name: "soil_organic_carbon",
        aliases: &["soc"],
        unit: "%",
        min: 0.3,
        max: 3.0,
    },
    FeatureSpec {
        name: "elevation",
        aliases: &[],
        unit: "m",
        min: 200.0,
        max: 3000.0,
    },
    FeatureSpec {
        name: "slope",
        aliases: &[],
        unit: "°",
        min: 0.0,
        max: 45.0,
    },
    FeatureSpec {
        name: "planting_day_of_year",
        aliases: &["planting_doy"],
        unit: "day",
        min: 110.0,
        max: 150.0,
    },
];

/// Canonical feature names in schema order.
pub fn feature_names() -> impl Iterator<Item = &'static str> {
    FEATURES.iter().map(|f| f.name)
}

/// Schema index of a canonical feature name (aliases are not accepted here).
pub fn feature_index(name: &str) -> Option<usize> {
    FEATURES.iter().position(|f| f.name == name)
}

/// Owned copy of the feature names, as stored in model metadata.
pub fn feature_name_vec() -> Vec<String> {
    feature_names().map(str::to_owned).collect()
}

// =============================================================================
// SchemaError
// =============================================================================

/// A feature vector does not match [`FEATURES`].
///
/// Recoverable by the caller: reject the request, keep serving.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("missing required feature `{0}`")]
    MissingField(&'static str),

    #[error("unknown feature `{0}`")]
    UnknownField(String),

    #[error("feature `{field}` must be a finite number, got {value}")]
    NonFinite { field: &'static str, value: f64 },

    #[error("expected {expected} feature values, got {actual}")]
    WrongLength { expected: usize, actual: usize },
}

// =============================================================================
// FeatureVector
// =============================================================================

/// One farm-plot observation: all eight features, in schema order.
///
/// A `FeatureVector` is complete and finite by construction, so `predict` and
/// `explain` never have to re-validate it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "HashMap<String, f64>", into = "HashMap<String, f64>")]
pub struct FeatureVector {
    values: [f64; N_FEATURES],
}

impl FeatureVector {
    /// Build from values in schema order.
    pub fn new(values: [f64; N_FEATURES]) -> Result<Self, SchemaError> {
        for (spec, &value) in FEATURES.iter().zip(values.iter()) {
            if !value.is_finite() {
                return Err(SchemaError::NonFinite { field: spec.name, value });
            }
        }
        Ok(Self { values })
    }

    /// Wrap values already known to be finite (dataset rows).
    pub(crate) fn from_finite(values: [f64; N_FEATURES]) -> Self {
        debug_assert!(values.iter().all(|v| v.is_finite()));
        Self { values }
    }

    /// Build from a slice in schema order.
    pub fn from_slice(values: &[f64]) -> Result<Self, SchemaError> {
        let values: [f64; N_FEATURES] =
            values.try_into().map_err(|_| SchemaError::WrongLength {
                expected: N_FEATURES,
                actual: values.len(),
            })?;
        Self::new(values)
    }

    /// Build from a name → value mapping.
    ///
    /// Every canonical name must be present and no other key is allowed.
    pub fn from_map<'a, I, K>(fields: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = (K, &'a f64)>,
        K: AsRef<str>,
    {
        let mut values = [f64::NAN; N_FEATURES];
        let mut seen = [false; N_FEATURES];
        for (name, &value) in fields {
            let name = name.as_ref();
            let idx = feature_index(name).ok_or_else(|| SchemaError::UnknownField(name.to_owned()))?;
            values[idx] = value;
            seen[idx] = true;
        }
        if let Some(idx) = seen.iter().position(|s| !s) {
            return Err(SchemaError::MissingField(FEATURES[idx].name));
        }
        Self::new(values)
    }

    /// Values in schema order.
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Value of feature `idx`.
    #[inline]
    pub fn get(&self, idx: usize) -> f64 {
        self.values[idx]
    }

    /// Value by canonical name.
    pub fn value(&self, name: &str) -> Option<f64> {
        feature_index(name).map(|i| self.values[i])
    }

    /// `(name, value)` pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        FEATURES.iter().zip(self.values.iter()).map(|(f, &v)| (f.name, v))
    }

    /// Features whose value lies outside the documented range.
    pub fn out_of_range(&self) -> Vec<&'static str> {
        FEATURES
            .iter()
            .zip(self.values.iter())
            .filter(|(spec, v)| !spec.range().contains(*v))
            .map(|(spec, _)| spec.name)
            .collect()
    }
}

impl TryFrom<HashMap<String, f64>> for FeatureVector {
    type Error = SchemaError;

    fn try_from(map: HashMap<String, f64>) -> Result<Self, Self::Error> {
        Self::from_map(map.iter())
    }
}

impl From<FeatureVector> for HashMap<String, f64> {
    fn from(fv: FeatureVector) -> Self {
        fv.iter().map(|(k, v)| (k.to_owned(), v)).collect()
    }
}

impl fmt::Display for FeatureVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}: {value}")?;
        }
        write!(f, "}}")
    }
}
