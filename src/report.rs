//! Caller-side reporting on top of raw predictions and attributions.
//!
//! The model only returns numbers. Turning them into a food-security tier and
//! a short list of drivers is policy, kept here so it can change without
//! touching the engine.

use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::explainability::{AttributionResult, Contribution};

/// Yields below this are high risk, t/ha.
pub const HIGH_RISK_BELOW: f64 = 1.2;
/// Yields below this (and not high risk) are medium risk, t/ha.
pub const MEDIUM_RISK_BELOW: f64 = 1.8;
/// Contributions at or below this magnitude are not reported as drivers.
pub const DEFAULT_DRIVER_THRESHOLD: f64 = 0.1;

/// A report could not be exported.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to create {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write CSV {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Food-security risk implied by a predicted yield.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskTier {
    High,
    Medium,
    Low,
}

impl RiskTier {
    pub fn from_yield(yield_t_ha: f64) -> Self {
        if yield_t_ha < HIGH_RISK_BELOW {
            RiskTier::High
        } else if yield_t_ha < MEDIUM_RISK_BELOW {
            RiskTier::Medium
        } else {
            RiskTier::Low
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RiskTier::High => "High",
            RiskTier::Medium => "Medium",
            RiskTier::Low => "Low",
        };
        f.write_str(name)
    }
}

/// One exported forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastReport {
    /// Caller-supplied timestamp, e.g. `2024-05-01 10:30`.
    pub date: String,
    pub predicted_yield: f64,
    pub risk: RiskTier,
    /// Contributions above the threshold, largest magnitude first.
    pub drivers: Vec<Contribution>,
}

/// Flat CSV row of a [`ForecastReport`].
#[derive(Serialize)]
struct ReportRow<'a> {
    #[serde(rename = "Prediction Date")]
    date: &'a str,
    #[serde(rename = "Predicted Yield (t/ha)")]
    predicted_yield: String,
    #[serde(rename = "Food Security Risk")]
    risk: RiskTier,
    #[serde(rename = "Key Drivers")]
    drivers: String,
}

impl ForecastReport {
    /// Build a report keeping drivers with `|contribution| > threshold`.
    pub fn new(date: impl Into<String>, attribution: &AttributionResult, threshold: f64) -> Self {
        let drivers = attribution
            .by_magnitude()
            .into_iter()
            .filter(|c| c.value.abs() > threshold)
            .cloned()
            .collect();
        Self {
            date: date.into(),
            predicted_yield: attribution.prediction,
            risk: RiskTier::from_yield(attribution.prediction),
            drivers,
        }
    }

    /// `name: +0.42, name: -0.13`.
    pub fn drivers_summary(&self) -> String {
        self.drivers
            .iter()
            .map(|c| format!("{}: {:+.2}", c.feature, c.value))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Write the report as a headed single-row CSV.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut out = csv::Writer::from_writer(writer);
        out.serialize(ReportRow {
            date: &self.date,
            predicted_yield: format!("{:.2}", self.predicted_yield),
            risk: self.risk,
            drivers: self.drivers_summary(),
        })?;
        out.flush()?;
        Ok(())
    }

    /// Write the CSV to `path`, replacing any existing file.
    pub fn export_csv(&self, path: impl AsRef<Path>) -> Result<(), ReportError> {
        let path = path.as_ref();
        let file = File::create(path)
            .map_err(|source| ReportError::Io { path: path.to_owned(), source })?;
        self.write_csv(file)
            .map_err(|source| ReportError::Csv { path: path.to_owned(), source })?;
        info!(path = %path.display(), risk = %self.risk, "exported forecast report");
        Ok(())
    }
}

/// MAE as a percentage of the mean observed yield. `None` unless the mean is
/// positive.
pub fn mae_to_percentage_error(mae: f64, mean_yield: f64) -> Option<f64> {
    (mean_yield > 0.0).then(|| mae / mean_yield * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rstest::rstest;

    #[rstest]
    #[case(0.4, RiskTier::High)]
    #[case(1.19, RiskTier::High)]
    #[case(1.2, RiskTier::Medium)]
    #[case(1.79, RiskTier::Medium)]
    #[case(1.8, RiskTier::Low)]
    #[case(4.0, RiskTier::Low)]
    fn risk_tiers(#[case] yield_t_ha: f64, #[case] expected: RiskTier) {
        assert_eq!(RiskTier::from_yield(yield_t_ha), expected);
    }

    fn attribution() -> AttributionResult {
        let values = [0.5, -0.8, 0.05, 0.1, -0.11, 0.0, 0.0, 0.0];
        AttributionResult::from_values(2.0, &values, 2.0 + values.iter().sum::<f64>())
    }

    #[test]
    fn drivers_are_filtered_and_sorted() {
        let report = ForecastReport::new("2024-05-01 10:30", &attribution(), DEFAULT_DRIVER_THRESHOLD);
        let names: Vec<_> = report.drivers.iter().map(|c| c.feature.as_str()).collect();
        assert_eq!(names, vec!["rainfall_60d", "vegetation_index", "soil_organic_carbon"]);
        assert_eq!(report.risk, RiskTier::Medium);
        assert_eq!(
            report.drivers_summary(),
            "rainfall_60d: -0.80, vegetation_index: +0.50, soil_organic_carbon: -0.11"
        );
    }

    #[test]
    fn csv_export() {
        let report = ForecastReport::new("2024-05-01", &attribution(), 0.6);
        let mut buf = Vec::new();
        report.write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("Prediction Date,Predicted Yield (t/ha),Food Security Risk,Key Drivers")
        );
        assert_eq!(lines.next(), Some("2024-05-01,1.74,Medium,rainfall_60d: -0.80"));
    }

    #[test]
    fn export_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forecast.csv");
        let report = ForecastReport::new("2024-05-01", &attribution(), 0.6);
        report.export_csv(&path).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][2], "Medium");
        assert_eq!(&rows[0][3], "rainfall_60d: -0.80");
    }

    #[test]
    fn export_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent").join("forecast.csv");
        let report = ForecastReport::new("2024-05-01", &attribution(), 0.6);
        assert!(matches!(report.export_csv(&path), Err(ReportError::Io { .. })));
    }

    #[test]
    fn percentage_error() {
        assert_abs_diff_eq!(mae_to_percentage_error(0.3, 2.0).unwrap(), 15.0);
        assert_eq!(mae_to_percentage_error(0.3, 0.0), None);
    }
}
