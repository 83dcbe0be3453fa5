//! Quality-control rule checks over ledger slices.
//!
//! Every check is a pure function: identical inputs always produce identical
//! outputs, which is what makes the QC history reproducible for audit. A
//! failed check is a normal result value (`passed = false`), never an error;
//! the protocol driver decides whether to abort, alert, or flag. Too few
//! points to compute a statistic is "insufficient data", which passes.

use crate::stats::{mean, quartiles, sample_std};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outlier screening method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutlierMethod {
    /// Flag values outside `[Q1 - k*IQR, Q3 + k*IQR]`
    Iqr,
    /// Flag values with `|z| > threshold`
    ZScore,
}

/// Outcome of one QC check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QcCheckResult {
    pub check_id: String,
    pub passed: bool,
    /// Computed statistics by name (e.g. "cv", "max_deviation")
    pub stats: BTreeMap<String, f64>,
    /// Indices of flagged values, outlier checks only
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flagged: Vec<usize>,
    pub message: String,
}

impl QcCheckResult {
    fn new(check_id: &str, passed: bool, message: String) -> Self {
        Self {
            check_id: check_id.to_string(),
            passed,
            stats: BTreeMap::new(),
            flagged: Vec::new(),
            message,
        }
    }

    fn with_stat(mut self, name: &str, value: f64) -> Self {
        self.stats.insert(name.to_string(), value);
        self
    }

    pub fn stat(&self, name: &str) -> Option<f64> {
        self.stats.get(name).copied()
    }
}

/// Repeatability check: coefficient of variation against a limit.
///
/// CV = sample std / mean (ddof = 1), 0 when the mean is 0. Below 2 points
/// there is nothing to compare, so the check passes with no `cv` statistic.
pub fn check_repeatability(values: &[f64], max_cv: f64) -> QcCheckResult {
    if values.len() < 2 {
        return QcCheckResult::new(
            "repeatability",
            true,
            format!("insufficient data ({} points)", values.len()),
        );
    }
    let m = mean(values).unwrap_or(0.0);
    let s = sample_std(values).unwrap_or(0.0);
    let cv = if m == 0.0 { 0.0 } else { (s / m).abs() };
    let passed = cv <= max_cv;
    QcCheckResult::new(
        "repeatability",
        passed,
        format!("CV {:.5} vs limit {:.5}", cv, max_cv),
    )
    .with_stat("cv", cv)
    .with_stat("mean", m)
    .with_stat("std", s)
}

/// Stability check: maximum absolute deviation of any reading from the series
/// mean, or from a fixed target when the rule specifies one.
pub fn check_stability(readings: &[f64], target: Option<f64>, max_deviation: f64) -> QcCheckResult {
    if readings.is_empty() {
        return QcCheckResult::new("stability", true, "insufficient data (0 readings)".to_string());
    }
    let reference = match target {
        Some(t) => t,
        None => mean(readings).unwrap_or(0.0),
    };
    let max_dev = readings
        .iter()
        .map(|r| (r - reference).abs())
        .fold(0.0, f64::max);
    let passed = max_dev <= max_deviation;
    QcCheckResult::new(
        "stability",
        passed,
        format!("max deviation {:.4} from {:.4} vs limit {:.4}", max_dev, reference, max_deviation),
    )
    .with_stat("max_deviation", max_dev)
    .with_stat("reference", reference)
}

/// Data completeness: fraction of expected records actually collected.
/// Defined as 1.0 when nothing was expected.
pub fn check_completeness(expected: usize, actual: usize, min_completeness: f64) -> QcCheckResult {
    let completeness = if expected == 0 { 1.0 } else { actual as f64 / expected as f64 };
    let passed = completeness >= min_completeness;
    QcCheckResult::new(
        "completeness",
        passed,
        format!("{}/{} records ({:.1}%)", actual, expected, completeness * 100.0),
    )
    .with_stat("completeness", completeness)
}

/// Outlier screening via IQR fences or z-scores.
///
/// Requires at least 4 points; below that the result is an
/// insufficient-data pass with nothing flagged. Flagged indices refer to
/// positions in the input slice, so rerunning on the same input reproduces
/// the same flags.
pub fn detect_outliers(values: &[f64], method: OutlierMethod, threshold: f64) -> QcCheckResult {
    if values.len() < 4 {
        return QcCheckResult::new(
            "outliers",
            true,
            format!("insufficient data ({} points)", values.len()),
        );
    }

    let flagged: Vec<usize> = match method {
        OutlierMethod::Iqr => {
            // quartiles() requires >= 4 points, which is guaranteed here
            let (q1, q3) = match quartiles(values) {
                Some(q) => q,
                None => return QcCheckResult::new("outliers", true, "insufficient data".to_string()),
            };
            let iqr = q3 - q1;
            let lo = q1 - threshold * iqr;
            let hi = q3 + threshold * iqr;
            values
                .iter()
                .enumerate()
                .filter(|&(_, &v)| v < lo || v > hi)
                .map(|(i, _)| i)
                .collect()
        }
        OutlierMethod::ZScore => {
            let m = mean(values).unwrap_or(0.0);
            let s = sample_std(values).unwrap_or(0.0);
            if s == 0.0 {
                Vec::new()
            } else {
                values
                    .iter()
                    .enumerate()
                    .filter(|&(_, &v)| ((v - m) / s).abs() > threshold)
                    .map(|(i, _)| i)
                    .collect()
            }
        }
    };

    let passed = flagged.is_empty();
    let count = flagged.len();
    let mut result = QcCheckResult::new(
        "outliers",
        passed,
        format!("{} outlier(s) in {} values", count, values.len()),
    )
    .with_stat("outlier_count", count as f64);
    result.flagged = flagged;
    result
}
