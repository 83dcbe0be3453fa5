//! Statistical analysis over ledger data: retention, degradation-rate
//! regression, summary statistics, and GUM uncertainty budgets.
//!
//! Every function here is a side-effect-free read; none advances protocol
//! state. "Insufficient data" is an expected mid-test condition and is
//! reported as an explicit sentinel value, never an error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Arithmetic mean. `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (ddof = 1). `None` below 2 points.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

/// Median of a slice. `None` for an empty slice.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    if n % 2 == 1 {
        Some(sorted[n / 2])
    } else {
        Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0)
    }
}

/// First and third quartiles by linear interpolation. `None` below 4 points.
pub fn quartiles(values: &[f64]) -> Option<(f64, f64)> {
    if values.len() < 4 {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    Some((percentile_sorted(&sorted, 0.25), percentile_sorted(&sorted, 0.75)))
}

fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    let rank = p * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (rank - lo as f64) * (sorted[hi] - sorted[lo])
    }
}

/// Retention of a parameter after stress, in percent.
///
/// Defined as 0 when `initial == 0` — a dead module has retained nothing,
/// and the boundary must not surface as a division error.
pub fn retention(initial: f64, final_value: f64) -> f64 {
    if initial == 0.0 {
        return 0.0;
    }
    final_value / initial * 100.0
}

/// Degradation-rate regression outcome
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DegradationRate {
    /// Linear rate of change in percent of initial value per hour
    PercentPerHour(f64),
    /// Below 2 distinct time points, or initial value is 0
    NotComputable,
}

impl DegradationRate {
    pub fn value(&self) -> Option<f64> {
        match self {
            DegradationRate::PercentPerHour(v) => Some(*v),
            DegradationRate::NotComputable => None,
        }
    }
}

/// Least-squares degradation rate over a time series, normalized by the
/// initial value (%/hour).
///
/// The series is sorted by time and timestamps are converted to elapsed hours
/// from the first point before fitting a first-degree line.
pub fn degradation_rate(series: &[(DateTime<Utc>, f64)]) -> DegradationRate {
    let mut points = series.to_vec();
    points.sort_by_key(|&(t, _)| t);

    let distinct_times = {
        let mut times: Vec<_> = points.iter().map(|&(t, _)| t).collect();
        times.dedup();
        times.len()
    };
    if distinct_times < 2 {
        return DegradationRate::NotComputable;
    }

    let t0 = points[0].0;
    let initial = points[0].1;
    if initial == 0.0 {
        return DegradationRate::NotComputable;
    }

    let xs: Vec<f64> =
        points.iter().map(|&(t, _)| (t - t0).num_milliseconds() as f64 / 3_600_000.0).collect();
    let ys: Vec<f64> = points.iter().map(|&(_, v)| v).collect();

    let n = xs.len() as f64;
    let sum_x: f64 = xs.iter().sum();
    let sum_y: f64 = ys.iter().sum();
    let sum_xx: f64 = xs.iter().map(|x| x * x).sum();
    let sum_xy: f64 = xs.iter().zip(&ys).map(|(x, y)| x * y).sum();

    let denom = n * sum_xx - sum_x * sum_x;
    if denom == 0.0 {
        return DegradationRate::NotComputable;
    }
    let slope = (n * sum_xy - sum_x * sum_y) / denom;

    DegradationRate::PercentPerHour(slope / initial * 100.0)
}

/// Summary statistics for a value set. Empty input yields `count = 0` and
/// every other field `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SummaryStats {
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub median: Option<f64>,
    /// Coefficient of variation; `None` when the mean is 0
    pub cv: Option<f64>,
}

pub fn summary_stats(values: &[f64]) -> SummaryStats {
    if values.is_empty() {
        return SummaryStats::default();
    }
    let m = mean(values);
    let s = sample_std(values);
    let cv = match (m, s) {
        (Some(m), Some(s)) if m != 0.0 => Some(s / m),
        _ => None,
    };
    SummaryStats {
        count: values.len(),
        mean: m,
        std: s,
        min: Some(values.iter().cloned().fold(f64::INFINITY, f64::min)),
        max: Some(values.iter().cloned().fold(f64::NEG_INFINITY, f64::max)),
        median: median(values),
        cv,
    }
}

/// Classification of an uncertainty contribution per the GUM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UncertaintyType {
    /// Statistical, from repeated observations
    TypeA,
    /// Everything else: calibration certificates, resolution, drift
    TypeB,
}

/// One named uncertainty source, expressed as a fraction of the measured value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UncertaintySource {
    pub name: String,
    pub uncertainty_type: UncertaintyType,
    /// Standard uncertainty as a fraction of the measured value (0.01 = 1%)
    pub relative_standard: f64,
    /// Assumed distribution, e.g. "normal", "rectangular"
    pub distribution: String,
}

impl UncertaintySource {
    pub fn type_a(name: &str, relative_standard: f64) -> Self {
        Self {
            name: name.to_string(),
            uncertainty_type: UncertaintyType::TypeA,
            relative_standard,
            distribution: "normal".to_string(),
        }
    }

    pub fn type_b(name: &str, relative_standard: f64, distribution: &str) -> Self {
        Self {
            name: name.to_string(),
            uncertainty_type: UncertaintyType::TypeB,
            relative_standard,
            distribution: distribution.to_string(),
        }
    }
}

/// GUM uncertainty budget for one measured value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UncertaintyBudget {
    pub value: f64,
    /// Absolute standard uncertainty contributed by each source
    pub components: Vec<(String, f64)>,
    /// Root-sum-square of all components
    pub combined_standard: f64,
    /// Combined standard uncertainty times the coverage factor
    pub expanded: f64,
    pub coverage_factor: f64,
    /// Expanded uncertainty relative to the value, in percent; 0 when the
    /// value itself is 0
    pub relative_percent: f64,
}

/// Coverage factor for ~95 % confidence
pub const COVERAGE_FACTOR_K2: f64 = 2.0;

/// Combine named uncertainty sources into a budget for `value`.
pub fn uncertainty_budget(value: f64, sources: &[UncertaintySource]) -> UncertaintyBudget {
    let components: Vec<(String, f64)> = sources
        .iter()
        .map(|s| (s.name.clone(), (s.relative_standard * value).abs()))
        .collect();
    let combined_standard =
        components.iter().map(|(_, u)| u * u).sum::<f64>().sqrt();
    let expanded = combined_standard * COVERAGE_FACTOR_K2;
    let relative_percent = if value == 0.0 { 0.0 } else { (expanded / value).abs() * 100.0 };
    UncertaintyBudget {
        value,
        components,
        combined_standard,
        expanded,
        coverage_factor: COVERAGE_FACTOR_K2,
        relative_percent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(hours: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + hours * 3600, 0).unwrap()
    }

    #[test]
    fn retention_zero_initial_is_zero() {
        assert_eq!(retention(0.0, 240.0), 0.0);
        assert_eq!(retention(0.0, 0.0), 0.0);
    }

    #[test]
    fn retention_percent() {
        assert!((retention(250.0, 237.5) - 95.0).abs() < 1e-9);
    }

    #[test]
    fn degradation_rate_decreasing_series_is_negative() {
        let series = vec![(ts(0), 250.0), (ts(100), 248.0), (ts(200), 246.0), (ts(300), 244.0)];
        match degradation_rate(&series) {
            DegradationRate::PercentPerHour(rate) => {
                assert!(rate < 0.0);
                // 2 W per 100 h on 250 W initial = -0.008 %/h
                assert!((rate - (-0.008)).abs() < 1e-9);
            }
            DegradationRate::NotComputable => panic!("expected a computable rate"),
        }
    }

    #[test]
    fn degradation_rate_flat_series_is_zero() {
        let series = vec![(ts(0), 250.0), (ts(50), 250.0), (ts(100), 250.0)];
        assert_eq!(degradation_rate(&series), DegradationRate::PercentPerHour(0.0));
    }

    #[test]
    fn degradation_rate_single_point_not_computable() {
        let series = vec![(ts(0), 250.0)];
        assert_eq!(degradation_rate(&series), DegradationRate::NotComputable);
    }

    #[test]
    fn degradation_rate_unsorted_input_matches_sorted() {
        let sorted = vec![(ts(0), 250.0), (ts(10), 249.0), (ts(20), 248.0)];
        let shuffled = vec![(ts(20), 248.0), (ts(0), 250.0), (ts(10), 249.0)];
        assert_eq!(degradation_rate(&sorted), degradation_rate(&shuffled));
    }

    #[test]
    fn degradation_rate_zero_initial_not_computable() {
        let series = vec![(ts(0), 0.0), (ts(10), 1.0)];
        assert_eq!(degradation_rate(&series), DegradationRate::NotComputable);
    }

    #[test]
    fn summary_stats_empty() {
        let stats = summary_stats(&[]);
        assert_eq!(stats.count, 0);
        assert!(stats.mean.is_none());
        assert!(stats.cv.is_none());
    }

    #[test]
    fn summary_stats_basic() {
        let stats = summary_stats(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(stats.count, 5);
        assert_eq!(stats.mean, Some(3.0));
        assert_eq!(stats.median, Some(3.0));
        assert_eq!(stats.min, Some(1.0));
        assert_eq!(stats.max, Some(5.0));
        let std = stats.std.unwrap();
        assert!((std - 1.5811388).abs() < 1e-6);
        assert!((stats.cv.unwrap() - std / 3.0).abs() < 1e-12);
    }

    #[test]
    fn summary_stats_zero_mean_has_no_cv() {
        let stats = summary_stats(&[-1.0, 1.0]);
        assert_eq!(stats.mean, Some(0.0));
        assert!(stats.cv.is_none());
    }

    #[test]
    fn uncertainty_budget_rss_and_expansion() {
        let sources = vec![
            UncertaintySource::type_a("repeatability", 0.003),
            UncertaintySource::type_b("calibration", 0.004, "normal"),
        ];
        let budget = uncertainty_budget(200.0, &sources);
        // components: 0.6 and 0.8 W; RSS = 1.0 W
        assert!((budget.combined_standard - 1.0).abs() < 1e-9);
        assert!((budget.expanded - 2.0).abs() < 1e-9);
        assert!((budget.relative_percent - 1.0).abs() < 1e-9);
        assert_eq!(budget.coverage_factor, 2.0);
    }

    #[test]
    fn uncertainty_budget_zero_value() {
        let sources = vec![UncertaintySource::type_a("repeatability", 0.01)];
        let budget = uncertainty_budget(0.0, &sources);
        assert_eq!(budget.combined_standard, 0.0);
        assert_eq!(budget.relative_percent, 0.0);
    }
}
