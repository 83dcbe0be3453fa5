//! Acceptance-criteria evaluation: the final pass/fail verdict.
//!
//! `evaluate` is a pure function of (criteria, actuals); re-evaluating over
//! the same ledger-derived actuals reproduces the same verdict, which is what
//! makes session exports replayable.

use crate::protocol::{AcceptanceCriterionSpec, Criticality};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Comparator parsed out of a requirement string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparator {
    LessEq,
    GreaterEq,
    Less,
    Greater,
    Equal,
}

impl Comparator {
    pub fn holds(&self, actual: f64, threshold: f64) -> bool {
        match self {
            Comparator::LessEq => actual <= threshold,
            Comparator::GreaterEq => actual >= threshold,
            Comparator::Less => actual < threshold,
            Comparator::Greater => actual > threshold,
            Comparator::Equal => (actual - threshold).abs() < 1e-9,
        }
    }
}

/// Parse a numeric requirement such as "<=5%", "≥0.70", or "= 0".
///
/// A trailing `%` is cosmetic: actuals for percentage criteria are already
/// expressed in percent.
pub fn parse_requirement(requirement: &str) -> Option<(Comparator, f64)> {
    let s = requirement.trim();
    let (comparator, rest) = if let Some(r) = s.strip_prefix("<=").or_else(|| s.strip_prefix('≤')) {
        (Comparator::LessEq, r)
    } else if let Some(r) = s.strip_prefix(">=").or_else(|| s.strip_prefix('≥')) {
        (Comparator::GreaterEq, r)
    } else if let Some(r) = s.strip_prefix("==") {
        (Comparator::Equal, r)
    } else if let Some(r) = s.strip_prefix('<') {
        (Comparator::Less, r)
    } else if let Some(r) = s.strip_prefix('>') {
        (Comparator::Greater, r)
    } else if let Some(r) = s.strip_prefix('=') {
        (Comparator::Equal, r)
    } else {
        return None;
    };
    let threshold: f64 = rest.trim().trim_end_matches('%').trim().parse().ok()?;
    Some((comparator, threshold))
}

/// One criterion after evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionOutcome {
    pub spec: AcceptanceCriterionSpec,
    pub actual: Option<f64>,
    /// None when the actual was absent or the requirement unparseable;
    /// excluded from aggregation either way
    pub passed: Option<bool>,
    pub notes: String,
}

/// Overall verdict plus the per-criterion breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub overall_pass: bool,
    pub criteria: Vec<CriterionOutcome>,
    /// Parameters of every criterion with `passed = Some(false)`, any severity
    pub failed_criteria: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Evaluate every criterion against the final actuals.
///
/// Aggregation is Critical-only: a failed Major or Minor criterion is
/// recorded and generates a recommendation but does not by itself flip the
/// overall verdict. A criterion whose parameter is absent from `actuals`
/// stays unevaluated.
pub fn evaluate(
    criteria: &[AcceptanceCriterionSpec],
    actuals: &BTreeMap<String, f64>,
) -> EvaluationResult {
    let mut outcomes = Vec::with_capacity(criteria.len());
    let mut failed = Vec::new();
    let mut recommendations = Vec::new();
    let mut overall_pass = true;

    for spec in criteria {
        let outcome = match actuals.get(&spec.parameter) {
            None => CriterionOutcome {
                spec: spec.clone(),
                actual: None,
                passed: None,
                notes: "no measured value".to_string(),
            },
            Some(&actual) => match parse_requirement(&spec.requirement) {
                None => CriterionOutcome {
                    spec: spec.clone(),
                    actual: Some(actual),
                    passed: None,
                    notes: format!("unparseable requirement '{}'", spec.requirement),
                },
                Some((comparator, threshold)) => {
                    let passed = comparator.holds(actual, threshold);
                    CriterionOutcome {
                        spec: spec.clone(),
                        actual: Some(actual),
                        passed: Some(passed),
                        notes: format!("{} against '{}'", actual, spec.requirement),
                    }
                }
            },
        };

        if outcome.passed == Some(false) {
            failed.push(spec.parameter.clone());
            if let Some(r) = recommendation_for(&spec.parameter) {
                if !recommendations.contains(&r) {
                    recommendations.push(r);
                }
            }
            if spec.criticality == Criticality::Critical {
                overall_pass = false;
            }
        }
        outcomes.push(outcome);
    }

    EvaluationResult { overall_pass, criteria: outcomes, failed_criteria: failed, recommendations }
}

/// Rule-based follow-up advice keyed by the failed parameter's category.
fn recommendation_for(parameter: &str) -> Option<String> {
    let p = parameter.to_lowercase();
    let advice = if p.contains("power") || p.contains("degradation") || p.contains("pmax") {
        "Perform EL imaging to inspect for cell cracks and interconnect damage"
    } else if p.contains("fill_factor") || p.contains("ff") {
        "Inspect for cell cracks and hot spots; check series resistance"
    } else if p.contains("insulation") || p.contains("wet_leakage") {
        "Check junction box sealing and edge encapsulation for moisture ingress"
    } else if p.contains("visual") || p.contains("defect") {
        "Document defects photographically and compare against initial inspection"
    } else if p.contains("yellow") || p.contains("color") || p.contains("transmittance") {
        "Assess encapsulant discoloration; verify UV dose and lamp calibration"
    } else if p.contains("corrosion") || p.contains("creepage") {
        "Examine busbars and frame grounding points for corrosion products"
    } else {
        return None;
    };
    Some(advice.to_string())
}
