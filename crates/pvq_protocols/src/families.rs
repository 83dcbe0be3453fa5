//! Protocol family capabilities.
//!
//! The ~20 concrete protocols fall into four families that share setup
//! validation, a standard phase skeleton, and the way final actuals are
//! derived from the ledger before acceptance evaluation. A family is a
//! capability implementation, not a base class: protocols pick one and stay
//! thin configuration.

use pvq_core::protocol::{ParamValue, PhaseSpec, ProtocolDefinition, StepSpec};
use pvq_core::session::TestSession;
use pvq_core::stats::{degradation_rate, retention, DegradationRate};
use pvq_core::{EngineError, Result};
use std::collections::BTreeMap;

pub const TABLE_BASELINE: &str = "baseline_electrical";
pub const TABLE_FINAL: &str = "final_electrical";
pub const TABLE_VISUAL: &str = "visual_inspection";

/// Capabilities a protocol family contributes on top of the generic engine
pub trait ProtocolFamily {
    fn name(&self) -> &'static str;

    /// Family-specific setup validation, layered on the parameter-table
    /// checks the definition itself performs.
    fn validate_setup(
        &self,
        definition: &ProtocolDefinition,
        setup: &BTreeMap<String, ParamValue>,
    ) -> Result<()> {
        definition.validate_setup(setup)
    }

    /// The standard phase skeleton for protocols of this family. Builders
    /// splice their stress steps into the middle phase.
    fn phase_skeleton(&self, stress_phase: PhaseSpec) -> Vec<PhaseSpec> {
        vec![baseline_phase(), stress_phase, final_phase()]
    }

    /// Derive the actuals fed into acceptance evaluation from the session
    /// ledger. The default covers electrical retention/degradation; families
    /// extend it.
    fn derived_actuals(&self, session: &TestSession) -> BTreeMap<String, f64> {
        electrical_actuals(session)
    }
}

pub fn baseline_phase() -> PhaseSpec {
    PhaseSpec::new(
        "baseline",
        "Baseline Characterization",
        vec![
            StepSpec::new("visual_initial", "visual_inspection", "Initial visual inspection"),
            StepSpec::new("iv_initial", "iv_measurement", "Initial I-V characterization at STC"),
        ],
    )
}

pub fn final_phase() -> PhaseSpec {
    PhaseSpec::new(
        "final",
        "Final Characterization",
        vec![
            StepSpec::new("visual_final", "visual_inspection", "Final visual inspection"),
            StepSpec::new("iv_final", "iv_measurement", "Final I-V characterization at STC"),
            StepSpec::new("insulation_final", "insulation_test", "Final insulation resistance test"),
        ],
    )
}

/// Retention and degradation for every electrical parameter measured in both
/// the baseline and final tables, plus the final values themselves.
pub fn electrical_actuals(session: &TestSession) -> BTreeMap<String, f64> {
    let mut actuals = BTreeMap::new();
    for parameter in ["pmax", "voc", "isc", "fill_factor", "insulation_resistance"] {
        let baseline = session.ledger.values(TABLE_BASELINE, parameter);
        let final_values = session.ledger.values(TABLE_FINAL, parameter);
        if let Some(&final_value) = final_values.last() {
            actuals.insert(parameter.to_string(), final_value);
            if let Some(&initial) = baseline.first() {
                let ret = retention(initial, final_value);
                actuals.insert(format!("{}_retention", parameter), ret);
                if parameter == "pmax" {
                    actuals.insert("power_degradation".to_string(), 100.0 - ret);
                }
            }
        }
    }
    let defects = session.ledger.values(TABLE_VISUAL, "defect_count");
    if let Some(&count) = defects.last() {
        actuals.insert("visual_defects".to_string(), count);
    }
    log::debug!("derived {} electrical actuals from ledger", actuals.len());
    actuals
}

/// STC and hot-spot performance protocols
pub struct PerformanceFamily;

impl ProtocolFamily for PerformanceFamily {
    fn name(&self) -> &'static str {
        "performance"
    }
}

/// Chamber-driven environmental stress protocols
pub struct EnvironmentalFamily;

impl ProtocolFamily for EnvironmentalFamily {
    fn name(&self) -> &'static str {
        "environmental"
    }

    /// Environmental runs demand an explicit chamber setpoint; a default
    /// silently pulled from the definition has caused wrong-profile runs.
    fn validate_setup(
        &self,
        definition: &ProtocolDefinition,
        setup: &BTreeMap<String, ParamValue>,
    ) -> Result<()> {
        definition.validate_setup(setup)?;
        for required in definition.parameters.keys() {
            if required.starts_with("chamber_") && !setup.contains_key(required) {
                return Err(EngineError::Validation(format!(
                    "environmental protocols require explicit '{}'",
                    required
                )));
            }
        }
        Ok(())
    }
}

/// Static and dynamic mechanical load protocols
pub struct MechanicalFamily;

impl ProtocolFamily for MechanicalFamily {
    fn name(&self) -> &'static str {
        "mechanical"
    }

    fn derived_actuals(&self, session: &TestSession) -> BTreeMap<String, f64> {
        let mut actuals = electrical_actuals(session);
        // Mechanical tests record residual deflection after load removal
        if let Some(&deflection) = session.ledger.values("mechanical", "residual_deflection").last()
        {
            actuals.insert("residual_deflection".to_string(), deflection);
        }
        actuals
    }
}

/// Long-exposure degradation protocols (UV dose, yellowing)
pub struct DegradationFamily;

impl ProtocolFamily for DegradationFamily {
    fn name(&self) -> &'static str {
        "degradation"
    }

    fn derived_actuals(&self, session: &TestSession) -> BTreeMap<String, f64> {
        let mut actuals = electrical_actuals(session);
        // Degradation protocols additionally evaluate the trend over the
        // whole exposure, not just the endpoints
        if let DegradationRate::PercentPerHour(rate) =
            degradation_rate(&session.ledger.series("pmax"))
        {
            actuals.insert("pmax_degradation_rate".to_string(), rate);
        }
        if let Some(&yi) = session.ledger.values("optical", "yellowness_index").last() {
            actuals.insert("yellowness_index".to_string(), yi);
        }
        actuals
    }
}
