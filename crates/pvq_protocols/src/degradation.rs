//! Long-exposure degradation protocols.

use crate::families::{DegradationFamily, ProtocolFamily};
use pvq_core::protocol::{
    AcceptanceCriterionSpec, Criticality, ParamSpec, ParamValue, PhaseSpec, ProtocolDefinition,
    QcThresholds, StepSpec,
};
use std::collections::BTreeMap;

/// YELLOW-001: encapsulant yellowing under extended UV/thermal exposure,
/// tracked by yellowness index and power trend.
pub fn yellow_001() -> ProtocolDefinition {
    let mut parameters = BTreeMap::new();
    parameters.insert(
        "exposure_hours".to_string(),
        ParamSpec::float(500.0, 2000.0, "h").with_default(ParamValue::Float(1000.0)),
    );
    parameters.insert(
        "sample_interval_hours".to_string(),
        ParamSpec::float(50.0, 250.0, "h").with_default(ParamValue::Float(100.0)),
    );
    parameters.insert(
        "chamber_temp".to_string(),
        ParamSpec::float(55.0, 65.0, "C").with_default(ParamValue::Float(60.0)),
    );

    let mut qc_rules = BTreeMap::new();
    qc_rules.insert(
        "optical_repeatability".to_string(),
        QcThresholds { max_cv: Some(0.03), ..Default::default() },
    );
    qc_rules.insert(
        "sample_completeness".to_string(),
        QcThresholds { min_completeness: Some(0.9), ..Default::default() },
    );

    ProtocolDefinition {
        id: "YELLOW-001".to_string(),
        name: "Encapsulant Yellowing".to_string(),
        version: "1.0".to_string(),
        standard: "IEC 61215-2:2021 MQT 10 (extended)".to_string(),
        parameters,
        qc_rules,
        acceptance_criteria: vec![
            AcceptanceCriterionSpec::new(
                "yellowness_index",
                "<=6",
                Criticality::Major,
                "Yellowness index delta after exposure",
            ),
            AcceptanceCriterionSpec::new(
                "power_degradation",
                "<=5%",
                Criticality::Critical,
                "Power loss over the full exposure",
            ),
            AcceptanceCriterionSpec::new(
                "pmax_degradation_rate",
                ">=-0.01",
                Criticality::Major,
                "Power trend no steeper than -0.01 %/h",
            ),
        ],
        phases: DegradationFamily.phase_skeleton(PhaseSpec::new(
            "exposure",
            "Extended Exposure with Periodic Sampling",
            vec![
                StepSpec::new("initial_optical", "optical_measurement", "Initial yellowness index"),
                StepSpec::new("exposure", "uv_thermal_exposure", "Exposure with periodic I-V and optical sampling"),
                StepSpec::new("final_optical", "optical_measurement", "Final yellowness index"),
            ],
        )),
    }
}
