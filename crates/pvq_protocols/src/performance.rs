//! Performance protocols: STC power determination and hot-spot endurance.

use crate::families::{PerformanceFamily, ProtocolFamily};
use pvq_core::protocol::{
    AcceptanceCriterionSpec, Criticality, ParamSpec, ParamValue, PhaseSpec, ProtocolDefinition,
    QcThresholds, StepSpec,
};
use pvq_core::qc::OutlierMethod;
use std::collections::BTreeMap;

/// STC-001: maximum power determination at standard test conditions
/// (1000 W/m2, 25 C cell temperature, AM1.5 spectrum).
pub fn stc_001() -> ProtocolDefinition {
    let mut parameters = BTreeMap::new();
    parameters.insert(
        "irradiance".to_string(),
        ParamSpec::float(950.0, 1050.0, "W/m2").with_default(ParamValue::Float(1000.0)),
    );
    parameters.insert(
        "cell_temperature".to_string(),
        ParamSpec::float(23.0, 27.0, "C").with_default(ParamValue::Float(25.0)),
    );
    parameters.insert("sweep_count".to_string(), ParamSpec::integer(3, 10, "sweeps"));

    let mut qc_rules = BTreeMap::new();
    qc_rules.insert(
        "iv_repeatability".to_string(),
        QcThresholds { max_cv: Some(0.01), ..Default::default() },
    );
    qc_rules.insert(
        "irradiance_stability".to_string(),
        QcThresholds { target: Some(1000.0), max_deviation: Some(20.0), ..Default::default() },
    );
    qc_rules.insert(
        "outlier_screen".to_string(),
        QcThresholds {
            outlier_method: Some(OutlierMethod::Iqr),
            outlier_threshold: Some(1.5),
            ..Default::default()
        },
    );

    ProtocolDefinition {
        id: "STC-001".to_string(),
        name: "STC Performance Determination".to_string(),
        version: "1.0".to_string(),
        standard: "IEC 61215-2:2021 MQT 06".to_string(),
        parameters,
        qc_rules,
        acceptance_criteria: vec![
            AcceptanceCriterionSpec::new(
                "pmax_retention",
                ">=97",
                Criticality::Critical,
                "Measured power within 3% of nameplate rating",
            ),
            AcceptanceCriterionSpec::new(
                "fill_factor",
                ">=0.70",
                Criticality::Major,
                "Fill factor at STC",
            ),
            AcceptanceCriterionSpec::new(
                "visual_defects",
                "=0",
                Criticality::Minor,
                "No major visual defects",
            ),
        ],
        phases: PerformanceFamily.phase_skeleton(PhaseSpec::new(
            "measurement",
            "STC Measurement Series",
            vec![
                StepSpec::new("stabilize_simulator", "stabilize", "Stabilize solar simulator"),
                StepSpec::new("iv_sweeps", "iv_measurement", "Repeated I-V sweeps at STC"),
            ],
        )),
    }
}

/// HOT-001: hot-spot endurance under worst-case cell shading.
pub fn hot_001() -> ProtocolDefinition {
    let mut parameters = BTreeMap::new();
    parameters.insert(
        "exposure_hours".to_string(),
        ParamSpec::float(1.0, 5.0, "h").with_default(ParamValue::Float(5.0)),
    );
    parameters.insert("shaded_cells".to_string(), ParamSpec::integer(1, 3, "cells"));
    parameters.insert(
        "irradiance".to_string(),
        ParamSpec::float(800.0, 1100.0, "W/m2").with_default(ParamValue::Float(1000.0)),
    );

    let mut qc_rules = BTreeMap::new();
    qc_rules.insert(
        "iv_repeatability".to_string(),
        QcThresholds { max_cv: Some(0.02), ..Default::default() },
    );
    qc_rules.insert(
        "temperature_completeness".to_string(),
        QcThresholds { min_completeness: Some(0.95), ..Default::default() },
    );

    ProtocolDefinition {
        id: "HOT-001".to_string(),
        name: "Hot-Spot Endurance".to_string(),
        version: "1.0".to_string(),
        standard: "IEC 61215-2:2021 MQT 09".to_string(),
        parameters,
        qc_rules,
        acceptance_criteria: vec![
            AcceptanceCriterionSpec::new(
                "power_degradation",
                "<=5%",
                Criticality::Critical,
                "Power loss after hot-spot exposure",
            ),
            AcceptanceCriterionSpec::new(
                "insulation_resistance",
                ">=40",
                Criticality::Critical,
                "Insulation resistance, MOhm m2",
            ),
            AcceptanceCriterionSpec::new(
                "visual_defects",
                "=0",
                Criticality::Major,
                "No evidence of burn marks or delamination",
            ),
        ],
        phases: PerformanceFamily.phase_skeleton(PhaseSpec::new(
            "exposure",
            "Hot-Spot Exposure",
            vec![
                StepSpec::new("identify_cell", "cell_selection", "Identify worst-case cell by IR"),
                StepSpec::new("shade_exposure", "hot_spot_exposure", "Expose with selected cell shaded"),
                StepSpec::new("ir_monitoring", "ir_imaging", "Record cell temperatures during exposure"),
            ],
        )),
    }
}
