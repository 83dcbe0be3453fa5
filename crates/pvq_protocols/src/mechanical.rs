//! Mechanical load protocols: static snow load, dynamic wind load, and
//! sand/dust abrasion.

use crate::families::{MechanicalFamily, ProtocolFamily};
use pvq_core::protocol::{
    AcceptanceCriterionSpec, Criticality, ParamSpec, ParamValue, PhaseSpec, ProtocolDefinition,
    QcThresholds, StepSpec,
};
use std::collections::BTreeMap;

/// SNOW-001: non-uniform static snow load.
pub fn snow_001() -> ProtocolDefinition {
    let mut parameters = BTreeMap::new();
    parameters.insert(
        "load_pressure".to_string(),
        ParamSpec::float(2400.0, 5400.0, "Pa").with_default(ParamValue::Float(5400.0)),
    );
    parameters.insert("hold_minutes".to_string(), ParamSpec::integer(60, 60, "min"));
    parameters.insert("load_cycles".to_string(), ParamSpec::integer(1, 3, "cycles"));

    let mut qc_rules = BTreeMap::new();
    qc_rules.insert(
        "load_stability".to_string(),
        QcThresholds { max_deviation: Some(100.0), ..Default::default() },
    );
    qc_rules.insert(
        "deflection_repeatability".to_string(),
        QcThresholds { max_cv: Some(0.1), ..Default::default() },
    );

    ProtocolDefinition {
        id: "SNOW-001".to_string(),
        name: "Static Snow Load".to_string(),
        version: "1.0".to_string(),
        standard: "IEC 61215-2:2021 MQT 16".to_string(),
        parameters,
        qc_rules,
        acceptance_criteria: vec![
            AcceptanceCriterionSpec::new(
                "power_degradation",
                "<=5%",
                Criticality::Critical,
                "Power loss after load removal",
            ),
            AcceptanceCriterionSpec::new(
                "residual_deflection",
                "<=5",
                Criticality::Major,
                "Residual frame deflection, mm",
            ),
            AcceptanceCriterionSpec::new(
                "visual_defects",
                "=0",
                Criticality::Critical,
                "No glass breakage or frame separation",
            ),
        ],
        phases: MechanicalFamily.phase_skeleton(PhaseSpec::new(
            "load",
            "Static Load Application",
            vec![
                StepSpec::new("mount", "fixture_mounting", "Mount module per installation manual"),
                StepSpec::new("apply_load", "static_load", "Apply load, hold 1 h per face"),
                StepSpec::new("deflection", "deflection_measurement", "Record deflection during hold"),
            ],
        )),
    }
}

/// WIND-001: dynamic (cyclic) wind load.
pub fn wind_001() -> ProtocolDefinition {
    let mut parameters = BTreeMap::new();
    parameters.insert(
        "load_pressure".to_string(),
        ParamSpec::float(1000.0, 2400.0, "Pa").with_default(ParamValue::Float(1000.0)),
    );
    parameters.insert("pressure_cycles".to_string(), ParamSpec::integer(1000, 10000, "cycles"));
    parameters.insert("cycle_frequency".to_string(), ParamSpec::float(0.5, 3.0, "Hz"));

    let mut qc_rules = BTreeMap::new();
    qc_rules.insert(
        "pressure_stability".to_string(),
        QcThresholds { max_deviation: Some(50.0), ..Default::default() },
    );
    qc_rules.insert(
        "cycle_completeness".to_string(),
        QcThresholds { min_completeness: Some(0.99), ..Default::default() },
    );

    ProtocolDefinition {
        id: "WIND-001".to_string(),
        name: "Dynamic Wind Load".to_string(),
        version: "1.0".to_string(),
        standard: "IEC 62782:2016".to_string(),
        parameters,
        qc_rules,
        acceptance_criteria: vec![
            AcceptanceCriterionSpec::new(
                "power_degradation",
                "<=5%",
                Criticality::Critical,
                "Power loss after cyclic loading",
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
                "No cell cracks or interconnect fatigue",
            ),
        ],
        phases: MechanicalFamily.phase_skeleton(PhaseSpec::new(
            "cycling",
            "Cyclic Load Application",
            vec![
                StepSpec::new("mount", "fixture_mounting", "Mount module on cyclic load fixture"),
                StepSpec::new("cycle_load", "dynamic_load", "Alternate pressure/suction cycles"),
            ],
        )),
    }
}

/// SAND-001: blowing sand and dust abrasion.
pub fn sand_001() -> ProtocolDefinition {
    let mut parameters = BTreeMap::new();
    parameters.insert(
        "air_velocity".to_string(),
        ParamSpec::float(18.0, 29.0, "m/s").with_default(ParamValue::Float(20.0)),
    );
    parameters.insert(
        "dust_concentration".to_string(),
        ParamSpec::float(1.0, 11.0, "g/m3"),
    );
    parameters.insert("exposure_hours".to_string(), ParamSpec::float(2.0, 12.0, "h"));

    let mut qc_rules = BTreeMap::new();
    qc_rules.insert(
        "velocity_stability".to_string(),
        QcThresholds { max_deviation: Some(2.0), ..Default::default() },
    );

    ProtocolDefinition {
        id: "SAND-001".to_string(),
        name: "Sand and Dust Abrasion".to_string(),
        version: "1.0".to_string(),
        standard: "IEC 60068-2-68".to_string(),
        parameters,
        qc_rules,
        acceptance_criteria: vec![
            AcceptanceCriterionSpec::new(
                "power_degradation",
                "<=5%",
                Criticality::Critical,
                "Power loss from surface abrasion",
            ),
            AcceptanceCriterionSpec::new(
                "visual_defects",
                "<=3",
                Criticality::Minor,
                "Superficial abrasion marks allowed",
            ),
        ],
        phases: MechanicalFamily.phase_skeleton(PhaseSpec::new(
            "abrasion",
            "Sand/Dust Exposure",
            vec![
                StepSpec::new("chamber_setup", "chamber_setup", "Establish air velocity and dust feed"),
                StepSpec::new("exposure", "abrasion_exposure", "Hold exposure with orientation changes"),
            ],
        )),
    }
}
