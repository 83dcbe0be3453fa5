//! Environmental stress protocols: chamber-driven humidity, corrosion, and
//! UV exposure tests.

use crate::families::{EnvironmentalFamily, ProtocolFamily};
use pvq_core::protocol::{
    AcceptanceCriterionSpec, Criticality, ParamSpec, ParamValue, PhaseSpec, ProtocolDefinition,
    QcThresholds, StepSpec,
};
use pvq_core::qc::OutlierMethod;
use std::collections::BTreeMap;

fn power_degradation_criterion(limit: &str) -> AcceptanceCriterionSpec {
    AcceptanceCriterionSpec::new(
        "power_degradation",
        limit,
        Criticality::Critical,
        "Power loss after stress exposure",
    )
}

fn insulation_criterion() -> AcceptanceCriterionSpec {
    AcceptanceCriterionSpec::new(
        "insulation_resistance",
        ">=40",
        Criticality::Critical,
        "Insulation resistance, MOhm m2",
    )
}

fn visual_criterion() -> AcceptanceCriterionSpec {
    AcceptanceCriterionSpec::new(
        "visual_defects",
        "=0",
        Criticality::Major,
        "No major visual defects after stress",
    )
}

/// HF-001: humidity-freeze cycling (85 C / 85 % RH to -40 C).
pub fn hf_001() -> ProtocolDefinition {
    let mut parameters = BTreeMap::new();
    parameters.insert(
        "chamber_temp_high".to_string(),
        ParamSpec::float(83.0, 87.0, "C").with_default(ParamValue::Float(85.0)),
    );
    parameters.insert(
        "chamber_temp_low".to_string(),
        ParamSpec::float(-42.0, -38.0, "C").with_default(ParamValue::Float(-40.0)),
    );
    parameters.insert(
        "chamber_humidity".to_string(),
        ParamSpec::float(80.0, 90.0, "%RH").with_default(ParamValue::Float(85.0)),
    );
    parameters.insert("cycles".to_string(), ParamSpec::integer(10, 10, "cycles"));

    let mut qc_rules = BTreeMap::new();
    qc_rules.insert(
        "chamber_stability".to_string(),
        QcThresholds { target: Some(85.0), max_deviation: Some(2.0), ..Default::default() },
    );
    qc_rules.insert(
        "log_completeness".to_string(),
        QcThresholds { min_completeness: Some(0.95), ..Default::default() },
    );

    ProtocolDefinition {
        id: "HF-001".to_string(),
        name: "Humidity-Freeze".to_string(),
        version: "1.0".to_string(),
        standard: "IEC 61215-2:2021 MQT 12".to_string(),
        parameters,
        qc_rules,
        acceptance_criteria: vec![
            power_degradation_criterion("<=5%"),
            insulation_criterion(),
            visual_criterion(),
        ],
        phases: EnvironmentalFamily.phase_skeleton(PhaseSpec::new(
            "stress",
            "Humidity-Freeze Cycling",
            vec![
                StepSpec::new("precondition", "stabilize", "Stabilize at 85C/85%RH"),
                StepSpec::new("hf_cycles", "hf_cycles", "Run 10 humidity-freeze cycles"),
                StepSpec::new("recovery", "recovery", "Recovery at ambient, 2-4 h"),
            ],
        )),
    }
}

/// WET-001: wet leakage current test.
pub fn wet_001() -> ProtocolDefinition {
    let mut parameters = BTreeMap::new();
    parameters.insert(
        "chamber_water_temp".to_string(),
        ParamSpec::float(20.0, 24.0, "C").with_default(ParamValue::Float(22.0)),
    );
    parameters.insert(
        "test_voltage".to_string(),
        ParamSpec::float(500.0, 1500.0, "V").with_default(ParamValue::Float(1000.0)),
    );

    let mut qc_rules = BTreeMap::new();
    qc_rules.insert(
        "leakage_repeatability".to_string(),
        QcThresholds { max_cv: Some(0.05), ..Default::default() },
    );

    ProtocolDefinition {
        id: "WET-001".to_string(),
        name: "Wet Leakage Current".to_string(),
        version: "1.0".to_string(),
        standard: "IEC 61215-2:2021 MQT 15".to_string(),
        parameters,
        qc_rules,
        acceptance_criteria: vec![
            AcceptanceCriterionSpec::new(
                "insulation_resistance",
                ">=40",
                Criticality::Critical,
                "Wet insulation resistance, MOhm m2",
            ),
            visual_criterion(),
        ],
        phases: EnvironmentalFamily.phase_skeleton(PhaseSpec::new(
            "immersion",
            "Wet Leakage Measurement",
            vec![
                StepSpec::new("immerse", "immersion", "Immerse module surface in wetting solution"),
                StepSpec::new("apply_voltage", "leakage_measurement", "Apply test voltage, record leakage"),
            ],
        )),
    }
}

/// H2S-001: hydrogen-sulfide atmosphere corrosion.
pub fn h2s_001() -> ProtocolDefinition {
    let mut parameters = BTreeMap::new();
    parameters.insert(
        "chamber_h2s_concentration".to_string(),
        ParamSpec::float(10.0, 25.0, "ppm").with_default(ParamValue::Float(15.0)),
    );
    parameters.insert(
        "chamber_humidity".to_string(),
        ParamSpec::float(70.0, 80.0, "%RH").with_default(ParamValue::Float(75.0)),
    );
    parameters.insert("exposure_hours".to_string(), ParamSpec::float(240.0, 720.0, "h"));

    let mut qc_rules = BTreeMap::new();
    qc_rules.insert(
        "concentration_stability".to_string(),
        QcThresholds { max_deviation: Some(2.0), ..Default::default() },
    );
    qc_rules.insert(
        "log_completeness".to_string(),
        QcThresholds { min_completeness: Some(0.9), ..Default::default() },
    );

    ProtocolDefinition {
        id: "H2S-001".to_string(),
        name: "Hydrogen Sulfide Corrosion".to_string(),
        version: "1.0".to_string(),
        standard: "IEC 60068-2-43".to_string(),
        parameters,
        qc_rules,
        acceptance_criteria: vec![
            power_degradation_criterion("<=5%"),
            AcceptanceCriterionSpec::new(
                "visual_defects",
                "=0",
                Criticality::Critical,
                "No corrosion of busbars or interconnects",
            ),
        ],
        phases: EnvironmentalFamily.phase_skeleton(PhaseSpec::new(
            "exposure",
            "H2S Exposure",
            vec![
                StepSpec::new("seal_chamber", "chamber_setup", "Seal chamber, establish H2S concentration"),
                StepSpec::new("exposure", "gas_exposure", "Hold exposure with periodic monitoring"),
                StepSpec::new("purge", "chamber_purge", "Purge chamber before retrieval"),
            ],
        )),
    }
}

/// CORR-001: salt-mist corrosion.
pub fn corr_001() -> ProtocolDefinition {
    let mut parameters = BTreeMap::new();
    parameters.insert(
        "chamber_salt_concentration".to_string(),
        ParamSpec::float(4.0, 6.0, "%NaCl").with_default(ParamValue::Float(5.0)),
    );
    parameters.insert(
        "chamber_temp".to_string(),
        ParamSpec::float(33.0, 37.0, "C").with_default(ParamValue::Float(35.0)),
    );
    parameters.insert("spray_cycles".to_string(), ParamSpec::integer(4, 8, "cycles"));

    let mut qc_rules = BTreeMap::new();
    qc_rules.insert(
        "chamber_stability".to_string(),
        QcThresholds { target: Some(35.0), max_deviation: Some(1.0), ..Default::default() },
    );

    ProtocolDefinition {
        id: "CORR-001".to_string(),
        name: "Salt Mist Corrosion".to_string(),
        version: "1.0".to_string(),
        standard: "IEC 61701:2020".to_string(),
        parameters,
        qc_rules,
        acceptance_criteria: vec![
            power_degradation_criterion("<=5%"),
            insulation_criterion(),
            AcceptanceCriterionSpec::new(
                "visual_defects",
                "<=2",
                Criticality::Major,
                "Limited superficial corrosion allowed",
            ),
        ],
        phases: EnvironmentalFamily.phase_skeleton(PhaseSpec::new(
            "stress",
            "Salt Mist Cycling",
            vec![
                StepSpec::new("spray", "salt_spray", "Salt spray application"),
                StepSpec::new("humidity_storage", "humid_storage", "Humidity storage between sprays"),
            ],
        )),
    }
}

/// UV-001: UV preconditioning, 15 kWh/m2 total dose.
pub fn uv_001() -> ProtocolDefinition {
    let mut parameters = BTreeMap::new();
    parameters.insert(
        "chamber_uv_irradiance".to_string(),
        ParamSpec::float(100.0, 250.0, "W/m2").with_default(ParamValue::Float(150.0)),
    );
    parameters.insert(
        "target_dose".to_string(),
        ParamSpec::float(15.0, 60.0, "kWh/m2").with_default(ParamValue::Float(15.0)),
    );
    parameters.insert(
        "chamber_temp".to_string(),
        ParamSpec::float(55.0, 65.0, "C").with_default(ParamValue::Float(60.0)),
    );

    let mut qc_rules = BTreeMap::new();
    qc_rules.insert(
        "uv_stability".to_string(),
        QcThresholds { max_deviation: Some(15.0), ..Default::default() },
    );
    qc_rules.insert(
        "dose_outliers".to_string(),
        QcThresholds {
            outlier_method: Some(OutlierMethod::ZScore),
            outlier_threshold: Some(3.0),
            ..Default::default()
        },
    );

    ProtocolDefinition {
        id: "UV-001".to_string(),
        name: "UV Preconditioning".to_string(),
        version: "1.0".to_string(),
        standard: "IEC 61215-2:2021 MQT 10".to_string(),
        parameters,
        qc_rules,
        acceptance_criteria: vec![
            power_degradation_criterion("<=5%"),
            visual_criterion(),
        ],
        phases: EnvironmentalFamily.phase_skeleton(PhaseSpec::new(
            "exposure",
            "UV Dose Accumulation",
            vec![
                StepSpec::new("lamp_calibration", "calibration", "Verify UV lamp irradiance"),
                StepSpec::new("dose_accumulation", "uv_exposure", "Accumulate target UV dose"),
            ],
        )),
    }
}
