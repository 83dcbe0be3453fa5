//! Protocol definitions: the static configuration a session executes against.
//!
//! A `ProtocolDefinition` is supplied fully parsed by an external loader; this
//! module never reads files. Definitions are immutable after construction and
//! shared read-only across sessions.

use crate::error::{EngineError, Result};
use crate::qc::OutlierMethod;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Declared type of a protocol parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamType {
    Float,
    Integer,
    Boolean,
    Text,
}

/// A concrete setup value supplied by the operator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Integer(v) => Some(*v as f64),
            ParamValue::Boolean(_) | ParamValue::Text(_) => None,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Float(_) => "float",
            ParamValue::Integer(_) => "integer",
            ParamValue::Boolean(_) => "boolean",
            ParamValue::Text(_) => "text",
        }
    }

    fn matches(&self, param_type: ParamType) -> bool {
        matches!(
            (self, param_type),
            (ParamValue::Float(_), ParamType::Float)
                | (ParamValue::Integer(_), ParamType::Integer)
                | (ParamValue::Integer(_), ParamType::Float)
                | (ParamValue::Boolean(_), ParamType::Boolean)
                | (ParamValue::Text(_), ParamType::Text)
        )
    }
}

/// Specification of a single protocol parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub param_type: ParamType,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub unit: String,
    pub default: Option<ParamValue>,
}

impl ParamSpec {
    pub fn float(min: f64, max: f64, unit: &str) -> Self {
        Self { param_type: ParamType::Float, min: Some(min), max: Some(max), unit: unit.to_string(), default: None }
    }

    pub fn integer(min: i64, max: i64, unit: &str) -> Self {
        Self {
            param_type: ParamType::Integer,
            min: Some(min as f64),
            max: Some(max as f64),
            unit: unit.to_string(),
            default: None,
        }
    }

    pub fn with_default(mut self, default: ParamValue) -> Self {
        self.default = Some(default);
        self
    }
}

/// Thresholds for one named QC rule, taken from the protocol definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct QcThresholds {
    pub max_cv: Option<f64>,
    pub max_deviation: Option<f64>,
    pub target: Option<f64>,
    pub min_completeness: Option<f64>,
    pub outlier_method: Option<OutlierMethod>,
    pub outlier_threshold: Option<f64>,
}

/// Severity of an acceptance criterion, controlling how its failure affects
/// the overall verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Criticality {
    Critical,
    Major,
    Minor,
}

/// One acceptance criterion as declared by the protocol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptanceCriterionSpec {
    /// Parameter name the criterion applies to (e.g. "power_degradation")
    pub parameter: String,
    /// Numeric comparator requirement, e.g. "<=5%" or ">=0.70"
    pub requirement: String,
    pub criticality: Criticality,
    pub description: String,
}

impl AcceptanceCriterionSpec {
    pub fn new(parameter: &str, requirement: &str, criticality: Criticality, description: &str) -> Self {
        Self {
            parameter: parameter.to_string(),
            requirement: requirement.to_string(),
            criticality,
            description: description.to_string(),
        }
    }
}

/// One step of a phase, as declared by the protocol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSpec {
    pub step_id: String,
    pub action: String,
    pub description: String,
}

impl StepSpec {
    pub fn new(step_id: &str, action: &str, description: &str) -> Self {
        Self { step_id: step_id.to_string(), action: action.to_string(), description: description.to_string() }
    }
}

/// One ordered phase of protocol execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSpec {
    pub phase_id: String,
    pub name: String,
    pub steps: Vec<StepSpec>,
}

impl PhaseSpec {
    pub fn new(phase_id: &str, name: &str, steps: Vec<StepSpec>) -> Self {
        Self { phase_id: phase_id.to_string(), name: name.to_string(), steps }
    }
}

/// A complete qualification protocol: parameter table, QC rule thresholds,
/// acceptance criteria, and the phase/step sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolDefinition {
    pub id: String,
    pub name: String,
    pub version: String,
    /// Regulatory standard reference, e.g. "IEC 61215-2:2021 MQT 11"
    pub standard: String,
    pub parameters: BTreeMap<String, ParamSpec>,
    pub qc_rules: BTreeMap<String, QcThresholds>,
    pub acceptance_criteria: Vec<AcceptanceCriterionSpec>,
    pub phases: Vec<PhaseSpec>,
}

impl ProtocolDefinition {
    /// Validate operator-supplied setup values against the parameter table.
    ///
    /// Fails fast with `EngineError::Validation` before any session state is
    /// created: unknown names, type mismatches, and out-of-range numerics are
    /// all rejected here, never by the ledger.
    pub fn validate_setup(&self, setup: &BTreeMap<String, ParamValue>) -> Result<()> {
        for (name, value) in setup {
            let spec = self
                .parameters
                .get(name)
                .ok_or_else(|| EngineError::Validation(format!("unknown parameter '{}'", name)))?;

            if !value.matches(spec.param_type) {
                return Err(EngineError::Validation(format!(
                    "parameter '{}' expects {:?}, got {}",
                    name,
                    spec.param_type,
                    value.type_name()
                )));
            }

            if let Some(v) = value.as_f64() {
                if let Some(min) = spec.min {
                    if v < min {
                        return Err(EngineError::Validation(format!(
                            "parameter '{}' = {} below minimum {} {}",
                            name, v, min, spec.unit
                        )));
                    }
                }
                if let Some(max) = spec.max {
                    if v > max {
                        return Err(EngineError::Validation(format!(
                            "parameter '{}' = {} above maximum {} {}",
                            name, v, max, spec.unit
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Look up the thresholds for a named QC rule
    pub fn qc_rule(&self, rule: &str) -> Option<&QcThresholds> {
        self.qc_rules.get(rule)
    }
}

/// Explicit protocol registry, constructed at startup and passed by the host
/// into whatever drives the engine. No process-wide mutable state.
#[derive(Debug, Clone, Default)]
pub struct ProtocolRegistry {
    protocols: BTreeMap<String, Arc<ProtocolDefinition>>,
}

impl ProtocolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, definition: ProtocolDefinition) {
        self.protocols.insert(definition.id.clone(), Arc::new(definition));
    }

    pub fn get(&self, id: &str) -> Result<Arc<ProtocolDefinition>> {
        self.protocols
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("protocol '{}'", id)))
    }

    pub fn ids(&self) -> Vec<&str> {
        self.protocols.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.protocols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.protocols.is_empty()
    }
}
