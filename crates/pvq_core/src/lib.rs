//! # pvq_core - PV Module Qualification Test Engine
//!
//! Protocol execution and acceptance-evaluation engine for photovoltaic
//! module qualification testing (thermal cycling, UV exposure, mechanical
//! load, corrosion, ...). Every concrete protocol is a thin configuration of
//! this engine: a parameter table, QC rule thresholds, acceptance criteria,
//! and a phase/step sequence.
//!
//! ## Components
//! - Phase/step lifecycle state machine with an append-only audit log
//! - Append-only measurement ledger with sorted query/series views
//! - Stateless QC rule checks (repeatability, stability, completeness, outliers)
//! - Statistical analysis (retention, degradation regression, GUM uncertainty)
//! - Acceptance-criteria evaluation producing the final pass/fail verdict
//!
//! The engine consumes already-parsed protocol definitions and emits
//! structured session exports; file I/O, report rendering, UI, and equipment
//! drivers are external collaborators.

pub mod engine;
pub mod error;
pub mod evaluate;
pub mod export;
pub mod ledger;
pub mod protocol;
pub mod qc;
pub mod session;
pub mod stats;

pub use engine::ProtocolEngine;
pub use error::{EngineError, Result};
pub use evaluate::{evaluate, Comparator, CriterionOutcome, EvaluationResult};
pub use export::SessionExport;
pub use ledger::{MeasurementLedger, MeasurementRecord};
pub use protocol::{
    AcceptanceCriterionSpec, Criticality, ParamSpec, ParamType, ParamValue, PhaseSpec,
    ProtocolDefinition, ProtocolRegistry, QcThresholds, StepSpec,
};
pub use qc::{
    check_completeness, check_repeatability, check_stability, detect_outliers, OutlierMethod,
    QcCheckResult,
};
pub use session::{
    AuditEntry, Phase, PhaseStatus, ProgressSnapshot, SessionStatus, Step, StepStatus, TestSession,
};
pub use stats::{
    degradation_rate, retention, summary_stats, uncertainty_budget, DegradationRate, SummaryStats,
    UncertaintyBudget, UncertaintySource, UncertaintyType,
};
