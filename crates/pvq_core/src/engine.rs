//! The engine façade: owns at most one active session and exposes the full
//! state-machine surface to protocol drivers.
//!
//! One engine instance models one operator driving one physical test article,
//! so starting a second session while one is in progress is a contract
//! violation, not a queueing request.

use crate::error::{EngineError, Result};
use crate::evaluate::{evaluate, EvaluationResult};
use crate::export::SessionExport;
use crate::protocol::{ParamValue, ProtocolDefinition};
use crate::session::{ProgressSnapshot, SessionStatus, StepStatus, TestSession};
use log::info;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct ProtocolEngine {
    session: Option<TestSession>,
    /// Finished sessions displaced by a new start before the host took them.
    /// Their audit logs and ledgers stay retrievable.
    archive: Vec<TestSession>,
}

impl ProtocolEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session for `protocol`. Setup values are validated against the
    /// parameter table first; on any validation error no session state is
    /// created.
    pub fn start_session(
        &mut self,
        protocol: Arc<ProtocolDefinition>,
        sample_id: &str,
        operator_id: &str,
        setup: BTreeMap<String, ParamValue>,
    ) -> Result<&TestSession> {
        if let Some(active) = &self.session {
            if active.status == SessionStatus::InProgress {
                return Err(EngineError::AlreadyActive {
                    session_id: active.session_id.to_string(),
                });
            }
        }
        protocol.validate_setup(&setup)?;
        let mut session = TestSession::new(protocol, sample_id, operator_id, setup);
        session.begin();
        if let Some(displaced) = self.session.take() {
            self.archive.push(displaced);
        }
        Ok(self.session.insert(session))
    }

    pub fn start_phase(&mut self, phase_id: &str) -> Result<()> {
        self.active_mut()?.start_phase(phase_id)
    }

    pub fn start_step(&mut self, step_id: &str) -> Result<()> {
        self.active_mut()?.start_step(step_id)
    }

    pub fn complete_step(&mut self, step_id: &str, result: serde_json::Value) -> Result<()> {
        self.active_mut()?.complete_step(step_id, result)
    }

    pub fn fail_step(&mut self, step_id: &str, reason: &str) -> Result<()> {
        self.active_mut()?.fail_step(step_id, reason)
    }

    pub fn skip_step(&mut self, step_id: &str, reason: &str) -> Result<()> {
        self.active_mut()?.skip_step(step_id, reason)
    }

    /// Run operator-supplied step logic inside the step boundary.
    ///
    /// The step is started, the closure runs with mutable access to the
    /// session (measurement appends, QC recording), and its outcome decides
    /// the terminal status: `Ok(result)` completes the step, `Err(message)`
    /// fails it with the captured message. Either way the step ends terminal,
    /// never stuck InProgress.
    pub fn run_step<F>(&mut self, step_id: &str, op: F) -> Result<StepStatus>
    where
        F: FnOnce(&mut TestSession) -> std::result::Result<serde_json::Value, String>,
    {
        let session = self.active_mut()?;
        session.start_step(step_id)?;
        match op(&mut *session) {
            Ok(result) => {
                session.complete_step(step_id, result)?;
                Ok(StepStatus::Completed)
            }
            Err(message) => {
                session.fail_step(step_id, &message)?;
                Ok(StepStatus::Failed)
            }
        }
    }

    /// Abort the active session. The only sanctioned early termination.
    pub fn abort_session(&mut self, reason: &str) -> Result<()> {
        let session = self.active_mut()?;
        session.abort(reason);
        Ok(())
    }

    pub fn complete_session(&mut self) -> Result<()> {
        self.active_mut()?.try_complete()
    }

    /// Evaluate the protocol's acceptance criteria against final actuals and
    /// store the result on the session. Idempotent for identical actuals.
    pub fn evaluate_session(
        &mut self,
        actuals: &BTreeMap<String, f64>,
    ) -> Result<EvaluationResult> {
        let session = self.active_mut()?;
        let result = evaluate(&session.protocol.acceptance_criteria, actuals);
        info!(
            "session {} evaluated: overall_pass={} failed={:?}",
            session.session_id, result.overall_pass, result.failed_criteria
        );
        session.evaluation = Some(result.clone());
        Ok(result)
    }

    pub fn progress(&self) -> Result<ProgressSnapshot> {
        Ok(self.active()?.progress())
    }

    pub fn export(&self) -> Result<SessionExport> {
        Ok(SessionExport::from_session(self.active()?))
    }

    /// Hand the finished session back to the host (archival), leaving the
    /// engine free for the next sample.
    pub fn take_session(&mut self) -> Result<TestSession> {
        self.session.take().ok_or(EngineError::NoActiveSession)
    }

    pub fn session(&self) -> Option<&TestSession> {
        self.session.as_ref()
    }

    /// Finished sessions that were displaced before being taken
    pub fn archived_sessions(&self) -> &[TestSession] {
        &self.archive
    }

    /// Hand the archived sessions back to the host for persistence
    pub fn drain_archive(&mut self) -> Vec<TestSession> {
        std::mem::take(&mut self.archive)
    }

    pub fn session_mut(&mut self) -> Option<&mut TestSession> {
        self.session.as_mut()
    }

    fn active(&self) -> Result<&TestSession> {
        self.session.as_ref().ok_or(EngineError::NoActiveSession)
    }

    fn active_mut(&mut self) -> Result<&mut TestSession> {
        self.session.as_mut().ok_or(EngineError::NoActiveSession)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{
        AcceptanceCriterionSpec, Criticality, ParamSpec, PhaseSpec, StepSpec,
    };

    fn protocol() -> Arc<ProtocolDefinition> {
        let mut parameters = BTreeMap::new();
        parameters.insert("chamber_temp".to_string(), ParamSpec::float(-45.0, 90.0, "C"));
        Arc::new(ProtocolDefinition {
            id: "HF-001".to_string(),
            name: "Humidity Freeze".to_string(),
            version: "1.0".to_string(),
            standard: "IEC 61215-2 MQT 12".to_string(),
            parameters,
            qc_rules: BTreeMap::new(),
            acceptance_criteria: vec![AcceptanceCriterionSpec::new(
                "power_degradation",
                "<=5%",
                Criticality::Critical,
                "Power loss after humidity-freeze cycles",
            )],
            phases: vec![PhaseSpec::new(
                "stress",
                "Humidity Freeze Cycles",
                vec![
                    StepSpec::new("precondition", "stabilize", "Stabilize at 85C/85%RH"),
                    StepSpec::new("cycles", "hf_cycles", "Run 10 humidity-freeze cycles"),
                ],
            )],
        })
    }

    #[test]
    fn only_one_active_session() {
        let mut engine = ProtocolEngine::new();
        engine.start_session(protocol(), "MOD-1", "op-a", BTreeMap::new()).unwrap();
        let err = engine
            .start_session(protocol(), "MOD-2", "op-a", BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, EngineError::AlreadyActive { .. }));
    }

    #[test]
    fn aborted_session_frees_the_engine() {
        let mut engine = ProtocolEngine::new();
        engine.start_session(protocol(), "MOD-1", "op-a", BTreeMap::new()).unwrap();
        engine.abort_session("operator recalled").unwrap();
        assert!(engine.start_session(protocol(), "MOD-2", "op-a", BTreeMap::new()).is_ok());
    }

    #[test]
    fn displaced_session_is_archived_not_dropped() {
        let mut engine = ProtocolEngine::new();
        engine.start_session(protocol(), "MOD-1", "op-a", BTreeMap::new()).unwrap();
        engine.start_phase("stress").unwrap();
        engine.start_step("precondition").unwrap();
        engine.abort_session("operator recalled").unwrap();

        // Starting the next sample without take_session must not lose the
        // aborted session's audit trail
        engine.start_session(protocol(), "MOD-2", "op-a", BTreeMap::new()).unwrap();
        let archived = engine.archived_sessions();
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].sample_id, "MOD-1");
        assert_eq!(archived[0].status, SessionStatus::Aborted);
        assert!(!archived[0].audit_log.is_empty());

        let drained = engine.drain_archive();
        assert_eq!(drained.len(), 1);
        assert!(engine.archived_sessions().is_empty());
    }

    #[test]
    fn invalid_setup_creates_no_session() {
        let mut engine = ProtocolEngine::new();
        let mut setup = BTreeMap::new();
        setup.insert("chamber_temp".to_string(), ParamValue::Float(120.0));
        let err = engine.start_session(protocol(), "MOD-1", "op-a", setup).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert!(engine.session().is_none());
    }

    #[test]
    fn run_step_converts_driver_error_to_failed_step() {
        let mut engine = ProtocolEngine::new();
        engine.start_session(protocol(), "MOD-1", "op-a", BTreeMap::new()).unwrap();
        engine.start_phase("stress").unwrap();

        let status = engine
            .run_step("precondition", |_| Err("RH sensor disconnected".to_string()))
            .unwrap();
        assert_eq!(status, StepStatus::Failed);

        let session = engine.session().unwrap();
        let step = session.step("precondition").unwrap();
        assert_eq!(step.status, StepStatus::Failed);
        assert!(step.notes.contains(&"RH sensor disconnected".to_string()));
    }

    #[test]
    fn run_step_records_measurements_and_result() {
        let mut engine = ProtocolEngine::new();
        engine.start_session(protocol(), "MOD-1", "op-a", BTreeMap::new()).unwrap();
        engine.start_phase("stress").unwrap();

        let status = engine
            .run_step("precondition", |session| {
                session.ledger.append("chamber", "temperature", 85.1, "C", None);
                Ok(serde_json::json!({"stabilized": true}))
            })
            .unwrap();
        assert_eq!(status, StepStatus::Completed);
        assert_eq!(engine.session().unwrap().ledger.len(), 1);
    }

    #[test]
    fn full_session_to_verdict() {
        let mut engine = ProtocolEngine::new();
        engine.start_session(protocol(), "MOD-1", "op-a", BTreeMap::new()).unwrap();
        engine.start_phase("stress").unwrap();
        engine
            .run_step("precondition", |s| {
                s.ledger.append("baseline_electrical", "pmax", 250.0, "W", None);
                Ok(serde_json::Value::Null)
            })
            .unwrap();
        engine
            .run_step("cycles", |s| {
                s.ledger.append("final_electrical", "pmax", 235.0, "W", None);
                Ok(serde_json::Value::Null)
            })
            .unwrap();
        engine.complete_session().unwrap();

        // 6% degradation against a <=5% critical limit
        let mut actuals = BTreeMap::new();
        actuals.insert("power_degradation".to_string(), 6.0);
        let result = engine.evaluate_session(&actuals).unwrap();
        assert!(!result.overall_pass);
        assert_eq!(result.failed_criteria, vec!["power_degradation".to_string()]);

        let export = engine.export().unwrap();
        assert_eq!(export.status, SessionStatus::Completed);
        assert_eq!(export.records.len(), 2);
        assert!(export.evaluation.is_some());

        let archived = engine.take_session().unwrap();
        assert_eq!(archived.status, SessionStatus::Completed);
        assert!(engine.session().is_none());
    }

    #[test]
    fn abort_then_complete_is_incomplete_protocol() {
        let mut engine = ProtocolEngine::new();
        engine.start_session(protocol(), "MOD-1", "op-a", BTreeMap::new()).unwrap();
        engine.start_phase("stress").unwrap();
        engine.start_step("precondition").unwrap();
        engine.abort_session("chamber failure").unwrap();

        let err = engine.complete_session().unwrap_err();
        assert!(matches!(err, EngineError::IncompleteProtocol { .. }));
    }
}
