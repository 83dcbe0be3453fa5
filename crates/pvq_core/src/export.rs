//! Session export: the sole hand-off object to report generation and
//! persistence (both out of scope here).
//!
//! An export carries everything a downstream consumer needs to reproduce the
//! verdict: session metadata, the full transition audit log, every ledger
//! record, the QC history, and the final evaluation.

use crate::evaluate::EvaluationResult;
use crate::ledger::MeasurementRecord;
use crate::qc::QcCheckResult;
use crate::session::{AuditEntry, ProgressSnapshot, SessionStatus, TestSession};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionExport {
    pub session_id: Uuid,
    pub protocol_id: String,
    pub protocol_version: String,
    pub standard: String,
    pub sample_id: String,
    pub operator_id: String,
    pub status: SessionStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub progress: ProgressSnapshot,
    pub audit_log: Vec<AuditEntry>,
    pub records: Vec<MeasurementRecord>,
    pub qc_history: Vec<QcCheckResult>,
    pub evaluation: Option<EvaluationResult>,
}

impl SessionExport {
    pub fn from_session(session: &TestSession) -> Self {
        Self {
            session_id: session.session_id,
            protocol_id: session.protocol.id.clone(),
            protocol_version: session.protocol.version.clone(),
            standard: session.protocol.standard.clone(),
            sample_id: session.sample_id.clone(),
            operator_id: session.operator_id.clone(),
            status: session.status,
            start_time: session.start_time,
            end_time: session.end_time,
            progress: session.progress(),
            audit_log: session.audit_log.clone(),
            records: session.ledger.records().to_vec(),
            qc_history: session.qc_history.clone(),
            evaluation: session.evaluation.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluate::evaluate;
    use crate::protocol::{
        AcceptanceCriterionSpec, Criticality, PhaseSpec, ProtocolDefinition, StepSpec,
    };
    use crate::stats::retention;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn protocol() -> Arc<ProtocolDefinition> {
        Arc::new(ProtocolDefinition {
            id: "UV-001".to_string(),
            name: "UV Preconditioning".to_string(),
            version: "1.0".to_string(),
            standard: "IEC 61215-2 MQT 10".to_string(),
            parameters: BTreeMap::new(),
            qc_rules: BTreeMap::new(),
            acceptance_criteria: vec![AcceptanceCriterionSpec::new(
                "power_degradation",
                "<=5%",
                Criticality::Critical,
                "Power loss after UV dose",
            )],
            phases: vec![PhaseSpec::new(
                "final",
                "Final Characterization",
                vec![StepSpec::new("iv_final", "iv_measurement", "Final I-V sweep")],
            )],
        })
    }

    #[test]
    fn export_round_trip_reproduces_verdict() {
        let mut session = TestSession::new(protocol(), "MOD-7", "op-a", BTreeMap::new());
        session.begin();
        session.ledger.append("baseline_electrical", "pmax", 250.0, "W", None);
        session.ledger.append("final_electrical", "pmax", 242.0, "W", None);
        session.start_phase("final").unwrap();
        session.start_step("iv_final").unwrap();
        session.complete_step("iv_final", serde_json::json!({"pmax": 242.0})).unwrap();

        let initial = session.ledger.values("baseline_electrical", "pmax")[0];
        let final_value = session.ledger.values("final_electrical", "pmax")[0];
        let degradation = 100.0 - retention(initial, final_value);
        let mut actuals = BTreeMap::new();
        actuals.insert("power_degradation".to_string(), degradation);
        session.evaluation = Some(evaluate(&session.protocol.acceptance_criteria, &actuals));

        let export = SessionExport::from_session(&session);
        let json = serde_json::to_string(&export).unwrap();
        let restored: SessionExport = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, export);

        // Recomputing the verdict from the exported ledger reproduces it
        let initial = restored
            .records
            .iter()
            .find(|r| r.table == "baseline_electrical" && r.parameter == "pmax")
            .unwrap()
            .value;
        let final_value = restored
            .records
            .iter()
            .find(|r| r.table == "final_electrical" && r.parameter == "pmax")
            .unwrap()
            .value;
        let mut actuals = BTreeMap::new();
        actuals.insert("power_degradation".to_string(), 100.0 - retention(initial, final_value));
        let recomputed = evaluate(&session.protocol.acceptance_criteria, &actuals);

        let exported_eval = restored.evaluation.unwrap();
        assert_eq!(recomputed.overall_pass, exported_eval.overall_pass);
        let passed: Vec<_> = recomputed.criteria.iter().map(|c| c.passed).collect();
        let exported_passed: Vec<_> = exported_eval.criteria.iter().map(|c| c.passed).collect();
        assert_eq!(passed, exported_passed);
    }
}
