//! Append-only measurement ledger.
//!
//! Records are never mutated or removed once appended; corrections are new
//! records. `query` and `series` are read-only views over the same underlying
//! log and are safe to call at any time, including mid-session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single timestamped, labeled measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    pub timestamp: DateTime<Utc>,
    /// Logical grouping, e.g. "baseline_electrical"
    pub table: String,
    pub parameter: String,
    pub value: f64,
    pub unit: String,
    pub notes: Option<String>,
}

/// Append-only store of measurement records for one session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasurementLedger {
    records: Vec<MeasurementRecord>,
}

impl MeasurementLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a measurement. Always succeeds; range validation is the
    /// protocol's setup-validation responsibility upstream.
    pub fn append(
        &mut self,
        table: &str,
        parameter: &str,
        value: f64,
        unit: &str,
        notes: Option<&str>,
    ) -> &MeasurementRecord {
        self.append_at(Utc::now(), table, parameter, value, unit, notes)
    }

    /// Append with an explicit timestamp (measurements reported after the
    /// fact, e.g. chamber logs read out at cycle end).
    pub fn append_at(
        &mut self,
        timestamp: DateTime<Utc>,
        table: &str,
        parameter: &str,
        value: f64,
        unit: &str,
        notes: Option<&str>,
    ) -> &MeasurementRecord {
        self.records.push(MeasurementRecord {
            timestamp,
            table: table.to_string(),
            parameter: parameter.to_string(),
            value,
            unit: unit.to_string(),
            notes: notes.map(|n| n.to_string()),
        });
        self.records.last().unwrap()
    }

    /// Records for one table/parameter pair, sorted by timestamp ascending
    /// regardless of insertion order. An optional `[from, to]` window
    /// (inclusive) restricts the result.
    pub fn query(
        &self,
        table: &str,
        parameter: &str,
        window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Vec<&MeasurementRecord> {
        let mut out: Vec<&MeasurementRecord> = self
            .records
            .iter()
            .filter(|r| r.table == table && r.parameter == parameter)
            .filter(|r| match window {
                Some((from, to)) => r.timestamp >= from && r.timestamp <= to,
                None => true,
            })
            .collect();
        out.sort_by_key(|r| r.timestamp);
        out
    }

    /// All (timestamp, value) points for a parameter across every table,
    /// sorted by timestamp. Used for cross-cutting analysis such as the
    /// degradation trend over a whole session.
    pub fn series(&self, parameter: &str) -> Vec<(DateTime<Utc>, f64)> {
        let mut out: Vec<(DateTime<Utc>, f64)> = self
            .records
            .iter()
            .filter(|r| r.parameter == parameter)
            .map(|r| (r.timestamp, r.value))
            .collect();
        out.sort_by_key(|&(t, _)| t);
        out
    }

    /// Values only, in timestamp order, for one table/parameter pair
    pub fn values(&self, table: &str, parameter: &str) -> Vec<f64> {
        self.query(table, parameter, None).iter().map(|r| r.value).collect()
    }

    /// Distinct table names in first-seen order
    pub fn tables(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for r in &self.records {
            if !seen.contains(&r.table.as_str()) {
                seen.push(r.table.as_str());
            }
        }
        seen
    }

    pub fn records(&self) -> &[MeasurementRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn query_sorts_by_timestamp_regardless_of_insertion_order() {
        let mut ledger = MeasurementLedger::new();
        ledger.append_at(ts(20), "baseline_electrical", "pmax", 249.8, "W", None);
        ledger.append_at(ts(0), "baseline_electrical", "pmax", 250.1, "W", None);
        ledger.append_at(ts(10), "baseline_electrical", "pmax", 250.0, "W", None);

        let records = ledger.query("baseline_electrical", "pmax", None);
        let values: Vec<f64> = records.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![250.1, 250.0, 249.8]);
    }

    #[test]
    fn query_window_is_inclusive() {
        let mut ledger = MeasurementLedger::new();
        for i in 0..5 {
            ledger.append_at(ts(i * 10), "chamber", "temperature", 85.0 + i as f64, "C", None);
        }
        let records = ledger.query("chamber", "temperature", Some((ts(10), ts(30))));
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].value, 86.0);
        assert_eq!(records[2].value, 88.0);
    }

    #[test]
    fn series_spans_tables() {
        let mut ledger = MeasurementLedger::new();
        ledger.append_at(ts(0), "baseline_electrical", "pmax", 250.0, "W", None);
        ledger.append_at(ts(100), "final_electrical", "pmax", 245.0, "W", None);
        ledger.append_at(ts(50), "intermediate_electrical", "pmax", 248.0, "W", None);

        let series = ledger.series("pmax");
        let values: Vec<f64> = series.iter().map(|&(_, v)| v).collect();
        assert_eq!(values, vec![250.0, 248.0, 245.0]);
    }

    #[test]
    fn tables_in_first_seen_order() {
        let mut ledger = MeasurementLedger::new();
        ledger.append("baseline_electrical", "pmax", 250.0, "W", None);
        ledger.append("visual_inspection", "defect_count", 0.0, "count", None);
        ledger.append("baseline_electrical", "voc", 37.8, "V", None);
        assert_eq!(ledger.tables(), vec!["baseline_electrical", "visual_inspection"]);
    }
}
