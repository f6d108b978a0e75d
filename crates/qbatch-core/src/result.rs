//! Result records: raw engine output, per-experiment results, job results.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use num_complex::Complex64;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::request::ExperimentHeader;

/// Measurement level reported for counts-based results (classified bits).
pub const MEAS_LEVEL_CLASSIFIED: u8 = 2;

/// Result document returned by the engine for one experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEngineResult {
    /// Engine protocol version.
    #[serde(alias = "qtoaster_version")]
    pub engine_version: Option<String>,
    /// Histogram of measured bit-strings.
    pub counts: FxHashMap<String, u64>,
    /// Final state amplitudes, when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statevector: Option<Vec<Complex64>>,
    /// Engine-side execution time in seconds.
    pub time_taken: f64,
}

/// Data section of an experiment result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperimentData {
    /// Hex-keyed counts (`"0x3"` → occurrences).
    #[serde(default)]
    pub counts: BTreeMap<String, u64>,
    /// Final state amplitudes; present only when the engine returned some.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statevector: Option<Vec<Complex64>>,
}

/// Canonical result of one experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentResult {
    /// `false` when the engine returned no parseable body.
    pub success: bool,
    pub meas_level: u8,
    /// Shots actually run (1 when a statevector was captured).
    pub shots: u32,
    pub data: ExperimentData,
    pub header: ExperimentHeader,
    pub name: String,
    pub status: String,
    /// Engine-side execution time in seconds.
    pub time_taken: f64,
    pub seed_simulator: u64,
    pub engine_version: String,
}

impl ExperimentResult {
    /// Total number of recorded outcomes.
    pub fn total_counts(&self) -> u64 {
        self.data.counts.values().sum()
    }

    /// Counts sorted by descending frequency, then key.
    pub fn sorted_counts(&self) -> Vec<(&str, u64)> {
        let mut sorted: Vec<_> = self
            .data
            .counts
            .iter()
            .map(|(k, v)| (k.as_str(), *v))
            .collect();
        sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        sorted
    }
}

/// Timing for one job, computed when its result is aggregated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMetrics {
    /// When the job's units were handed to the worker pool.
    pub submitted_at: DateTime<Utc>,
    /// Wall-clock seconds from submission to aggregation.
    pub wall_time_secs: f64,
    /// Sum of engine-reported execution time across experiments.
    pub engine_time_secs: f64,
    /// Number of experiments in the job.
    pub experiments: usize,
}

/// Aggregated result of a whole job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub success: bool,
    pub backend_name: String,
    /// Identifier of the originating request.
    pub request_id: String,
    pub job_id: String,
    /// Engine version taken from the first experiment that reported one.
    pub engine_version: String,
    pub header: Value,
    /// Experiment results in request order.
    pub results: Vec<ExperimentResult>,
    pub status: String,
    pub metrics: JobMetrics,
}

impl JobResult {
    /// Look up an experiment result by name.
    pub fn experiment(&self, name: &str) -> Option<&ExperimentResult> {
        self.results.iter().find(|r| r.name == name)
    }

    /// Counts for the named experiment.
    pub fn get_counts(&self, name: &str) -> Option<&BTreeMap<String, u64>> {
        self.experiment(name).map(|r| &r.data.counts)
    }

    /// Statevector for the named experiment, if one was captured.
    pub fn get_statevector(&self, name: &str) -> Option<&[Complex64]> {
        self.experiment(name)
            .and_then(|r| r.data.statevector.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_result_accepts_legacy_version_field() {
        let raw: RawEngineResult = serde_json::from_str(
            r#"{"qtoaster_version": "1.2.0", "counts": {"00": 3}, "time_taken": 0.5}"#,
        )
        .unwrap();
        assert_eq!(raw.engine_version.as_deref(), Some("1.2.0"));
        assert_eq!(raw.counts["00"], 3);
        assert!(raw.statevector.is_none());
    }

    #[test]
    fn test_raw_result_statevector_pairs() {
        let raw: RawEngineResult = serde_json::from_str(
            r#"{"engine_version": "1.0.0", "counts": {"0": 1}, "statevector": [[0.5, 0.0], [0.0, -0.5]], "time_taken": 0}"#,
        )
        .unwrap();
        let sv = raw.statevector.unwrap();
        assert_eq!(sv.len(), 2);
        assert_eq!(sv[1], Complex64::new(0.0, -0.5));
    }

    #[test]
    fn test_sorted_counts() {
        let mut data = ExperimentData::default();
        data.counts.insert("0x0".into(), 10);
        data.counts.insert("0x3".into(), 30);
        data.counts.insert("0x1".into(), 10);
        let result = ExperimentResult {
            success: true,
            meas_level: MEAS_LEVEL_CLASSIFIED,
            shots: 50,
            data,
            header: ExperimentHeader::new("x"),
            name: "x".into(),
            status: "DONE".into(),
            time_taken: 0.0,
            seed_simulator: 0,
            engine_version: "1.0.0".into(),
        };

        assert_eq!(result.total_counts(), 50);
        assert_eq!(
            result.sorted_counts(),
            vec![("0x3", 30), ("0x0", 10), ("0x1", 10)]
        );
    }
}
