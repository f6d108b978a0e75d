//! Merge per-experiment results into one job result.

use crate::request::JobRequest;
use crate::result::{ExperimentResult, JobMetrics, JobResult};
use crate::version::{BASELINE_ENGINE_VERSION, UNKNOWN_ENGINE_VERSION};

/// Backend name recorded on aggregated results.
pub const BACKEND_NAME: &str = "qbatch_engine";

/// Status recorded on aggregated results.
pub const STATUS_COMPLETED: &str = "COMPLETED";

/// Build the job result from experiment results in request order.
///
/// `success` is always `true` here: a soft failure of one experiment is
/// visible only on that experiment's own `success` flag.
pub fn aggregate(
    request: &JobRequest,
    job_id: &str,
    results: Vec<ExperimentResult>,
    metrics: JobMetrics,
) -> JobResult {
    let engine_version = results
        .iter()
        .map(|r| r.engine_version.as_str())
        .find(|v| !v.is_empty() && *v != UNKNOWN_ENGINE_VERSION)
        .unwrap_or(BASELINE_ENGINE_VERSION)
        .to_string();

    JobResult {
        success: true,
        backend_name: BACKEND_NAME.to_string(),
        request_id: request.id.clone(),
        job_id: job_id.to_string(),
        engine_version,
        header: request.header.clone(),
        results,
        status: STATUS_COMPLETED.to_string(),
        metrics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::ExperimentHeader;
    use crate::result::{ExperimentData, MEAS_LEVEL_CLASSIFIED};
    use chrono::Utc;

    fn experiment(name: &str, success: bool, version: &str) -> ExperimentResult {
        ExperimentResult {
            success,
            meas_level: MEAS_LEVEL_CLASSIFIED,
            shots: 1,
            data: ExperimentData::default(),
            header: ExperimentHeader::new(name),
            name: name.into(),
            status: "DONE".into(),
            time_taken: 0.0,
            seed_simulator: 0,
            engine_version: version.into(),
        }
    }

    fn metrics(experiments: usize) -> JobMetrics {
        JobMetrics {
            submitted_at: Utc::now(),
            wall_time_secs: 0.0,
            engine_time_secs: 0.0,
            experiments,
        }
    }

    #[test]
    fn test_version_from_first_reporting_experiment() {
        let request = JobRequest::new("req");
        let results = vec![
            experiment("a", false, UNKNOWN_ENGINE_VERSION),
            experiment("b", true, "1.3.0"),
            experiment("c", true, "1.4.0"),
        ];

        let job = aggregate(&request, "job-1", results, metrics(3));
        assert_eq!(job.engine_version, "1.3.0");
        assert_eq!(job.request_id, "req");
        assert_eq!(job.job_id, "job-1");
        assert_eq!(job.status, STATUS_COMPLETED);
        let names: Vec<_> = job.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn test_baseline_version_when_none_reported() {
        let job = aggregate(&JobRequest::new("req"), "job-1", Vec::new(), metrics(0));
        assert_eq!(job.engine_version, BASELINE_ENGINE_VERSION);
        assert!(job.results.is_empty());
        assert!(job.success);
    }

    #[test]
    fn test_soft_failures_do_not_fail_job() {
        let results = vec![experiment("a", false, UNKNOWN_ENGINE_VERSION)];
        let job = aggregate(&JobRequest::new("req"), "job-1", results, metrics(1));
        assert!(job.success);
        assert!(!job.results[0].success);
    }
}
