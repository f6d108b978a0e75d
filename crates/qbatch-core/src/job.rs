//! Job dispatcher and status state machine.
//!
//! A [`Job`] splits its [`JobRequest`] into one [`WorkerUnit`] per
//! experiment and hands every unit to a [`WorkerPool`]. The job-level
//! status is derived from the units' phases:
//!
//! ```text
//!   Initializing ──submit()──→ Queued ──→ Running ──→ Done
//!                                            │
//!                                            ├──→ Error
//!                                            └──→ Cancelled
//! ```
//!
//! With units in mixed phases the status is chosen in the fixed order
//! `Error > Running > Cancelled > Done > Queued`: one failed unit makes the
//! whole job `Error`, and one running unit keeps it `Running`.
//!
//! **Invariants:**
//! - `submit()` succeeds at most once per job.
//! - Results are reported in experiment order, whatever order units finish in.
//! - The aggregated [`JobResult`] is built once every unit is terminal, then cached.

use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::aggregate::aggregate;
use crate::engine::EngineClient;
use crate::error::{ExecError, ExecResult};
use crate::pool::WorkerPool;
use crate::request::JobRequest;
use crate::result::{ExperimentResult, JobMetrics, JobResult};

/// Job-level status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Nothing has been submitted yet.
    Initializing,
    /// Units submitted, none observed running.
    Queued,
    /// At least one unit is executing.
    Running,
    /// Every unit finished without error.
    Done,
    /// At least one unit failed.
    Error,
    /// At least one unit was cancelled by the pool.
    Cancelled,
}

impl JobStatus {
    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Done | JobStatus::Error | JobStatus::Cancelled
        )
    }

    /// Derive a job status from unit phases.
    pub fn from_phases<I>(phases: I) -> Self
    where
        I: IntoIterator<Item = UnitPhase>,
    {
        let mut seen = 0usize;
        let (mut running, mut finished, mut failed, mut cancelled) = (0, 0, 0, 0);
        for phase in phases {
            seen += 1;
            match phase {
                UnitPhase::Pending => {}
                UnitPhase::Running => running += 1,
                UnitPhase::Finished => finished += 1,
                UnitPhase::Failed => failed += 1,
                UnitPhase::Cancelled => cancelled += 1,
            }
        }

        if seen == 0 {
            JobStatus::Done
        } else if failed > 0 {
            JobStatus::Error
        } else if running > 0 {
            JobStatus::Running
        } else if cancelled > 0 {
            JobStatus::Cancelled
        } else if finished > 0 {
            JobStatus::Done
        } else {
            JobStatus::Queued
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Initializing => "INITIALIZING",
            JobStatus::Queued => "QUEUED",
            JobStatus::Running => "RUNNING",
            JobStatus::Done => "DONE",
            JobStatus::Error => "ERROR",
            JobStatus::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

/// Phase of a single unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitPhase {
    /// Waiting for a worker.
    Pending,
    /// Executing.
    Running,
    /// Produced an experiment result.
    Finished,
    /// Produced an error.
    Failed,
    /// Dropped by the pool before finishing.
    Cancelled,
}

impl UnitPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            UnitPhase::Finished | UnitPhase::Failed | UnitPhase::Cancelled
        )
    }
}

/// Shared state between a unit's task and its job.
#[derive(Debug)]
struct UnitCell {
    sub_job_id: String,
    phase: watch::Sender<UnitPhase>,
    outcome: Mutex<Option<ExecResult<ExperimentResult>>>,
}

impl UnitCell {
    fn new(sub_job_id: String) -> Self {
        let (phase, _) = watch::channel(UnitPhase::Pending);
        Self {
            sub_job_id,
            phase,
            outcome: Mutex::new(None),
        }
    }

    fn phase(&self) -> UnitPhase {
        *self.phase.borrow()
    }

    fn mark_running(&self) {
        self.phase.send_if_modified(|phase| {
            if *phase == UnitPhase::Pending {
                *phase = UnitPhase::Running;
                true
            } else {
                false
            }
        });
    }

    /// Record the outcome, then publish the terminal phase.
    fn finish(&self, outcome: ExecResult<ExperimentResult>) {
        let phase = if outcome.is_ok() {
            UnitPhase::Finished
        } else {
            UnitPhase::Failed
        };
        *self
            .outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(outcome);
        self.phase.send_replace(phase);
    }

    fn cancel(&self) {
        self.phase.send_replace(UnitPhase::Cancelled);
    }

    fn error(&self) -> Option<ExecError> {
        match self
            .outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            Some(Err(e)) => Some(e.clone()),
            _ => None,
        }
    }

    fn result(&self) -> Option<ExperimentResult> {
        match self
            .outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            Some(Ok(r)) => Some(r.clone()),
            _ => None,
        }
    }

    async fn settled(&self) {
        let mut rx = self.phase.subscribe();
        let _ = rx.wait_for(|phase| phase.is_terminal()).await;
    }
}

/// Moves a unit to a terminal phase if its task goes away early.
///
/// Lives inside the unit's future, so it is dropped when the pool drops
/// the task: on abort the unit becomes `Cancelled`, on panic `Failed`.
struct UnitGuard(Arc<UnitCell>);

impl Drop for UnitGuard {
    fn drop(&mut self) {
        if self.0.phase().is_terminal() {
            return;
        }
        if std::thread::panicking() {
            warn!("Worker for {} panicked", self.0.sub_job_id);
            self.0
                .finish(Err(ExecError::WorkerPanicked(self.0.sub_job_id.clone())));
        } else {
            debug!("Worker for {} dropped before finishing", self.0.sub_job_id);
            self.0.cancel();
        }
    }
}

/// One experiment's unit of work.
#[derive(Debug)]
pub struct WorkerUnit {
    index: usize,
    cell: Arc<UnitCell>,
}

impl WorkerUnit {
    fn new(index: usize, job_id: &str) -> Self {
        Self {
            index,
            cell: Arc::new(UnitCell::new(sub_job_id(index, job_id))),
        }
    }

    /// Position of the unit's experiment in the request.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Identifier the engine sees for this unit.
    pub fn sub_job_id(&self) -> &str {
        &self.cell.sub_job_id
    }

    pub fn phase(&self) -> UnitPhase {
        self.cell.phase()
    }

    /// The unit's error, if it failed.
    pub fn error(&self) -> Option<ExecError> {
        self.cell.error()
    }
}

/// Engine-facing identifier of the experiment at `index` (1-based in the id).
pub fn sub_job_id(index: usize, job_id: &str) -> String {
    format!("Exp_{}_{}", index + 1, job_id)
}

struct Submission {
    units: Vec<WorkerUnit>,
    submitted_at: DateTime<Utc>,
    started: Instant,
}

/// A composite request executing as independent units.
pub struct Job {
    job_id: String,
    request: Arc<JobRequest>,
    engine: Arc<EngineClient>,
    pool: Arc<WorkerPool>,
    submission: OnceLock<Submission>,
    result: OnceLock<JobResult>,
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("job_id", &self.job_id)
            .field("request_id", &self.request.id)
            .field("experiments", &self.request.len())
            .field("status", &self.status())
            .finish()
    }
}

impl Job {
    /// Create a job; nothing runs until [`submit`](Self::submit).
    pub fn new(
        job_id: impl Into<String>,
        request: JobRequest,
        engine: Arc<EngineClient>,
        pool: Arc<WorkerPool>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            request: Arc::new(request),
            engine,
            pool,
            submission: OnceLock::new(),
            result: OnceLock::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.job_id
    }

    pub fn request(&self) -> &JobRequest {
        &self.request
    }

    /// Units created by `submit()`; empty before submission.
    pub fn units(&self) -> &[WorkerUnit] {
        self.submission
            .get()
            .map(|s| s.units.as_slice())
            .unwrap_or_default()
    }

    /// Hand one unit per experiment to the worker pool.
    ///
    /// Must be called from within a Tokio runtime. Fails with
    /// [`ExecError::Submission`] on a second call.
    #[instrument(skip(self), fields(job_id = %self.job_id))]
    pub fn submit(&self) -> ExecResult<()> {
        let runtime = Handle::try_current().map_err(|_| {
            ExecError::Submission(format!(
                "job {} must be submitted from within an async runtime",
                self.job_id
            ))
        })?;

        let units: Vec<WorkerUnit> = (0..self.request.len())
            .map(|index| WorkerUnit::new(index, &self.job_id))
            .collect();
        let submission = Submission {
            units,
            submitted_at: Utc::now(),
            started: Instant::now(),
        };
        if self.submission.set(submission).is_err() {
            return Err(ExecError::Submission(format!(
                "job {} has already been submitted",
                self.job_id
            )));
        }

        let units = self.units();
        info!(
            experiments = units.len(),
            workers = self.pool.size(),
            "Submitting job"
        );

        for (unit, request) in units.iter().zip(self.request.split()) {
            let engine = Arc::clone(&self.engine);
            let cell = Arc::clone(&unit.cell);
            let guard = UnitGuard(Arc::clone(&cell));
            self.pool.spawn(&runtime, async move {
                let _guard = guard;
                cell.mark_running();
                let outcome = engine.run_experiment(&request, &cell.sub_job_id).await;
                if let Err(e) = &outcome {
                    warn!("{} failed: {}", cell.sub_job_id, e);
                }
                cell.finish(outcome);
            });
        }

        Ok(())
    }

    /// Current job status.
    pub fn status(&self) -> JobStatus {
        match self.submission.get() {
            None => JobStatus::Initializing,
            Some(submission) => {
                JobStatus::from_phases(submission.units.iter().map(WorkerUnit::phase))
            }
        }
    }

    /// Wait until every unit is terminal or `timeout` elapses.
    ///
    /// Elapsing the timeout is not an error and does not stop any unit.
    /// Returns the first unit error, in experiment order, if any unit failed.
    pub async fn wait(&self, timeout: Option<Duration>) -> ExecResult<()> {
        let Some(submission) = self.submission.get() else {
            return Ok(());
        };

        let settled = futures::future::join_all(submission.units.iter().map(|u| u.cell.settled()));
        match timeout {
            Some(limit) => {
                if tokio::time::timeout(limit, settled).await.is_err() {
                    debug!(job_id = %self.job_id, "Wait timed out after {:?}", limit);
                }
            }
            None => {
                settled.await;
            }
        }

        match submission.units.iter().find_map(WorkerUnit::error) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Wait, then return the aggregated result.
    ///
    /// Re-raises the first unit error. Fails with [`ExecError::Timeout`] if
    /// units are still pending when `timeout` elapses, and with
    /// [`ExecError::Cancelled`] if the pool cancelled a unit.
    pub async fn result(&self, timeout: Option<Duration>) -> ExecResult<&JobResult> {
        let Some(submission) = self.submission.get() else {
            return Err(ExecError::Submission(format!(
                "job {} has not been submitted",
                self.job_id
            )));
        };

        self.wait(timeout).await?;

        if let Some(result) = self.result.get() {
            return Ok(result);
        }

        // `Done` only means no unit is running; others may still be pending.
        if !submission.units.iter().all(|u| u.phase().is_terminal()) {
            return Err(ExecError::Timeout(self.job_id.clone()));
        }
        if let Some(e) = submission.units.iter().find_map(WorkerUnit::error) {
            return Err(e);
        }
        if submission
            .units
            .iter()
            .any(|u| u.phase() == UnitPhase::Cancelled)
        {
            return Err(ExecError::Cancelled(self.job_id.clone()));
        }

        let results: Vec<ExperimentResult> = submission
            .units
            .iter()
            .filter_map(|u| u.cell.result())
            .collect();
        let metrics = JobMetrics {
            submitted_at: submission.submitted_at,
            wall_time_secs: submission.started.elapsed().as_secs_f64(),
            engine_time_secs: results.iter().map(|r| r.time_taken).sum(),
            experiments: results.len(),
        };

        let result = self
            .result
            .get_or_init(|| aggregate(&self.request, &self.job_id, results, metrics));
        info!(
            job_id = %self.job_id,
            wall_time_secs = result.metrics.wall_time_secs,
            "Job completed"
        );
        Ok(result)
    }

    /// Cancellation is not supported; in-flight units always run to completion.
    pub fn cancel(&self) {
        debug!(job_id = %self.job_id, "Cancel requested; ignored");
    }

    /// Timing for the job, available once its result has been built.
    pub fn metrics(&self) -> Option<&JobMetrics> {
        self.result.get().map(|r| &r.metrics)
    }
}
