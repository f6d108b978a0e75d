//! Engine backend facade.
//!
//! An [`EngineBackend`] pairs a static [`BackendConfiguration`] with an
//! [`EngineClient`] and a [`WorkerPool`], and turns requests into running
//! [`Job`]s. Two flavors exist: a counts simulator and a statevector
//! simulator, which captures the final state and always runs one shot.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::engine::EngineClient;
use crate::error::{ExecError, ExecResult};
use crate::job::Job;
use crate::pool::WorkerPool;
use crate::request::JobRequest;
use crate::transport::Transport;

/// Largest register the engine simulates.
pub const MAX_QUBITS: u32 = 32;

/// Largest shot count accepted per experiment.
pub const MAX_SHOTS: u32 = 65_536;

/// Static description of an engine backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfiguration {
    pub backend_name: String,
    pub backend_version: String,
    pub n_qubits: u32,
    pub simulator: bool,
    pub local: bool,
    pub conditional: bool,
    pub open_pulse: bool,
    pub memory: bool,
    pub max_shots: u32,
    pub description: String,
    pub basis_gates: Vec<String>,
}

impl BackendConfiguration {
    /// Configuration of the counts simulator.
    pub fn counts_simulator() -> Self {
        Self {
            backend_name: "qbatch_simulator".into(),
            backend_version: "1.0.0".into(),
            n_qubits: MAX_QUBITS,
            simulator: true,
            local: true,
            conditional: false,
            open_pulse: false,
            memory: true,
            max_shots: MAX_SHOTS,
            description: "A qasm simulator backed by an external engine".into(),
            basis_gates: ["u1", "u2", "u3", "cx", "id", "x", "y", "z", "h", "s", "t"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }

    /// Configuration of the statevector simulator.
    pub fn statevector_simulator() -> Self {
        Self {
            backend_name: "statevector_simulator".into(),
            description: "A statevector simulator backed by an external engine".into(),
            ..Self::counts_simulator()
        }
    }
}

/// Creates and submits jobs against one engine.
#[derive(Debug)]
pub struct EngineBackend {
    configuration: BackendConfiguration,
    engine: Arc<EngineClient>,
    pool: Arc<WorkerPool>,
}

impl EngineBackend {
    /// Counts simulator on the process-wide worker pool.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::from_engine(
            BackendConfiguration::counts_simulator(),
            EngineClient::new(transport),
        )
    }

    /// Statevector simulator on the process-wide worker pool.
    pub fn statevector(transport: Arc<dyn Transport>) -> Self {
        Self::from_engine(
            BackendConfiguration::statevector_simulator(),
            EngineClient::new(transport).with_statevector(true),
        )
    }

    /// Backend from an explicitly configured engine client.
    pub fn from_engine(configuration: BackendConfiguration, engine: EngineClient) -> Self {
        Self {
            configuration,
            engine: Arc::new(engine),
            pool: WorkerPool::global(),
        }
    }

    /// Run jobs on `pool` instead of the process-wide pool.
    pub fn with_pool(mut self, pool: Arc<WorkerPool>) -> Self {
        self.pool = pool;
        self
    }

    pub fn name(&self) -> &str {
        &self.configuration.backend_name
    }

    pub fn configuration(&self) -> &BackendConfiguration {
        &self.configuration
    }

    pub fn engine(&self) -> &EngineClient {
        &self.engine
    }

    /// Create a job for `request` under a fresh id and submit it.
    pub fn run(&self, request: JobRequest) -> ExecResult<Job> {
        if !self.engine.get_statevector() && request.config.shots > self.configuration.max_shots {
            return Err(ExecError::Submission(format!(
                "{} shots requested but {} supports at most {}",
                request.config.shots, self.configuration.backend_name, self.configuration.max_shots
            )));
        }

        let job_id = Uuid::new_v4().to_string();
        info!(
            backend = %self.configuration.backend_name,
            job_id = %job_id,
            experiments = request.len(),
            "Running request {}",
            request.id
        );

        let job = Job::new(job_id, request, Arc::clone(&self.engine), Arc::clone(&self.pool));
        job.submit()?;
        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configurations() {
        let counts = BackendConfiguration::counts_simulator();
        assert_eq!(counts.max_shots, MAX_SHOTS);
        assert_eq!(counts.n_qubits, 32);
        assert!(counts.basis_gates.iter().any(|g| g == "cx"));

        let sv = BackendConfiguration::statevector_simulator();
        assert_eq!(sv.backend_name, "statevector_simulator");
        assert_eq!(sv.basis_gates, counts.basis_gates);
    }
}
