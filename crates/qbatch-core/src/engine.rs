//! Engine client: the per-experiment unit of work.
//!
//! [`EngineClient::run_experiment`] converts one experiment, hands it to the
//! configured [`Transport`], and turns the engine's answer into an
//! [`ExperimentResult`].
//!
//! How engine answers map to outcomes:
//!
//! | Engine answer | Outcome |
//! |---------------|---------|
//! | empty body, invalid JSON, wrong object shape | `Ok`, `success = false`, zero counts |
//! | version below minimum (or missing) | `Err(ExecError::Version)` |
//! | transport failure | `Err(ExecError::Transport)` |

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::convert::{JsonConverter, WireConverter};
use crate::counts::normalize_counts;
use crate::error::{ExecError, ExecResult};
use crate::request::JobRequest;
use crate::result::{ExperimentData, ExperimentResult, MEAS_LEVEL_CLASSIFIED, RawEngineResult};
use crate::transport::{ExecParams, ReturnKind, Transport};
use crate::version::{EngineVersion, UNKNOWN_ENGINE_VERSION};

/// Directory receiving request/response dumps.
pub const DUMP_DIR_ENV: &str = "QBATCH_DUMP_DIR";

/// Older name for [`DUMP_DIR_ENV`], read only when the current one is unset.
pub const LEGACY_DUMP_DIR_ENV: &str = "TOASTER_DUMP_DIR";

/// Resolve the dump directory through `lookup`; empty values count as unset.
pub fn dump_dir_with<F>(lookup: F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(DUMP_DIR_ENV)
        .filter(|v| !v.is_empty())
        .or_else(|| lookup(LEGACY_DUMP_DIR_ENV).filter(|v| !v.is_empty()))
        .map(PathBuf::from)
}

/// Runs single experiments against the engine.
pub struct EngineClient {
    transport: Arc<dyn Transport>,
    converter: Arc<dyn WireConverter>,
    get_statevector: bool,
    default_optimization_level: Option<u32>,
    dump_dir: Option<PathBuf>,
    min_version: EngineVersion,
}

impl std::fmt::Debug for EngineClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineClient")
            .field("transport", &self.transport.name())
            .field("get_statevector", &self.get_statevector)
            .field("default_optimization_level", &self.default_optimization_level)
            .field("dump_dir", &self.dump_dir)
            .field("min_version", &self.min_version.as_str())
            .finish()
    }
}

impl EngineClient {
    /// Create a client using the JSON converter and the default minimum version.
    ///
    /// The dump directory starts from `QBATCH_DUMP_DIR` (or `TOASTER_DUMP_DIR`).
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            converter: Arc::new(JsonConverter),
            get_statevector: false,
            default_optimization_level: None,
            dump_dir: dump_dir_with(|key| std::env::var(key).ok()),
            min_version: EngineVersion::minimum(),
        }
    }

    /// Use a different wire-format converter.
    pub fn with_converter(mut self, converter: Arc<dyn WireConverter>) -> Self {
        self.converter = converter;
        self
    }

    /// Request the final statevector (forces a single shot).
    pub fn with_statevector(mut self, get_statevector: bool) -> Self {
        self.get_statevector = get_statevector;
        self
    }

    /// Optimization level used when a request does not set its own.
    pub fn with_default_optimization_level(mut self, level: Option<u32>) -> Self {
        self.default_optimization_level = level;
        self
    }

    /// Write request/response documents under `dir` for inspection.
    pub fn with_dump_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.dump_dir = dir;
        self
    }

    /// Override the minimum accepted engine version.
    pub fn with_min_version(mut self, version: EngineVersion) -> Self {
        self.min_version = version;
        self
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn get_statevector(&self) -> bool {
        self.get_statevector
    }

    /// Derive transport parameters for a single-experiment request.
    pub fn exec_params(&self, request: &JobRequest, sub_job_id: &str) -> ExecParams {
        let shots = if self.get_statevector {
            1
        } else {
            request.config.shots
        };

        let mut params = ExecParams::new(sub_job_id, shots);
        if self.get_statevector {
            params = params.with_return(ReturnKind::State);
        }

        let seed = request.config.seed_simulator.unwrap_or(0);
        if seed != 0 {
            params = params.with_seed(seed);
        }
        let level = request
            .config
            .optimization_level
            .or(self.default_optimization_level);
        if let Some(level) = level.filter(|l| *l != 0) {
            params = params.with_optimization_level(level);
        }
        params
    }

    /// Run the single experiment carried by `request`.
    #[instrument(skip(self, request), fields(transport = self.transport.name()))]
    pub async fn run_experiment(
        &self,
        request: &JobRequest,
        sub_job_id: &str,
    ) -> ExecResult<ExperimentResult> {
        let experiment = request.experiments.first().ok_or_else(|| {
            ExecError::Submission(format!("{sub_job_id}: request carries no experiment"))
        })?;

        let params = self.exec_params(request, sub_job_id);
        let seed = request.config.seed_simulator.unwrap_or(0);

        let payload = self.converter.convert(request)?;
        if let Some(dir) = &self.dump_dir {
            dump(dir, &format!("{sub_job_id}.request.json"), &payload).await;
        }

        debug!(
            shots = params.shots,
            returns = %params.returns_joined(),
            "Sending experiment '{}' to engine",
            experiment.name()
        );
        let body = self.transport.execute(&payload, &params).await?;

        if let Some(dir) = &self.dump_dir {
            dump(dir, &format!("{sub_job_id}.response.json"), &body).await;
        }

        let mut result = ExperimentResult {
            success: false,
            meas_level: MEAS_LEVEL_CLASSIFIED,
            shots: params.shots,
            data: ExperimentData::default(),
            header: experiment.header.clone(),
            name: experiment.name().to_string(),
            status: "DONE".to_string(),
            time_taken: 0.0,
            seed_simulator: seed,
            engine_version: UNKNOWN_ENGINE_VERSION.to_string(),
        };

        let Some(document) = parse_body(&body) else {
            warn!("Engine returned no parseable result for {}", sub_job_id);
            return Ok(result);
        };

        // Anything that is not a JSON object cannot carry a version.
        let reported = document
            .get("engine_version")
            .or_else(|| document.get("qtoaster_version"))
            .and_then(|v| v.as_str())
            .unwrap_or(UNKNOWN_ENGINE_VERSION);
        let version = EngineVersion::parse(reported);
        version.ensure_at_least(&self.min_version)?;
        result.engine_version = version.as_str().to_string();

        let raw: RawEngineResult = match serde_json::from_value(document) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Engine result for {} has unexpected shape: {}", sub_job_id, e);
                return Ok(result);
            }
        };
        let Some(counts) = normalize_counts(&raw.counts) else {
            warn!("Engine result for {} has non-binary counts keys", sub_job_id);
            return Ok(result);
        };

        debug!(
            outcomes = counts.len(),
            time_taken = raw.time_taken,
            "Engine finished {}",
            sub_job_id
        );

        result.success = true;
        result.time_taken = raw.time_taken;
        result.data.counts = counts;
        result.data.statevector = raw.statevector.filter(|sv| !sv.is_empty());
        Ok(result)
    }
}

fn parse_body(body: &[u8]) -> Option<serde_json::Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    serde_json::from_slice(body).ok()
}

async fn dump(dir: &Path, file_name: &str, contents: &[u8]) {
    let path = dir.join(file_name);
    if let Err(e) = tokio::fs::write(&path, contents).await {
        warn!("Failed to write debug dump {}: {}", path.display(), e);
    }
}
