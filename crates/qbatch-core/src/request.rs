//! Composite job requests.
//!
//! A [`JobRequest`] bundles a shared run configuration with an ordered list
//! of independent [`Experiment`]s. The orchestrator reads only the fields
//! modelled here; everything else is carried through untouched for the
//! wire-format converter.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default number of shots when a request does not specify one.
pub const DEFAULT_SHOTS: u32 = 1024;

/// A batch of experiments submitted together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    /// Request identifier chosen by the caller.
    #[serde(alias = "qobj_id")]
    pub id: String,
    /// Shared header, copied verbatim onto the job result.
    #[serde(default)]
    pub header: Value,
    /// Run configuration shared by all experiments.
    #[serde(default)]
    pub config: RunConfig,
    /// Experiments, executed independently and reported in this order.
    #[serde(default)]
    pub experiments: Vec<Experiment>,
}

impl JobRequest {
    /// Create an empty request with default configuration.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            header: Value::Object(Map::new()),
            config: RunConfig::default(),
            experiments: Vec::new(),
        }
    }

    /// Set the number of shots.
    pub fn with_shots(mut self, shots: u32) -> Self {
        self.config.shots = shots;
        self
    }

    /// Set the simulator seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.seed_simulator = Some(seed);
        self
    }

    /// Set the engine optimization level.
    pub fn with_optimization_level(mut self, level: u32) -> Self {
        self.config.optimization_level = Some(level);
        self
    }

    /// Append an experiment.
    pub fn with_experiment(mut self, experiment: Experiment) -> Self {
        self.experiments.push(experiment);
        self
    }

    /// Number of experiments in the request.
    pub fn len(&self) -> usize {
        self.experiments.len()
    }

    /// Whether the request carries no experiments.
    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
    }

    /// A copy of this request restricted to the experiment at `index`.
    ///
    /// Returns `None` if `index` is out of range.
    pub fn single(&self, index: usize) -> Option<JobRequest> {
        let experiment = self.experiments.get(index)?.clone();
        Some(JobRequest {
            id: self.id.clone(),
            header: self.header.clone(),
            config: self.config.clone(),
            experiments: vec![experiment],
        })
    }

    /// Split into one single-experiment request per experiment, in order.
    pub fn split(&self) -> Vec<JobRequest> {
        (0..self.experiments.len())
            .filter_map(|index| self.single(index))
            .collect()
    }

    /// Load a request from a JSON document.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Run configuration shared by every experiment of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Number of repeated trials per experiment.
    #[serde(default = "default_shots")]
    pub shots: u32,
    /// Seed for deterministic sampling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_simulator: Option<u64>,
    /// Engine-side optimization level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimization_level: Option<u32>,
    /// Fields the orchestrator does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_shots() -> u32 {
    DEFAULT_SHOTS
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            shots: DEFAULT_SHOTS,
            seed_simulator: None,
            optimization_level: None,
            extra: Map::new(),
        }
    }
}

/// One independent circuit execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    /// Identifying header, copied onto the experiment result.
    pub header: ExperimentHeader,
    /// Instruction sequence, opaque to the orchestrator.
    #[serde(default)]
    pub instructions: Vec<Value>,
    /// Per-experiment configuration, opaque to the orchestrator.
    #[serde(default)]
    pub config: Map<String, Value>,
}

impl Experiment {
    /// Create an experiment with the given name and no instructions.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            header: ExperimentHeader::new(name),
            instructions: Vec::new(),
            config: Map::new(),
        }
    }

    /// Append an instruction.
    pub fn with_instruction(mut self, instruction: Value) -> Self {
        self.instructions.push(instruction);
        self
    }

    /// Experiment name.
    pub fn name(&self) -> &str {
        &self.header.name
    }
}

/// Experiment header: a name plus whatever identifiers the caller attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentHeader {
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ExperimentHeader {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extra: Map::new(),
        }
    }
}
