//! qbatch job orchestration core
//!
//! This crate runs batches of independent quantum-circuit experiments
//! against an external simulation engine and folds the answers into one
//! job result.
//!
//! # Overview
//!
//! - A [`Transport`] delivers one converted experiment to the engine
//!   (HTTP or local process, see the adapter crates).
//! - The [`EngineClient`] runs a single experiment: it derives shots,
//!   seed and return kinds, calls the transport, checks the engine's
//!   version, and normalizes counts.
//! - A [`Job`] splits a [`JobRequest`] into one [`WorkerUnit`] per
//!   experiment, runs them on a bounded [`WorkerPool`], and derives its
//!   [`JobStatus`] from the units.
//! - [`aggregate`] merges the experiment results, in request order, into
//!   a [`JobResult`].
//!
//! # Example: Running a Request
//!
//! ```ignore
//! use std::sync::Arc;
//! use qbatch_core::{EngineBackend, Experiment, JobRequest};
//! use qbatch_adapter_http::HttpTransport;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let transport = Arc::new(HttpTransport::new("http://127.0.0.1:8001")?);
//!     let backend = EngineBackend::new(transport);
//!
//!     let request = JobRequest::new("bell-batch")
//!         .with_shots(1024)
//!         .with_experiment(Experiment::new("Bell"));
//!
//!     let job = backend.run(request)?;
//!     let result = job.result(None).await?;
//!     println!("{:?}", result.get_counts("Bell"));
//!     Ok(())
//! }
//! ```

pub mod aggregate;
pub mod backend;
pub mod config;
pub mod convert;
pub mod counts;
pub mod engine;
pub mod error;
pub mod job;
pub mod pool;
pub mod request;
pub mod result;
pub mod transport;
pub mod version;

pub use aggregate::aggregate;
pub use backend::{BackendConfiguration, EngineBackend};
pub use config::{Config, ConfigError, TransportConfig};
pub use convert::{JsonConverter, WireConverter};
pub use counts::{normalize_counts, normalize_key};
pub use engine::EngineClient;
pub use error::{ExecError, ExecResult, TransportError, TransportResult};
pub use job::{Job, JobStatus, UnitPhase, WorkerUnit};
pub use pool::{PoolKind, WorkerPool};
pub use request::{Experiment, ExperimentHeader, JobRequest, RunConfig};
pub use result::{ExperimentData, ExperimentResult, JobMetrics, JobResult, RawEngineResult};
pub use transport::{ExecParams, ReturnKind, Transport};
pub use version::{EngineVersion, MIN_ENGINE_VERSION};
