//! qbatch transport for engines reachable over HTTP.
//!
//! The engine accepts a converted experiment on `POST {url}/submit`, with
//! the run parameters carried in `x-qtc-*` headers:
//!
//! | Header | Value |
//! |--------|-------|
//! | `x-qtc-return` | comma-separated return kinds (`counts`, `state`) |
//! | `x-qtc-shots` | shot count |
//! | `x-qtc-jobid` | sub-job id, used to fetch the answer later |
//! | `x-qtc-seed` | seed, only when nonzero |
//! | `x-qtc-optimization` | optimization level, only when nonzero |
//!
//! When the submission times out, or the engine answers `409 Conflict`
//! because it already holds the job, the answer is fetched from
//! `GET {url}/pollresult/{job_id}`.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use qbatch_adapter_http::HttpTransport;
//! use qbatch_core::EngineBackend;
//!
//! let transport = HttpTransport::new("http://127.0.0.1:8001")?;
//! let backend = EngineBackend::new(Arc::new(transport));
//! ```

pub mod error;
pub mod transport;

pub use error::{HttpError, HttpResult};
pub use transport::{HttpTransport, MAX_RETRIES, RETRY_DELAY};
