//! Transport capability.
//!
//! A [`Transport`] delivers one converted experiment to the engine and
//! returns the raw result bytes. Two implementations live in the adapter
//! crates:
//!
//! | Transport | Crate | Engine reached via |
//! |-----------|-------|--------------------|
//! | HTTP | `qbatch-adapter-http` | `POST /submit`, `GET /pollresult/{job_id}` |
//! | Process | `qbatch-adapter-process` | spawned executable, stdin/stdout |
//!
//! # Implementing a custom transport
//!
//! ```ignore
//! use async_trait::async_trait;
//! use qbatch_core::{ExecParams, Transport, TransportResult};
//!
//! #[derive(Debug)]
//! struct Loopback;
//!
//! #[async_trait]
//! impl Transport for Loopback {
//!     fn name(&self) -> &str { "loopback" }
//!
//!     async fn execute(&self, payload: &[u8], _params: &ExecParams) -> TransportResult<Vec<u8>> {
//!         Ok(payload.to_vec())
//!     }
//! }
//! ```

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TransportResult;

/// What the engine should include in its result document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnKind {
    /// Measurement histogram.
    Counts,
    /// Final statevector.
    State,
}

impl ReturnKind {
    /// Wire name of this return kind.
    pub fn as_str(self) -> &'static str {
        match self {
            ReturnKind::Counts => "counts",
            ReturnKind::State => "state",
        }
    }
}

impl fmt::Display for ReturnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-call execution parameters passed alongside the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecParams {
    /// Sub-job identifier, also used as the poll key.
    pub job_id: String,
    pub shots: u32,
    /// Sampling seed; `None` lets the engine choose.
    pub seed: Option<u64>,
    /// Requested result sections; never empty.
    pub returns: Vec<ReturnKind>,
    pub optimization_level: Option<u32>,
}

impl ExecParams {
    /// Parameters requesting counts only.
    pub fn new(job_id: impl Into<String>, shots: u32) -> Self {
        Self {
            job_id: job_id.into(),
            shots,
            seed: None,
            returns: vec![ReturnKind::Counts],
            optimization_level: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_return(mut self, kind: ReturnKind) -> Self {
        if !self.returns.contains(&kind) {
            self.returns.push(kind);
        }
        self
    }

    pub fn with_optimization_level(mut self, level: u32) -> Self {
        self.optimization_level = Some(level);
        self
    }

    /// Return kinds joined with commas, e.g. `"counts,state"`.
    pub fn returns_joined(&self) -> String {
        self.returns
            .iter()
            .map(|r| r.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Whether a statevector was requested.
    pub fn wants_state(&self) -> bool {
        self.returns.contains(&ReturnKind::State)
    }
}

/// Delivers a payload to the engine and returns its raw result bytes.
///
/// An empty `Ok` body means the engine produced no result; callers treat
/// that as a soft failure rather than an error.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Execute one payload.
    async fn execute(&self, payload: &[u8], params: &ExecParams) -> TransportResult<Vec<u8>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_returns_joined() {
        let params = ExecParams::new("Exp_1_abc", 100);
        assert_eq!(params.returns_joined(), "counts");
        assert!(!params.wants_state());

        let params = params.with_return(ReturnKind::State).with_return(ReturnKind::State);
        assert_eq!(params.returns_joined(), "counts,state");
        assert!(params.wants_state());
    }

    #[test]
    fn test_return_kind_serde() {
        assert_eq!(
            serde_json::to_string(&ReturnKind::State).unwrap(),
            "\"state\""
        );
    }
}
