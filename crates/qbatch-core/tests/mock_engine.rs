//! In-process engine used by the integration tests.
//!
//! Samples uniformly over two-qubit outcomes with a seeded RNG, so equal
//! seeds reproduce equal histograms.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use qbatch_core::{ExecParams, JobRequest, Transport, TransportError, TransportResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashMap;
use serde_json::json;

const OUTCOMES: [&str; 4] = ["00", "01", "10", "11"];

#[derive(Debug, Default)]
pub struct MockEngine {
    version: Option<String>,
    delay: Option<Duration>,
    failing: HashSet<String>,
    calls: AtomicUsize,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            version: Some("1.2.0".into()),
            ..Self::default()
        }
    }

    /// Sleep this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Answer experiments with this name with an HTTP 500.
    pub fn failing_on(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn execute(&self, payload: &[u8], params: &ExecParams) -> TransportResult<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let request: JobRequest = serde_json::from_slice(payload)
            .map_err(|e| TransportError::Request(e.to_string()))?;
        let name = request.experiments[0].name().to_string();
        if self.failing.contains(&name) {
            return Err(TransportError::Status {
                code: 500,
                body: format!("cannot simulate {name}"),
            });
        }

        let mut rng = match params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut counts: FxHashMap<String, u64> = FxHashMap::default();
        for _ in 0..params.shots {
            let outcome = OUTCOMES[rng.gen_range(0..OUTCOMES.len())];
            *counts.entry(outcome.to_string()).or_default() += 1;
        }

        let mut body = json!({
            "counts": counts,
            "time_taken": 0.001,
        });
        if let Some(version) = &self.version {
            body["engine_version"] = json!(version);
        }
        if params.wants_state() {
            body["statevector"] = json!([[0.5, 0.0], [0.5, 0.0], [0.5, 0.0], [0.5, 0.0]]);
        }

        serde_json::to_vec(&body).map_err(|e| TransportError::Request(e.to_string()))
    }
}
