//! qbatch transport for a local engine executable.
//!
//! Each experiment spawns the engine once. The converted experiment is
//! written to the child's stdin and the result document is read from its
//! stdout:
//!
//! ```text
//! <engine> - -s <shots> -r <kind>... [--seed <seed>] [-o <level>]
//! ```
//!
//! A nonzero exit status (or death by signal) fails the experiment, even
//! if the child printed a valid result first.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use qbatch_core::{ExecParams, Transport, TransportError, TransportResult};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// Longest stderr excerpt kept on an exit-status error.
const STDERR_EXCERPT: usize = 4096;

/// Transport running the engine as a child process.
#[derive(Debug, Clone)]
pub struct ProcessTransport {
    path: PathBuf,
}

impl ProcessTransport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Command-line arguments passed to the engine for `params`.
pub fn args(params: &ExecParams) -> Vec<String> {
    let mut args = vec![
        "-".to_string(),
        "-s".to_string(),
        params.shots.to_string(),
        "-r".to_string(),
    ];
    args.extend(params.returns.iter().map(|r| r.as_str().to_string()));

    if let Some(seed) = params.seed.filter(|s| *s != 0) {
        args.push("--seed".to_string());
        args.push(seed.to_string());
    }
    if let Some(level) = params.optimization_level.filter(|l| *l != 0) {
        args.push("-o".to_string());
        args.push(level.to_string());
    }
    args
}

fn excerpt(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    match text.char_indices().nth(STDERR_EXCERPT) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[async_trait]
impl Transport for ProcessTransport {
    fn name(&self) -> &str {
        "process"
    }

    #[instrument(skip(self, payload, params), fields(job_id = %params.job_id))]
    async fn execute(&self, payload: &[u8], params: &ExecParams) -> TransportResult<Vec<u8>> {
        let args = args(params);
        info!("Running engine {} {}", self.path.display(), args.join(" "));

        let mut child = Command::new(&self.path)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TransportError::Spawn {
                program: self.path.display().to_string(),
                message: e.to_string(),
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::Io("engine stdin is not piped".into()))?;
        let payload = payload.to_vec();
        let feed = async move {
            stdin.write_all(&payload).await?;
            stdin.shutdown().await
        };

        // Feed stdin while draining stdout so neither pipe can fill up.
        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output = output?;

        if !output.status.success() {
            let err = TransportError::ExitStatus {
                code: output.status.code(),
                stderr: excerpt(&output.stderr),
            };
            debug!("Engine finished unsuccessfully: {}", err);
            return Err(err);
        }
        if let Err(e) = fed {
            // The engine may exit without consuming all of its input.
            if e.kind() != std::io::ErrorKind::BrokenPipe {
                return Err(e.into());
            }
        }

        debug!(bytes = output.stdout.len(), "Engine finished");
        Ok(output.stdout)
    }
}
