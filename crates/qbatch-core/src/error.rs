//! Error types for job execution.
//!
//! Two layers are distinguished:
//!
//! - [`TransportError`]: the engine could not be reached or refused the
//!   request. Produced by [`Transport`](crate::transport::Transport)
//!   implementations.
//! - [`ExecError`]: everything a caller of [`Job::wait`](crate::job::Job::wait)
//!   or [`Job::result`](crate::job::Job::result) can observe, including
//!   transport failures, version mismatches, and misuse of the job API.
//!
//! Both are `Clone`: a unit's captured error is re-surfaced on every call
//! to `wait()`/`result()`, not just the first one.

use thiserror::Error;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for execution operations.
pub type ExecResult<T> = Result<T, ExecError>;

/// Unrecoverable transport failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportError {
    /// The engine could not be reached after all connection retries.
    #[error("Failed to connect to engine after {attempts} attempts, probably not running (url: {target})")]
    Connection { target: String, attempts: u32 },

    /// The engine answered with an HTTP error status other than conflict.
    #[error("Error received from engine API ({code}): {body}")]
    Status { code: u16, body: String },

    /// The engine executable exited unsuccessfully.
    #[error("Error received from engine CLI, exit code: {}", code.map_or_else(|| "signal".to_string(), |c| c.to_string()))]
    ExitStatus { code: Option<i32>, stderr: String },

    /// The engine executable could not be started.
    #[error("Failed to spawn engine executable {program}: {message}")]
    Spawn { program: String, message: String },

    /// Local I/O failure while talking to the engine.
    #[error("I/O error: {0}")]
    Io(String),

    /// The request could not be built or sent.
    #[error("Request error: {0}")]
    Request(String),
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Errors surfaced by the job orchestrator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExecError {
    /// Transport failure inside a unit of work.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The engine reports a protocol version below the supported minimum.
    #[error(
        "Unsupported engine version, got '{reported}' - minimum expected is '{minimum}'. Please update your engine to the latest version"
    )]
    Version { reported: String, minimum: String },

    /// The job was submitted twice, or could not be submitted at all.
    #[error("Job submission failed: {0}")]
    Submission(String),

    /// An experiment could not be converted to the engine wire format.
    #[error("Wire format conversion failed: {0}")]
    Conversion(String),

    /// Units were still pending when the wait timeout elapsed.
    #[error("Timeout waiting for job {0}")]
    Timeout(String),

    /// A unit was cancelled by the worker pool.
    #[error("Job cancelled: {0}")]
    Cancelled(String),

    /// A unit's worker panicked before producing a result.
    #[error("Worker panicked while running {0}")]
    WorkerPanicked(String),
}

impl ExecError {
    /// Whether this error originates from the transport layer.
    pub fn is_transport(&self) -> bool {
        matches!(self, ExecError::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_message_names_both_versions() {
        let err = ExecError::Version {
            reported: "0.9.8".into(),
            minimum: "0.9.9".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("0.9.8"));
        assert!(msg.contains("0.9.9"));
    }

    #[test]
    fn test_exit_status_message() {
        let err = TransportError::ExitStatus {
            code: Some(3),
            stderr: String::new(),
        };
        assert_eq!(
            err.to_string(),
            "Error received from engine CLI, exit code: 3"
        );

        let killed = TransportError::ExitStatus {
            code: None,
            stderr: String::new(),
        };
        assert!(killed.to_string().ends_with("signal"));
    }

    #[test]
    fn test_transport_conversion() {
        let err: ExecError = TransportError::Connection {
            target: "http://127.0.0.1:8001".into(),
            attempts: 6,
        }
        .into();
        assert!(err.is_transport());
        assert!(err.to_string().contains("127.0.0.1:8001"));
    }
}
