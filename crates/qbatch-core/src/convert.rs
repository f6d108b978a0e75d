//! Wire-format conversion seam.

use crate::error::{ExecError, ExecResult};
use crate::request::JobRequest;

/// Converts a single-experiment request into the engine's input encoding.
pub trait WireConverter: Send + Sync {
    fn convert(&self, request: &JobRequest) -> ExecResult<Vec<u8>>;
}

/// Serializes the request itself as a JSON document.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonConverter;

impl WireConverter for JsonConverter {
    fn convert(&self, request: &JobRequest) -> ExecResult<Vec<u8>> {
        serde_json::to_vec(request).map_err(|e| ExecError::Conversion(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Experiment;

    #[test]
    fn test_json_converter_roundtrips_request() {
        let request = JobRequest::new("job").with_experiment(Experiment::new("Bell"));
        let bytes = JsonConverter.convert(&request).unwrap();
        let back: JobRequest = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, request);
    }
}
