//! Engine protocol version gate.

use std::cmp::Ordering;
use std::fmt;

use crate::error::{ExecError, ExecResult};

/// Oldest engine release whose result format this crate understands.
pub const MIN_ENGINE_VERSION: &str = "0.9.9";

/// Version reported on a job result when no experiment carried one.
pub const BASELINE_ENGINE_VERSION: &str = "1.0.0";

/// Version recorded on experiment results that carried no engine answer.
pub const UNKNOWN_ENGINE_VERSION: &str = "0.0.0";

/// A `major.minor.patch` engine version.
///
/// Ordering uses the packed form `major * 1_000_000 + minor * 1_000 + patch`.
/// Strings with fewer than three components, or with non-numeric
/// components, pack to `0` and therefore sort below every real release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineVersion {
    raw: String,
    packed: u64,
}

impl EngineVersion {
    /// Parse a version string. Never fails; malformed input packs to `0`.
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let packed = pack(&raw).unwrap_or(0);
        Self { raw, packed }
    }

    /// The minimum supported engine version.
    pub fn minimum() -> Self {
        Self::parse(MIN_ENGINE_VERSION)
    }

    /// Packed integer form used for comparison.
    pub fn packed(&self) -> u64 {
        self.packed
    }

    /// The version string as reported.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Check that `self` is at least `minimum`.
    pub fn ensure_at_least(&self, minimum: &EngineVersion) -> ExecResult<()> {
        if self.packed < minimum.packed {
            return Err(ExecError::Version {
                reported: self.raw.clone(),
                minimum: minimum.raw.clone(),
            });
        }
        Ok(())
    }
}

fn pack(raw: &str) -> Option<u64> {
    let parts: Vec<&str> = raw.trim().split('.').collect();
    if parts.len() < 3 {
        return None;
    }
    let major: u64 = parts[0].parse().ok()?;
    let minor: u64 = parts[1].parse().ok()?;
    let patch: u64 = parts[2].parse().ok()?;
    Some(major * 1_000_000 + minor * 1_000 + patch)
}

impl PartialOrd for EngineVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EngineVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.packed.cmp(&other.packed)
    }
}

impl fmt::Display for EngineVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}
