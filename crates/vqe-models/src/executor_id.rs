//! Executor identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of one executor variant: a (TYPE, VERSION) pair.
///
/// Every concrete executor declares a pair that is unique across all
/// variants ever deployed; changing extraction or fusion logic requires a
/// version bump so stale cache entries are never reused. The [`key`]
/// representation is embedded in cache keys and log file paths and must
/// stay stable across releases.
///
/// [`key`]: ExecutorId::key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutorId {
    name: &'static str,
    version: &'static str,
}

impl ExecutorId {
    /// Create a new executor identity.
    pub const fn new(name: &'static str, version: &'static str) -> Self {
        Self { name, version }
    }

    /// Executor TYPE, e.g. `"psnr"` or `"signal_feature"`.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Executor VERSION, e.g. `"0.1"`.
    pub fn version(&self) -> &'static str {
        self.version
    }

    /// Stable key used in cache keys and log paths: `"{name}_v{version}"`.
    pub fn key(&self) -> String {
        format!("{}_v{}", self.name, self.version)
    }
}

impl fmt::Display for ExecutorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_v{}", self.name, self.version)
    }
}
