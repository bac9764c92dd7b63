//! Engine configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory for intermediate tool logs
    pub work_dir: PathBuf,
    /// Directory for cached results
    pub cache_dir: PathBuf,
    /// Directory holding the external quality tools; `None` resolves via PATH
    pub tool_dir: Option<PathBuf>,
    /// Directory holding fusion model artifacts
    pub model_dir: PathBuf,
    /// Maximum assets processed concurrently by `run_batch`
    pub max_parallel_assets: usize,
    /// External tool timeout; `None` blocks until the tool exits
    pub tool_timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/tmp/vqe/work"),
            cache_dir: PathBuf::from("/tmp/vqe/cache"),
            tool_dir: None,
            model_dir: PathBuf::from("models"),
            max_parallel_assets: 1,
            tool_timeout: None,
        }
    }
}

impl EngineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("VQE_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/tmp/vqe/work")),
            cache_dir: std::env::var("VQE_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/tmp/vqe/cache")),
            tool_dir: std::env::var("VQE_TOOL_DIR").ok().map(PathBuf::from),
            model_dir: std::env::var("VQE_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("models")),
            max_parallel_assets: std::env::var("VQE_MAX_PARALLEL")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1),
            tool_timeout: std::env::var("VQE_TOOL_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs),
        }
    }
}
