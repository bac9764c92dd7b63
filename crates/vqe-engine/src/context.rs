//! Shared run context.

use std::path::PathBuf;
use std::sync::Arc;

use vqe_media::ToolRunner;
use vqe_models::{Asset, ExecutorId};

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::registry::ExecutorRegistry;
use crate::store::ResultStore;

/// Shared handle passed to every executor: configuration plus the result
/// store.
///
/// Construction validates the built-in executor registry, so an identity
/// clash between variants is caught before any work runs.
pub struct RunContext {
    pub config: EngineConfig,
    pub store: Arc<dyn ResultStore>,
}

impl RunContext {
    pub fn new(config: EngineConfig, store: Arc<dyn ResultStore>) -> EngineResult<Self> {
        ExecutorRegistry::builtin()?;
        Ok(Self { config, store })
    }

    /// Deterministic log file path for an (executor, asset) pair:
    /// `{work_dir}/logs/{executor_key}/{asset_identity}.log`.
    pub fn log_file_path(&self, executor_id: &ExecutorId, asset: &Asset) -> PathBuf {
        self.config
            .work_dir
            .join("logs")
            .join(executor_id.key())
            .join(format!("{}.log", asset.identity()))
    }

    /// Tool runner configured from this context.
    pub fn tool_runner(&self) -> ToolRunner {
        let mut runner = ToolRunner::new();
        if let Some(dir) = &self.config.tool_dir {
            runner = runner.with_tool_dir(dir);
        }
        if let Some(timeout) = self.config.tool_timeout {
            runner = runner.with_timeout(timeout.as_secs());
        }
        runner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryResultStore;
    use vqe_models::PixelFormat;

    #[test]
    fn test_log_path_is_keyed_by_executor_and_asset() {
        let ctx = RunContext::new(
            EngineConfig {
                work_dir: PathBuf::from("/tmp/vqe-test/work"),
                ..EngineConfig::default()
            },
            Arc::new(MemoryResultStore::new()),
        )
        .unwrap();

        let asset = Asset::new("/r/a.yuv", "/d/b.yuv", PixelFormat::Yuv420p, 640, 480);
        let path = ctx.log_file_path(&ExecutorId::new("psnr", "1.0"), &asset);

        let s = path.to_string_lossy();
        assert!(s.starts_with("/tmp/vqe-test/work/logs/psnr_v1.0/"));
        assert!(s.ends_with(".log"));
        assert!(s.contains(&asset.identity()));
    }
}
