//! PSNR quality runner: the simple direct path.

use async_trait::async_trait;
use metrics::counter;

use vqe_media::{read_labeled_series, ToolCommand};
use vqe_models::{scalar_key, scores_key, Asset, AssetResult, ExecutorId};

use crate::context::RunContext;
use crate::error::{EngineError, EngineResult};
use crate::producer::Producer;
use crate::quality::mean_score;

const TYPE: &str = "psnr";
const TOOL: &str = "psnr";
const LABEL: &str = "psnr";

/// Scores an asset by plain peak signal-to-noise ratio: one external tool
/// invocation, one parsed log, no assembler and no model.
#[derive(Debug, Default)]
pub struct PsnrQualityRunner;

impl PsnrQualityRunner {
    pub const ID: ExecutorId = ExecutorId::new(TYPE, "1.0");

    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Producer for PsnrQualityRunner {
    fn id(&self) -> ExecutorId {
        Self::ID
    }

    fn score_keys(&self) -> Vec<String> {
        vec![scores_key(TYPE), scalar_key(TYPE)]
    }

    async fn produce(&self, ctx: &RunContext, asset: &Asset) -> EngineResult<AssetResult> {
        let asset_id = asset.identity();
        let log_path = ctx.log_file_path(&self.id(), asset);

        let cmd = ToolCommand::for_asset(TOOL, asset, &log_path);
        counter!("vqe_tool_invocations_total", "tool" => TOOL).increment(1);
        ctx.tool_runner().run(&cmd).await?;

        let series = read_labeled_series(&log_path, LABEL).await?;

        if let Some(range) = asset.frame_range() {
            if series.len() != range.len() as usize {
                return Err(EngineError::alignment(
                    &asset_id,
                    format!(
                        "tool '{}' produced {} frames, asset frame range covers {}",
                        TOOL,
                        series.len(),
                        range.len()
                    ),
                ));
            }
        }

        let mut result = AssetResult::new(asset_id, Self::ID);
        result.insert_scalar(scalar_key(TYPE), mean_score(&series));
        result.insert_series(scores_key(TYPE), series);
        Ok(result)
    }
}
