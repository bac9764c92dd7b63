//! Feature extractors.
//!
//! A feature extractor produces one or more named per-frame series for an
//! asset by invoking an external quality tool and parsing its log. All
//! extractors share one production routine ([`extract_via_tool`]); concrete
//! variants only declare their identity, tool, and sub-features.

mod psnr;
mod signal;

pub use psnr::PsnrFeatureExtractor;
pub use signal::SignalFeatureExtractor;

use std::sync::Arc;

use metrics::counter;
use tracing::debug;

use vqe_media::{read_labeled_series, ToolCommand};
use vqe_models::{Asset, AssetResult};

use crate::context::RunContext;
use crate::error::{EngineError, EngineResult};
use crate::producer::Producer;

/// A producer whose results are named per-frame feature series parsed from
/// an external tool's log.
pub trait FeatureExtractor: Producer {
    /// Name of the external tool invoked for extraction.
    fn tool_name(&self) -> &'static str;

    /// Sub-feature names, one labeled series each in the tool's log.
    fn sub_features(&self) -> &'static [&'static str];

    /// Score key for a sub-feature: `"{TYPE}_{sub}_scores"`.
    fn scores_key_for(&self, sub: &str) -> String {
        format!("{}_{}_scores", self.id().name(), sub)
    }

    /// Score keys for every sub-feature.
    fn all_scores_keys(&self) -> Vec<String> {
        self.sub_features()
            .iter()
            .map(|sub| self.scores_key_for(sub))
            .collect()
    }
}

/// Shared production routine: invoke the extractor's tool, then parse one
/// labeled series per sub-feature out of the log.
pub async fn extract_via_tool(
    extractor: &dyn FeatureExtractor,
    ctx: &RunContext,
    asset: &Asset,
) -> EngineResult<AssetResult> {
    let asset_id = asset.identity();
    let log_path = ctx.log_file_path(&extractor.id(), asset);

    let cmd = ToolCommand::for_asset(extractor.tool_name(), asset, &log_path);
    counter!("vqe_tool_invocations_total", "tool" => extractor.tool_name()).increment(1);
    ctx.tool_runner().run(&cmd).await?;

    let mut result = AssetResult::new(asset_id.clone(), extractor.id());
    let mut frame_count: Option<usize> = None;

    for sub in extractor.sub_features() {
        let series = read_labeled_series(&log_path, sub).await?;

        match frame_count {
            None => frame_count = Some(series.len()),
            Some(n) if n != series.len() => {
                return Err(EngineError::alignment(
                    &asset_id,
                    format!(
                        "tool '{}' produced {} frames for '{}' but {} for earlier sub-features",
                        extractor.tool_name(),
                        series.len(),
                        sub,
                        n
                    ),
                ));
            }
            Some(_) => {}
        }

        result.insert_series(extractor.scores_key_for(sub), series);
    }

    if let (Some(range), Some(frames)) = (asset.frame_range(), frame_count) {
        if frames != range.len() as usize {
            return Err(EngineError::alignment(
                &asset_id,
                format!(
                    "tool '{}' produced {} frames, asset frame range covers {}",
                    extractor.tool_name(),
                    frames,
                    range.len()
                ),
            ));
        }
    }

    debug!(
        executor = %extractor.id(),
        asset = %asset_id,
        frames = frame_count.unwrap_or(0),
        "Feature extraction complete"
    );
    Ok(result)
}

/// Instantiate the extractor registered for a TYPE name.
pub fn extractor_for_type(name: &str) -> EngineResult<Arc<dyn FeatureExtractor>> {
    match name {
        signal::TYPE => Ok(Arc::new(SignalFeatureExtractor::new())),
        psnr::TYPE => Ok(Arc::new(PsnrFeatureExtractor::new())),
        other => Err(EngineError::UnknownExecutor(other.to_string())),
    }
}
