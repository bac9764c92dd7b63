//! PSNR feature extractor.

use async_trait::async_trait;

use vqe_models::{Asset, AssetResult, ExecutorId};

use crate::context::RunContext;
use crate::error::EngineResult;
use crate::extractor::{extract_via_tool, FeatureExtractor};
use crate::producer::Producer;

pub(crate) const TYPE: &str = "psnr_feature";

/// Extracts plain peak signal-to-noise ratio as a feature series, letting
/// the assembler mix raw signal distance into a feature set.
#[derive(Debug, Default)]
pub struct PsnrFeatureExtractor;

impl PsnrFeatureExtractor {
    pub const ID: ExecutorId = ExecutorId::new(TYPE, "1.0");

    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Producer for PsnrFeatureExtractor {
    fn id(&self) -> ExecutorId {
        Self::ID
    }

    fn score_keys(&self) -> Vec<String> {
        self.all_scores_keys()
    }

    async fn produce(&self, ctx: &RunContext, asset: &Asset) -> EngineResult<AssetResult> {
        extract_via_tool(self, ctx, asset).await
    }
}

impl FeatureExtractor for PsnrFeatureExtractor {
    fn tool_name(&self) -> &'static str {
        "psnr"
    }

    fn sub_features(&self) -> &'static [&'static str] {
        &["psnr"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_keys() {
        let extractor = PsnrFeatureExtractor::new();
        assert_eq!(extractor.score_keys(), vec!["psnr_feature_psnr_scores"]);
    }
}
