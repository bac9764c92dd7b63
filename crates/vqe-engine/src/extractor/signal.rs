//! Psycho-visual signal feature extractor.

use async_trait::async_trait;

use vqe_models::{Asset, AssetResult, ExecutorId};

use crate::context::RunContext;
use crate::error::EngineResult;
use crate::extractor::{extract_via_tool, FeatureExtractor};
use crate::producer::Producer;

pub(crate) const TYPE: &str = "signal_feature";

/// Extracts the four fusion input signals in one tool pass: visual
/// information fidelity (`vif`), detail loss metric (`adm`), spectral
/// peak SNR (`ansnr`), and temporal motion energy (`motion`).
///
/// The `signal_features` tool writes all four labeled series into a single
/// log.
#[derive(Debug, Default)]
pub struct SignalFeatureExtractor;

impl SignalFeatureExtractor {
    pub const ID: ExecutorId = ExecutorId::new(TYPE, "0.1");

    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Producer for SignalFeatureExtractor {
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

impl FeatureExtractor for SignalFeatureExtractor {
    fn tool_name(&self) -> &'static str {
        "signal_features"
    }

    fn sub_features(&self) -> &'static [&'static str] {
        &["vif", "adm", "ansnr", "motion"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_keys() {
        let extractor = SignalFeatureExtractor::new();
        assert_eq!(
            extractor.score_keys(),
            vec![
                "signal_feature_vif_scores",
                "signal_feature_adm_scores",
                "signal_feature_ansnr_scores",
                "signal_feature_motion_scores",
            ]
        );
    }
}
