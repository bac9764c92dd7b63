//! Feature assembly.
//!
//! The assembler turns a feature selection (which extractors to run, and
//! which of their sub-features to keep) into one combined, frame-aligned
//! result per asset. Each constituent extractor runs under its own cache;
//! the merged result is what the fusion runners consume.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::debug;

use vqe_models::{Asset, AssetResult, ExecutorId};

use crate::context::RunContext;
use crate::error::{EngineError, EngineResult};
use crate::extractor::{extractor_for_type, FeatureExtractor};
use crate::producer::Producer;

/// Identity stamped on combined results. The assembler is not an executor
/// (it never owns a cache row), so this never enters the registry.
pub const ASSEMBLER_ID: ExecutorId = ExecutorId::new("feature_assembler", "0.1");

/// Which sub-features of one extractor to retain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureSelection {
    /// Keep every sub-feature the extractor produces.
    All,
    /// Keep an explicit set of sub-feature names.
    Keys(BTreeSet<String>),
}

/// Merges the selected features of several extractors into one combined
/// result per asset, verifying frame alignment.
#[derive(Debug, Clone)]
pub struct FeatureAssembler {
    selections: BTreeMap<String, FeatureSelection>,
}

impl FeatureAssembler {
    /// Create an assembler from a TYPE → selection mapping.
    pub fn new(selections: BTreeMap<String, FeatureSelection>) -> Self {
        Self { selections }
    }

    /// Convenience: one extractor, all sub-features.
    pub fn select_all(extractor_type: &str) -> Self {
        let mut selections = BTreeMap::new();
        selections.insert(extractor_type.to_string(), FeatureSelection::All);
        Self::new(selections)
    }

    /// Resolve the selection to (extractor, selected score keys) pairs.
    fn resolve(&self) -> EngineResult<Vec<(Arc<dyn FeatureExtractor>, Vec<String>)>> {
        let mut parts = Vec::with_capacity(self.selections.len());
        for (extractor_type, selection) in &self.selections {
            let extractor = extractor_for_type(extractor_type)?;
            let keys = match selection {
                FeatureSelection::All => extractor.all_scores_keys(),
                FeatureSelection::Keys(subs) => {
                    let known = extractor.sub_features();
                    for sub in subs {
                        if !known.contains(&sub.as_str()) {
                            return Err(EngineError::UnknownScoreKey {
                                executor: extractor_type.clone(),
                                key: sub.clone(),
                            });
                        }
                    }
                    subs.iter().map(|sub| extractor.scores_key_for(sub)).collect()
                }
            };
            parts.push((extractor, keys));
        }
        Ok(parts)
    }

    /// Run every required extractor over the assets and merge the selected
    /// series into one combined result per asset.
    pub async fn assemble(
        &self,
        ctx: &RunContext,
        assets: &[Asset],
    ) -> EngineResult<Vec<AssetResult>> {
        let parts = self.resolve()?;

        let mut extracted = Vec::with_capacity(parts.len());
        for (extractor, keys) in &parts {
            let results = extractor.run(ctx, assets).await?;
            extracted.push((keys, results));
        }

        let mut combined_results = Vec::with_capacity(assets.len());
        for (index, asset) in assets.iter().enumerate() {
            let asset_id = asset.identity();
            let mut combined = AssetResult::new(asset_id.clone(), ASSEMBLER_ID);

            for (keys, results) in &extracted {
                let missing = combined.merge_selected(&results[index], keys);
                if !missing.is_empty() {
                    // run() validated the extractor's keys, so this means a
                    // selected key the extractor does not actually produce.
                    return Err(EngineError::CacheInconsistency {
                        key: format!("{}/{}", results[index].executor_id.key(), asset_id),
                        missing: missing.join(", "),
                    });
                }
            }

            verify_alignment(asset, &combined)?;
            debug!(
                asset = %asset_id,
                keys = combined.len(),
                frames = combined.frame_count().unwrap_or(0),
                "Assembled feature result"
            );
            combined_results.push(combined);
        }

        Ok(combined_results)
    }

    /// Delete every constituent extractor's log file for the assets.
    pub async fn remove_logs(&self, ctx: &RunContext, assets: &[Asset]) -> EngineResult<()> {
        for (extractor, _) in &self.resolve()? {
            for asset in assets {
                extractor.remove_log(ctx, asset).await?;
            }
        }
        Ok(())
    }

    /// Remove every constituent extractor's cache row for the assets.
    pub async fn remove_results(&self, ctx: &RunContext, assets: &[Asset]) -> EngineResult<()> {
        for (extractor, _) in &self.resolve()? {
            for asset in assets {
                extractor.remove_result(ctx, asset).await?;
            }
        }
        Ok(())
    }
}

/// All merged series must agree in length, and match the asset's frame
/// count when a frame range is declared.
fn verify_alignment(asset: &Asset, combined: &AssetResult) -> EngineResult<()> {
    let asset_id = asset.identity();

    let Some(frames) = combined.frame_count() else {
        let lengths: Vec<String> = combined
            .keys()
            .map(|key| {
                let len = combined
                    .series(key)
                    .map(|s| s.len().to_string())
                    .unwrap_or_else(|| "scalar".to_string());
                format!("{}={}", key, len)
            })
            .collect();
        return Err(EngineError::alignment(
            asset_id,
            format!("merged series lengths differ: {}", lengths.join(", ")),
        ));
    };

    if let Some(range) = asset.frame_range() {
        if frames != range.len() as usize {
            return Err(EngineError::alignment(
                asset_id,
                format!(
                    "merged series cover {} frames, asset frame range covers {}",
                    frames,
                    range.len()
                ),
            ));
        }
    }

    Ok(())
}
