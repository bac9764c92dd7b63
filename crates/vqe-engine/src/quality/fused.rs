//! Fusion-path quality runners.
//!
//! Both runners assemble per-frame feature vectors and feed them through a
//! pretrained regression model. They differ in what their models were
//! trained on: [`FusedQualityRunner`]'s model expects hand-rescaled inputs
//! and needs the high-motion post-correction applied to its raw
//! predictions, while [`DirectFusedQualityRunner`]'s model carries its own
//! feature normalization and motion behavior, so it must receive raw
//! vectors and no correction.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use vqe_models::{scalar_key, scores_key, Asset, AssetResult, ExecutorId};

use crate::assembler::{FeatureAssembler, FeatureSelection};
use crate::config::EngineConfig;
use crate::context::RunContext;
use crate::error::{EngineError, EngineResult};
use crate::fusion::model::{RegressionModel, SvrModel};
use crate::fusion::rescale::{rescale_series, RescaleBounds};
use crate::producer::Producer;
use crate::quality::mean_score;
use crate::store::ResultStore;

/// Motion value above which predictions are scaled up.
const MOTION_KNEE: f64 = 12.0;
/// Motion value at which the correction saturates.
const MOTION_CAP: f64 = 20.0;
/// Correction gain per motion unit above the knee.
const MOTION_SLOPE: f64 = 0.015;

/// Compensate for model bias at high motion: above the knee the raw
/// prediction is scaled by `(min(motion, 20) - 12) * 0.015 + 1`.
///
/// Only valid for models trained without this behavior baked in.
pub fn post_correction(motion: f64, score: f64) -> f64 {
    if motion > MOTION_KNEE {
        score * ((motion.min(MOTION_CAP) - MOTION_KNEE) * MOTION_SLOPE + 1.0)
    } else {
        score
    }
}

/// Clamp a fused score into the reportable [0, 100] range.
pub fn clamp_score(score: f64) -> f64 {
    score.clamp(0.0, 100.0)
}

/// Static configuration of one fusion variant, pinned 1:1 to the model
/// artifact it describes. Not user-configurable at call time.
#[derive(Debug, Clone)]
pub struct FusionSpec {
    /// Assembler input: extractor TYPE → sub-feature selection
    pub selections: BTreeMap<String, FeatureSelection>,
    /// Model input features, in the exact order fixed at training time
    pub feature_keys: Vec<String>,
    /// Rescale bounds per feature key (empty for models trained on raw
    /// vectors)
    pub bounds: BTreeMap<String, RescaleBounds>,
    /// Raw series driving the high-motion post-correction; `None` for
    /// models with the behavior trained in
    pub motion_key: Option<String>,
}

impl FusionSpec {
    fn signal_key(sub: &str) -> String {
        format!("signal_feature_{}_scores", sub)
    }

    fn signal_selection() -> BTreeMap<String, FeatureSelection> {
        let mut selections = BTreeMap::new();
        selections.insert("signal_feature".to_string(), FeatureSelection::All);
        selections
    }

    /// Spec of the `fused` variant: rescaled inputs, post-correction on the
    /// raw motion series.
    pub fn fused_default() -> Self {
        let mut bounds = BTreeMap::new();
        bounds.insert(Self::signal_key("vif"), RescaleBounds::new(0.0, 1.0));
        bounds.insert(Self::signal_key("adm"), RescaleBounds::new(0.4, 1.0));
        bounds.insert(Self::signal_key("ansnr"), RescaleBounds::new(10.0, 50.0));
        bounds.insert(Self::signal_key("motion"), RescaleBounds::new(0.0, 20.0));

        Self {
            selections: Self::signal_selection(),
            feature_keys: vec![
                Self::signal_key("vif"),
                Self::signal_key("adm"),
                Self::signal_key("ansnr"),
                Self::signal_key("motion"),
            ],
            bounds,
            motion_key: Some(Self::signal_key("motion")),
        }
    }

    /// Spec of the `fused_direct` variant: raw inputs, normalization and
    /// motion behavior live inside the model artifact.
    pub fn fused_direct_default() -> Self {
        Self {
            selections: Self::signal_selection(),
            feature_keys: vec![
                Self::signal_key("vif"),
                Self::signal_key("adm"),
                Self::signal_key("ansnr"),
                Self::signal_key("motion"),
            ],
            bounds: BTreeMap::new(),
            motion_key: None,
        }
    }
}

/// Pull the series for each model feature key out of the combined result,
/// in model order.
fn gather_feature_series<'a>(
    combined: &'a AssetResult,
    feature_keys: &[String],
) -> EngineResult<Vec<&'a [f64]>> {
    let mut series = Vec::with_capacity(feature_keys.len());
    for key in feature_keys {
        let values = combined
            .series(key)
            .ok_or_else(|| EngineError::CacheInconsistency {
                key: format!("{}/{}", combined.executor_id.key(), combined.asset_id),
                missing: key.clone(),
            })?;
        series.push(values);
    }
    Ok(series)
}

/// Quality runner fusing rescaled signal features through a pretrained
/// regressor, with the high-motion post-correction.
pub struct FusedQualityRunner {
    spec: FusionSpec,
    model: Arc<dyn RegressionModel>,
}

impl FusedQualityRunner {
    pub const ID: ExecutorId = ExecutorId::new("fused", "0.1");

    /// Artifact file the default spec is pinned to.
    pub const MODEL_FILE: &'static str = "fused_v1.json";

    /// Load the pinned model artifact from `config.model_dir`.
    pub fn new(config: &EngineConfig) -> EngineResult<Self> {
        let path = config.model_dir.join(Self::MODEL_FILE);
        let model = SvrModel::from_file(&path)?;
        Self::with_model(FusionSpec::fused_default(), Arc::new(model))
    }

    /// Build from an explicit spec and model backend.
    ///
    /// The spec must carry bounds for every model feature and a motion key;
    /// the model's input dimensionality must match the feature order.
    pub fn with_model(spec: FusionSpec, model: Arc<dyn RegressionModel>) -> EngineResult<Self> {
        if model.input_dim() != spec.feature_keys.len() {
            return Err(EngineError::model_load(
                Self::MODEL_FILE,
                format!(
                    "model expects {} inputs, spec orders {} features",
                    model.input_dim(),
                    spec.feature_keys.len()
                ),
            ));
        }
        for key in &spec.feature_keys {
            if !spec.bounds.contains_key(key) {
                return Err(EngineError::model_load(
                    Self::MODEL_FILE,
                    format!("no rescale bounds for feature '{}'", key),
                ));
            }
        }
        if spec.motion_key.is_none() {
            return Err(EngineError::model_load(
                Self::MODEL_FILE,
                "variant requires a motion key for post-correction",
            ));
        }
        Ok(Self { spec, model })
    }

    fn assembler(&self) -> FeatureAssembler {
        FeatureAssembler::new(self.spec.selections.clone())
    }
}

#[async_trait]
impl Producer for FusedQualityRunner {
    fn id(&self) -> ExecutorId {
        Self::ID
    }

    fn score_keys(&self) -> Vec<String> {
        vec![scores_key(Self::ID.name()), scalar_key(Self::ID.name())]
    }

    async fn produce(&self, ctx: &RunContext, asset: &Asset) -> EngineResult<AssetResult> {
        let asset_id = asset.identity();

        let mut combined = self
            .assembler()
            .assemble(ctx, std::slice::from_ref(asset))
            .await?;
        let combined = combined.pop().expect("assembler returns one result per asset");

        let frames = combined
            .frame_count()
            .ok_or_else(|| EngineError::alignment(&asset_id, "assembled result has no series"))?;

        let raw_series = gather_feature_series(&combined, &self.spec.feature_keys)?;
        let rescaled: Vec<Vec<f64>> = self
            .spec
            .feature_keys
            .iter()
            .zip(&raw_series)
            .map(|(key, series)| rescale_series(series, self.spec.bounds[key]))
            .collect();

        let motion_key = self.spec.motion_key.as_ref().expect("validated at construction");
        let motion = combined
            .series(motion_key)
            .ok_or_else(|| EngineError::CacheInconsistency {
                key: format!("{}/{}", combined.executor_id.key(), asset_id),
                missing: motion_key.clone(),
            })?
            .to_vec();

        let mut scores = Vec::with_capacity(frames);
        for frame in 0..frames {
            let x: Vec<f64> = rescaled.iter().map(|series| series[frame]).collect();
            let raw = self.model.predict(&x);
            scores.push(clamp_score(post_correction(motion[frame], raw)));
        }

        debug!(
            executor = %Self::ID,
            asset = %asset_id,
            frames = frames,
            mean = mean_score(&scores),
            "Fused quality scores computed"
        );

        let mut result = AssetResult::new(asset_id, Self::ID);
        result.merge_from(&combined);
        result.insert_scalar(scalar_key(Self::ID.name()), mean_score(&scores));
        result.insert_series(scores_key(Self::ID.name()), scores);
        Ok(result)
    }

    /// The runner has no log of its own; cleanup goes to the constituent
    /// extractors.
    async fn remove_log(&self, ctx: &RunContext, asset: &Asset) -> EngineResult<()> {
        self.assembler()
            .remove_logs(ctx, std::slice::from_ref(asset))
            .await
    }

    async fn remove_result(&self, ctx: &RunContext, asset: &Asset) -> EngineResult<()> {
        self.assembler()
            .remove_results(ctx, std::slice::from_ref(asset))
            .await?;
        ctx.store.remove(&asset.identity(), &self.id()).await
    }
}

/// Quality runner feeding raw feature vectors to a model with trained-in
/// normalization and motion behavior.
pub struct DirectFusedQualityRunner {
    spec: FusionSpec,
    model: Arc<dyn RegressionModel>,
}

impl DirectFusedQualityRunner {
    pub const ID: ExecutorId = ExecutorId::new("fused_direct", "0.1");

    /// Artifact file the default spec is pinned to.
    pub const MODEL_FILE: &'static str = "fused_direct_v1.json";

    /// Load the pinned model artifact from `config.model_dir`.
    pub fn new(config: &EngineConfig) -> EngineResult<Self> {
        let path = config.model_dir.join(Self::MODEL_FILE);
        let model = SvrModel::from_file(&path)?;
        Self::with_model(FusionSpec::fused_direct_default(), Arc::new(model))
    }

    /// Build from an explicit spec and model backend.
    pub fn with_model(spec: FusionSpec, model: Arc<dyn RegressionModel>) -> EngineResult<Self> {
        if model.input_dim() != spec.feature_keys.len() {
            return Err(EngineError::model_load(
                Self::MODEL_FILE,
                format!(
                    "model expects {} inputs, spec orders {} features",
                    model.input_dim(),
                    spec.feature_keys.len()
                ),
            ));
        }
        Ok(Self { spec, model })
    }

    fn assembler(&self) -> FeatureAssembler {
        FeatureAssembler::new(self.spec.selections.clone())
    }
}

#[async_trait]
impl Producer for DirectFusedQualityRunner {
    fn id(&self) -> ExecutorId {
        Self::ID
    }

    fn score_keys(&self) -> Vec<String> {
        vec![scores_key(Self::ID.name()), scalar_key(Self::ID.name())]
    }

    async fn produce(&self, ctx: &RunContext, asset: &Asset) -> EngineResult<AssetResult> {
        let asset_id = asset.identity();

        let mut combined = self
            .assembler()
            .assemble(ctx, std::slice::from_ref(asset))
            .await?;
        let combined = combined.pop().expect("assembler returns one result per asset");

        let frames = combined
            .frame_count()
            .ok_or_else(|| EngineError::alignment(&asset_id, "assembled result has no series"))?;

        let raw_series = gather_feature_series(&combined, &self.spec.feature_keys)?;

        let mut scores = Vec::with_capacity(frames);
        for frame in 0..frames {
            let x: Vec<f64> = raw_series.iter().map(|series| series[frame]).collect();
            // normalization and motion behavior are the model's own
            scores.push(clamp_score(self.model.predict(&x)));
        }

        debug!(
            executor = %Self::ID,
            asset = %asset_id,
            frames = frames,
            mean = mean_score(&scores),
            "Direct fused quality scores computed"
        );

        let mut result = AssetResult::new(asset_id, Self::ID);
        result.merge_from(&combined);
        result.insert_scalar(scalar_key(Self::ID.name()), mean_score(&scores));
        result.insert_series(scores_key(Self::ID.name()), scores);
        Ok(result)
    }

    async fn remove_log(&self, ctx: &RunContext, asset: &Asset) -> EngineResult<()> {
        self.assembler()
            .remove_logs(ctx, std::slice::from_ref(asset))
            .await
    }

    async fn remove_result(&self, ctx: &RunContext, asset: &Asset) -> EngineResult<()> {
        self.assembler()
            .remove_results(ctx, std::slice::from_ref(asset))
            .await?;
        ctx.store.remove(&asset.identity(), &self.id()).await
    }
}
