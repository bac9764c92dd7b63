//! Quality runners.
//!
//! A quality runner produces the final per-frame quality score series for
//! an asset. The simple path invokes an external tool directly and wraps
//! its parsed log; the fusion paths assemble features and feed them
//! through a pretrained regression model.

mod fused;
mod psnr;

pub use fused::{
    clamp_score, post_correction, DirectFusedQualityRunner, FusedQualityRunner, FusionSpec,
};
pub use psnr::PsnrQualityRunner;

/// Arithmetic mean of a non-empty score series.
pub(crate) fn mean_score(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}
