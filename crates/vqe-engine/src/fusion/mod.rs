//! Model-driven feature fusion: rescaling and regression inference.

pub mod model;
pub mod rescale;

pub use model::{
    FeatureNorm, Kernel, RegressionModel, SvrArtifact, SvrModel, MODEL_ARTIFACT_VERSION,
};
pub use rescale::{rescale, rescale_series, RescaleBounds};
