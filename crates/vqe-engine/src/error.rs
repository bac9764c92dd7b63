//! Engine error types.

use std::path::PathBuf;

use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised by the executor framework and the fusion engine.
///
/// Every variant aborts processing of the affected asset; nothing is
/// retried and no partial result is ever cached.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("media error: {0}")]
    Media(#[from] vqe_media::MediaError),

    #[error("failed to load model '{path}': {reason}")]
    ModelLoad { path: PathBuf, reason: String },

    #[error("feature series misaligned for asset '{asset_id}': {details}")]
    FeatureAlignment { asset_id: String, details: String },

    #[error("result for '{key}' lacks expected score keys: {missing}")]
    CacheInconsistency { key: String, missing: String },

    #[error("unknown executor type '{0}'")]
    UnknownExecutor(String),

    #[error("executor '{executor}' has no sub-feature '{key}'")]
    UnknownScoreKey { executor: String, key: String },

    #[error("duplicate executor identity '{0}'")]
    DuplicateExecutor(String),

    #[error("result store error: {0}")]
    Store(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Create a model load error.
    pub fn model_load(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ModelLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a feature alignment error.
    pub fn alignment(asset_id: impl Into<String>, details: impl Into<String>) -> Self {
        Self::FeatureAlignment {
            asset_id: asset_id.into(),
            details: details.into(),
        }
    }

    /// Create a result store error.
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }
}
