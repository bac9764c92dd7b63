//! Executor framework and feature-fusion quality engine.
//!
//! This crate provides:
//! - The [`Producer`] contract: cached, identity-keyed units of production
//! - A file-backed [`store::ResultStore`] of per-asset results
//! - Feature extractors driving external quality tools
//! - The [`FeatureAssembler`] merging extractor output into frame-aligned
//!   feature sets
//! - Quality runners: a direct PSNR path and two model-driven fusion paths
//! - A support-vector [`RegressionModel`] backend loaded from versioned
//!   JSON artifacts

pub mod assembler;
pub mod config;
pub mod context;
pub mod error;
pub mod extractor;
pub mod fusion;
pub mod producer;
pub mod quality;
pub mod registry;
pub mod store;

pub use assembler::{FeatureAssembler, FeatureSelection, ASSEMBLER_ID};
pub use config::EngineConfig;
pub use context::RunContext;
pub use error::{EngineError, EngineResult};
pub use extractor::{extractor_for_type, FeatureExtractor, PsnrFeatureExtractor, SignalFeatureExtractor};
pub use fusion::{FeatureNorm, Kernel, RegressionModel, RescaleBounds, SvrArtifact, SvrModel};
pub use producer::{run_batch, Producer};
pub use quality::{
    clamp_score, post_correction, DirectFusedQualityRunner, FusedQualityRunner, FusionSpec,
    PsnrQualityRunner,
};
pub use registry::ExecutorRegistry;
pub use store::{FileResultStore, MemoryResultStore, ResultStore};

use vqe_models::ExecutorId;

/// Identities of every built-in executor variant.
///
/// [`ExecutorRegistry::builtin`] registers these and rejects duplicates, so
/// an identity clash between variants is caught at startup.
pub fn builtin_executor_ids() -> Vec<ExecutorId> {
    vec![
        SignalFeatureExtractor::ID,
        PsnrFeatureExtractor::ID,
        PsnrQualityRunner::ID,
        FusedQualityRunner::ID,
        DirectFusedQualityRunner::ID,
    ]
}
