//! Shared data models for the video quality engine.
//!
//! This crate provides Serde-serializable types for:
//! - Assets (reference/distorted video pairs and their decode parameters)
//! - Executor identities (TYPE + VERSION pairs)
//! - Per-asset results (named per-frame score series and scalar scores)

pub mod asset;
pub mod executor_id;
pub mod result;

// Re-export common types
pub use asset::{Asset, FrameRange, PixelFormat};
pub use executor_id::ExecutorId;
pub use result::{scalar_key, scores_key, AssetResult, ScoreValue, RESULT_FORMAT_VERSION};
