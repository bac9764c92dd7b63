//! Per-asset result models.
//!
//! An [`AssetResult`] is the immutable output of one executor run on one
//! asset: a mapping from score key to either an ordered per-frame series or
//! a single scalar. Results are what the engine caches, so the structure
//! carries a format version for cache invalidation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ExecutorId;

/// Version of the result format.
/// Increment this when the structure changes to invalidate old caches.
pub const RESULT_FORMAT_VERSION: u32 = 1;

/// Score key for a per-frame series: `"{type}_scores"`.
pub fn scores_key(executor_type: &str) -> String {
    format!("{}_scores", executor_type)
}

/// Score key for a scalar aggregate: `"{type}_score"`.
pub fn scalar_key(executor_type: &str) -> String {
    format!("{}_score", executor_type)
}

/// A named score: either an ordered per-frame series or a single scalar.
///
/// Serialized untagged, so a series is a JSON array and a scalar a JSON
/// number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScoreValue {
    /// One value per decoded frame, ordered by frame index.
    Series(Vec<f64>),
    /// A single aggregate value.
    Scalar(f64),
}

impl ScoreValue {
    pub fn as_series(&self) -> Option<&[f64]> {
        match self {
            ScoreValue::Series(v) => Some(v),
            ScoreValue::Scalar(_) => None,
        }
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            ScoreValue::Scalar(v) => Some(*v),
            ScoreValue::Series(_) => None,
        }
    }
}

/// The scores produced by one executor run on one asset.
///
/// Invariant: all per-frame series produced for the same asset by the same
/// fusion step have equal length, and index `i` of every series refers to
/// the same decoded frame. [`AssetResult::frame_count`] reports the shared
/// length, or `None` when series disagree; callers that require alignment
/// must check it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetResult {
    /// Identity of the asset this result belongs to
    pub asset_id: String,

    /// Identity of the executor that produced it
    pub executor_id: ExecutorId,

    /// Named scores
    scores: BTreeMap<String, ScoreValue>,

    /// Version of the result format for cache invalidation
    pub format_version: u32,

    /// When this result was produced
    pub created_at: DateTime<Utc>,
}

impl AssetResult {
    /// Create an empty result for an asset/executor pair.
    pub fn new(asset_id: impl Into<String>, executor_id: ExecutorId) -> Self {
        Self {
            asset_id: asset_id.into(),
            executor_id,
            scores: BTreeMap::new(),
            format_version: RESULT_FORMAT_VERSION,
            created_at: Utc::now(),
        }
    }

    /// Add a per-frame series under `key`.
    pub fn insert_series(&mut self, key: impl Into<String>, values: Vec<f64>) {
        self.scores.insert(key.into(), ScoreValue::Series(values));
    }

    /// Add a scalar under `key`.
    pub fn insert_scalar(&mut self, key: impl Into<String>, value: f64) {
        self.scores.insert(key.into(), ScoreValue::Scalar(value));
    }

    /// Per-frame series stored under `key`, if present.
    pub fn series(&self, key: &str) -> Option<&[f64]> {
        self.scores.get(key).and_then(ScoreValue::as_series)
    }

    /// Scalar stored under `key`, if present.
    pub fn scalar(&self, key: &str) -> Option<f64> {
        self.scores.get(key).and_then(ScoreValue::as_scalar)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.scores.contains_key(key)
    }

    /// All score keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.scores.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Copy every score from `other` into this result.
    ///
    /// Used when assembling features from several extractors into one
    /// combined result. Keys already present are overwritten.
    pub fn merge_from(&mut self, other: &AssetResult) {
        for (key, value) in &other.scores {
            self.scores.insert(key.clone(), value.clone());
        }
    }

    /// Copy only the selected keys from `other`. Returns the keys that were
    /// not present in `other`, empty when all were found.
    pub fn merge_selected(&mut self, other: &AssetResult, keys: &[String]) -> Vec<String> {
        let mut missing = Vec::new();
        for key in keys {
            match other.scores.get(key) {
                Some(value) => {
                    self.scores.insert(key.clone(), value.clone());
                }
                None => missing.push(key.clone()),
            }
        }
        missing
    }

    /// Shared length of all per-frame series.
    ///
    /// `None` when the result has no series or when two series disagree in
    /// length (a frame alignment violation).
    pub fn frame_count(&self) -> Option<usize> {
        let mut count = None;
        for value in self.scores.values() {
            if let ScoreValue::Series(series) = value {
                match count {
                    None => count = Some(series.len()),
                    Some(n) if n != series.len() => return None,
                    Some(_) => {}
                }
            }
        }
        count
    }

    /// Check if this result is compatible with the current format version.
    pub fn is_current_version(&self) -> bool {
        self.format_version == RESULT_FORMAT_VERSION
    }
}
