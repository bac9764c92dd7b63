//! Regression model loading and inference.
//!
//! Fusion runners consume a pretrained support-vector regressor stored as a
//! versioned JSON artifact. Loading is idempotent and side-effect-free;
//! anything missing or malformed fails loudly rather than silently
//! substituting a default model.

use std::path::Path;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, EngineResult};

/// Version of the model artifact format.
pub const MODEL_ARTIFACT_VERSION: u32 = 1;

/// A black-box predictor: fixed-order numeric feature vector in, scalar
/// prediction out. Inference is pure and stateless.
pub trait RegressionModel: Send + Sync {
    /// Expected input dimensionality, fixed at training time.
    fn input_dim(&self) -> usize;

    /// Predict a scalar for one feature vector. `features.len()` must equal
    /// [`RegressionModel::input_dim`].
    fn predict(&self, features: &[f64]) -> f64;
}

/// Kernel of a support-vector regressor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kernel {
    Rbf,
    Linear,
}

/// Per-feature affine normalization baked into an artifact at training
/// time: `x' = slope * x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureNorm {
    pub slope: f64,
    pub intercept: f64,
}

/// On-disk model artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvrArtifact {
    /// Artifact format version
    pub format_version: u32,
    pub kernel: Kernel,
    /// RBF kernel width; required when `kernel` is `rbf`
    #[serde(default)]
    pub gamma: Option<f64>,
    /// Decision-function offset
    pub rho: f64,
    /// Support vectors, one row per vector
    pub support_vectors: Vec<Vec<f64>>,
    /// Dual coefficients, one per support vector
    pub coefficients: Vec<f64>,
    /// Optional per-feature normalization applied before the kernel
    #[serde(default)]
    pub feature_norms: Option<Vec<FeatureNorm>>,
}

/// Support-vector regressor backend.
pub struct SvrModel {
    kernel: Kernel,
    gamma: f64,
    rho: f64,
    support_vectors: Array2<f64>,
    coefficients: Array1<f64>,
    feature_norms: Option<Vec<FeatureNorm>>,
}

impl SvrModel {
    /// Load a model from a JSON artifact file.
    pub fn from_file(path: &Path) -> EngineResult<Self> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| EngineError::model_load(path, format!("cannot read artifact: {}", e)))?;
        let artifact: SvrArtifact = serde_json::from_str(&data)
            .map_err(|e| EngineError::model_load(path, format!("malformed artifact: {}", e)))?;
        Self::from_artifact(artifact, path)
    }

    /// Build a model from a parsed artifact, validating its shape.
    pub fn from_artifact(artifact: SvrArtifact, path: &Path) -> EngineResult<Self> {
        if artifact.format_version != MODEL_ARTIFACT_VERSION {
            return Err(EngineError::model_load(
                path,
                format!(
                    "unsupported artifact format version {} (expected {})",
                    artifact.format_version, MODEL_ARTIFACT_VERSION
                ),
            ));
        }

        let rows = artifact.support_vectors.len();
        if rows == 0 {
            return Err(EngineError::model_load(path, "no support vectors"));
        }
        if artifact.coefficients.len() != rows {
            return Err(EngineError::model_load(
                path,
                format!(
                    "{} coefficients for {} support vectors",
                    artifact.coefficients.len(),
                    rows
                ),
            ));
        }

        let dim = artifact.support_vectors[0].len();
        if dim == 0 || artifact.support_vectors.iter().any(|sv| sv.len() != dim) {
            return Err(EngineError::model_load(
                path,
                "support vectors are empty or ragged",
            ));
        }

        if let Some(norms) = &artifact.feature_norms {
            if norms.len() != dim {
                return Err(EngineError::model_load(
                    path,
                    format!("{} feature norms for input dim {}", norms.len(), dim),
                ));
            }
        }

        let gamma = match artifact.kernel {
            Kernel::Rbf => artifact.gamma.ok_or_else(|| {
                EngineError::model_load(path, "rbf kernel requires gamma")
            })?,
            Kernel::Linear => 0.0,
        };

        let flat: Vec<f64> = artifact.support_vectors.iter().flatten().copied().collect();
        let support_vectors = Array2::from_shape_vec((rows, dim), flat)
            .map_err(|e| EngineError::model_load(path, format!("bad support vector shape: {}", e)))?;

        debug!(
            path = %path.display(),
            kernel = ?artifact.kernel,
            support_vectors = rows,
            input_dim = dim,
            "Loaded regression model"
        );

        Ok(Self {
            kernel: artifact.kernel,
            gamma,
            rho: artifact.rho,
            support_vectors,
            coefficients: Array1::from_vec(artifact.coefficients),
            feature_norms: artifact.feature_norms,
        })
    }

    fn kernel_value(&self, sv: ndarray::ArrayView1<'_, f64>, x: &Array1<f64>) -> f64 {
        match self.kernel {
            Kernel::Rbf => {
                let mut dist_sq = 0.0;
                for (a, b) in sv.iter().zip(x.iter()) {
                    let d = a - b;
                    dist_sq += d * d;
                }
                (-self.gamma * dist_sq).exp()
            }
            Kernel::Linear => sv.dot(x),
        }
    }
}

impl RegressionModel for SvrModel {
    fn input_dim(&self) -> usize {
        self.support_vectors.ncols()
    }

    fn predict(&self, features: &[f64]) -> f64 {
        debug_assert_eq!(features.len(), self.input_dim());

        let x: Array1<f64> = match &self.feature_norms {
            Some(norms) => features
                .iter()
                .zip(norms)
                .map(|(v, n)| n.slope * v + n.intercept)
                .collect(),
            None => features.iter().copied().collect(),
        };

        let mut sum = 0.0;
        for (sv, coef) in self.support_vectors.rows().into_iter().zip(&self.coefficients) {
            sum += coef * self.kernel_value(sv, &x);
        }
        sum - self.rho
    }
}
