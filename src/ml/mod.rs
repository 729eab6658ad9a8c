//! Machine Learning Module
//!
//! Linear regression over standardized features:
//! - `ModelState`: the persisted output of training
//! - `training`: full-batch gradient descent
//! - `models`: single-step prediction from a timestamp and load history

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod models;
pub mod training;

pub use models::LinearRegressionModel;
pub use training::{ModelTrainer, TrainingConfig, TrainingOutcome};

/// Added to every standard deviation before dividing, so constant columns
/// standardize to zero instead of NaN.
pub const STD_EPSILON: f64 = 1e-8;

#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error(
        "model state mismatch: {feature_cols} feature columns, {weights} weights, \
         {means} means, {stds} stds"
    )]
    StateMismatch {
        feature_cols: usize,
        weights: usize,
        means: usize,
        stds: usize,
    },

    #[error("feature columns {requested:?} do not match the trained columns {trained:?}")]
    FeatureNameMismatch {
        trained: Vec<String>,
        requested: Vec<String>,
    },

    #[error("feature count mismatch: {features} features, {names} names")]
    FeatureCountMismatch { features: usize, names: usize },

    #[error("cannot train on an empty feature table")]
    EmptyTrainingSet,

    #[error("prediction and target count mismatch: {predictions} predictions, {targets} targets")]
    MetricsMismatch { predictions: usize, targets: usize },
}

/// Trained weights, bias and standardization parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelState {
    pub feature_cols: Vec<String>,
    pub w: Vec<f64>,
    pub b: f64,
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl ModelState {
    /// Check that every per-feature vector lines up with `feature_cols`
    pub fn validate(&self) -> Result<(), ModelError> {
        self.validate_against(&self.feature_cols)
    }

    /// Check that the stored vectors line up with a caller-supplied column list
    pub fn validate_against(&self, feature_cols: &[String]) -> Result<(), ModelError> {
        let n = feature_cols.len();
        if self.w.len() != n || self.mean.len() != n || self.std.len() != n {
            return Err(ModelError::StateMismatch {
                feature_cols: n,
                weights: self.w.len(),
                means: self.mean.len(),
                stds: self.std.len(),
            });
        }
        Ok(())
    }
}

/// Model metadata recorded for each training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_id: String,
    pub trained_at: chrono::DateTime<chrono::Utc>,
    pub training_samples: usize,
    pub validation_metrics: ValidationMetrics,
    pub feature_names: Vec<String>,
}

/// Validation Metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationMetrics {
    pub mae: f64,  // Mean Absolute Error
    pub rmse: f64, // Root Mean Square Error
    pub mape: f64, // Mean Absolute Percentage Error
    pub r2: f64,   // R-squared
}

impl ValidationMetrics {
    pub fn new(mae: f64, rmse: f64, mape: f64, r2: f64) -> Self {
        Self {
            mae,
            rmse,
            mape,
            r2,
        }
    }
}

/// Feature Vector for ML models
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureVector {
    pub features: Vec<f64>,
    pub feature_names: Vec<String>,
}

impl FeatureVector {
    pub fn new(features: Vec<f64>, feature_names: Vec<String>) -> Result<Self, ModelError> {
        if features.len() != feature_names.len() {
            return Err(ModelError::FeatureCountMismatch {
                features: features.len(),
                names: feature_names.len(),
            });
        }
        Ok(Self {
            features,
            feature_names,
        })
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Standardize features using z-score normalization
    pub fn standardize(&self, means: &[f64], stds: &[f64]) -> Result<Self, ModelError> {
        if means.len() != self.features.len() || stds.len() != self.features.len() {
            return Err(ModelError::StateMismatch {
                feature_cols: self.features.len(),
                weights: self.features.len(),
                means: means.len(),
                stds: stds.len(),
            });
        }
        Ok(Self {
            features: standardize(&self.features, means, stds),
            feature_names: self.feature_names.clone(),
        })
    }
}

/// `(x - mean) / (std + ε)` element-wise
pub fn standardize(x: &[f64], means: &[f64], stds: &[f64]) -> Vec<f64> {
    x.iter()
        .zip(means.iter().zip(stds.iter()))
        .map(|(v, (mean, std))| (v - mean) / (std + STD_EPSILON))
        .collect()
}

/// Inverse of [`standardize`]: `x_norm * (std + ε) + mean`
pub fn destandardize(x_norm: &[f64], means: &[f64], stds: &[f64]) -> Vec<f64> {
    x_norm
        .iter()
        .zip(means.iter().zip(stds.iter()))
        .map(|(v, (mean, std))| v * (std + STD_EPSILON) + mean)
        .collect()
}
