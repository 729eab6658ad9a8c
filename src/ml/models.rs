//! Linear regression inference
//!
//! Prediction rebuilds the feature vector for a target timestamp from history,
//! standardizes it with the stored parameters and applies `x_norm·w + b`.

use chrono::{DateTime, Utc};

use super::{FeatureVector, ModelError, ModelState};
use crate::domain::{Cadence, Feature};
use crate::forecast::{features::inference_features, history::HistoryIndex};

/// Linear regression model loaded from a [`ModelState`]
#[derive(Debug, Clone)]
pub struct LinearRegressionModel {
    state: ModelState,
    columns: Vec<Option<Feature>>,
}

impl LinearRegressionModel {
    /// Wrap a trained or persisted state. Fails when the per-feature vectors
    /// do not line up with `feature_cols`.
    pub fn from_state(state: ModelState) -> Result<Self, ModelError> {
        state.validate()?;
        let columns = state
            .feature_cols
            .iter()
            .map(|c| c.parse::<Feature>().ok())
            .collect();
        Ok(Self { state, columns })
    }

    /// Wrap `state` for a caller that expects `feature_cols`. The names and
    /// their order must be exactly the ones the state was trained on.
    pub fn with_feature_cols(state: ModelState, feature_cols: &[String]) -> Result<Self, ModelError> {
        state.validate_against(feature_cols)?;
        if state.feature_cols != feature_cols {
            return Err(ModelError::FeatureNameMismatch {
                trained: state.feature_cols,
                requested: feature_cols.to_vec(),
            });
        }
        Self::from_state(state)
    }

    /// Raw (unstandardized) feature vector for `target` in column order.
    /// Columns the cadence does not derive are `0.0`.
    pub fn feature_vector(
        &self,
        cadence: Cadence,
        target: DateTime<Utc>,
        history: &HistoryIndex,
    ) -> Result<FeatureVector, ModelError> {
        let values = inference_features(cadence, target, history);
        let features = self
            .columns
            .iter()
            .map(|col| col.and_then(|f| values.get(&f).copied()).unwrap_or(0.0))
            .collect();
        FeatureVector::new(features, self.state.feature_cols.clone())
    }

    /// `standardize(x)·w + b` for an already assembled feature vector
    pub fn predict_vector(&self, features: &FeatureVector) -> Result<f64, ModelError> {
        if features.len() != self.state.w.len() {
            return Err(ModelError::StateMismatch {
                feature_cols: features.len(),
                weights: self.state.w.len(),
                means: self.state.mean.len(),
                stds: self.state.std.len(),
            });
        }
        let x_norm = features.standardize(&self.state.mean, &self.state.std)?;
        let value = x_norm
            .features
            .iter()
            .zip(self.state.w.iter())
            .map(|(x, w)| x * w)
            .sum::<f64>()
            + self.state.b;
        Ok(value)
    }

    /// One-step prediction for `target` at `cadence`
    pub fn predict_at(
        &self,
        cadence: Cadence,
        target: DateTime<Utc>,
        history: &HistoryIndex,
    ) -> Result<f64, ModelError> {
        let features = self.feature_vector(cadence, target, history)?;
        self.predict_vector(&features)
    }

    /// Hourly one-step prediction
    pub fn predict(&self, target: DateTime<Utc>, history: &HistoryIndex) -> Result<f64, ModelError> {
        self.predict_at(Cadence::Hourly, target, history)
    }

    /// Daily one-step prediction
    pub fn predict_for_days(
        &self,
        target: DateTime<Utc>,
        history: &HistoryIndex,
    ) -> Result<f64, ModelError> {
        self.predict_at(Cadence::Daily, target, history)
    }
}
