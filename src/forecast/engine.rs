use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::features::FeatureEngineer;
use super::history::HistoryIndex;
use crate::domain::{Cadence, ForecastPoint, Observation};
use crate::ml::{LinearRegressionModel, ModelError, ModelState, ModelTrainer, TrainingConfig, TrainingOutcome};

#[derive(Debug, Error)]
pub enum ForecastError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("cannot forecast from an empty history")]
    EmptyHistory,
}

/// Limits applied to a recursive forecast run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastPolicy {
    /// Stop after this many steps regardless of the requested horizon
    pub max_steps: Option<usize>,
}

impl ForecastPolicy {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn capped(max_steps: usize) -> Self {
        Self {
            max_steps: Some(max_steps),
        }
    }

    fn steps_for(&self, horizon: usize) -> usize {
        match self.max_steps {
            Some(cap) if horizon > cap => {
                warn!(horizon, max_steps = cap, "forecast horizon capped");
                cap
            }
            _ => horizon,
        }
    }
}

/// Recursive multi-step forecaster.
///
/// Each prediction is appended to a private copy of history and becomes a lag
/// input for later steps, so errors compound with the horizon.
pub struct Forecaster {
    model: LinearRegressionModel,
    cadence: Cadence,
    policy: ForecastPolicy,
}

impl Forecaster {
    pub fn new(model: LinearRegressionModel, cadence: Cadence) -> Self {
        Self {
            model,
            cadence,
            policy: ForecastPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ForecastPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Forecast `horizon` steps after the last observed timestamp
    pub fn forecast(
        &self,
        observations: &[Observation],
        horizon: usize,
    ) -> Result<Vec<ForecastPoint>, ForecastError> {
        let steps = self.policy.steps_for(horizon);
        if steps == 0 {
            return Ok(Vec::new());
        }

        let mut history = HistoryIndex::from_observations(observations);
        let mut current = history.last_timestamp().ok_or(ForecastError::EmptyHistory)?;
        let unit = self.cadence.unit();

        let mut points = Vec::with_capacity(steps);
        for _ in 0..steps {
            let next = current + unit;
            let value = self.model.predict_at(self.cadence, next, &history)?;
            let point = ForecastPoint {
                timestamp: next,
                value,
            };
            history.push(point.into());
            points.push(point);
            current = next;
        }

        debug!(
            cadence = %self.cadence,
            steps = points.len(),
            first = ?points.first().map(|p| p.timestamp),
            "forecast complete"
        );

        Ok(points)
    }
}

/// Derive features for `cadence` and fit a model on `feature_cols`
pub fn train(
    observations: &[Observation],
    cadence: Cadence,
    feature_cols: &[String],
    engineer: &FeatureEngineer,
    config: &TrainingConfig,
) -> Result<TrainingOutcome, ModelError> {
    let table = engineer.derive(observations, cadence);
    ModelTrainer::new(config.clone()).train(&table, feature_cols)
}

/// Forecast `horizon` steps with a stored state and explicit column order
pub fn forecast(
    observations: &[Observation],
    state: &ModelState,
    feature_cols: &[String],
    cadence: Cadence,
    horizon: usize,
) -> Result<Vec<ForecastPoint>, ForecastError> {
    forecast_with_policy(
        observations,
        state,
        feature_cols,
        cadence,
        horizon,
        ForecastPolicy::default(),
    )
}

pub fn forecast_with_policy(
    observations: &[Observation],
    state: &ModelState,
    feature_cols: &[String],
    cadence: Cadence,
    horizon: usize,
    policy: ForecastPolicy,
) -> Result<Vec<ForecastPoint>, ForecastError> {
    let model = LinearRegressionModel::with_feature_cols(state.clone(), feature_cols)?;
    Forecaster::new(model, cadence)
        .with_policy(policy)
        .forecast(observations, horizon)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn lag1_state() -> ModelState {
        // prediction == lag_1 exactly when mean = 0 and std + ε = 1
        ModelState {
            feature_cols: vec!["lag_1".to_string()],
            w: vec![1.0],
            b: 0.0,
            mean: vec![0.0],
            std: vec![1.0 - crate::ml::STD_EPSILON],
        }
    }

    fn history(n: i64) -> Vec<Observation> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| Observation::new(start + Duration::hours(i), 5.0))
            .collect()
    }

    #[test]
    fn test_zero_horizon_is_empty() {
        let cols = vec!["lag_1".to_string()];
        let points = forecast(&history(3), &lag1_state(), &cols, Cadence::Hourly, 0).unwrap();
        assert!(points.is_empty());
        // empty history is fine when nothing is requested
        assert!(forecast(&[], &lag1_state(), &cols, Cadence::Hourly, 0)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_empty_history_is_an_error() {
        let cols = vec!["lag_1".to_string()];
        let err = forecast(&[], &lag1_state(), &cols, Cadence::Hourly, 2).unwrap_err();
        assert!(matches!(err, ForecastError::EmptyHistory));
    }

    #[test]
    fn test_predictions_feed_back_as_history() {
        let cols = vec!["lag_1".to_string()];
        let obs = history(3);
        let points = forecast(&obs, &lag1_state(), &cols, Cadence::Hourly, 4).unwrap();

        assert_eq!(points.len(), 4);
        for (i, p) in points.iter().enumerate() {
            assert_eq!(p.timestamp, obs[2].timestamp + Duration::hours(i as i64 + 1));
            assert!((p.value - 5.0).abs() < 1e-9);
        }
        // caller history untouched
        assert_eq!(obs.len(), 3);
    }

    #[test]
    fn test_policy_caps_steps() {
        let cols = vec!["lag_1".to_string()];
        let points = forecast_with_policy(
            &history(3),
            &lag1_state(),
            &cols,
            Cadence::Daily,
            10,
            ForecastPolicy::capped(3),
        )
        .unwrap();
        assert_eq!(points.len(), 3);
    }

    #[test]
    fn test_reordered_columns_are_rejected() {
        let state = ModelState {
            feature_cols: vec!["lag_1".to_string(), "hours".to_string()],
            w: vec![1.0, 0.0],
            b: 0.0,
            mean: vec![0.0, 0.0],
            std: vec![1.0, 1.0],
        };
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let flat: Vec<_> = (0..48)
            .map(|i| Observation::new(start + Duration::hours(i), 100.0))
            .collect();

        for cols in [["hours", "lag_1"], ["lag_7", "temperature"]] {
            let cols: Vec<String> = cols.iter().map(|c| c.to_string()).collect();
            let err = forecast(&flat, &state, &cols, Cadence::Hourly, 1).unwrap_err();
            assert!(matches!(
                err,
                ForecastError::Model(ModelError::FeatureNameMismatch { .. })
            ));
        }

        let cols = state.feature_cols.clone();
        let points = forecast(&flat, &state, &cols, Cadence::Hourly, 1).unwrap();
        assert!((points[0].value - 100.0).abs() < 1e-5);
    }

    #[test]
    fn test_column_count_mismatch_fails() {
        let cols = Cadence::Hourly.default_feature_cols();
        let err = forecast(&history(3), &lag1_state(), &cols, Cadence::Hourly, 1).unwrap_err();
        assert!(matches!(
            err,
            ForecastError::Model(ModelError::StateMismatch { .. })
        ));
    }
}
