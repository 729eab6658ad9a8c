//! ML Model Training Pipeline
//!
//! Full-batch gradient descent over standardized features. The iteration
//! count is the only stopping criterion.

use ndarray::{Array1, Array2, Axis};
use rand::{distributions::Uniform, rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{ModelError, ModelMetadata, ModelState, ValidationMetrics, STD_EPSILON};
use crate::forecast::features::FeatureTable;

/// Training Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub learning_rate: f64,
    pub iterations: usize,
    /// Initial weights are drawn uniformly from `[-init_range, init_range]`
    pub init_range: f64,
    /// Fixed seed for weight initialization; `None` draws from OS entropy
    pub seed: Option<u64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            iterations: 2000,
            init_range: 0.01,
            seed: None,
        }
    }
}

/// Result of a training run
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub state: ModelState,
    pub metadata: ModelMetadata,
}

/// Model Trainer
pub struct ModelTrainer {
    config: TrainingConfig,
}

impl ModelTrainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    /// Assemble `(X, y)` in `feature_cols` order. Unknown columns and
    /// non-finite values become zero.
    pub fn design_matrix(table: &FeatureTable, feature_cols: &[String]) -> (Array2<f64>, Array1<f64>) {
        let m = table.len();
        let n = feature_cols.len();

        for col in feature_cols {
            if table.rows().first().is_some_and(|row| row.value(col).is_none()) {
                warn!(column = %col, cadence = %table.cadence(), "feature column not derived, training on zeros");
            }
        }

        let x = Array2::from_shape_fn((m, n), |(i, j)| {
            finite_or_zero(table.rows()[i].value(&feature_cols[j]))
        });
        let y = Array1::from_iter(table.rows().iter().map(|row| finite_or_zero(Some(row.load))));
        (x, y)
    }

    /// Train a linear regression model on `feature_cols` of `table`
    pub fn train(
        &self,
        table: &FeatureTable,
        feature_cols: &[String],
    ) -> Result<TrainingOutcome, ModelError> {
        if table.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }

        let (x, y) = Self::design_matrix(table, feature_cols);
        let m = x.nrows();
        let n = x.ncols();

        let mean = x.mean_axis(Axis(0)).ok_or(ModelError::EmptyTrainingSet)?;
        let std = x.std_axis(Axis(0), 0.0);
        let x_norm = (&x - &mean) / &(&std + STD_EPSILON);

        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let range = self.config.init_range.abs();
        let init = Uniform::new_inclusive(-range, range);
        let mut w: Array1<f64> = (0..n).map(|_| rng.sample(init)).collect();
        let mut b = 0.0;

        let lr = self.config.learning_rate;
        let inv_m = 1.0 / m as f64;
        for _ in 0..self.config.iterations {
            let error = x_norm.dot(&w) + b - &y;
            let dw = x_norm.t().dot(&error) * inv_m;
            let db = error.sum() * inv_m;
            w.scaled_add(-lr, &dw);
            b -= lr * db;
        }

        let predictions = x_norm.dot(&w) + b;
        let metrics = self.calculate_metrics(&predictions.to_vec(), &y.to_vec())?;

        info!(
            cadence = %table.cadence(),
            samples = m,
            features = n,
            iterations = self.config.iterations,
            learning_rate = lr,
            rmse = metrics.rmse,
            r2 = metrics.r2,
            "linear regression trained"
        );

        let metadata = ModelMetadata {
            model_id: format!("linear_regression_{}", uuid::Uuid::new_v4()),
            trained_at: chrono::Utc::now(),
            training_samples: m,
            validation_metrics: metrics,
            feature_names: feature_cols.to_vec(),
        };

        let state = ModelState {
            feature_cols: feature_cols.to_vec(),
            w: w.to_vec(),
            b,
            mean: mean.to_vec(),
            std: std.to_vec(),
        };

        Ok(TrainingOutcome { state, metadata })
    }

    /// Calculate in-sample metrics
    pub fn calculate_metrics(
        &self,
        predictions: &[f64],
        targets: &[f64],
    ) -> Result<ValidationMetrics, ModelError> {
        if predictions.len() != targets.len() {
            return Err(ModelError::MetricsMismatch {
                predictions: predictions.len(),
                targets: targets.len(),
            });
        }

        if predictions.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }

        let n = predictions.len() as f64;

        // Mean Absolute Error
        let mae: f64 = predictions
            .iter()
            .zip(targets.iter())
            .map(|(p, t)| (p - t).abs())
            .sum::<f64>()
            / n;

        // Root Mean Square Error
        let mse: f64 = predictions
            .iter()
            .zip(targets.iter())
            .map(|(p, t)| (p - t).powi(2))
            .sum::<f64>()
            / n;
        let rmse = mse.sqrt();

        // Mean Absolute Percentage Error over non-zero targets
        let (pct_sum, pct_count) = predictions
            .iter()
            .zip(targets.iter())
            .filter(|(_, t)| t.abs() > 1e-10)
            .fold((0.0, 0usize), |(sum, count), (p, t)| {
                (sum + ((p - t) / t).abs() * 100.0, count + 1)
            });
        let mape = if pct_count == 0 {
            0.0
        } else {
            pct_sum / pct_count as f64
        };

        // R-squared
        let mean_target: f64 = targets.iter().sum::<f64>() / n;
        let ss_tot: f64 = targets.iter().map(|t| (t - mean_target).powi(2)).sum();
        let ss_res: f64 = predictions
            .iter()
            .zip(targets.iter())
            .map(|(p, t)| (t - p).powi(2))
            .sum();

        let r2 = if ss_tot.abs() < 1e-10 {
            0.0
        } else {
            1.0 - (ss_res / ss_tot)
        };

        Ok(ValidationMetrics::new(mae, rmse, mape, r2))
    }
}

fn finite_or_zero(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}
