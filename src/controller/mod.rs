use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;
use crate::domain::{Cadence, ForecastPoint};
use crate::forecast::{
    self, FeatureEngineer, ForecastError, LoaderError, RawRecord, TimeSeriesLoader,
};
use crate::ml::{ModelError, ModelState, ValidationMetrics};
use crate::repo::{RepoError, Repositories};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Forecast(#[from] ForecastError),

    #[error(transparent)]
    Loader(#[from] LoaderError),

    #[error("training task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Summary of a completed training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub cadence: Cadence,
    pub model_id: String,
    pub trained_at: DateTime<Utc>,
    pub samples: usize,
    pub feature_cols: Vec<String>,
    pub metrics: ValidationMetrics,
}

#[derive(Clone)]
pub struct AppState {
    pub cfg: Config,
    pub service: Arc<ForecastService>,
}

impl AppState {
    pub async fn new(cfg: Config) -> Result<Self> {
        let repos = Repositories::new(&cfg).await?;
        Ok(Self::with_repositories(cfg, repos))
    }

    pub fn with_repositories(cfg: Config, repos: Repositories) -> Self {
        let service = Arc::new(ForecastService::new(cfg.clone(), repos));
        Self { cfg, service }
    }
}

pub fn spawn_training_tasks(state: AppState) {
    let every = state.cfg.training.retrain_every_minutes;
    if every == 0 {
        info!("scheduled retraining disabled");
        return;
    }

    for cadence in Cadence::ALL {
        let service = state.service.clone();
        tokio::spawn(async move { service.retrain_loop(cadence, every).await });
    }
}

/// Connects the repositories to the training and forecasting engine
pub struct ForecastService {
    cfg: Config,
    repos: Repositories,
    engineer: FeatureEngineer,
}

impl ForecastService {
    pub fn new(cfg: Config, repos: Repositories) -> Self {
        let engineer = FeatureEngineer::new(cfg.features.lag_alignment);
        Self {
            cfg,
            repos,
            engineer,
        }
    }

    pub fn repositories(&self) -> &Repositories {
        &self.repos
    }

    pub fn feature_cols(&self, cadence: Cadence) -> Vec<String> {
        self.cfg.features.feature_cols(cadence)
    }

    /// Fit a model on every stored observation and persist its state
    pub async fn train(&self, cadence: Cadence) -> Result<TrainingReport, ServiceError> {
        let observations = self.repos.observations.fetch_all_observations().await?;
        let feature_cols = self.feature_cols(cadence);
        let engineer = self.engineer;
        let config = self.cfg.training.model.clone();

        let outcome = tokio::task::spawn_blocking(move || {
            forecast::train(&observations, cadence, &feature_cols, &engineer, &config)
        })
        .await??;

        self.repos
            .models
            .save_model_state(cadence, &outcome.state)
            .await?;

        let meta = outcome.metadata;
        info!(
            %cadence,
            model_id = %meta.model_id,
            samples = meta.training_samples,
            r2 = meta.validation_metrics.r2,
            "model state saved"
        );

        Ok(TrainingReport {
            cadence,
            model_id: meta.model_id,
            trained_at: meta.trained_at,
            samples: meta.training_samples,
            feature_cols: meta.feature_names,
            metrics: meta.validation_metrics,
        })
    }

    /// Recursive forecast from the stored state and full history
    pub async fn forecast(
        &self,
        cadence: Cadence,
        horizon: usize,
    ) -> Result<Vec<ForecastPoint>, ServiceError> {
        let state = self.repos.models.load_model_state(cadence).await?;
        let observations = self.repos.observations.fetch_all_observations().await?;

        let points = forecast::forecast_with_policy(
            &observations,
            &state,
            &self.feature_cols(cadence),
            cadence,
            horizon,
            self.cfg.forecast.policy(),
        )?;
        Ok(points)
    }

    pub async fn model_state(&self, cadence: Cadence) -> Result<ModelState, ServiceError> {
        Ok(self.repos.models.load_model_state(cadence).await?)
    }

    /// Normalize raw records and store them; returns how many were kept
    pub async fn ingest(&self, records: &[RawRecord]) -> Result<usize, ServiceError> {
        let observations = TimeSeriesLoader::from_records(records);
        let stored = self
            .repos
            .observations
            .insert_observations(observations)
            .await?;
        info!(received = records.len(), stored, "observations ingested");
        Ok(stored)
    }

    /// Read a `Timestamp`/`Load` CSV and store its observations
    pub async fn import_csv<R: Read>(&self, reader: R) -> Result<usize, ServiceError> {
        let observations = TimeSeriesLoader::load_csv(reader)?;
        let stored = self
            .repos
            .observations
            .insert_observations(observations)
            .await?;
        info!(stored, "CSV imported");
        Ok(stored)
    }

    pub async fn retrain_loop(&self, cadence: Cadence, every_minutes: u64) {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(every_minutes.max(1) * 60));
        loop {
            interval.tick().await;
            if let Err(e) = self.train(cadence).await {
                warn!(%cadence, error = %e, "scheduled retrain failed");
            }
        }
    }
}
