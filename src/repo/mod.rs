//! Storage for observations and trained model state

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{Config, StorageBackend};
use crate::domain::{Cadence, Observation};
use crate::ml::ModelState;

pub mod file;
pub mod memory;

#[cfg(feature = "db")]
pub mod pg;

pub use file::FileRepository;
pub use memory::InMemoryRepository;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("no model state stored for {0} cadence")]
    ModelStateNotFound(Cadence),

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed stored data: {0}")]
    Serde(#[from] serde_json::Error),

    #[cfg(feature = "db")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait ObservationRepository: Send + Sync {
    /// Every stored observation, ascending by timestamp
    async fn fetch_all_observations(&self) -> Result<Vec<Observation>, RepoError>;

    /// Append observations; returns how many were stored
    async fn insert_observations(&self, observations: Vec<Observation>) -> Result<usize, RepoError>;
}

/// One model state per cadence
#[async_trait]
pub trait ModelStateRepository: Send + Sync {
    async fn load_model_state(&self, cadence: Cadence) -> Result<ModelState, RepoError>;

    /// Insert or replace the state for `cadence`
    async fn save_model_state(&self, cadence: Cadence, state: &ModelState) -> Result<(), RepoError>;
}

#[derive(Clone)]
pub struct Repositories {
    pub observations: Arc<dyn ObservationRepository>,
    pub models: Arc<dyn ModelStateRepository>,
}

impl Repositories {
    pub async fn new(cfg: &Config) -> Result<Self> {
        match cfg.storage.backend {
            StorageBackend::Memory => Ok(Self::shared(Arc::new(InMemoryRepository::new()))),
            StorageBackend::File => {
                let repo = FileRepository::open(&cfg.storage.data_dir).await?;
                Ok(Self::shared(Arc::new(repo)))
            }
            StorageBackend::Postgres => {
                #[cfg(feature = "db")]
                {
                    let url = cfg
                        .storage
                        .url
                        .as_deref()
                        .ok_or_else(|| anyhow::anyhow!("storage.url is required for the postgres backend"))?;
                    let repo = pg::PgRepository::connect(url, cfg.storage.max_connections).await?;
                    repo.migrate().await?;
                    Ok(Self::shared(Arc::new(repo)))
                }

                #[cfg(not(feature = "db"))]
                {
                    anyhow::bail!("postgres storage requires building with the `db` feature")
                }
            }
        }
    }

    /// Use one backend for both observations and model state
    pub fn shared<R>(repo: Arc<R>) -> Self
    where
        R: ObservationRepository + ModelStateRepository + 'static,
    {
        Self {
            observations: repo.clone(),
            models: repo,
        }
    }
}
