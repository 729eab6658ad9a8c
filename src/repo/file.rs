//! JSON files under a data directory
//!
//! `observations.json` holds the full series; each cadence keeps its model
//! state in `model_state_<cadence>.json`. Writes go to a temporary file first
//! and are renamed into place.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

use super::{ModelStateRepository, ObservationRepository, RepoError};
use crate::domain::{sort_observations, Cadence, Observation};
use crate::ml::ModelState;

const OBSERVATIONS_FILE: &str = "observations.json";

pub struct FileRepository {
    data_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileRepository {
    /// Open (and create if needed) the data directory
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self, RepoError> {
        let data_dir = data_dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&data_dir).await?;
        debug!(path = %data_dir.display(), "file repository opened");
        Ok(Self {
            data_dir,
            write_lock: Mutex::new(()),
        })
    }

    fn observations_path(&self) -> PathBuf {
        self.data_dir.join(OBSERVATIONS_FILE)
    }

    fn model_state_path(&self, cadence: Cadence) -> PathBuf {
        self.data_dir.join(format!("model_state_{cadence}.json"))
    }

    async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, RepoError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), RepoError> {
        let bytes = serde_json::to_vec_pretty(value)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[async_trait]
impl ObservationRepository for FileRepository {
    async fn fetch_all_observations(&self) -> Result<Vec<Observation>, RepoError> {
        let mut observations: Vec<Observation> = Self::read_json(&self.observations_path())
            .await?
            .unwrap_or_default();
        sort_observations(&mut observations);
        Ok(observations)
    }

    async fn insert_observations(&self, observations: Vec<Observation>) -> Result<usize, RepoError> {
        let _guard = self.write_lock.lock().await;
        let count = observations.len();

        let mut stored = self.fetch_all_observations().await?;
        stored.extend(observations);
        sort_observations(&mut stored);
        Self::write_json(&self.observations_path(), &stored).await?;

        debug!(inserted = count, total = stored.len(), "observations written");
        Ok(count)
    }
}

#[async_trait]
impl ModelStateRepository for FileRepository {
    async fn load_model_state(&self, cadence: Cadence) -> Result<ModelState, RepoError> {
        Self::read_json(&self.model_state_path(cadence))
            .await?
            .ok_or(RepoError::ModelStateNotFound(cadence))
    }

    async fn save_model_state(&self, cadence: Cadence, state: &ModelState) -> Result<(), RepoError> {
        let _guard = self.write_lock.lock().await;
        Self::write_json(&self.model_state_path(cadence), state).await
    }
}
