use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{ModelStateRepository, ObservationRepository, RepoError};
use crate::domain::{sort_observations, Cadence, Observation};
use crate::ml::ModelState;

/// Process-local store, used by tests and the default development setup
#[derive(Default)]
pub struct InMemoryRepository {
    observations: Arc<RwLock<Vec<Observation>>>,
    states: Arc<RwLock<HashMap<Cadence, ModelState>>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_observations(observations: Vec<Observation>) -> Self {
        let mut observations = observations;
        sort_observations(&mut observations);
        Self {
            observations: Arc::new(RwLock::new(observations)),
            states: Arc::default(),
        }
    }
}

#[async_trait]
impl ObservationRepository for InMemoryRepository {
    async fn fetch_all_observations(&self) -> Result<Vec<Observation>, RepoError> {
        Ok(self.observations.read().await.clone())
    }

    async fn insert_observations(&self, observations: Vec<Observation>) -> Result<usize, RepoError> {
        let count = observations.len();
        let mut stored = self.observations.write().await;
        stored.extend(observations);
        sort_observations(&mut stored);
        Ok(count)
    }
}

#[async_trait]
impl ModelStateRepository for InMemoryRepository {
    async fn load_model_state(&self, cadence: Cadence) -> Result<ModelState, RepoError> {
        self.states
            .read()
            .await
            .get(&cadence)
            .cloned()
            .ok_or(RepoError::ModelStateNotFound(cadence))
    }

    async fn save_model_state(&self, cadence: Cadence, state: &ModelState) -> Result<(), RepoError> {
        self.states.write().await.insert(cadence, state.clone());
        Ok(())
    }
}
