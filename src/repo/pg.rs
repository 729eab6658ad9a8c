#![cfg(feature = "db")]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool, Row};
use tracing::info;

use super::{ModelStateRepository, ObservationRepository, RepoError};
use crate::domain::{Cadence, Observation};
use crate::ml::ModelState;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS observations (
        id BIGSERIAL PRIMARY KEY,
        timestamp TIMESTAMPTZ NOT NULL,
        load DOUBLE PRECISION
    )
    "#,
    "CREATE INDEX IF NOT EXISTS observations_timestamp_idx ON observations (timestamp)",
    r#"
    CREATE TABLE IF NOT EXISTS model_states (
        cadence TEXT PRIMARY KEY,
        state JSONB NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
];

pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, RepoError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    /// Create tables if they do not exist yet
    pub async fn migrate(&self) -> Result<(), RepoError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("database schema ready");
        Ok(())
    }
}

#[async_trait]
impl ObservationRepository for PgRepository {
    async fn fetch_all_observations(&self) -> Result<Vec<Observation>, RepoError> {
        let rows = sqlx::query(
            r#"
            SELECT timestamp, load
            FROM observations
            ORDER BY timestamp ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let timestamp: DateTime<Utc> = row.try_get("timestamp")?;
                let load: Option<f64> = row.try_get("load")?;
                Ok(match load {
                    Some(load) => Observation::new(timestamp, load),
                    None => Observation::missing(timestamp),
                })
            })
            .collect()
    }

    async fn insert_observations(&self, observations: Vec<Observation>) -> Result<usize, RepoError> {
        let mut tx = self.pool.begin().await?;
        for obs in &observations {
            sqlx::query("INSERT INTO observations (timestamp, load) VALUES ($1, $2)")
                .bind(obs.timestamp)
                .bind(obs.load)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(observations.len())
    }
}

#[async_trait]
impl ModelStateRepository for PgRepository {
    async fn load_model_state(&self, cadence: Cadence) -> Result<ModelState, RepoError> {
        let row = sqlx::query("SELECT state FROM model_states WHERE cadence = $1")
            .bind(cadence.as_ref())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let Json(state): Json<ModelState> = row.try_get("state")?;
                Ok(state)
            }
            None => Err(RepoError::ModelStateNotFound(cadence)),
        }
    }

    async fn save_model_state(&self, cadence: Cadence, state: &ModelState) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO model_states (cadence, state, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (cadence) DO UPDATE
            SET state = EXCLUDED.state, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(cadence.as_ref())
        .bind(Json(state))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
