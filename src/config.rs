use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::domain::Cadence;
use crate::forecast::{ForecastPolicy, LagAlignment};
use crate::ml::TrainingConfig;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
pub const ENV_PREFIX: &str = "LF__";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub training: TrainingSection,
    pub features: FeaturesConfig,
    pub forecast: ForecastConfig,
    pub storage: StorageConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            request_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingSection {
    /// Minutes between scheduled retrains; 0 disables the loop
    pub retrain_every_minutes: u64,
    #[serde(flatten)]
    pub model: TrainingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig {
    pub lag_alignment: LagAlignment,
    /// Overrides the default hourly column set
    pub hourly_cols: Option<Vec<String>>,
    /// Overrides the default daily column set
    pub daily_cols: Option<Vec<String>>,
}

impl FeaturesConfig {
    pub fn feature_cols(&self, cadence: Cadence) -> Vec<String> {
        let configured = match cadence {
            Cadence::Hourly => self.hourly_cols.as_ref(),
            Cadence::Daily => self.daily_cols.as_ref(),
        };
        configured
            .cloned()
            .unwrap_or_else(|| cadence.default_feature_cols())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub max_horizon_hours: u32,
    pub max_horizon_days: u32,
    /// Hard cap on recursive steps, independent of the requested horizon
    pub max_steps: Option<usize>,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            max_horizon_hours: 24 * 14,
            max_horizon_days: 90,
            max_steps: None,
        }
    }
}

impl ForecastConfig {
    pub fn max_horizon(&self, cadence: Cadence) -> u32 {
        match cadence {
            Cadence::Hourly => self.max_horizon_hours,
            Cadence::Daily => self.max_horizon_days,
        }
    }

    pub fn policy(&self) -> ForecastPolicy {
        ForecastPolicy {
            max_steps: self.max_steps,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    File,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub data_dir: PathBuf,
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            data_dir: PathBuf::from("data"),
            url: None,
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub format: LogFormat,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Defaults, then the TOML file (if present), then `LF__` env vars
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));
        Ok(figment.extract()?)
    }
}
