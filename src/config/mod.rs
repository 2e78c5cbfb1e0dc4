//! Server configuration loaded from YAML

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::rules::DEFAULT_RESPAWN_MINUTES;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_yaml::Error),
    #[error("invalid config {path}: {message}")]
    Invalid { path: PathBuf, message: String },
}

/// Upper bound for `gameplay.collect_cooldown_secs`.
pub const MAX_COLLECT_COOLDOWN_SECS: u64 = 86_400;

/// Top-level configuration. Every section falls back to its defaults, so an
/// empty file is a valid config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ListenConfig,
    pub logging: LoggingConfig,
    pub gameplay: GameplayConfig,
    pub respawn: RespawnConfig,
    pub storage: StorageConfig,
    pub seed_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameplayConfig {
    #[serde(default = "default_cooldown_secs")]
    pub collect_cooldown_secs: u64,
    #[serde(default = "default_max_distance")]
    pub max_distance_meters: f64,
    #[serde(default = "default_max_request_amount")]
    pub max_request_amount: u32,
}

fn default_cooldown_secs() -> u64 {
    3
}

fn default_max_distance() -> f64 {
    50.0
}

fn default_max_request_amount() -> u32 {
    50
}

impl Default for GameplayConfig {
    fn default() -> Self {
        Self {
            collect_cooldown_secs: default_cooldown_secs(),
            max_distance_meters: default_max_distance(),
            max_request_amount: default_max_request_amount(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RespawnConfig {
    #[serde(default = "default_respawn_minutes")]
    pub default_minutes: u32,
    #[serde(default = "default_minutes_by_type")]
    pub minutes_by_type: BTreeMap<String, u32>,
}

fn default_respawn_minutes() -> u32 {
    DEFAULT_RESPAWN_MINUTES
}

fn default_minutes_by_type() -> BTreeMap<String, u32> {
    [("Wood", 5), ("Iron", 10), ("Stone", 7)]
        .into_iter()
        .map(|(kind, minutes)| (kind.to_string(), minutes))
        .collect()
}

impl Default for RespawnConfig {
    fn default() -> Self {
        Self {
            default_minutes: default_respawn_minutes(),
            minutes_by_type: default_minutes_by_type(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// JSON snapshot loaded at start-up and written on shutdown.
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
}

impl ServerConfig {
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate().map_err(|message| ConfigError::Invalid {
            path: path.to_path_buf(),
            message,
        })?;
        Ok(config)
    }

    /// Range checks serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        let gameplay = &self.gameplay;
        if gameplay.collect_cooldown_secs > MAX_COLLECT_COOLDOWN_SECS {
            return Err(format!(
                "gameplay.collect_cooldown_secs must be at most {MAX_COLLECT_COOLDOWN_SECS}"
            ));
        }
        if !gameplay.max_distance_meters.is_finite() || gameplay.max_distance_meters < 0.0 {
            return Err("gameplay.max_distance_meters must be a non-negative number".into());
        }
        if gameplay.max_request_amount == 0 {
            return Err("gameplay.max_request_amount must be at least 1".into());
        }
        Ok(())
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, serde_yaml::Error> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(contents)
    }

    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
