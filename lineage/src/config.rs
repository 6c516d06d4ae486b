use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use trail_store::EntityStore;
use trail_store::InMemoryEntityStore;
use trail_store::LOCAL_STORE_FILENAME;
use trail_store::LocalEntityStore;

use crate::DeploymentTracker;

pub const CONFIG_TOML_FILE: &str = "config.toml";
pub const DEFAULT_PARTITION_KEY: &str = "deployments";
pub const TRAIL_HOME_ENV_VAR: &str = "TRAIL_HOME";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("TRAIL_HOME points to {}, but that is not a directory", path.display())]
    InvalidHome { path: PathBuf },
    #[error("could not find home directory")]
    NoHomeDir,
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("partition_key must not be empty")]
    EmptyPartitionKey,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackendKind {
    /// JSON file under the trail home.
    #[default]
    Local,
    /// Process-local; nothing survives the process.
    Memory,
}

/// On-disk shape of `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LineageConfigToml {
    pub partition_key: Option<String>,
    #[serde(default)]
    pub store: StoreConfigToml,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfigToml {
    pub backend: Option<StoreBackendKind>,
    pub path: Option<PathBuf>,
}

/// Resolved configuration for a [`DeploymentTracker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineageConfig {
    pub trail_home: PathBuf,
    pub partition_key: String,
    pub store_backend: StoreBackendKind,
    pub store_path: PathBuf,
}

impl LineageConfig {
    /// Load `config.toml` from the trail home (`TRAIL_HOME`, else `~/.trail`).
    pub fn load() -> Result<Self, ConfigError> {
        let trail_home = find_trail_home(std::env::var_os(TRAIL_HOME_ENV_VAR).map(PathBuf::from))?;
        Self::load_from_home(trail_home)
    }

    /// A missing `config.toml` yields the defaults.
    pub fn load_from_home(trail_home: PathBuf) -> Result<Self, ConfigError> {
        let path = trail_home.join(CONFIG_TOML_FILE);
        let config_toml = match std::fs::read_to_string(&path) {
            Ok(contents) => toml::from_str::<LineageConfigToml>(&contents)
                .map_err(|source| ConfigError::Parse { path, source })?,
            Err(err) if err.kind() == ErrorKind::NotFound => LineageConfigToml::default(),
            Err(source) => return Err(ConfigError::Read { path, source }),
        };
        Self::from_toml(trail_home, config_toml)
    }

    pub fn from_toml(
        trail_home: PathBuf,
        config_toml: LineageConfigToml,
    ) -> Result<Self, ConfigError> {
        let partition_key = match config_toml.partition_key {
            Some(key) if key.trim().is_empty() => return Err(ConfigError::EmptyPartitionKey),
            Some(key) => key.trim().to_string(),
            None => DEFAULT_PARTITION_KEY.to_string(),
        };
        let store_path = match config_toml.store.path {
            Some(path) if path.is_relative() => trail_home.join(path),
            Some(path) => path,
            None => default_store_path(&trail_home),
        };
        Ok(Self {
            partition_key,
            store_backend: config_toml.store.backend.unwrap_or_default(),
            store_path,
            trail_home,
        })
    }

    pub fn open_store(&self) -> Arc<dyn EntityStore> {
        match self.store_backend {
            StoreBackendKind::Local => Arc::new(LocalEntityStore::new(self.store_path.clone())),
            StoreBackendKind::Memory => Arc::new(InMemoryEntityStore::new()),
        }
    }
}

impl DeploymentTracker {
    pub fn from_config(config: &LineageConfig) -> Self {
        DeploymentTracker::new(config.open_store(), config.partition_key.as_str())
    }
}

fn default_store_path(trail_home: &Path) -> PathBuf {
    trail_home.join("store").join(LOCAL_STORE_FILENAME)
}

fn find_trail_home(from_env: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    match from_env.filter(|path| !path.as_os_str().is_empty()) {
        Some(path) if path.is_dir() => Ok(path),
        Some(path) => Err(ConfigError::InvalidHome { path }),
        None => dirs::home_dir()
            .map(|home| home.join(".trail"))
            .ok_or(ConfigError::NoHomeDir),
    }
}
