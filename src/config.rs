// YAML configuration and storage backend selection

use crate::file::FileStorage;
use crate::persistence::{DEFAULT_SLOT, Persistence};
use crate::sqlite::SqliteStorage;
use crate::store::InsertOrder;
use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

const APP_DIR: &str = "tasklist";
const CONFIG_FILENAME: &str = "config.yaml";

/// Storage backend kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    File,
    Sqlite,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::File => write!(f, "file"),
            Backend::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" | "json" => Ok(Backend::File),
            "sqlite" => Ok(Backend::Sqlite),
            other => Err(format!("Invalid backend: {} (expected file or sqlite)", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: Backend,
    /// Storage directory; `None` means the platform data directory
    pub data_dir: Option<PathBuf>,
    pub slot: String,
    pub insert_order: InsertOrder,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            data_dir: None,
            slot: DEFAULT_SLOT.to_string(),
            insert_order: InsertOrder::default(),
        }
    }
}

impl Config {
    /// Load configuration
    ///
    /// With an explicit `path` the file must exist. Otherwise the default
    /// location is read if present, and defaults are used if not.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => {
                    debug!("No config file, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_yaml(&content).with_context(|| format!("Invalid config file {}", path.display()))?;
        debug!(path = ?path, ?config, "Loaded config");
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        // An empty file is a valid, all-defaults config
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_str(content).context("Failed to parse YAML")?;
        if config.slot.trim().is_empty() {
            return Err(eyre!("Config slot cannot be empty"));
        }
        Ok(config)
    }

    /// Directory holding the stored list
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .map(|dir| dir.join(APP_DIR))
                .unwrap_or_else(|| PathBuf::from(".tasklist"))
        })
    }

    /// Open the configured backend
    pub fn open_storage(&self) -> Result<Box<dyn Persistence>> {
        let dir = self.resolved_data_dir();
        let storage: Box<dyn Persistence> = match self.backend {
            Backend::File => Box::new(FileStorage::open(&dir, &self.slot)?),
            Backend::Sqlite => Box::new(SqliteStorage::open(&dir, &self.slot)?),
        };
        debug!(backend = %self.backend, dir = ?dir, slot = %self.slot, "Opened storage");
        Ok(storage)
    }
}

/// `<config_dir>/tasklist/config.yaml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILENAME))
}
