use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{crypto::DEFAULT_PBKDF2_ITERATIONS, storage::json::DEFAULT_BACKUPS_TO_KEEP};

const APP_DIR: &str = "ptrack";
const CONFIG_FILE: &str = "config.toml";
const STORE_FILE: &str = "store.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Could not determine a data directory, set data_dir in the config file")]
    NoDataDir,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where the store and its backups live
    pub data_dir: Option<PathBuf>,
    /// Default log filter when RUST_LOG is unset
    pub log: String,
    pub backups_to_keep: usize,
    pub pbkdf2_iterations: u32,
    /// Look-ahead for "due soon" listings and alerts
    pub due_soon_days: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            log: String::from("warn"),
            backups_to_keep: DEFAULT_BACKUPS_TO_KEEP,
            pbkdf2_iterations: DEFAULT_PBKDF2_ITERATIONS,
            due_soon_days: 7,
        }
    }
}

impl Config {
    /// Reads `path`, or the default location when none is given. A missing
    /// default file yields the defaults, a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => match Self::default_path() {
                Some(path) => (path, false),
                None => return Ok(Self::default()),
            },
        };

        if !required && !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::ReadFailed {
            path: path.clone(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::ParseFailed { path, source })
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(APP_DIR).join(CONFIG_FILE))
    }

    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::data_local_dir()
                .map(|p| p.join(APP_DIR))
                .ok_or(ConfigError::NoDataDir),
        }
    }

    pub fn store_path(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.data_dir()?.join(STORE_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "data_dir = \"/tmp/ptrack-data\"\ndue_soon_days = 3\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();

        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/ptrack-data")));
        assert_eq!(config.due_soon_days, 3);
        assert_eq!(config.log, "warn");
        assert_eq!(config.backups_to_keep, 5);
        assert_eq!(config.pbkdf2_iterations, 200_000);
        assert_eq!(
            config.store_path().unwrap(),
            PathBuf::from("/tmp/ptrack-data/store.json")
        );
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let result = Config::load(Some(&dir.path().join("nope.toml")));
        assert!(matches!(result, Err(ConfigError::ReadFailed { .. })));
    }

    #[test]
    fn test_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "backups_to_keep = \"many\"").unwrap();

        let result = Config::load(Some(&path));

        assert!(matches!(result, Err(ConfigError::ParseFailed { .. })));
    }
}
