//! Persisted settings: a single JSON object in the user's home directory.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::ConfigError;

pub const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Default, Deserialize, Serialize)]
struct PersistedConfig {
    #[serde(default)]
    download_directory: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// `<home>/config.json`, or `./config.json` when no home directory is known.
    pub fn locate() -> Self {
        let base = match BaseDirs::new() {
            Some(dirs) => dirs.home_dir().to_path_buf(),
            None => {
                warn!("No home directory found, keeping config in the working directory");
                PathBuf::from(".")
            }
        };
        Self::at(base.join(CONFIG_FILE_NAME))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Saved download directory, if any. Unreadable or malformed files count as absent.
    pub fn load(&self) -> Option<String> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No config file yet");
                return None;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read config file");
                return None;
            }
        };

        let config: PersistedConfig = match serde_json::from_str(&raw) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring malformed config file");
                return None;
            }
        };

        config.download_directory.filter(|dir| !dir.is_empty())
    }

    /// Overwrites the config file with `directory` as the only setting.
    pub fn save(&self, directory: &str) -> Result<(), ConfigError> {
        let config = PersistedConfig {
            download_directory: Some(directory.to_string()),
        };
        let encoded = serde_json::to_string(&config)?;
        fs::write(&self.path, encoded)?;
        info!(path = %self.path.display(), directory, "Saved download directory");
        Ok(())
    }
}
