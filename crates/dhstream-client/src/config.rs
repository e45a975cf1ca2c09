//! Persisted client configuration.
//!
//! A single TOML record holding the backend URL, stored under the
//! platform config directory unless a path is given explicitly.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Backend root used when nothing has been saved.
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3000/api";

const APP_DIR: &str = "dhstream";
const CONFIG_FILE: &str = "config.toml";

/// Errors raised while loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform has no config directory.
    #[error("could not determine the config directory")]
    NoConfigDir,

    /// Reading or writing the config file failed.
    #[error("config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The config file is not valid TOML.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The server URL is not an absolute http(s) URL.
    #[error("invalid server URL '{0}'")]
    InvalidUrl(String),
}

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Backend root the actions are appended to.
    #[serde(default = "default_server_url")]
    pub server_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
        }
    }
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

/// Check that `url` is an absolute http or https URL.
pub fn validate_server_url(url: &str) -> Result<(), ConfigError> {
    match Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        _ => Err(ConfigError::InvalidUrl(url.to_string())),
    }
}

/// Loads and saves [`Config`] at a fixed path.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    current: Config,
}

impl ConfigStore {
    /// Create a store backed by `path`. Nothing is read until [`load`](Self::load).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            current: Config::default(),
        }
    }

    /// Store at `<config dir>/dhstream/config.toml`.
    pub fn default_location() -> Result<Self, ConfigError> {
        Ok(Self::new(Self::default_path()?))
    }

    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(dir.join(APP_DIR).join(CONFIG_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The configuration as of the last load or save.
    pub fn current(&self) -> &Config {
        &self.current
    }

    /// Read the config file. A missing file or empty URL yields the defaults.
    pub fn load(&mut self) -> Result<&Config, ConfigError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No config file, using defaults");
                self.current = Config::default();
                return Ok(&self.current);
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let mut config: Config = toml::from_str(&contents)?;
        if config.server_url.trim().is_empty() {
            config.server_url = default_server_url();
        }
        debug!(path = %self.path.display(), server_url = %config.server_url, "Loaded config");
        self.current = config;
        Ok(&self.current)
    }

    /// Persist `config` and make it current.
    pub fn save(&mut self, config: Config) -> Result<(), ConfigError> {
        validate_server_url(&config.server_url)?;
        let contents = toml::to_string_pretty(&config)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&self.path, contents).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })?;

        info!(path = %self.path.display(), server_url = %config.server_url, "Saved config");
        self.current = config;
        Ok(())
    }

    /// Server URL to use for a run. An explicit override wins and the file
    /// is not read at all; otherwise the stored config is loaded.
    pub fn server_url(&mut self, explicit: Option<String>) -> Result<String, ConfigError> {
        match explicit {
            Some(url) => Ok(url),
            None => Ok(self.load()?.server_url.clone()),
        }
    }

    /// Change and persist the server URL.
    pub fn set_server_url(&mut self, url: impl Into<String>) -> Result<(), ConfigError> {
        let mut config = self.current.clone();
        config.server_url = url.into();
        self.save(config)
    }

    /// Overwrite the stored config with the defaults.
    pub fn reset(&mut self) -> Result<(), ConfigError> {
        self.save(Config::default())
    }
}
