//! Configuration file support for episode-renamer.
//!
//! This module loads and saves user preferences from a TOML file: the server
//! address, the last username, the default naming pattern and request
//! timeouts.

use crate::error::{AppError, Result};
use crate::pattern::{DEFAULT_PATTERN, NamingPattern};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE: &str = "config.toml";

/// User configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Address of the OpenList server
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Username used for the last successful login
    #[serde(default)]
    pub username: Option<String>,

    /// Pattern offered first in smart and uniform mode
    #[serde(default = "default_pattern")]
    pub default_pattern: String,

    /// Timeout for ordinary requests, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Timeout for batch renames, in seconds
    #[serde(default = "default_batch_timeout")]
    pub batch_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

fn default_base_url() -> String {
    "http://192.168.1.1:5244".to_string()
}

fn default_pattern() -> String {
    DEFAULT_PATTERN.to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_batch_timeout() -> u64 {
    60
}

/// Directory holding the token cache.
///
/// The caller passes the explicit directory (CLI flag or environment
/// variable); without one the process temp directory is used.
pub fn resolve_state_dir(explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(std::env::temp_dir)
}

impl Config {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self {
            base_url: default_base_url(),
            username: None,
            default_pattern: default_pattern(),
            request_timeout_secs: default_request_timeout(),
            batch_timeout_secs: default_batch_timeout(),
        }
    }

    /// Get the path to the config file.
    ///
    /// With an explicit state directory the file lives inside it. Otherwise
    /// it is ~/.config/episode-renamer/config.toml on Linux, or a
    /// platform-appropriate location on other systems.
    pub fn get_config_path(state_dir: Option<&Path>) -> std::result::Result<PathBuf, io::Error> {
        if let Some(dir) = state_dir {
            return Ok(dir.join(CONFIG_FILE));
        }

        let config_dir = dirs::config_dir()
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, "Could not find config directory")
            })?
            .join("episode-renamer");

        Ok(config_dir.join(CONFIG_FILE))
    }

    /// Load config from `path`.
    ///
    /// Returns default config if the file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save config to `path`.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// The configured default pattern, parsed.
    pub fn naming_pattern(&self) -> Result<NamingPattern> {
        NamingPattern::parse(&self.default_pattern)
            .map_err(|e| AppError::Config(format!("default_pattern: {}", e)))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_timeout_secs.max(1))
    }
}
