//! Configuration for sercount

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::codec::Format;
use crate::publisher::DEFAULT_CHANNEL_CAPACITY;

/// Default number of items between progress log lines
pub const DEFAULT_LOG_EVERY: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Encoding used when a file extension does not name one
    pub format: Format,

    /// Pretty-print JSON output
    pub pretty: bool,

    /// Log progress every N items
    pub log_every: u64,

    /// Capacity of the progress channel
    pub channel_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            format: Format::default(),
            pretty: false,
            log_every: DEFAULT_LOG_EVERY,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: ./sercount.yml
        let local_config = PathBuf::from("sercount.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/sercount/sercount.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("sercount").join("sercount.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a YAML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        fs::write(path, content).context(format!("Failed to write config to {}", path.display()))?;
        Ok(())
    }

    /// Format for `path`: its extension if recognised, else the configured one
    pub fn format_for(&self, path: &Path) -> Format {
        Format::from_path(path).unwrap_or(self.format)
    }
}
