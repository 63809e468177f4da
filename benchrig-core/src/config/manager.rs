//! Locating and loading `config.toml`

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::settings::BenchConfig;
use crate::error::{ConfigError, ConfigResult};

/// Configuration file name inside the config directory
pub const CONFIG_FILE: &str = "config.toml";

/// Loads the configuration from a config directory
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: PathBuf,
}

impl ConfigManager {
    /// Uses `$XDG_CONFIG_HOME/benchrig` (or the platform equivalent)
    ///
    /// # Errors
    ///
    /// Returns `NoConfigDir` if the platform has no config directory.
    pub fn new() -> ConfigResult<Self> {
        let base = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(Self::with_config_dir(base.join("benchrig")))
    }

    /// Uses an explicit config directory
    #[must_use]
    pub const fn with_config_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    /// The config directory
    #[must_use]
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Full path of `config.toml`
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    /// Loads and validates `config.toml`; a missing file yields the defaults
    ///
    /// # Errors
    ///
    /// Returns `Read`, `Parse` or `Invalid`.
    pub fn load(&self) -> ConfigResult<BenchConfig> {
        let path = self.config_path();
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(BenchConfig::default());
        }
        Self::load_from(&path)
    }

    /// Loads and validates an explicit file, which must exist
    ///
    /// # Errors
    ///
    /// Returns `Read`, `Parse` or `Invalid`.
    pub fn load_from(path: &Path) -> ConfigResult<BenchConfig> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: BenchConfig = toml::from_str(&text)?;
        config.validate()?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }
}
