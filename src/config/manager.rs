//! Configuration manager for loading and saving application configuration
//!
//! This module provides functionality to load and save configuration to
//! `<LEDTOGGLE_HOME>/ledtoggle/config.json` with atomic writes to prevent
//! corruption. `LEDTOGGLE_HOME` defaults to the working directory.

use crate::config::models::AppConfig;
use crate::error::{LedToggleError, Result, StringError};
use std::io::Write;
use std::path::PathBuf;
use tracing::{info, warn};

/// Environment variable selecting the base directory for config and logs
pub const HOME_ENV_VAR: &str = "LEDTOGGLE_HOME";

/// Configuration manager
pub struct ConfigManager;

impl ConfigManager {
    /// Base directory for all application files
    ///
    /// Returns: `<LEDTOGGLE_HOME>/ledtoggle`
    pub fn get_app_dir() -> PathBuf {
        let home = std::env::var(HOME_ENV_VAR).unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join("ledtoggle")
    }

    /// Get the path to the configuration file
    ///
    /// Returns: `<LEDTOGGLE_HOME>/ledtoggle/config.json`
    pub fn get_config_path() -> PathBuf {
        Self::get_app_dir().join("config.json")
    }

    /// Ensure the configuration directory exists
    pub fn ensure_config_dir() -> Result<PathBuf> {
        let config_path = Self::get_config_path();
        let config_dir = config_path
            .parent()
            .ok_or_else(|| LedToggleError::ConfigError(StringError::new("Invalid config path")))?;

        std::fs::create_dir_all(config_dir)?;
        Ok(config_dir.to_path_buf())
    }

    /// Load configuration from disk
    ///
    /// If the configuration file doesn't exist or is corrupt, returns default configuration.
    pub fn load() -> Result<AppConfig> {
        let config_path = Self::get_config_path();

        if !config_path.exists() {
            info!(
                "Configuration file {} not found, using defaults",
                config_path.display()
            );
            return Ok(AppConfig::default());
        }

        let json = std::fs::read_to_string(&config_path)?;

        match serde_json::from_str(&json) {
            Ok(config) => {
                info!("Configuration loaded from {}", config_path.display());
                Ok(config)
            }
            Err(e) => {
                warn!("Failed to parse configuration, using defaults: {}", e);
                Ok(AppConfig::default())
            }
        }
    }

    /// Save configuration to disk with atomic write
    ///
    /// Writes to a temporary file in the same directory, then renames it over
    /// the target.
    pub fn save(config: &AppConfig) -> Result<()> {
        let config_dir = Self::ensure_config_dir()?;
        let json = serde_json::to_string_pretty(config)?;

        let mut temp = tempfile::NamedTempFile::new_in(&config_dir)?;
        temp.write_all(json.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(Self::get_config_path())
            .map_err(|e| LedToggleError::IoError(e.error))?;

        info!("Configuration saved successfully");
        Ok(())
    }
}
