//! Loading and saving `config.json`

use crate::config::types::RalenConfig;
use crate::errors::{RalenError, RalenResult};
use std::env;
use std::path::{Path, PathBuf};
use tokio::fs;

pub const CONFIG_FILE: &str = "config.json";
pub const HOME_ENV: &str = "RALEN_HOME";

pub struct ConfigLoader;

impl ConfigLoader {
    /// `$RALEN_HOME`, or `~/.ralen`
    pub fn home_dir() -> RalenResult<PathBuf> {
        if let Some(home) = env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(home));
        }
        dirs::home_dir()
            .map(|home| home.join(".ralen"))
            .ok_or_else(|| RalenError::Config {
                message: format!("Could not determine the home directory; set {}", HOME_ENV),
            })
    }

    pub fn config_path(home: &Path) -> PathBuf {
        home.join(CONFIG_FILE)
    }

    /// Load the configuration from the default home directory
    pub async fn load() -> RalenResult<RalenConfig> {
        let home = Self::home_dir()?;
        Self::load_from(&home).await
    }

    /// Load `<home>/config.json`, writing defaults when it does not exist.
    /// A file that cannot be parsed is reported and replaced by defaults in
    /// memory; it is not overwritten.
    pub async fn load_from(home: &Path) -> RalenResult<RalenConfig> {
        let path = Self::config_path(home);

        if !fs::try_exists(&path).await.unwrap_or(false) {
            let config = RalenConfig::with_install_dir(home);
            Self::save_to(&config, home).await?;
            log::info!("Created default configuration at {}", path.display());
            return Ok(config);
        }

        let content = fs::read_to_string(&path).await.map_err(|e| RalenError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        match Self::from_str(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                log::warn!("Ignoring invalid config file {}: {}", path.display(), e);
                Ok(RalenConfig::with_install_dir(home))
            }
        }
    }

    pub fn from_str(content: &str) -> RalenResult<RalenConfig> {
        let config: RalenConfig = serde_json::from_str(content).map_err(|e| RalenError::Config {
            message: format!("Failed to parse configuration: {}", e),
        })?;
        if config.install_dir.as_os_str().is_empty() {
            return Err(RalenError::Config {
                message: "InstallDir must not be empty".to_string(),
            });
        }
        Ok(config)
    }

    pub async fn save_to(config: &RalenConfig, home: &Path) -> RalenResult<()> {
        fs::create_dir_all(home).await?;
        let content = serde_json::to_string_pretty(config)?;
        let path = Self::config_path(home);
        fs::write(&path, content).await.map_err(|e| RalenError::Config {
            message: format!("Failed to write config file {}: {}", path.display(), e),
        })
    }

    pub async fn save(config: &RalenConfig) -> RalenResult<()> {
        let home = Self::home_dir()?;
        Self::save_to(config, &home).await
    }
}
