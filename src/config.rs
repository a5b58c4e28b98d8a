// Configuration management

use crate::error::{ObserverError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

const APP_DIR: &str = "winsvc-observer";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Ordered list of service names to observe
    pub services: Vec<String>,
    pub interval_secs: u64,
    pub foreground_port: u16,
    pub service_port: u16,
    pub bind_address: String,
    pub status_log_path: PathBuf,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            services: vec![
                "dhcp".to_string(),
                "filebeat".to_string(),
                "FontCache".to_string(),
                "FrameServer".to_string(),
            ],
            interval_secs: 5,
            foreground_port: 8000,
            service_port: 8002,
            bind_address: "0.0.0.0".to_string(),
            status_log_path: default_status_log_path(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Get default config path: <config dir>/winsvc-observer/config.yaml
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join(APP_DIR).join("config.yaml"))
    }

    /// Load config from path, falling back to defaults if not found
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = path.unwrap_or_else(|| Self::default_path().unwrap_or_default());

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_yaml::from_str(&contents)
                .map_err(|e| ObserverError::Config(format!("{}: {}", config_path.display(), e)))?;
            Ok(config)
        } else {
            tracing::debug!("No config at {}, using defaults", config_path.display());
            Ok(Self::default())
        }
    }

    /// Save config to path
    pub fn save(&self, path: PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Reject configurations the collection cycle cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.services.is_empty() {
            return Err(ObserverError::EmptyMonitoredSet.into());
        }

        let mut seen = HashSet::new();
        for name in &self.services {
            if name.trim().is_empty() {
                return Err(ObserverError::Config("service names must not be blank".to_string()).into());
            }
            if !seen.insert(name.as_str()) {
                return Err(ObserverError::Config(format!("service '{}' is listed more than once", name)).into());
            }
        }

        if self.interval_secs == 0 {
            return Err(ObserverError::Config("interval_secs must be greater than zero".to_string()).into());
        }

        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

fn default_status_log_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR))
        .unwrap_or_default()
        .join("WindowsServiceStatus.log")
}
