//! Host profile configuration
//!
//! JSON file holding the Falcon installation directory and the persisted RTT
//! settings. Stands in for the host's own profile serialization.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::RttSettings;
use crate::constants::config;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Falcon BMS installation directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_dir: Option<PathBuf>,
    #[serde(default)]
    pub rtt: RttSettings,
}

impl HostConfig {
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(config::APP_DIR);
        path.push(config::FILENAME);
        path
    }

    /// Load from `path`, or defaults if the file does not exist yet
    pub fn load(path: &Path) -> Result<Self> {
        let mut host = if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {:?}", path))?;
            let host: HostConfig = serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON from {:?}", path))?;
            info!(path = %path.display(), enabled = host.rtt.enabled, "Loaded host config");
            host
        } else {
            info!(path = %path.display(), "Config file not found, using defaults");
            HostConfig::default()
        };

        host.apply_env_overrides();
        Ok(host)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var(config::INSTALL_DIR_ENV)
            && !dir.is_empty()
        {
            info!(install_dir = %dir, "Using installation directory from environment");
            self.install_dir = Some(PathBuf::from(dir));
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }

        let json = serde_json::to_string_pretty(self).context("Failed to serialize config to JSON")?;
        fs::write(path, json).with_context(|| format!("Failed to write config to {:?}", path))?;

        info!(path = %path.display(), "Saved host config");
        Ok(())
    }
}
