//! Persistent defaults
//!
//! Stored in `<config_dir>/songdrop/config.json`. Every field is optional in
//! the file; command-line flags take precedence over it.

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// User configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory for songs whose options name none (default: working directory)
    pub download_dir: Option<PathBuf>,
    /// Fetch lyrics for songs that do not say otherwise
    pub lyric: bool,
    /// Concurrent downloads, unlimited when unset
    pub parallel: Option<usize>,
    /// User-Agent sent with every request
    pub user_agent: String,
    /// Connect timeout; requests never time out when unset
    pub connect_timeout_secs: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            download_dir: None,
            lyric: false,
            parallel: None,
            user_agent: format!("songdrop/{}", env!("CARGO_PKG_VERSION")),
            connect_timeout_secs: None,
        }
    }
}

impl AppConfig {
    /// Load from the default location, falling back to defaults
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        let config: Self =
            serde_json::from_str(&contents).with_context(|| "Failed to parse config")?;

        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Save to the default location
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config to {:?}", path))?;

        debug!("Saved config to {}", path.display());
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("songdrop").join("config.json"))
    }

    /// HTTP client shared by every download of a run
    pub fn build_client(&self) -> Result<Client> {
        let mut builder = Client::builder().user_agent(&self.user_agent);
        if let Some(secs) = self.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }
        builder.build().context("Failed to create HTTP client")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(config.parallel.is_none());
        assert!(config.user_agent.starts_with("songdrop/"));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"lyric": true, "parallel": 3}"#).unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert!(config.lyric);
        assert_eq!(config.parallel, Some(3));
        assert!(config.download_dir.is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = AppConfig {
            download_dir: Some(PathBuf::from("/music")),
            connect_timeout_secs: Some(10),
            ..Default::default()
        };

        config.save_to(&path).unwrap();
        assert_eq!(AppConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_build_client() {
        let config = AppConfig {
            connect_timeout_secs: Some(5),
            ..Default::default()
        };
        assert!(config.build_client().is_ok());
    }
}
