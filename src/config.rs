use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::detector::DetectorConfig;
use crate::dynamic_fetch::BrowserSettings;
use crate::export::ExportSettings;
use crate::suggest::SuggestConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Directory served at `/`, if any
    pub static_dir: Option<PathBuf>,
    pub workers: Option<usize>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            static_dir: None,
            workers: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperSettings {
    /// Fixed User-Agent; rotated from a built-in list when unset
    pub user_agent: Option<String>,
    pub accept_language: String,
    /// Seconds added to the request timeout before a fetch is abandoned
    pub timeout_grace_secs: u64,
}

impl Default for ScraperSettings {
    fn default() -> Self {
        Self {
            user_agent: None,
            accept_language: "en-US,en;q=0.5".to_string(),
            timeout_grace_secs: 5,
        }
    }
}

/// Everything the binary can be configured with
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub scraper: ScraperSettings,
    pub browser: BrowserSettings,
    pub detector: DetectorConfig,
    pub suggest: SuggestConfig,
    pub export: ExportSettings,
    /// Extra preset files (json, yaml, toml)
    pub presets_dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("Invalid configuration")
    }

    /// Reads `path` when given, then applies `HOST` / `PORT` from the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                Self::from_toml(&raw).with_context(|| format!("In config file {}", path.display()))?
            }
            None => Self::default(),
        };

        config.apply_env(std::env::var("HOST").ok(), std::env::var("PORT").ok())?;
        Ok(config)
    }

    pub fn apply_env(&mut self, host: Option<String>, port: Option<String>) -> Result<()> {
        if let Some(host) = host.filter(|h| !h.trim().is_empty()) {
            self.server.host = host;
        }
        if let Some(port) = port {
            self.server.port = port
                .trim()
                .parse::<u16>()
                .with_context(|| format!("PORT must be a valid number, got '{}'", port))?;
        }
        Ok(())
    }
}
