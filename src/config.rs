//! Configuration loading.
//!
//! Defaults, then `config.json` in the config directory, then environment
//! overrides. Command-line flags are applied on top by the binary.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf};

/// Environment variable naming an explicit config directory.
pub const CONFIG_DIR_ENV: &str = "CABLE_CONFIG_DIR";

const CONFIG_FILE: &str = "config.json";

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Connection configuration for the cable client.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct CableConfig {
    /// Cable endpoint. `http(s)://` URLs are accepted and rewritten.
    pub url: String,
    /// Extra handshake headers, in order (e.g. `Origin`).
    pub headers: Vec<(String, String)>,
    /// Capacity of the client's event queue.
    pub channel_buffer: usize,
}

impl Default for CableConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:3000/cable".to_string(),
            headers: Vec::new(),
            channel_buffer: 256,
        }
    }
}

impl CableConfig {
    /// Config directory: `CABLE_CONFIG_DIR` if set, else the platform
    /// config dir (e.g. `~/.config/cable`).
    pub fn config_dir() -> Result<PathBuf> {
        Self::config_dir_with(env_lookup)
    }

    fn config_dir_with(lookup: impl Fn(&str) -> Option<String>) -> Result<PathBuf> {
        if let Some(dir) = lookup(CONFIG_DIR_ENV) {
            return Ok(PathBuf::from(dir));
        }
        Ok(dirs::config_dir()
            .context("Could not determine config directory")?
            .join("cable"))
    }

    /// Path of `config.json` inside [`Self::config_dir`].
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }

    /// Load defaults, the config file if present, and env overrides.
    pub fn load() -> Result<Self> {
        Self::load_with(env_lookup)
    }

    fn load_with(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let path = Self::config_dir_with(&lookup)?.join(CONFIG_FILE);
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        config.apply_overrides(lookup);
        Ok(config)
    }

    /// Read a config file. Missing fields take their defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Write the config as pretty JSON, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("Failed to write config file {}", path.display()))
    }

    /// Apply `CABLE_URL` and `CABLE_CHANNEL_BUFFER` from `lookup`.
    /// Unparseable values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("CABLE_URL") {
            self.url = url;
        }

        if let Some(buffer) = lookup("CABLE_CHANNEL_BUFFER") {
            match buffer.parse::<usize>() {
                Ok(size) if size > 0 => self.channel_buffer = size,
                _ => log::warn!("Ignoring invalid CABLE_CHANNEL_BUFFER={}", buffer),
            }
        }
    }

    /// The WebSocket endpoint to dial.
    #[must_use]
    pub fn cable_url(&self) -> String {
        crate::ws::cable_url(&self.url)
    }
}
