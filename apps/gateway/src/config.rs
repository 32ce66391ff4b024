//! Gateway configuration.
//!
//! Read from TOML at `$MISSION_GATEWAY_CONFIG`, falling back to
//! `~/.config/mission-relay/gateway.toml`. A missing file means defaults.
//! The environment variables `ADDR`, `AGENT_SECRET` and `MAX_UPLOAD_SIZE`
//! override the file.

use std::path::{Path, PathBuf};

use anyhow::Context;
use mission_gateway::DEFAULT_MAX_UPLOAD_SIZE;
use serde::{Deserialize, Serialize};

/// Gateway configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Listen address.
    #[serde(default = "default_addr")]
    pub addr: String,

    /// Secret the agent must present. Empty disables authentication.
    #[serde(default)]
    pub agent_secret: String,

    /// Largest accepted upload in bytes (0 = unlimited).
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: u64,
}

fn default_addr() -> String {
    "0.0.0.0:8000".into()
}

fn default_max_upload_size() -> u64 {
    DEFAULT_MAX_UPLOAD_SIZE
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            agent_secret: String::new(),
            max_upload_size: default_max_upload_size(),
        }
    }
}

impl Config {
    /// Loads the config file (if any) and applies environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let path = config_path();
        let mut config = Self::from_file(&path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Address to bind. A bare `:port` listens on all interfaces.
    pub fn listen_addr(&self) -> String {
        if self.addr.starts_with(':') {
            format!("0.0.0.0{}", self.addr)
        } else {
            self.addr.clone()
        }
    }

    fn from_file(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        tracing::debug!(path = %path.display(), "configuration file loaded");
        Ok(config)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(addr) = var("ADDR").filter(|v| !v.is_empty()) {
            self.addr = addr;
        }
        if let Some(secret) = var("AGENT_SECRET") {
            self.agent_secret = secret;
        }
        if let Some(size) = var("MAX_UPLOAD_SIZE").filter(|v| !v.is_empty()) {
            self.max_upload_size = size
                .trim()
                .parse()
                .with_context(|| format!("invalid MAX_UPLOAD_SIZE: {size}"))?;
        }
        Ok(())
    }
}

fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os("MISSION_GATEWAY_CONFIG") {
        return PathBuf::from(path);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
    PathBuf::from(home)
        .join(".config")
        .join("mission-relay")
        .join("gateway.toml")
}
