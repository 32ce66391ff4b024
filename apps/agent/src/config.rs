//! Agent configuration.
//!
//! Read from TOML at `$MISSION_AGENT_CONFIG`, falling back to
//! `~/.config/mission-relay/agent.toml`; a missing file means defaults.
//! `GATEWAY_URL`, `AGENT_SECRET` and `MISSION_DIR` override the file.

use std::path::{Path, PathBuf};

use anyhow::Context;
use mission_protocol::constants::{DEFAULT_GATEWAY_URL, HEARTBEAT_INTERVAL, RECONNECT_BACKOFF};
use serde::{Deserialize, Serialize};

/// Name of the default scratch directory inside the mission directory.
const SCRATCH_SUBDIR: &str = ".partial";

/// Agent configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// WebSocket URL of the gateway's agent endpoint.
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,

    /// Shared secret sent as a bearer token. Empty sends none.
    #[serde(default)]
    pub agent_secret: String,

    /// Where completed uploads land.
    #[serde(default = "default_mission_dir")]
    pub mission_dir: PathBuf,

    /// Where uploads are assembled. Defaults to a hidden directory inside
    /// `mission_dir` so the final move is a rename.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<PathBuf>,

    #[serde(default = "default_reconnect_backoff_secs")]
    pub reconnect_backoff_secs: u64,

    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
}

fn default_gateway_url() -> String {
    DEFAULT_GATEWAY_URL.into()
}

fn default_mission_dir() -> PathBuf {
    PathBuf::from("./incoming")
}

fn default_reconnect_backoff_secs() -> u64 {
    RECONNECT_BACKOFF.as_secs()
}

fn default_heartbeat_interval_secs() -> u64 {
    HEARTBEAT_INTERVAL.as_secs()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gateway_url: default_gateway_url(),
            agent_secret: String::new(),
            mission_dir: default_mission_dir(),
            scratch_dir: None,
            reconnect_backoff_secs: default_reconnect_backoff_secs(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
        }
    }
}

impl Config {
    /// Loads the config file (if any) and applies environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let path = config_path();
        let mut config = Self::from_file(&path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Effective scratch directory.
    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir
            .clone()
            .unwrap_or_else(|| self.mission_dir.join(SCRATCH_SUBDIR))
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

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("GATEWAY_URL").filter(|v| !v.is_empty()) {
            self.gateway_url = url;
        }
        if let Some(secret) = var("AGENT_SECRET") {
            self.agent_secret = secret;
        }
        if let Some(dir) = var("MISSION_DIR").filter(|v| !v.is_empty()) {
            self.mission_dir = PathBuf::from(dir);
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.heartbeat_interval_secs > 0,
            "heartbeat_interval_secs must be positive"
        );
        Ok(())
    }
}

fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os("MISSION_AGENT_CONFIG") {
        return PathBuf::from(path);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
    PathBuf::from(home)
        .join(".config")
        .join("mission-relay")
        .join("agent.toml")
}
