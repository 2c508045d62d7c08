use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{OrgError, Result};
use crate::org::DEFAULT_API_VERSION;
use crate::poll::{POLL_INTERVAL_MS, POLL_MAX_ATTEMPTS};

/// Centralized configuration for orgctl, loaded from
/// `~/.orgctl/config.toml`. Every key has a default; commands work with no
/// config file at all.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrgctlConfig {
    #[serde(default)]
    pub cli: CliConfig,
    #[serde(default)]
    pub org: OrgConfig,
    #[serde(default)]
    pub poll: PollSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Platform CLI binary name or path
    #[serde(default = "default_binary")]
    pub binary: String,
    /// REST API version used for org connections
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrgConfig {
    /// Scratch-org definition file used when `org create` gets none
    pub default_definition_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollSettings {
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_poll_max_attempts")]
    pub max_attempts: u32,
}

fn default_binary() -> String {
    "sfdx".to_string()
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_poll_interval_ms() -> u64 {
    POLL_INTERVAL_MS
}

fn default_poll_max_attempts() -> u32 {
    POLL_MAX_ATTEMPTS
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            api_version: default_api_version(),
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval_ms(),
            max_attempts: default_poll_max_attempts(),
        }
    }
}

impl OrgctlConfig {
    /// Load config from ~/.orgctl/config.toml, falling back to defaults
    /// when the file does not exist.
    pub fn load() -> Result<Self> {
        Self::load_from(Self::config_path())
    }

    pub fn load_from(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        toml::from_str(&content)
            .map_err(|err| OrgError::config(format!("invalid TOML in {:?}: {}", path, err)))
    }

    /// Config file path: ~/.orgctl/config.toml
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".orgctl/config.toml")
    }

    pub fn poll_config(&self) -> crate::poll::PollConfig {
        crate::poll::PollConfig::new(
            std::time::Duration::from_millis(self.poll.interval_ms),
            self.poll.max_attempts,
        )
    }
}
