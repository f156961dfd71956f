//! Service configuration.
//!
//! Layers, lowest precedence first:
//!
//! | Source | Example |
//! |--------|---------|
//! | Built-in defaults | `api_host = "0.0.0.0:8082"` |
//! | TOML file (`-c<file>`) | `[web] read_timeout_secs = 10` |
//! | Environment | `DATA_API_WEB_API_HOST=127.0.0.1:9000` |
//! | Command line | `-a127.0.0.1:9000`, `-r<dir>` (applied by `main`) |

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix shared by every environment override.
pub const ENV_PREFIX: &str = "DATA_API";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parsing config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("{name}: invalid value {value:?}: {reason}")]
    Env {
        name: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct WebConfig {
    /// Listen address of the HTTP API.
    pub api_host: String,
    /// How long a client may take to send its request.
    pub read_timeout_secs: u64,
    /// How long in-flight requests get to finish on shutdown.
    pub shutdown_timeout_secs: u64,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            api_host: "0.0.0.0:8082".into(),
            read_timeout_secs: 5,
            shutdown_timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScriptsConfig {
    /// Directory every script path is resolved against.
    pub root: PathBuf,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("configs/dataapi"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub web: WebConfig,
    pub scripts: ScriptsConfig,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document.  Missing keys keep their defaults.
    pub fn load_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Read and parse a TOML file from disk.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::load_str(&s)
    }

    /// Apply `DATA_API_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Apply `DATA_API_*` overrides using `lookup` (exposed for testing).
    pub fn apply_env_from(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let var = |suffix: &str| {
            let name = format!("{ENV_PREFIX}_{suffix}");
            lookup(&name).map(|value| (name, value))
        };
        let secs = |(name, value): (String, String)| {
            value.trim().parse::<u64>().map_err(|e| ConfigError::Env {
                name,
                value: value.clone(),
                reason: e.to_string(),
            })
        };

        if let Some((_, value)) = var("WEB_API_HOST") {
            self.web.api_host = value;
        }
        if let Some(pair) = var("WEB_READ_TIMEOUT") {
            self.web.read_timeout_secs = secs(pair)?;
        }
        if let Some(pair) = var("WEB_SHUTDOWN_TIMEOUT") {
            self.web.shutdown_timeout_secs = secs(pair)?;
        }
        if let Some((_, value)) = var("SCRIPTS_ROOT") {
            self.scripts.root = PathBuf::from(value);
        }
        Ok(())
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.web.read_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.web.shutdown_timeout_secs)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
