//! Server configuration.
//!
//! Configuration is loaded from multiple sources with precedence:
//! 1. Command-line flags / environment variables (INTERVENTION_*)
//! 2. Config file (`--config` / INTERVENTION_CONFIG)
//! 3. Default values
//!
//! Example config file:
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 5001
//!
//! [decision]
//! random_trigger_probability = 0.5
//! movement_trigger_probability = 0.3
//!
//! [lifecycle]
//! cooldown_ms = 5000
//! grace_window_ms = 2000
//! history_limit = 1000
//! ```

use anyhow::{Context, Result};
use intervention_core::{DecisionConfig, LifecycleConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listener settings
    pub server: ServerConfig,

    /// Decision engine tuning
    pub decision: DecisionConfig,

    /// Intervention lifecycle timings
    pub lifecycle: LifecycleConfig,

    /// File the configuration was read from, if any
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,

    /// TCP port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5001,
        }
    }
}

impl Config {
    /// Load configuration from `path` if given, otherwise use defaults.
    ///
    /// An explicitly given path that does not exist is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config = Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply command-line / environment overrides
    pub fn with_overrides(mut self, host: Option<String>, port: Option<u16>) -> Self {
        if let Some(host) = host {
            self.server.host = host;
        }
        if let Some(port) = port {
            self.server.port = port;
        }
        self
    }

    /// Address the listener binds to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
