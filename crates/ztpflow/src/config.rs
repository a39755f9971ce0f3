//! Configuration loading and types

use std::path::{Path, PathBuf};

use eyre::WrapErr;
use serde::{Deserialize, Serialize};
use ztpflow_core::EngineConfig;
use ztpflow_exec::CredentialSource;

/// Top-level configuration (`ztpflow.toml`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Orchestrator settings
    #[serde(default)]
    pub engine: EngineConfig,
    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
    /// How transports log in to switches
    #[serde(default)]
    pub credentials: CredentialSource,
    /// Command transport settings
    #[serde(default)]
    pub transport: TransportConfig,
}

/// Log output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error), overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable logs
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Command transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Upper bound for a single switch CLI command, in seconds
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
    /// Login user for switches whose inventory entry names none
    #[serde(default = "default_user")]
    pub default_user: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: default_command_timeout(),
            default_user: default_user(),
        }
    }
}

fn default_command_timeout() -> u64 {
    120
}

fn default_user() -> String {
    "network-admin".to_string()
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .wrap_err_with(|| format!("invalid config {}", path.display()))?;
        Ok(config)
    }

    /// Load `explicit` if given, else the first config found on the default
    /// paths, else defaults
    ///
    /// # Errors
    /// Returns error if a config file exists but is invalid
    pub fn resolve(explicit: Option<&Path>) -> eyre::Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Ok(path) = std::env::var("ZTPFLOW_CONFIG") {
            return Self::load(Path::new(&path));
        }

        let paths = [
            Some(PathBuf::from("ztpflow.toml")),
            Some(PathBuf::from("/etc/ztpflow/ztpflow.toml")),
            dirs::config_dir().map(|p| p.join("ztpflow/ztpflow.toml")),
        ];

        for path in paths.into_iter().flatten() {
            if path.exists() {
                return Self::load(&path);
            }
        }

        Ok(Config::default())
    }
}
