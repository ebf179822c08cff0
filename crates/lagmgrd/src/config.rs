//! Configuration file support for lagmgrd
//!
//! Loads and validates lagmgrd configuration from TOML files.
//! Default location: /etc/sonic/lagmgrd.toml

use serde::{Deserialize, Serialize};
use sonic_asic_platform::PlatformConfig;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::audit::LogFormat;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/sonic/lagmgrd.toml";

/// Errors loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema.
    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// A field holds an unusable value.
    #[error("Invalid configuration for {field}: {message}")]
    Invalid { field: String, message: String },
}

impl ConfigError {
    /// Creates an invalid field error.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// RPC server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address for the RPC, health and metrics endpoints
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

/// LAG service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Maximum wait for the registry lock before answering Busy
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout_ms: u64,

    /// Maximum wait for in-flight operations at shutdown
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout_ms: u64,
}

/// Warm boot snapshot configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Snapshot file path
    #[serde(default = "default_snapshot_path")]
    pub path: PathBuf,

    /// Save on shutdown and restore on warm boot
    #[serde(default = "default_snapshot_enabled")]
    pub enabled: bool,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by RUST_LOG
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

/// Complete lagmgrd configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LagmgrConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub service: ServiceConfig,

    #[serde(default)]
    pub platform: PlatformConfig,

    #[serde(default)]
    pub snapshot: SnapshotConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

// Default functions
fn default_listen_addr() -> String {
    "127.0.0.1:50052".to_string()
}

fn default_lock_timeout() -> u64 {
    500
}

fn default_drain_timeout() -> u64 {
    5000
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("/var/lib/lagmgrd/lag_snapshot.json")
}

fn default_snapshot_enabled() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_lock_timeout(),
            drain_timeout_ms: default_drain_timeout(),
        }
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            path: default_snapshot_path(),
            enabled: default_snapshot_enabled(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl LagmgrConfig {
    /// Load configuration from file. Returns `None` if the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Option<Self>, ConfigError> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content)
                .map(Some)
                .map_err(|e| ConfigError::Parse {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Get the parsed listen address
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server
            .listen_addr
            .parse()
            .map_err(|e| ConfigError::invalid("server.listen_addr", format!("{}", e)))
    }

    /// Get lock timeout as Duration
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.service.lock_timeout_ms)
    }

    /// Get drain timeout as Duration
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.service.drain_timeout_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listen_addr()?;

        if self.service.lock_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "service.lock_timeout_ms",
                "must be > 0",
            ));
        }

        if self.service.drain_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "service.drain_timeout_ms",
                "must be > 0",
            ));
        }

        if self.snapshot.enabled && self.snapshot.path.as_os_str().is_empty() {
            return Err(ConfigError::invalid(
                "snapshot.path",
                "must be set when snapshots are enabled",
            ));
        }

        self.platform
            .validate()
            .map_err(|e| ConfigError::invalid("platform", e.to_string()))
    }
}
