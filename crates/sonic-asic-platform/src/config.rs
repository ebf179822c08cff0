//! Platform bring-up and teardown options.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{PlatformError, PlatformResult};

/// Default SDK configuration file loaded on cold boot.
pub const DEFAULT_PLATFORM_CONFIG_FILE: &str = "config.yml";

/// In-service software upgrade versions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuInfo {
    /// Version the system is upgrading from.
    #[serde(default)]
    pub start_version: Option<String>,
    /// Version the system is upgrading to.
    #[serde(default)]
    pub current_version: Option<String>,
}

/// Options passed to [`Platform::init`](crate::Platform::init).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// SDK configuration file. Ignored on warm boot, where state comes from HA memory.
    #[serde(default = "default_config_file")]
    pub config_file: PathBuf,

    /// Restart from preserved HA state instead of a cold start.
    #[serde(default)]
    pub warm_boot: bool,

    /// HA file instance number.
    #[serde(default)]
    pub ha_instance: Option<u32>,

    /// Run an ISSU version transition during warm boot.
    #[serde(default)]
    pub issu: Option<IssuInfo>,

    /// Keep HA state on shutdown so the next start can warm boot.
    #[serde(default)]
    pub keep_ha_file: bool,
}

fn default_config_file() -> PathBuf {
    PathBuf::from(DEFAULT_PLATFORM_CONFIG_FILE)
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            config_file: default_config_file(),
            warm_boot: false,
            ha_instance: None,
            issu: None,
            keep_ha_file: false,
        }
    }
}

impl PlatformConfig {
    /// Checks option combinations the SDK would reject.
    pub fn validate(&self) -> PlatformResult<()> {
        if self.issu.is_some() && !self.warm_boot {
            return Err(PlatformError::invalid_config(
                "ISSU version upgrade requires warm boot",
            ));
        }

        if !self.warm_boot && self.config_file.as_os_str().is_empty() {
            return Err(PlatformError::invalid_config(
                "cold boot requires a platform config file",
            ));
        }

        Ok(())
    }

    /// Returns the teardown flags matching this configuration.
    pub fn shutdown_flags(&self) -> ShutdownFlags {
        ShutdownFlags {
            keep_ha_file: self.keep_ha_file,
        }
    }
}

/// Options passed to [`Platform::shutdown`](crate::Platform::shutdown).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownFlags {
    /// Preserve HA state for a following warm boot.
    pub keep_ha_file: bool,
}
