//! Configuration
//!
//! Settings are read from `nexus.toml`. Every section is optional:
//!
//! ```toml
//! [archive]
//! download_dir = "/var/lib/nexus/archives"
//!
//! [logging]
//! filter = "nexus=debug,info"
//!
//! [deployment]
//! default_flavor = "nginx"
//! ```

pub mod paths;
pub mod store;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use paths::{config_dir, default_config_path, default_download_dir};
pub use store::ConfigStore;

/// Default tracing filter
pub const DEFAULT_LOG_FILTER: &str = "nexus=info,warn";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NexusConfig {
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub deployment: DeploymentConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Local archive store. Defaults to the platform data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

fn default_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    /// Flavor for new application instances when none is given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_flavor: Option<String>,
}

impl NexusConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Archive directory, falling back to the platform default.
    pub fn download_dir(&self) -> PathBuf {
        self.archive
            .download_dir
            .clone()
            .unwrap_or_else(default_download_dir)
    }
}
