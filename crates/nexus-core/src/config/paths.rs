//! Config path resolution helpers.

use std::path::PathBuf;

/// Name of the config file
pub const CONFIG_FILE: &str = "nexus.toml";

/// Per-user nexus config directory.
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("nexus"))
}

pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(CONFIG_FILE))
}

/// Default local archive store.
pub fn default_download_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("nexus")
        .join("archives")
}
