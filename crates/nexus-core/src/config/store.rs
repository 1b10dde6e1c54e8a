//! Config store for loading and saving nexus.toml.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::NexusConfig;
use super::paths::default_config_path;
use crate::error::{NexusError, Result};

#[derive(Debug, Clone)]
pub struct ConfigStore {
    config_path: PathBuf,
}

impl ConfigStore {
    /// Store at the per-user default location.
    pub fn new() -> Result<Self> {
        let config_path = default_config_path()
            .ok_or_else(|| NexusError::runtime("Could not determine config directory"))?;
        Ok(Self::from_path(config_path))
    }

    pub fn from_path(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load the config. A missing file yields the defaults.
    pub fn load(&self) -> Result<NexusConfig> {
        if !self.config_path.exists() {
            debug!(path = %self.config_path.display(), "No config file, using defaults");
            return Ok(NexusConfig::new());
        }

        let content = std::fs::read_to_string(&self.config_path)?;
        NexusConfig::from_toml_str(&content)
    }

    pub fn save(&self, config: &NexusConfig) -> Result<()> {
        let content = config.to_toml_string()?;
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.config_path, content)?;
        Ok(())
    }
}
