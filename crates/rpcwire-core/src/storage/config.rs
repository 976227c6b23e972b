//! Configuration storage operations

use crate::{models::ServerConfig, Result};
use std::path::{Path, PathBuf};

pub struct ConfigStorage {
    config_dir: PathBuf,
}

impl ConfigStorage {
    pub fn new(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join("config.json")
    }

    /// Load the config, writing the defaults first if the file is missing or empty.
    pub fn load(&self) -> Result<ServerConfig> {
        let config_path = self.config_path();

        if !config_path.exists() {
            let config = ServerConfig::default();
            self.save(&config)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(config_path)?;

        // Handle empty file case
        if content.trim().is_empty() {
            let config = ServerConfig::default();
            self.save(&config)?;
            return Ok(config);
        }

        let config: ServerConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, config: &ServerConfig) -> Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;

        let content = serde_json::to_string_pretty(config)?;
        std::fs::write(self.config_path(), content)?;

        Ok(())
    }

    /// Load a config from an explicit file path without creating anything.
    pub fn load_file(path: &Path) -> Result<ServerConfig> {
        let content = std::fs::read_to_string(path)?;
        let config: ServerConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }
}
