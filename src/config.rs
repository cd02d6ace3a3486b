//! Application settings management
//!
//! Handles the persistent configuration shared by the CLI and any other
//! front end: where the store files live and a few display knobs.

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory holding the item and log files; empty means the platform
    /// data directory
    pub data_dir: PathBuf,
    /// Item store file name, `.csv` or `.parquet`
    pub items_file: String,
    /// Audit log file name, `.csv` or `.parquet`
    pub logs_file: String,
    /// Default number of audit entries shown by history views
    pub history_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::new(),
            items_file: "items.csv".to_owned(),
            logs_file: "logs.csv".to_owned(),
            history_limit: 100,
        }
    }
}

impl Settings {
    /// Get the config file path
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Failed to get config directory")?;
        Ok(config_dir.join("stockbook").join("config.json"))
    }

    /// Load settings from disk, falling back to the defaults when no file
    /// exists yet
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;

        let settings: Self =
            serde_json::from_str(&contents).context("Failed to parse settings JSON")?;

        Ok(settings)
    }

    /// Save settings to disk
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;

        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write settings to {}", path.display()))?;

        Ok(())
    }

    /// Directory the store files live in
    pub fn resolve_data_dir(&self) -> Result<PathBuf> {
        if self.data_dir.as_os_str().is_empty() {
            let base = dirs::data_dir().context("Failed to determine data directory")?;
            Ok(base.join("stockbook"))
        } else {
            Ok(self.data_dir.clone())
        }
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn items_path(&self) -> Result<PathBuf> {
        Ok(self.resolve_data_dir()?.join(&self.items_file))
    }

    pub fn logs_path(&self) -> Result<PathBuf> {
        Ok(self.resolve_data_dir()?.join(&self.logs_file))
    }

    pub fn users_path(&self) -> Result<PathBuf> {
        Ok(self.resolve_data_dir()?.join("users.json"))
    }
}
