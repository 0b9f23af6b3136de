// ============================================================
// Layer 6 — Config Store
// ============================================================
// Reads the data module config a run was started with and writes
// the resolved config next to the outputs it produced, so an
// export can always be traced back to its files and coordinates.
//
// File layout:
//   <dir>/
//     datamodule_config.json   ← resolved DataModuleConfig

use std::{fs, path::{Path, PathBuf}};

use anyhow::{Context, Result};

use crate::data::datamodule::DataModuleConfig;

pub const CONFIG_FILE_NAME: &str = "datamodule_config.json";

/// Parse a data module config from a JSON file.
pub fn load_config(path: &Path) -> Result<DataModuleConfig> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Cannot read config from '{}'", path.display()))?;

    serde_json::from_str(&json)
        .with_context(|| format!("Invalid data module config in '{}'", path.display()))
}

/// Saves and restores the config of a run inside one directory.
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE_NAME)
    }

    pub fn save(&self, cfg: &DataModuleConfig) -> Result<PathBuf> {
        let path = self.path();
        let json = serde_json::to_string_pretty(cfg)?;

        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;

        tracing::debug!("Saved data module config to '{}'", path.display());
        Ok(path)
    }

    pub fn load(&self) -> Result<DataModuleConfig> {
        load_config(&self.path())
    }
}
