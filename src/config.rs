//! # Config
//!
//! The plugin's configuration file. It holds a single option and every key is optional.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// File name of the configuration file, next to the plugin
pub const CONFIG_FILE: &str = "AutoExportPatches.json";

/// Plugin configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Export the live patch set into the database on save
    pub auto_export_patches: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auto_export_patches: true,
        }
    }
}

impl Config {
    /// Loads the configuration at `path`. A missing file gives the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes the configuration to `path`
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text)?;
        Ok(())
    }
}
