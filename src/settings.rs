//! Subsystem settings
//!
//! Supports loading settings from:
//! - Default values
//! - Settings file (lodestone.toml)
//! - Environment variables (LODESTONE_*)
//!
//! ## Example settings file (lodestone.toml):
//! ```toml
//! [storage]
//! root = "config"
//! pretty = true
//!
//! [logging]
//! filter = "lodestone_config=debug"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settings for the configuration subsystem
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Document storage settings
    #[serde(default)]
    pub storage: StorageSettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Where and how per-mod documents are written
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Configuration root, relative to the host install directory unless
    /// absolute
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Pretty-print documents
    #[serde(default = "default_true")]
    pub pretty: bool,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingSettings {
    /// Env-filter directive for the tracing subscriber
    #[serde(default)]
    pub filter: Option<String>,
}

fn default_root() -> PathBuf {
    PathBuf::from("config")
}

fn default_true() -> bool {
    true
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            root: default_root(),
            pretty: true,
        }
    }
}

impl Settings {
    /// Load settings from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load settings from a specific file
    pub fn load_from(settings_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        // Load from default locations
        let locations = ["lodestone.toml", ".lodestone.toml", "config/lodestone.toml"];
        for location in locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(dirs) = directories::ProjectDirs::from("dev", "lodestone", "config") {
            let xdg_settings = dirs.config_dir().join("lodestone.toml");
            if xdg_settings.exists() {
                builder = builder.add_source(File::from(xdg_settings).required(false));
            }
        }

        // Load from specified path
        if let Some(path) = settings_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Load from environment variables (LODESTONE_*)
        builder = builder.add_source(
            Environment::with_prefix("LODESTONE")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder.build()?;
        settings.try_deserialize()
    }

    /// Save settings to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Get the document root (resolves relative paths against the current
    /// directory, i.e. the host install location)
    pub fn document_root(&self) -> PathBuf {
        if self.storage.root.is_absolute() {
            self.storage.root.clone()
        } else {
            std::env::current_dir()
                .unwrap_or_default()
                .join(&self.storage.root)
        }
    }
}
