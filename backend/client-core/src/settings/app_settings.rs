use crate::error::SettingsError;
use crate::{APP_NAME, SETTINGS_FILE_NAME};

use common::ErrorLocation;
use models::is_valid_entity_id;

use std::panic::Location;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::{info, warn, LevelFilter};
use serde::{Deserialize, Serialize};

const SETTINGS_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub autostart: bool,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_host")]
    pub home_assistant_host: String,

    #[serde(default = "default_port")]
    pub home_assistant_port: u16,

    #[serde(default)]
    pub home_assistant_secure: bool,

    #[serde(default)]
    pub home_assistant_subscribed_entities: Vec<String>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            autostart: false,
            log_level: default_log_level(),
            home_assistant_host: default_host(),
            home_assistant_port: default_port(),
            home_assistant_secure: false,
            home_assistant_subscribed_entities: Vec::new(),
        }
    }
}

fn default_version() -> u32 {
    SETTINGS_VERSION
}
fn default_log_level() -> String {
    "INFO".to_string()
}
fn default_host() -> String {
    "homeassistant.local".to_string()
}
fn default_port() -> u16 {
    8123
}

/// Parse a log level name. Accepts the `log` crate names plus `WARNING` and `CRITICAL`.
pub fn parse_log_level(level: &str) -> Option<LevelFilter> {
    match level.trim().to_ascii_uppercase().as_str() {
        "WARNING" => Some(LevelFilter::Warn),
        "CRITICAL" => Some(LevelFilter::Error),
        other => LevelFilter::from_str(other).ok(),
    }
}

impl AppSettings {
    /// Per-user settings directory, e.g. `~/.config/homeassistant-desktop` on Linux.
    pub fn default_dir() -> Result<PathBuf, SettingsError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_NAME))
            .ok_or_else(|| SettingsError::DirectoryNotFound {
                location: ErrorLocation::from(Location::caller()),
            })
    }

    /// Load settings from `{dir}/settings.json`.
    ///
    /// A missing file yields defaults. A file that exists but cannot be read,
    /// parsed or validated is an error.
    pub fn load(dir: &Path) -> Result<Self, SettingsError> {
        let path = dir.join(SETTINGS_FILE_NAME);

        if !path.exists() {
            info!("Settings file not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&path).map_err(|e| {
            warn!("Failed to read settings file: {}", e);
            SettingsError::ReadError {
                location: ErrorLocation::from(Location::caller()),
                path: path.clone(),
                source: e,
            }
        })?;

        let settings: AppSettings = serde_json::from_str(&contents).map_err(|e| {
            warn!("Failed to parse settings JSON: {}", e);
            SettingsError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                path: path.clone(),
                reason: e.to_string(),
            }
        })?;

        settings.validate()?;

        info!("Settings loaded from {}", path.display());
        Ok(settings)
    }

    /// Save settings to `{dir}/settings.json` through a temp file and rename.
    pub fn save(&self, dir: &Path) -> Result<(), SettingsError> {
        self.validate()?;

        std::fs::create_dir_all(dir).map_err(|e| SettingsError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: dir.to_path_buf(),
            source: e,
        })?;

        let path = dir.join(SETTINGS_FILE_NAME);
        let temp_path = dir.join(format!("{}.tmp", SETTINGS_FILE_NAME));

        let json = serde_json::to_string_pretty(self).map_err(|e| SettingsError::SerializeError {
            location: ErrorLocation::from(Location::caller()),
            reason: e.to_string(),
        })?;

        std::fs::write(&temp_path, json).map_err(|e| SettingsError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: temp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&temp_path, &path).map_err(|e| SettingsError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: path.clone(),
            source: e,
        })?;

        info!("Settings saved to {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.version == 0 || self.version > SETTINGS_VERSION {
            return Err(validation_error(format!(
                "Invalid version: {} (expected 1-{})",
                self.version, SETTINGS_VERSION
            )));
        }

        let host = self.home_assistant_host.trim();
        if host.is_empty() {
            return Err(validation_error("home_assistant_host cannot be empty"));
        }
        if host.contains("://") {
            return Err(validation_error(format!(
                "home_assistant_host must not include a scheme: {}",
                host
            )));
        }

        if self.home_assistant_port == 0 {
            return Err(validation_error("home_assistant_port cannot be 0"));
        }

        if parse_log_level(&self.log_level).is_none() {
            return Err(validation_error(format!(
                "Unknown log level: {}",
                self.log_level
            )));
        }

        if let Some(bad) = self
            .home_assistant_subscribed_entities
            .iter()
            .find(|entity_id| !is_valid_entity_id(entity_id))
        {
            return Err(validation_error(format!("Invalid entity id: {}", bad)));
        }

        Ok(())
    }
}

#[track_caller]
fn validation_error(reason: impl Into<String>) -> SettingsError {
    SettingsError::ValidationError {
        location: ErrorLocation::from(Location::caller()),
        reason: reason.into(),
    }
}
