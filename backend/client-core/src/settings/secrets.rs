//! Secrets resolved from the process environment, optionally seeded from a `.env` file.
//!
//! Lookup order for `.env`:
//! 1. Current working directory
//! 2. The settings directory
//! 3. Directory of the running executable
//!
//! Variables already present in the environment are never overridden.

use crate::error::SettingsError;

use common::{ErrorLocation, RedactedToken};

use std::panic::Location;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

const DOTENV_FILE_NAME: &str = ".env";

#[derive(Debug, Clone, Default)]
pub struct EnvSecrets {
    loaded_from: Option<PathBuf>,
}

impl EnvSecrets {
    /// Load the first `.env` found and read secrets from the environment.
    pub fn load(settings_dir: &Path) -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            info!("Loaded .env from: {:?}", path);
            return Self {
                loaded_from: Some(path),
            };
        }

        let mut candidates = vec![settings_dir.join(DOTENV_FILE_NAME)];
        if let Some(exe_dir) = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
        {
            candidates.push(exe_dir.join(DOTENV_FILE_NAME));
        }

        for candidate in candidates {
            if !candidate.exists() {
                continue;
            }
            match dotenvy::from_path(&candidate) {
                Ok(()) => {
                    info!("Loaded .env from: {:?}", candidate);
                    return Self {
                        loaded_from: Some(candidate),
                    };
                }
                Err(e) => warn!("Failed to parse .env at {:?}: {}", candidate, e),
            }
        }

        debug!("No .env file found - reading secrets from the environment only");
        Self::default()
    }

    /// Read secrets from the environment without touching any `.env` file.
    pub fn environment_only() -> Self {
        Self::default()
    }

    pub fn loaded_from(&self) -> Option<&Path> {
        self.loaded_from.as_deref()
    }

    /// `home_assistant_token` is read from `HOME_ASSISTANT_TOKEN`.
    pub fn variable_name(key: &str) -> String {
        key.to_ascii_uppercase()
    }

    pub fn get(&self, key: &str) -> Result<RedactedToken, SettingsError> {
        let name = Self::variable_name(key);
        match std::env::var(&name) {
            Ok(value) if !value.trim().is_empty() => Ok(RedactedToken::new(value.trim())),
            _ => Err(SettingsError::SecretNotFound {
                location: ErrorLocation::from(Location::caller()),
                key: key.to_string(),
            }),
        }
    }
}
