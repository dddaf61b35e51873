use crate::error::SettingsError;
use crate::settings::{AppSettings, EnvSecrets, SettingsProvider};

use common::RedactedToken;

use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde_json::Value;

/// Settings file plus environment secrets behind the [`SettingsProvider`] trait.
#[derive(Debug)]
pub struct SettingsStore {
    dir: PathBuf,
    settings: RwLock<AppSettings>,
    secrets: EnvSecrets,
}

impl SettingsStore {
    /// Load `settings.json` from `dir` and seed secrets from `.env`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let dir = dir.into();
        let settings = AppSettings::load(&dir)?;
        let secrets = EnvSecrets::load(&dir);
        Ok(Self::new(dir, settings, secrets))
    }

    pub fn new(dir: impl Into<PathBuf>, settings: AppSettings, secrets: EnvSecrets) -> Self {
        Self {
            dir: dir.into(),
            settings: RwLock::new(settings),
            secrets,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Copy of the current settings.
    pub fn snapshot(&self) -> AppSettings {
        self.settings.read().clone()
    }

    /// Apply `change`, validate, persist, then swap the in-memory copy.
    ///
    /// Nothing is changed when validation or the write fails.
    pub fn update(&self, change: impl FnOnce(&mut AppSettings)) -> Result<AppSettings, SettingsError> {
        let mut next = self.snapshot();
        change(&mut next);
        next.validate()?;
        next.save(&self.dir)?;
        *self.settings.write() = next.clone();
        Ok(next)
    }
}

impl SettingsProvider for SettingsStore {
    fn get(&self, key: &str) -> Option<Value> {
        let settings = self.settings.read();
        match serde_json::to_value(&*settings) {
            Ok(Value::Object(mut map)) => map.remove(key),
            _ => None,
        }
    }

    fn get_secret(&self, key: &str) -> Result<RedactedToken, SettingsError> {
        self.secrets.get(key)
    }
}
