use client_core::{HubError, SettingsError};

use common::ErrorLocation;

use std::panic::Location;

use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by the desktop runner.
///
/// Engine errors are flattened to their display text so the whole enum stays
/// serializable for diagnostics.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum DesktopError {
    /// Error from this app (logging, directories, runtime)
    #[error("App Error: {message} {location}")]
    App {
        message: String,
        location: ErrorLocation,
    },

    /// Error from the hub session
    #[error("Core Error: {message} {location}")]
    Core {
        message: String,
        category: String,
        location: ErrorLocation,
    },

    /// Error loading, validating or saving settings
    #[error("Settings Error: {message} {location}")]
    Settings {
        message: String,
        location: ErrorLocation,
    },
}

impl DesktopError {
    #[track_caller]
    pub fn app(message: impl Into<String>) -> Self {
        Self::App {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// True when the supervisor gave up after its reconnect budget.
    pub fn is_attempts_exhausted(&self) -> bool {
        matches!(self, Self::Core { category, .. } if category == "attempts_exhausted")
    }
}

impl From<HubError> for DesktopError {
    #[track_caller]
    fn from(error: HubError) -> Self {
        Self::Core {
            message: error.to_string(),
            category: error.error_category().to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<SettingsError> for DesktopError {
    #[track_caller]
    fn from(error: SettingsError) -> Self {
        Self::Settings {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
