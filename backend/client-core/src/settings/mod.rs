//! Settings and secrets consumed by the protocol engine.
//!
//! The engine only sees the [`SettingsProvider`] trait; [`SettingsStore`] is the
//! file-plus-environment implementation the desktop app uses.

pub mod app_settings;
pub mod secrets;
pub mod store;

pub use app_settings::AppSettings;
pub use secrets::EnvSecrets;
pub use store::SettingsStore;

use crate::error::{HubError, SettingsError};

use common::RedactedToken;
use models::HubEndpointBuilder;
use models::HubEndpoint;

use serde_json::Value;

pub const SETTING_HOST: &str = "home_assistant_host";
pub const SETTING_PORT: &str = "home_assistant_port";
pub const SETTING_SECURE: &str = "home_assistant_secure";
pub const SETTING_SUBSCRIBED_ENTITIES: &str = "home_assistant_subscribed_entities";
pub const SETTING_AUTOSTART: &str = "autostart";
pub const SETTING_LOG_LEVEL: &str = "log_level";

pub const SECRET_HOME_ASSISTANT_TOKEN: &str = "home_assistant_token";

/// Read-only source of plain settings and secrets.
pub trait SettingsProvider: Send + Sync {
    /// Current value of a plain setting, `None` when unset.
    fn get(&self, key: &str) -> Option<Value>;

    /// Secret value for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::SecretNotFound`] when no non-empty value exists.
    fn get_secret(&self, key: &str) -> Result<RedactedToken, SettingsError>;
}

/// Resolve host, port and TLS flag into a validated endpoint.
///
/// The port may be stored as a number or a numeric string.
pub fn hub_endpoint(settings: &dyn SettingsProvider) -> Result<HubEndpoint, HubError> {
    let host = settings
        .get(SETTING_HOST)
        .and_then(|value| value.as_str().map(str::to_string))
        .ok_or_else(|| HubError::configuration(format!("{SETTING_HOST} is not set")))?;

    let port = match settings.get(SETTING_PORT) {
        Some(Value::Number(number)) => number.as_u64(),
        Some(Value::String(text)) => text.trim().parse::<u64>().ok(),
        _ => None,
    }
    .and_then(|port| u16::try_from(port).ok())
    .ok_or_else(|| HubError::configuration(format!("{SETTING_PORT} is not a valid port")))?;

    let secure = settings
        .get(SETTING_SECURE)
        .and_then(|value| value.as_bool())
        .unwrap_or(false);

    HubEndpointBuilder::default()
        .with_host(host)
        .with_port(port)
        .with_secure(secure)
        .build()
        .map_err(|e| HubError::configuration(e.to_string()))
}

/// Entity ids the user wants on the tray, in settings order.
pub fn subscribed_entities(settings: &dyn SettingsProvider) -> Vec<String> {
    settings
        .get(SETTING_SUBSCRIBED_ENTITIES)
        .and_then(|value| serde_json::from_value::<Vec<String>>(value).ok())
        .unwrap_or_default()
}
