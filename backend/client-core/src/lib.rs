//! Protocol engine for a Home Assistant hub.
//!
//! ## Architecture
//!
//! - [`transport`]: the physical WebSocket connection
//! - [`correlation`]: pending-request table (by sequence id, or by type during the handshake)
//! - [`session`]: id assignment and transmission
//! - [`sync`]: handshake, initial sync and the local mirror
//! - [`dispatcher`]: the receive loop
//! - [`client`]: one connection wired together
//! - [`supervisor`]: bounded reconnects with cancellation
//! - [`settings`]: settings file and secrets

pub mod client;
pub mod correlation;
pub mod dispatcher;
pub mod error;
pub mod session;
pub mod settings;
pub mod supervisor;
pub mod sync;
pub mod transport;

#[cfg(test)]
mod tests;

pub use client::HubClient;
pub use error::{CoreError, HubError, SettingsError};
pub use settings::{SettingsProvider, SettingsStore};
pub use supervisor::{RetryPolicy, Supervisor};
pub use sync::{SessionPhase, StateSynchronizer};
pub use transport::{Transport, WebSocketTransport};

pub const APP_NAME: &str = "homeassistant-desktop";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const SETTINGS_PATH_HINT: &str = const_format::concatcp!("<config dir>/", APP_NAME, "/", SETTINGS_FILE_NAME);
