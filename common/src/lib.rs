//! Shared primitives for the Home Assistant desktop client.
//!
//! ## Architecture
//!
//! - **common** (this crate): error location tracking and secret wrappers
//! - **models**: wire data model for the hub WebSocket API
//! - **client-core**: protocol engine operating on models
//! - **homeassistant-desktop**: application wiring everything together

pub mod error;
pub mod redacted_token;

pub use error::error_location::ErrorLocation;
pub use error::redact_error::RedactError;
pub use redacted_token::RedactedToken;
