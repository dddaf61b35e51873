//! Wire data model for the Home Assistant WebSocket API.
//!
//! Pure data structures: requests, responses, events, the hub endpoint, and the
//! message type vocabulary. No I/O lives here; `client-core` drives the protocol.

pub mod endpoint;
pub mod entity;
pub mod error;
pub mod message;

pub use common::ErrorLocation;
pub use endpoint::HubEndpoint;
pub use endpoint::builder::HubEndpointBuilder;
pub use entity::is_valid_entity_id;
pub use error::model_error::ModelError;
pub use message::event::{HubEvent, StateChangedData};
pub use message::request::Request;
pub use message::response::{Response, ResponseId};

#[cfg(test)]
mod tests;
