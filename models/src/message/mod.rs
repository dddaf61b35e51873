//! Messages exchanged with the hub over the WebSocket API.

pub mod event;
pub mod outbound;
pub mod request;
pub mod response;
pub mod types;
