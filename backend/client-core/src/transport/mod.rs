//! Physical connection to the hub.
//!
//! A [`Transport`] moves JSON values over the wire and translates transport-level
//! failures into [`HubError`]. It knows nothing about the protocol.

pub mod websocket;

pub use websocket::WebSocketTransport;

use crate::error::HubError;

use std::future::Future;

use serde_json::Value;
use url::Url;

pub trait Transport: Send + Sync + 'static {
    /// Open the connection.
    ///
    /// # Errors
    ///
    /// [`HubError::Connect`] on DNS, refused connection or upgrade failure.
    fn connect(&self, url: &Url) -> impl Future<Output = Result<(), HubError>> + Send;

    /// Serialize and transmit one message.
    ///
    /// # Errors
    ///
    /// [`HubError::Closed`] when not connected, [`HubError::Socket`] when the write fails
    /// or does not complete within the send timeout.
    fn send(&self, payload: &Value) -> impl Future<Output = Result<(), HubError>> + Send;

    /// Wait for the next frame.
    ///
    /// `Ok(None)` means a frame arrived that carries no message (control frames).
    ///
    /// # Errors
    ///
    /// [`HubError::Closed`] on a close frame, end of stream or local close,
    /// [`HubError::Socket`] on a read error and [`HubError::MalformedMessage`] for
    /// frames that are not JSON text.
    fn receive_one(&self) -> impl Future<Output = Result<Option<Value>, HubError>> + Send;

    /// Keepalive ping. Marks the connection as awaiting a reply until the next
    /// inbound frame of any kind.
    fn heartbeat(&self) -> impl Future<Output = Result<(), HubError>> + Send;

    /// A heartbeat went out and nothing has been received since.
    fn awaiting_pong(&self) -> bool;

    /// Release the connection. Idempotent and infallible.
    fn close(&self) -> impl Future<Output = ()> + Send;

    fn connected(&self) -> bool;
}
