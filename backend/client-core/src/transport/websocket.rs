//! [`Transport`] over `tokio-tungstenite`.
//!
//! The stream is split so the write half and the read half are locked
//! independently: sends from other tasks never wait on a blocked receive.

use crate::error::HubError;
use crate::transport::Transport;

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Bound on a single write, matching the keepalive interval.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(30);

type HubStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WebSocketTransport {
    writer: Mutex<Option<SplitSink<HubStream, Message>>>,
    reader: Mutex<Option<SplitStream<HubStream>>>,
    open: AtomicBool,
    awaiting_pong: AtomicBool,
    /// Replaced on every connect; cancelled by `close` to unblock a pending receive.
    shutdown: parking_lot::Mutex<CancellationToken>,
    send_timeout: Duration,
}

impl WebSocketTransport {
    pub fn new() -> Self {
        Self::with_send_timeout(SEND_TIMEOUT)
    }

    pub fn with_send_timeout(send_timeout: Duration) -> Self {
        Self {
            writer: Mutex::new(None),
            reader: Mutex::new(None),
            open: AtomicBool::new(false),
            awaiting_pong: AtomicBool::new(false),
            shutdown: parking_lot::Mutex::new(CancellationToken::new()),
            send_timeout,
        }
    }

    async fn write(&self, message: Message) -> Result<(), HubError> {
        let mut guard = self.writer.lock().await;
        let writer = guard
            .as_mut()
            .ok_or_else(|| HubError::closed("send on a transport that is not connected"))?;

        match tokio::time::timeout(self.send_timeout, writer.send(message)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(map_ws_error(e)),
            Err(_) => Err(HubError::socket(format!(
                "send did not complete within {}s",
                self.send_timeout.as_secs()
            ))),
        }
    }

    fn mark_closed(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for WebSocketTransport {
    async fn connect(&self, url: &Url) -> Result<(), HubError> {
        info!("Connecting to {}", url);

        let (stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| HubError::connect(format!("Failed to connect to {}: {}", url, e)))?;

        let (write, read) = stream.split();
        *self.writer.lock().await = Some(write);
        *self.reader.lock().await = Some(read);
        *self.shutdown.lock() = CancellationToken::new();
        self.awaiting_pong.store(false, Ordering::SeqCst);
        self.open.store(true, Ordering::SeqCst);

        info!("Connected to {}", url);
        Ok(())
    }

    async fn send(&self, payload: &Value) -> Result<(), HubError> {
        if !self.connected() {
            return Err(HubError::closed("send on a transport that is not connected"));
        }
        let text = serde_json::to_string(payload)
            .map_err(|e| HubError::malformed(format!("Failed to encode message: {}", e)))?;
        self.write(Message::Text(text.into())).await
    }

    async fn receive_one(&self) -> Result<Option<Value>, HubError> {
        let shutdown = self.shutdown.lock().clone();
        let mut guard = self.reader.lock().await;
        let reader = guard
            .as_mut()
            .ok_or_else(|| HubError::closed("receive on a transport that is not connected"))?;

        let frame = tokio::select! {
            _ = shutdown.cancelled() => {
                return Err(HubError::closed("transport closed locally"));
            }
            frame = reader.next() => frame,
        };

        if let Some(Ok(_)) = &frame {
            self.awaiting_pong.store(false, Ordering::SeqCst);
        }

        match frame {
            None => {
                self.mark_closed();
                Err(HubError::closed("stream ended"))
            }
            Some(Err(e)) => {
                self.mark_closed();
                Err(map_ws_error(e))
            }
            Some(Ok(Message::Text(text))) => serde_json::from_str::<Value>(text.as_str())
                .map(Some)
                .map_err(|e| HubError::malformed(format!("Invalid JSON text frame: {}", e))),
            Some(Ok(Message::Close(frame))) => {
                self.mark_closed();
                debug!("Close frame received: {:?}", frame);
                Err(HubError::closed("hub sent a close frame"))
            }
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => Ok(None),
            Some(Ok(Message::Binary(data))) => Err(HubError::malformed(format!(
                "Unexpected binary frame ({} bytes)",
                data.len()
            ))),
            Some(Ok(Message::Frame(_))) => Err(HubError::malformed("Unexpected raw frame")),
        }
    }

    async fn heartbeat(&self) -> Result<(), HubError> {
        self.awaiting_pong.store(true, Ordering::SeqCst);
        self.write(Message::Ping(Vec::new().into())).await
    }

    fn awaiting_pong(&self) -> bool {
        self.awaiting_pong.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.shutdown.lock().cancel();
        let was_open = self.open.swap(false, Ordering::SeqCst);

        if let Some(mut writer) = self.writer.lock().await.take() {
            match tokio::time::timeout(self.send_timeout, writer.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!("Error while closing connection: {}", e),
                Err(_) => warn!("Timed out closing connection"),
            }
        }
        self.reader.lock().await.take();

        if was_open {
            info!("Connection closed");
        }
    }

    fn connected(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

fn map_ws_error(error: tungstenite::Error) -> HubError {
    match error {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            HubError::closed(error.to_string())
        }
        other => HubError::socket(other.to_string()),
    }
}
