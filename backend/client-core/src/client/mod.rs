//! One hub connection: transport, correlation, synchronizer and receive loop.

use crate::correlation::Waiter;
use crate::dispatcher::{Dispatcher, HEARTBEAT_INTERVAL};
use crate::error::HubError;
use crate::session::{HubSession, REQUEST_TIMEOUT};
use crate::settings::{SettingsProvider, hub_endpoint};
use crate::sync::StateSynchronizer;
use crate::transport::Transport;

use models::message::types::AUTH_OK;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{info, warn};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use url::Url;

pub struct HubClient<T: Transport> {
    settings: Arc<dyn SettingsProvider>,
    session: Arc<HubSession<T>>,
    sync: Arc<StateSynchronizer<T>>,
    handshake: Mutex<Option<Waiter>>,
    /// Whether the current connection reached readiness; survives teardown.
    reached_ready: AtomicBool,
    heartbeat_interval: Duration,
}

impl<T: Transport> HubClient<T> {
    pub fn new(transport: T, settings: Arc<dyn SettingsProvider>) -> Self {
        let session = Arc::new(HubSession::new(Arc::new(transport)));
        let sync = Arc::new(StateSynchronizer::new(
            Arc::clone(&session),
            Arc::clone(&settings),
        ));
        Self {
            settings,
            session,
            sync,
            handshake: Mutex::new(None),
            reached_ready: AtomicBool::new(false),
            heartbeat_interval: HEARTBEAT_INTERVAL,
        }
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn sync(&self) -> &Arc<StateSynchronizer<T>> {
        &self.sync
    }

    pub fn session(&self) -> &Arc<HubSession<T>> {
        &self.session
    }

    /// The latest connection completed its initial sync, even if it has since ended.
    pub fn reached_ready(&self) -> bool {
        self.reached_ready.load(Ordering::SeqCst) || self.sync.became_ready()
    }

    pub fn connected(&self) -> bool {
        self.session.transport().connected()
    }

    /// Open a fresh connection to the configured hub.
    ///
    /// Any previous connection is closed first and the mirror starts empty.
    ///
    /// # Errors
    ///
    /// [`HubError::Configuration`] when the settings do not form a valid endpoint,
    /// [`HubError::Connect`] when the connection cannot be established.
    pub async fn connect(&self) -> Result<(), HubError> {
        if self.connected() {
            warn!("Already connected; closing the previous connection");
            self.close().await;
        }

        let endpoint = hub_endpoint(self.settings.as_ref())?;
        let url = Url::parse(&endpoint.websocket_url())
            .map_err(|e| HubError::configuration(format!("Invalid hub URL: {}", e)))?;

        self.sync.reset();
        self.session.reset();
        self.reached_ready.store(false, Ordering::SeqCst);
        self.session.correlation().fail_all("new connection");
        *self.handshake.lock() = Some(self.session.expect_handshake()?);

        self.session.transport().connect(&url).await
    }

    /// Run the receive loop until the connection drops or `cancel` fires.
    ///
    /// The transport is closed, the mirror discarded and pending waiters failed
    /// on the way out.
    pub async fn listen(&self, cancel: &CancellationToken) -> Result<(), HubError> {
        let dispatcher =
            Dispatcher::new(Arc::clone(&self.sync)).with_heartbeat_interval(self.heartbeat_interval);
        let outcome = dispatcher.run(cancel).await;

        if self.sync.became_ready() {
            self.reached_ready.store(true, Ordering::SeqCst);
        }
        self.session.transport().close().await;
        self.teardown("connection ended");
        outcome
    }

    /// Wait for the handshake started by [`connect`](Self::connect).
    ///
    /// Needs [`listen`](Self::listen) running concurrently. Returns the hub version.
    pub async fn authenticated(&self) -> Result<Option<String>, HubError> {
        let waiter = self
            .handshake
            .lock()
            .take()
            .ok_or_else(|| HubError::closed("no handshake in progress"))?;

        let response = self.session.wait(waiter, REQUEST_TIMEOUT).await?;
        if response.message_type == AUTH_OK {
            Ok(response.ha_version)
        } else {
            Err(HubError::authentication(
                response
                    .message
                    .unwrap_or_else(|| "Invalid access token".to_string()),
            ))
        }
    }

    /// Close the connection and discard all session state. Idempotent.
    pub async fn close(&self) {
        self.session.transport().close().await;
        self.teardown("connection closed");
        info!("Hub client closed");
    }

    fn teardown(&self, reason: &str) {
        self.sync.clear();
        self.handshake.lock().take();
        self.session.correlation().fail_all(reason);
    }
}
