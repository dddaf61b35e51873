//! The receive loop.
//!
//! Messages are handled strictly one at a time in arrival order: correlation
//! first, then the synchronizer, then the next `receive_one`.

use crate::correlation::CorrelationKey;
use crate::error::HubError;
use crate::sync::StateSynchronizer;
use crate::transport::Transport;

use models::{Response, ResponseId};

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use serde_json::Value;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Keepalive ping interval.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

pub struct Dispatcher<T: Transport> {
    sync: Arc<StateSynchronizer<T>>,
    heartbeat_interval: Duration,
}

impl<T: Transport> Dispatcher<T> {
    pub fn new(sync: Arc<StateSynchronizer<T>>) -> Self {
        Self {
            sync,
            heartbeat_interval: HEARTBEAT_INTERVAL,
        }
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// How long the hub has to answer a heartbeat: half the interval.
    pub fn pong_timeout(&self) -> Duration {
        self.heartbeat_interval / 2
    }

    /// Pull and handle messages until the connection ends or `cancel` fires.
    ///
    /// Returns `Ok(())` only on cancellation.
    ///
    /// # Errors
    ///
    /// Transport errors ([`HubError::Closed`], [`HubError::Socket`]), a
    /// [`HubError::Closed`] when a heartbeat goes unanswered for
    /// [`pong_timeout`](Self::pong_timeout), and the handshake failures raised
    /// by the synchronizer.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<(), HubError> {
        let transport = Arc::clone(self.sync.session().transport());

        let mut heartbeat = tokio::time::interval_at(
            tokio::time::Instant::now() + self.heartbeat_interval,
            self.heartbeat_interval,
        );
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let pong_deadline = tokio::time::sleep(self.heartbeat_interval);
        tokio::pin!(pong_deadline);
        let mut pong_pending = false;

        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Dispatcher cancelled");
                    return Ok(());
                }
                _ = heartbeat.tick() => {
                    transport.heartbeat().await?;
                    pong_deadline.as_mut().reset(tokio::time::Instant::now() + self.pong_timeout());
                    pong_pending = true;
                    continue;
                }
                _ = &mut pong_deadline, if pong_pending => {
                    pong_pending = false;
                    if transport.awaiting_pong() {
                        warn!("No reply to heartbeat within {}ms", self.pong_timeout().as_millis());
                        return Err(HubError::closed(format!(
                            "hub did not answer a heartbeat within {}ms",
                            self.pong_timeout().as_millis()
                        )));
                    }
                    continue;
                }
                received = transport.receive_one() => received,
            };

            match received {
                Ok(Some(value)) => self.dispatch(value).await?,
                Ok(None) => {}
                Err(HubError::MalformedMessage { message, .. }) => {
                    warn!("Dropping malformed message: {}", message);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Handle one decoded message.
    pub async fn dispatch(&self, value: Value) -> Result<(), HubError> {
        let response: Response = match serde_json::from_value(value) {
            Ok(response) => response,
            Err(e) => {
                warn!("Dropping message that is not a hub response: {}", e);
                return Ok(());
            }
        };
        debug!("Received {} (id {:?})", response.message_type, response.id);

        self.correlate(&response);
        self.sync.handle_message(&response).await
    }

    fn correlate(&self, response: &Response) {
        let correlation = self.sync.session().correlation();
        match &response.id {
            Some(ResponseId::Sequence(id)) => {
                correlation.resolve(&CorrelationKey::Sequence(*id), response);
            }
            Some(ResponseId::Opaque(id)) => {
                correlation.resolve(&CorrelationKey::Request(id.clone()), response);
            }
            None if self.sync.phase().is_handshake() => {
                correlation.resolve_by_type(response);
            }
            None => {}
        }
    }
}
