//! Connect-and-listen under a bounded retry policy.
//!
//! Transport failures are retried after a delay until the attempt cap is hit.
//! Authentication and configuration failures end the run at once. The attempt
//! counter starts over whenever a connection got as far as readiness.

pub mod policy;

pub use policy::RetryPolicy;

use crate::client::HubClient;
use crate::error::HubError;
use crate::transport::Transport;

use std::future::Future;
use std::sync::Arc;

use backoff::backoff::Backoff;
use log::{error, info, warn};
use tokio_util::sync::CancellationToken;

/// What the supervisor drives. Implemented by [`HubClient`].
pub trait Session: Send + Sync + 'static {
    fn connect(&self) -> impl Future<Output = Result<(), HubError>> + Send;

    fn listen(&self, cancel: &CancellationToken) -> impl Future<Output = Result<(), HubError>> + Send;

    /// The most recent connection completed its initial sync.
    fn became_ready(&self) -> bool;

    fn close(&self) -> impl Future<Output = ()> + Send;
}

impl<T: Transport> Session for HubClient<T> {
    async fn connect(&self) -> Result<(), HubError> {
        HubClient::connect(self).await
    }

    async fn listen(&self, cancel: &CancellationToken) -> Result<(), HubError> {
        HubClient::listen(self, cancel).await
    }

    fn became_ready(&self) -> bool {
        self.reached_ready()
    }

    async fn close(&self) {
        HubClient::close(self).await
    }
}

pub struct Supervisor<S: Session> {
    session: Arc<S>,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl<S: Session> Supervisor<S> {
    pub fn new(session: Arc<S>, cancel: CancellationToken) -> Self {
        Self {
            session,
            policy: RetryPolicy::default(),
            cancel,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run until cancelled or out of attempts.
    ///
    /// Returns `Ok(())` when cancelled.
    ///
    /// # Errors
    ///
    /// [`HubError::AttemptsExhausted`] after `max_attempts` consecutive failed
    /// connections, or the first non-retryable error.
    pub async fn run(&self) -> Result<(), HubError> {
        let max_attempts = self.policy.max_attempts;
        let mut backoff = self.policy.backoff();
        let mut attempt: u32 = 1;

        loop {
            if self.cancel.is_cancelled() {
                return self.shutdown().await;
            }

            info!("Connecting to hub (attempt {}/{})", attempt, max_attempts);
            let outcome = tokio::select! {
                _ = self.cancel.cancelled() => {
                    return self.shutdown().await;
                }
                outcome = self.connect_and_listen() => outcome,
            };

            if self.cancel.is_cancelled() {
                return self.shutdown().await;
            }

            match outcome {
                Ok(()) => warn!("Session ended"),
                Err(e) if !e.is_retryable() => {
                    error!("Giving up ({}): {}", e.error_category(), e);
                    self.session.close().await;
                    return Err(e);
                }
                Err(e) => error!("Connection lost ({}): {}", e.error_category(), e),
            }

            if self.session.became_ready() {
                attempt = 1;
                backoff.reset();
            } else {
                attempt += 1;
            }

            if attempt > max_attempts {
                error!(
                    "Failed to connect after {} attempts, giving up",
                    max_attempts
                );
                self.session.close().await;
                return Err(HubError::attempts_exhausted(max_attempts));
            }

            let delay = backoff.next_backoff().unwrap_or(self.policy.max_delay);
            info!("Retrying in {}s..", delay.as_secs());
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    return self.shutdown().await;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn connect_and_listen(&self) -> Result<(), HubError> {
        self.session.connect().await?;
        self.session.listen(&self.cancel).await
    }

    async fn shutdown(&self) -> Result<(), HubError> {
        info!("Supervisor cancelled");
        self.session.close().await;
        Ok(())
    }
}
