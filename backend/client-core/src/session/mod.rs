//! Outbound side of a hub session: id assignment, correlation and transmission.

use crate::correlation::{CorrelationKey, CorrelationTable, Waiter};
use crate::error::HubError;
use crate::transport::Transport;

use models::message::types::{AUTH_INVALID, AUTH_OK, FIELD_ID};
use models::{Request, Response};

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use log::debug;
use serde_json::{Map, Value};
use uuid::Uuid;

/// How long a correlated request waits for its response.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HubSession<T: Transport> {
    transport: Arc<T>,
    correlation: CorrelationTable,
    current_id: AtomicU64,
}

impl<T: Transport> HubSession<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            transport,
            correlation: CorrelationTable::new(),
            current_id: AtomicU64::new(0),
        }
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    pub fn correlation(&self) -> &CorrelationTable {
        &self.correlation
    }

    /// Last sequence id handed out.
    pub fn current_id(&self) -> u64 {
        self.current_id.load(Ordering::SeqCst)
    }

    /// Wrap `data` in a [`Request`], assigning the next sequence id when `include_id` is set.
    pub fn prepare(&self, mut data: Map<String, Value>, include_id: bool) -> Request {
        if include_id {
            let id = self.current_id.fetch_add(1, Ordering::SeqCst) + 1;
            data.insert(FIELD_ID.to_string(), Value::from(id));
        }
        Request::new(data)
    }

    /// Register a waiter for `request`, keyed by its sequence id when it has one.
    pub fn track(&self, request: &Request, allowed_types: Option<&[&str]>) -> Result<Waiter, HubError> {
        let key = match request.sequence_id() {
            Some(id) => CorrelationKey::Sequence(id),
            None => CorrelationKey::Request(request.id.clone()),
        };
        self.correlation.register(key, allowed_types)
    }

    pub async fn transmit(&self, request: &Request) -> Result<(), HubError> {
        debug!(
            "Sending {} (id {:?}, request {})",
            request.message_type().unwrap_or("<untyped>"),
            request.sequence_id(),
            request.id
        );
        self.transport
            .send(&Value::Object(request.data.clone()))
            .await
    }

    /// Fire-and-forget send.
    pub async fn send(&self, data: Map<String, Value>, include_id: bool) -> Result<Request, HubError> {
        let request = self.prepare(data, include_id);
        self.transmit(&request).await?;
        Ok(request)
    }

    /// Send with a sequence id and return a waiter for the response.
    ///
    /// The waiter is registered before the write so a fast reply cannot be missed.
    pub async fn request(
        &self,
        data: Map<String, Value>,
        allowed_types: Option<&[&str]>,
    ) -> Result<(Request, Waiter), HubError> {
        let request = self.prepare(data, true);
        let waiter = self.track(&request, allowed_types)?;

        if let Err(e) = self.transmit(&request).await {
            self.correlation.drop_entry(waiter.key());
            return Err(e);
        }
        Ok((request, waiter))
    }

    /// Await `waiter`, giving up after `timeout`.
    pub async fn wait(&self, waiter: Waiter, timeout: Duration) -> Result<Response, HubError> {
        let key = waiter.key().clone();
        match tokio::time::timeout(timeout, waiter.wait()).await {
            Ok(result) => result,
            Err(_) => {
                self.correlation.drop_entry(&key);
                Err(HubError::timeout(timeout.as_secs()))
            }
        }
    }

    /// Register the waiter for the handshake outcome, matched by type.
    pub fn expect_handshake(&self) -> Result<Waiter, HubError> {
        let key = CorrelationKey::Request(Uuid::new_v4().simple().to_string());
        self.correlation.register_by_type(key, &[AUTH_OK, AUTH_INVALID])
    }

    /// Start numbering from 1 again. Called for every new connection.
    pub fn reset(&self) {
        self.current_id.store(0, Ordering::SeqCst);
    }
}
