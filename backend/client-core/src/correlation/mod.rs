//! Pending-request bookkeeping.
//!
//! Two lookup strategies:
//! - by key: the numeric sequence id the hub echoes back, or the local request id
//! - by type: handshake replies carry no id and are matched on their `type`
//!
//! Each entry is resolved at most once. Resolving removes it.

use crate::error::HubError;

use models::Response;

use std::collections::HashMap;
use std::fmt;

use log::{debug, warn};
use parking_lot::Mutex;
use tokio::sync::oneshot;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CorrelationKey {
    /// Locally generated `Request::id`.
    Request(String),
    /// Numeric `id` carried inside the message.
    Sequence(u64),
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrelationKey::Request(id) => write!(f, "request {id}"),
            CorrelationKey::Sequence(id) => write!(f, "sequence {id}"),
        }
    }
}

struct PendingEntry {
    sender: oneshot::Sender<Result<Response, HubError>>,
    allowed_types: Option<Vec<String>>,
}

impl PendingEntry {
    fn accepts(&self, message_type: &str) -> bool {
        self.allowed_types
            .as_ref()
            .is_none_or(|allowed| allowed.iter().any(|t| t == message_type))
    }
}

#[derive(Default)]
struct Inner {
    pending: HashMap<CorrelationKey, PendingEntry>,
    /// Message type -> keys waiting on it, oldest first.
    by_type: HashMap<String, Vec<CorrelationKey>>,
}

impl Inner {
    fn unindex(&mut self, key: &CorrelationKey) {
        self.by_type.retain(|_, keys| {
            keys.retain(|k| k != key);
            !keys.is_empty()
        });
    }

    fn remove(&mut self, key: &CorrelationKey) -> Option<PendingEntry> {
        let entry = self.pending.remove(key)?;
        if entry.allowed_types.is_some() {
            self.unindex(key);
        }
        Some(entry)
    }
}

/// Receiving side of a registered entry.
#[derive(Debug)]
pub struct Waiter {
    key: CorrelationKey,
    receiver: oneshot::Receiver<Result<Response, HubError>>,
}

impl Waiter {
    pub fn key(&self) -> &CorrelationKey {
        &self.key
    }

    /// Wait for the matching response.
    ///
    /// # Errors
    ///
    /// [`HubError::Closed`] when the entry is dropped or the table is failed.
    pub async fn wait(self) -> Result<Response, HubError> {
        match self.receiver.await {
            Ok(result) => result,
            Err(_) => Err(HubError::closed(format!(
                "waiter for {} dropped without a response",
                self.key
            ))),
        }
    }
}

#[derive(Default)]
pub struct CorrelationTable {
    inner: Mutex<Inner>,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pending entry.
    ///
    /// # Errors
    ///
    /// [`HubError::DuplicateKey`] if `key` is already pending.
    pub fn register(
        &self,
        key: CorrelationKey,
        allowed_types: Option<&[&str]>,
    ) -> Result<Waiter, HubError> {
        self.insert(key, allowed_types, false)
    }

    /// Register an entry that is also reachable through [`resolve_by_type`](Self::resolve_by_type).
    pub fn register_by_type(
        &self,
        key: CorrelationKey,
        message_types: &[&str],
    ) -> Result<Waiter, HubError> {
        self.insert(key, Some(message_types), true)
    }

    fn insert(
        &self,
        key: CorrelationKey,
        allowed_types: Option<&[&str]>,
        index_by_type: bool,
    ) -> Result<Waiter, HubError> {
        let mut inner = self.inner.lock();
        if inner.pending.contains_key(&key) {
            return Err(HubError::duplicate_key(key.to_string()));
        }

        let allowed_types =
            allowed_types.map(|types| types.iter().map(|t| t.to_string()).collect::<Vec<_>>());
        if index_by_type {
            for message_type in allowed_types.iter().flatten() {
                inner
                    .by_type
                    .entry(message_type.clone())
                    .or_default()
                    .push(key.clone());
            }
        }

        let (sender, receiver) = oneshot::channel();
        inner.pending.insert(
            key.clone(),
            PendingEntry {
                sender,
                allowed_types,
            },
        );

        Ok(Waiter { key, receiver })
    }

    /// Complete the entry for `key` with `response`.
    ///
    /// Returns `false` for unknown keys and for responses whose type the entry
    /// does not accept; a rejected entry stays pending.
    pub fn resolve(&self, key: &CorrelationKey, response: &Response) -> bool {
        let mut inner = self.inner.lock();

        match inner.pending.get(key) {
            None => {
                debug!("No pending entry for {}", key);
                return false;
            }
            Some(entry) if !entry.accepts(&response.message_type) => {
                warn!(
                    "Rejected {} response for {}: type not accepted",
                    response.message_type, key
                );
                return false;
            }
            Some(_) => {}
        }

        match inner.remove(key) {
            Some(entry) => {
                if entry.sender.send(Ok(response.clone())).is_err() {
                    debug!("Waiter for {} was gone before resolution", key);
                }
                true
            }
            None => false,
        }
    }

    /// Complete the oldest entry indexed under `response.message_type`.
    pub fn resolve_by_type(&self, response: &Response) -> bool {
        let key = {
            let inner = self.inner.lock();
            inner
                .by_type
                .get(&response.message_type)
                .and_then(|keys| keys.first().cloned())
        };

        match key {
            Some(key) => self.resolve(&key, response),
            None => false,
        }
    }

    /// Remove an entry, waking its waiter with [`HubError::Closed`].
    pub fn drop_entry(&self, key: &CorrelationKey) -> bool {
        let entry = self.inner.lock().remove(key);
        match entry {
            Some(entry) => {
                let _ = entry
                    .sender
                    .send(Err(HubError::closed(format!("{} dropped", key))));
                true
            }
            None => false,
        }
    }

    /// Fail every pending entry. Used on disconnect.
    pub fn fail_all(&self, reason: &str) -> usize {
        let drained: Vec<(CorrelationKey, PendingEntry)> = {
            let mut inner = self.inner.lock();
            inner.by_type.clear();
            inner.pending.drain().collect()
        };

        let count = drained.len();
        for (key, entry) in drained {
            let _ = entry
                .sender
                .send(Err(HubError::closed(format!("{}: {}", reason, key))));
        }
        if count > 0 {
            debug!("Failed {} pending waiters: {}", count, reason);
        }
        count
    }

    pub fn is_pending(&self, key: &CorrelationKey) -> bool {
        self.inner.lock().pending.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
