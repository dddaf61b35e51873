//! Protocol state machine and local mirror.
//!
//! The synchronizer interprets every inbound message, drives the auth handshake,
//! issues the initial fetches and keeps [`Mirror`] current from results and
//! `state_changed` events. Readiness fires once per connection, when config,
//! services and states have all arrived, in whatever order.
//!
//! Locks are `parking_lot` and are never held across an `.await`.

pub mod mirror;
pub mod summary;

pub use mirror::{FetchKind, Mirror, SequenceRegistry};
pub use summary::entity_summary;

use crate::error::HubError;
use crate::session::{HubSession, REQUEST_TIMEOUT};
use crate::settings::{SECRET_HOME_ASSISTANT_TOKEN, SettingsProvider};
use crate::transport::Transport;

use models::message::outbound;
use models::message::types::{
    AUTH_INVALID, AUTH_OK, AUTH_REQUIRED, EVENT, RESULT, STATE_CHANGED, SUCCESS,
};
use models::{Response, StateChangedData, is_valid_entity_id};

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::future::BoxFuture;
use log::{debug, error, info, warn};
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};

/// Invoked once per connection when the mirror is complete.
pub type ReadyCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Invoked after a state change of a subscribed entity.
pub type WatchCallback = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Unauthenticated,
    Authenticating,
    Syncing,
    Ready,
    Closed,
}

impl SessionPhase {
    /// Before `auth_ok`/`auth_invalid`, replies carry no sequence id.
    pub fn is_handshake(&self) -> bool {
        matches!(
            self,
            SessionPhase::Unauthenticated | SessionPhase::Authenticating
        )
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::Unauthenticated => "unauthenticated",
            SessionPhase::Authenticating => "authenticating",
            SessionPhase::Syncing => "syncing",
            SessionPhase::Ready => "ready",
            SessionPhase::Closed => "closed",
        };
        f.write_str(name)
    }
}

pub struct StateSynchronizer<T: Transport> {
    session: Arc<HubSession<T>>,
    settings: Arc<dyn SettingsProvider>,
    phase: RwLock<SessionPhase>,
    mirror: RwLock<Mirror>,
    registry: Mutex<SequenceRegistry>,
    hub_version: RwLock<Option<String>>,
    ready_fired: AtomicBool,
    ready_callback: RwLock<Option<ReadyCallback>>,
    watcher: RwLock<Option<WatchCallback>>,
}

impl<T: Transport> StateSynchronizer<T> {
    pub fn new(session: Arc<HubSession<T>>, settings: Arc<dyn SettingsProvider>) -> Self {
        Self {
            session,
            settings,
            phase: RwLock::new(SessionPhase::Unauthenticated),
            mirror: RwLock::new(Mirror::default()),
            registry: Mutex::new(SequenceRegistry::default()),
            hub_version: RwLock::new(None),
            ready_fired: AtomicBool::new(false),
            ready_callback: RwLock::new(None),
            watcher: RwLock::new(None),
        }
    }

    pub fn session(&self) -> &Arc<HubSession<T>> {
        &self.session
    }

    // ============================================
    // INBOUND
    // ============================================

    /// Interpret one inbound message.
    ///
    /// # Errors
    ///
    /// [`HubError::MissingCredentials`] when the hub asks for a token and none is
    /// configured, [`HubError::Authentication`] when the hub rejects it, and
    /// transport errors from sends triggered by the message.
    pub async fn handle_message(&self, response: &Response) -> Result<(), HubError> {
        if let Some(error) = response.error.as_ref().filter(|e| !e.is_null()) {
            warn!(
                "Hub reported an error for {} (id {:?}): {}",
                response.message_type, response.id, error
            );
            return Ok(());
        }

        match response.message_type.as_str() {
            AUTH_REQUIRED => self.authenticate().await,
            AUTH_OK => self.on_auth_ok(response).await,
            AUTH_INVALID => {
                self.set_phase(SessionPhase::Closed);
                let message = response
                    .message
                    .clone()
                    .unwrap_or_else(|| "Invalid access token".to_string());
                error!("Authentication rejected: {}", message);
                Err(HubError::authentication(message))
            }
            RESULT => {
                self.on_result(response);
                Ok(())
            }
            EVENT => {
                self.on_event(response);
                Ok(())
            }
            SUCCESS => {
                debug!("Acknowledged: {:?}", response.id);
                Ok(())
            }
            other => {
                debug!("Ignoring message of type {}", other);
                Ok(())
            }
        }
    }

    async fn authenticate(&self) -> Result<(), HubError> {
        let token = self
            .settings
            .get_secret(SECRET_HOME_ASSISTANT_TOKEN)
            .map_err(|e| {
                error!("No access token configured: {}", e);
                HubError::missing_credentials(format!(
                    "{} is not configured",
                    SECRET_HOME_ASSISTANT_TOKEN
                ))
            })?;

        info!("Authenticating (token length {})", token.len());
        self.session
            .send(outbound::auth(token.as_str()), false)
            .await?;
        self.set_phase(SessionPhase::Authenticating);
        Ok(())
    }

    async fn on_auth_ok(&self, response: &Response) -> Result<(), HubError> {
        *self.hub_version.write() = response.ha_version.clone();
        info!(
            "Authenticated with hub version {}",
            response.ha_version.as_deref().unwrap_or("unknown")
        );
        self.set_phase(SessionPhase::Syncing);

        let fetches = [
            (FetchKind::Config, outbound::get_config()),
            (FetchKind::Services, outbound::get_services()),
            (FetchKind::States, outbound::get_states()),
        ];
        for (kind, data) in fetches {
            let request = self.session.prepare(data, true);
            if let Some(id) = request.sequence_id() {
                self.registry.lock().record(kind, id);
            }
            self.session.transmit(&request).await?;
        }

        self.session
            .send(outbound::subscribe_events(STATE_CHANGED), true)
            .await?;
        Ok(())
    }

    fn on_result(&self, response: &Response) {
        let Some(id) = response.sequence_id() else {
            debug!("Result without a sequence id");
            return;
        };

        let kind = self.registry.lock().take(id);
        let Some(kind) = kind else {
            debug!("Result for id {} (success {:?})", id, response.success);
            return;
        };

        let result = response.result.clone().unwrap_or(Value::Null);
        {
            let mut mirror = self.mirror.write();
            match kind {
                FetchKind::Config => mirror.set_config(result),
                FetchKind::Services => mirror.set_services(result),
                FetchKind::States => mirror.replace_states(result),
            }
        }
        debug!("Stored {:?} from id {}", kind, id);

        self.check_ready();
    }

    fn on_event(&self, response: &Response) {
        if response.effective_event_type() != Some(STATE_CHANGED) {
            debug!("Ignoring event {:?}", response.effective_event_type());
            return;
        }
        let Some(event) = response.event.as_ref() else {
            return;
        };

        let data: StateChangedData = match serde_json::from_value(event.data.clone()) {
            Ok(data) => data,
            Err(e) => {
                warn!("Malformed state_changed data: {}", e);
                return;
            }
        };

        let Some(new_state) = data.new_state.filter(|state| !state.is_null()) else {
            debug!("{} was removed; keeping its last known state", data.entity_id);
            return;
        };

        let subscribed = {
            let mut mirror = self.mirror.write();
            mirror.upsert_state(&data.entity_id, new_state);
            mirror.is_subscribed(&data.entity_id)
        };

        if subscribed {
            self.notify_watcher();
        }
    }

    fn check_ready(&self) {
        if !self.mirror.read().is_complete() {
            return;
        }
        if self.ready_fired.swap(true, Ordering::SeqCst) {
            return;
        }

        self.set_phase(SessionPhase::Ready);
        info!("Initial sync complete");

        let callback = self.ready_callback.read().clone();
        if let Some(callback) = callback {
            let task = tokio::spawn(callback());
            tokio::spawn(async move {
                if let Err(e) = task.await {
                    error!("Ready callback failed: {}", e);
                }
            });
        }
    }

    fn notify_watcher(&self) {
        let watcher = self.watcher.read().clone();
        let Some(watcher) = watcher else {
            return;
        };
        if std::panic::catch_unwind(AssertUnwindSafe(|| watcher())).is_err() {
            error!("Watcher callback panicked");
        }
    }

    fn set_phase(&self, phase: SessionPhase) {
        let previous = std::mem::replace(&mut *self.phase.write(), phase);
        if previous != phase {
            debug!("Session phase {} -> {}", previous, phase);
        }
    }

    // ============================================
    // OUTBOUND
    // ============================================

    /// Invoke a service. Fire-and-forget: the result is not awaited.
    pub async fn call_service(
        &self,
        domain: &str,
        service: &str,
        service_data: Option<Value>,
    ) -> Result<(), HubError> {
        info!("Calling service {}.{}", domain, service);
        self.session
            .send(outbound::call_service(domain, service, service_data), true)
            .await?;
        Ok(())
    }

    /// Subscribe to a hub event type. Returns the assigned sequence id.
    pub async fn subscribe_events(&self, event_type: &str) -> Result<u64, HubError> {
        let request = self
            .session
            .send(outbound::subscribe_events(event_type), true)
            .await?;
        sequence_of(&request)
    }

    /// Subscribe to entity updates and make `entity_ids` the watched set.
    ///
    /// The watched set only changes once the command has been sent.
    ///
    /// # Errors
    ///
    /// [`HubError::Validation`] if any id is not of the form `domain.object_id`.
    pub async fn subscribe_entities(&self, entity_ids: Vec<String>) -> Result<u64, HubError> {
        if let Some(bad) = entity_ids.iter().find(|id| !is_valid_entity_id(id)) {
            return Err(HubError::validation(format!("Invalid entity id: {}", bad)));
        }

        let data = outbound::subscribe_entities(&entity_ids);
        let request = self.session.send(data, true).await?;

        info!("Subscribed entities: {:?}", entity_ids);
        self.set_subscribed_entities(entity_ids);
        sequence_of(&request)
    }

    /// Replace the watched set without telling the hub.
    pub fn set_subscribed_entities(&self, entity_ids: Vec<String>) {
        self.mirror.write().subscribed_entities = Some(entity_ids);
    }

    /// Register the single watcher. A new registration replaces the previous one.
    pub fn watch_subscribed_entities(&self, watcher: impl Fn() + Send + Sync + 'static) {
        *self.watcher.write() = Some(Arc::new(watcher));
    }

    pub fn set_ready_callback<F>(&self, callback: F)
    where
        F: Fn() -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        *self.ready_callback.write() = Some(Arc::new(callback));
    }

    /// Send `data` with a sequence id and wait for the matching `result`.
    pub async fn request(&self, data: Map<String, Value>) -> Result<Response, HubError> {
        let (_, waiter) = self.session.request(data, Some(&[RESULT])).await?;
        self.session.wait(waiter, REQUEST_TIMEOUT).await
    }

    /// Fetch all states again.
    ///
    /// The mirror is replaced by the dispatch loop when the result arrives; the
    /// returned map is built from the same response.
    pub async fn refresh_states(&self) -> Result<Map<String, Value>, HubError> {
        let request = self.session.prepare(outbound::get_states(), true);
        let waiter = self.session.track(&request, Some(&[RESULT]))?;
        let id = sequence_of(&request)?;
        self.registry.lock().record(FetchKind::States, id);

        if let Err(e) = self.session.transmit(&request).await {
            self.session.correlation().drop_entry(waiter.key());
            return Err(e);
        }

        let response = self.session.wait(waiter, REQUEST_TIMEOUT).await?;
        Ok(mirror::states_by_entity(
            response.result.unwrap_or(Value::Null),
        ))
    }

    // ============================================
    // LIFECYCLE
    // ============================================

    /// Fresh state for a new connection.
    pub fn reset(&self) {
        self.discard(SessionPhase::Unauthenticated);
    }

    /// Discard the mirror after teardown.
    pub fn clear(&self) {
        self.discard(SessionPhase::Closed);
    }

    fn discard(&self, phase: SessionPhase) {
        self.mirror.write().clear();
        self.registry.lock().clear();
        *self.hub_version.write() = None;
        self.ready_fired.store(false, Ordering::SeqCst);
        self.set_phase(phase);
    }

    // ============================================
    // READS (copies, never live references)
    // ============================================

    pub fn phase(&self) -> SessionPhase {
        *self.phase.read()
    }

    pub fn became_ready(&self) -> bool {
        self.ready_fired.load(Ordering::SeqCst)
    }

    pub fn hub_version(&self) -> Option<String> {
        self.hub_version.read().clone()
    }

    pub fn mirror(&self) -> Mirror {
        self.mirror.read().clone()
    }

    pub fn config(&self) -> Option<Map<String, Value>> {
        self.mirror.read().config.clone()
    }

    pub fn services(&self) -> Option<Map<String, Value>> {
        self.mirror.read().services.clone()
    }

    pub fn states(&self) -> Option<Map<String, Value>> {
        self.mirror.read().states.clone()
    }

    pub fn state(&self, entity_id: &str) -> Option<Value> {
        self.mirror
            .read()
            .states
            .as_ref()
            .and_then(|states| states.get(entity_id).cloned())
    }

    pub fn subscribed_entities(&self) -> Option<Vec<String>> {
        self.mirror.read().subscribed_entities.clone()
    }

    pub fn registry(&self) -> SequenceRegistry {
        self.registry.lock().clone()
    }

    /// Tray text for the subscribed entities.
    pub fn entity_summary(&self) -> Option<String> {
        let mirror = self.mirror.read();
        let subscribed = mirror.subscribed_entities.as_deref().unwrap_or_default();
        entity_summary(mirror.states.as_ref(), subscribed)
    }
}

fn sequence_of(request: &models::Request) -> Result<u64, HubError> {
    request
        .sequence_id()
        .ok_or_else(|| HubError::validation("request was sent without a sequence id"))
}
