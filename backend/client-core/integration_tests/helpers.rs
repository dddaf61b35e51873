//! Test helpers for integration tests.
//!
//! A scripted hub speaking the WebSocket API on an ephemeral localhost port:
//! - sends `auth_required`, checks the token, answers `auth_ok` / `auth_invalid`
//! - answers `get_config`, `get_services`, `get_states` with canned data
//! - acknowledges everything else with a `result`
//! - optionally pushes events after `subscribe_events` and drops the connection
//! - optionally goes silent after `auth_required`, leaving pings unanswered

use client_core::SettingsError;
use client_core::settings::{
    SECRET_HOME_ASSISTANT_TOKEN, SETTING_HOST, SETTING_PORT, SETTING_SECURE, SettingsProvider,
};

use common::{ErrorLocation, RedactedToken};

use std::collections::HashMap;
use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

pub const TEST_TOKEN: &str = "test-token-12345";
pub const HUB_VERSION: &str = "2024.6.1";

#[derive(Clone)]
pub struct HubScript {
    pub token: String,
    /// Pushed after the `subscribe_events` ack, with `id` set to the subscription id.
    pub events: Vec<Value>,
    pub close_after_subscribe: bool,
    /// Stop reading after the greeting. The socket stays open, so no pong is sent.
    pub silent_after_greeting: bool,
}

impl HubScript {
    pub fn accepting(token: &str) -> Self {
        Self {
            token: token.to_string(),
            events: Vec::new(),
            close_after_subscribe: false,
            silent_after_greeting: false,
        }
    }

    pub fn with_events(mut self, events: Vec<Value>) -> Self {
        self.events = events;
        self
    }

    pub fn silent_after_greeting(mut self) -> Self {
        self.silent_after_greeting = true;
        self
    }

    pub fn closing_after_subscribe(mut self) -> Self {
        self.close_after_subscribe = true;
        self
    }
}

pub struct ScriptedHub {
    pub port: u16,
    received: Arc<Mutex<Vec<Value>>>,
    connections: Arc<AtomicUsize>,
}

impl ScriptedHub {
    /// Every message received from clients, in order.
    pub fn received(&self) -> Vec<Value> {
        self.received.lock().clone()
    }

    pub fn received_types(&self) -> Vec<String> {
        self.received()
            .iter()
            .map(|m| m["type"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

pub async fn start_hub(script: HubScript) -> ScriptedHub {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind scripted hub");
    let port = listener.local_addr().expect("local addr").port();
    let received = Arc::new(Mutex::new(Vec::new()));
    let connections = Arc::new(AtomicUsize::new(0));

    let accept_received = Arc::clone(&received);
    let accept_connections = Arc::clone(&connections);
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            accept_connections.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(serve(stream, script.clone(), Arc::clone(&accept_received)));
        }
    });

    ScriptedHub {
        port,
        received,
        connections,
    }
}

/// A port nothing listens on.
pub async fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    listener.local_addr().expect("local addr").port()
}

pub fn sensor(entity_id: &str, state: &str) -> Value {
    json!({
        "entity_id": entity_id,
        "state": state,
        "attributes": {"friendly_name": "Living Room", "unit_of_measurement": "°C"}
    })
}

pub fn state_changed(entity_id: &str, new_state: Value) -> Value {
    json!({
        "type": "event",
        "event": {
            "event_type": "state_changed",
            "data": {"entity_id": entity_id, "old_state": null, "new_state": new_state}
        }
    })
}

async fn serve(stream: TcpStream, script: HubScript, received: Arc<Mutex<Vec<Value>>>) {
    let Ok(ws_stream) = accept_async(stream).await else {
        return;
    };
    let (mut write, mut read) = ws_stream.split();

    let send = |value: Value| Message::Text(value.to_string().into());

    if write
        .send(send(json!({"type": "auth_required", "ha_version": HUB_VERSION})))
        .await
        .is_err()
    {
        return;
    }

    if script.silent_after_greeting {
        tokio::time::sleep(Duration::from_secs(30)).await;
        drop((write, read));
        return;
    }

    while let Some(Ok(frame)) = read.next().await {
        let Message::Text(text) = frame else {
            continue;
        };
        let Ok(message) = serde_json::from_str::<Value>(text.as_str()) else {
            continue;
        };
        received.lock().push(message.clone());

        let id = message.get("id").cloned().unwrap_or(Value::Null);
        let result = |payload: Value| {
            send(json!({"id": id, "type": "result", "success": true, "result": payload}))
        };

        let outcome = match message["type"].as_str() {
            Some("auth") if message["access_token"] == script.token.as_str() => {
                write
                    .send(send(json!({"type": "auth_ok", "ha_version": HUB_VERSION})))
                    .await
            }
            Some("auth") => {
                let _ = write
                    .send(send(json!({"type": "auth_invalid", "message": "Invalid access token or password"})))
                    .await;
                break;
            }
            Some("get_config") => {
                write
                    .send(result(json!({"location_name": "Home", "version": HUB_VERSION})))
                    .await
            }
            Some("get_services") => {
                write
                    .send(result(json!({"light": {"turn_on": {}, "turn_off": {}}})))
                    .await
            }
            Some("get_states") => {
                write
                    .send(result(json!([
                        sensor("sensor.temp", "21"),
                        {"entity_id": "light.kitchen", "state": "off", "attributes": {}}
                    ])))
                    .await
            }
            Some("subscribe_events") => {
                let mut outcome = write.send(result(Value::Null)).await;
                for event in &script.events {
                    let mut event = event.clone();
                    event["id"] = id.clone();
                    if outcome.is_ok() {
                        outcome = write.send(send(event)).await;
                    }
                }
                if script.close_after_subscribe {
                    break;
                }
                outcome
            }
            Some(_) => write.send(result(Value::Null)).await,
            None => Ok(()),
        };

        if outcome.is_err() {
            return;
        }
    }

    let _ = write.close().await;
}

/// Fixed settings pointing at the scripted hub.
pub struct StaticSettings {
    values: HashMap<String, Value>,
    token: Option<String>,
}

impl StaticSettings {
    pub fn new(port: u16, token: Option<&str>) -> Self {
        let mut values = HashMap::new();
        values.insert(SETTING_HOST.to_string(), json!("127.0.0.1"));
        values.insert(SETTING_PORT.to_string(), json!(port));
        values.insert(SETTING_SECURE.to_string(), json!(false));
        Self {
            values,
            token: token.map(str::to_string),
        }
    }
}

impl SettingsProvider for StaticSettings {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn get_secret(&self, key: &str) -> Result<RedactedToken, SettingsError> {
        match (&self.token, key) {
            (Some(token), SECRET_HOME_ASSISTANT_TOKEN) => Ok(RedactedToken::new(token.clone())),
            _ => Err(SettingsError::SecretNotFound {
                location: ErrorLocation::from(Location::caller()),
                key: key.to_string(),
            }),
        }
    }
}
