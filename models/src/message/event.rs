use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payload of an `event` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubEvent {
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub data: Value,
}

/// Data of a `state_changed` event.
///
/// `new_state` is null when the entity was removed from the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChangedData {
    pub entity_id: String,
    #[serde(default)]
    pub old_state: Option<Value>,
    #[serde(default)]
    pub new_state: Option<Value>,
}
