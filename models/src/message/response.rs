use crate::message::event::HubEvent;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Correlation id echoed back by the hub.
///
/// Normally the numeric sequence id; an opaque string is tolerated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseId {
    Sequence(u64),
    Opaque(String),
}

impl fmt::Display for ResponseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseId::Sequence(id) => write!(f, "{id}"),
            ResponseId::Opaque(id) => write!(f, "{id}"),
        }
    }
}

/// An inbound message. Unknown fields are kept in `extra` and otherwise ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub id: Option<ResponseId>,
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub ha_version: Option<String>,
    #[serde(default)]
    pub event: Option<HubEvent>,
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Response {
    /// A bare response of the given type, mostly useful for synthesized acknowledgements.
    pub fn of_type(message_type: impl Into<String>) -> Self {
        Self {
            id: None,
            message_type: message_type.into(),
            success: None,
            message: None,
            event_type: None,
            result: None,
            ha_version: None,
            event: None,
            error: None,
            extra: Map::new(),
        }
    }

    pub fn sequence_id(&self) -> Option<u64> {
        match self.id {
            Some(ResponseId::Sequence(id)) => Some(id),
            _ => None,
        }
    }

    /// Event type from the nested event, falling back to the top-level field.
    pub fn effective_event_type(&self) -> Option<&str> {
        self.event
            .as_ref()
            .and_then(|event| event.event_type.as_deref())
            .or(self.event_type.as_deref())
    }
}
