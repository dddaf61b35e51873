use crate::message::types::{FIELD_ID, FIELD_TYPE};

use serde_json::{Map, Value};
use uuid::Uuid;

/// An outbound message.
///
/// `id` is a fresh random token per send and is unrelated to the numeric `id`
/// field inside `data` that the hub echoes back for correlation.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub id: String,
    pub data: Map<String, Value>,
}

impl Request {
    pub fn new(data: Map<String, Value>) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            data,
        }
    }

    /// Numeric correlation id, if one was assigned.
    pub fn sequence_id(&self) -> Option<u64> {
        self.data.get(FIELD_ID).and_then(Value::as_u64)
    }

    pub fn message_type(&self) -> Option<&str> {
        self.data.get(FIELD_TYPE).and_then(Value::as_str)
    }
}
