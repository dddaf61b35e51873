//! Local copy of hub-side config, services and entity states.

use log::warn;
use serde_json::{Map, Value};

const FIELD_ENTITY_ID: &str = "entity_id";

/// Which initial fetch a sequence id belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    Config,
    Services,
    States,
}

/// Outstanding sequence ids of the initial fetches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceRegistry {
    pub id_config: Option<u64>,
    pub id_services: Option<u64>,
    pub id_states: Option<u64>,
}

impl SequenceRegistry {
    pub fn record(&mut self, kind: FetchKind, id: u64) {
        match kind {
            FetchKind::Config => self.id_config = Some(id),
            FetchKind::Services => self.id_services = Some(id),
            FetchKind::States => self.id_states = Some(id),
        }
    }

    /// Claim `id`, returning the fetch it answers. Each id is claimed once.
    pub fn take(&mut self, id: u64) -> Option<FetchKind> {
        if self.id_config == Some(id) {
            self.id_config = None;
            Some(FetchKind::Config)
        } else if self.id_services == Some(id) {
            self.id_services = None;
            Some(FetchKind::Services)
        } else if self.id_states == Some(id) {
            self.id_states = None;
            Some(FetchKind::States)
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mirror {
    pub config: Option<Map<String, Value>>,
    /// domain -> service -> schema
    pub services: Option<Map<String, Value>>,
    /// entity_id -> state object
    pub states: Option<Map<String, Value>>,
    pub subscribed_entities: Option<Vec<String>>,
}

impl Mirror {
    /// All three initial datasets are present.
    pub fn is_complete(&self) -> bool {
        self.config.is_some() && self.services.is_some() && self.states.is_some()
    }

    pub fn set_config(&mut self, result: Value) {
        self.config = Some(into_object("config", result));
    }

    pub fn set_services(&mut self, result: Value) {
        self.services = Some(into_object("services", result));
    }

    /// Replace all states with the `get_states` result, a list of state objects.
    pub fn replace_states(&mut self, result: Value) {
        self.states = Some(states_by_entity(result));
    }

    /// Last write wins; no merging with the previous state.
    pub fn upsert_state(&mut self, entity_id: &str, state: Value) {
        self.states
            .get_or_insert_with(Map::new)
            .insert(entity_id.to_string(), state);
    }

    pub fn is_subscribed(&self, entity_id: &str) -> bool {
        self.subscribed_entities
            .as_ref()
            .is_some_and(|ids| ids.iter().any(|id| id == entity_id))
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Index a `get_states` result by entity id. Items without an id are skipped.
pub fn states_by_entity(result: Value) -> Map<String, Value> {
    let items = match result {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => {
            warn!("Expected a list of states, got {}", type_name(&other));
            Vec::new()
        }
    };

    let mut states = Map::new();
    for item in items {
        match item.get(FIELD_ENTITY_ID).and_then(Value::as_str) {
            Some(entity_id) => {
                states.insert(entity_id.to_string(), item);
            }
            None => warn!("Skipping state without entity_id"),
        }
    }
    states
}

fn into_object(what: &str, result: Value) -> Map<String, Value> {
    match result {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            warn!("Expected {} to be an object, got {}", what, type_name(&other));
            Map::new()
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
