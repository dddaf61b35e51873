//! Builders for the message bodies the client sends.
//!
//! The numeric `id` is not set here; the session assigns it at send time.

use crate::message::types::{
    AUTH, CALL_SERVICE, FIELD_ACCESS_TOKEN, FIELD_DOMAIN, FIELD_ENTITY_IDS, FIELD_EVENT_TYPE,
    FIELD_SERVICE, FIELD_SERVICE_DATA, FIELD_TYPE, GET_CONFIG, GET_SERVICES, GET_STATES,
    SUBSCRIBE_ENTITIES, SUBSCRIBE_EVENTS,
};

use serde_json::{Map, Value};

fn message(message_type: &str) -> Map<String, Value> {
    let mut data = Map::new();
    data.insert(FIELD_TYPE.to_string(), Value::from(message_type));
    data
}

pub fn auth(access_token: &str) -> Map<String, Value> {
    let mut data = message(AUTH);
    data.insert(FIELD_ACCESS_TOKEN.to_string(), Value::from(access_token));
    data
}

pub fn get_config() -> Map<String, Value> {
    message(GET_CONFIG)
}

pub fn get_services() -> Map<String, Value> {
    message(GET_SERVICES)
}

pub fn get_states() -> Map<String, Value> {
    message(GET_STATES)
}

pub fn subscribe_events(event_type: &str) -> Map<String, Value> {
    let mut data = message(SUBSCRIBE_EVENTS);
    data.insert(FIELD_EVENT_TYPE.to_string(), Value::from(event_type));
    data
}

pub fn subscribe_entities(entity_ids: &[String]) -> Map<String, Value> {
    let mut data = message(SUBSCRIBE_ENTITIES);
    data.insert(FIELD_ENTITY_IDS.to_string(), Value::from(entity_ids.to_vec()));
    data
}

pub fn call_service(domain: &str, service: &str, service_data: Option<Value>) -> Map<String, Value> {
    let mut data = message(CALL_SERVICE);
    data.insert(FIELD_DOMAIN.to_string(), Value::from(domain));
    data.insert(FIELD_SERVICE.to_string(), Value::from(service));
    if let Some(service_data) = service_data {
        data.insert(FIELD_SERVICE_DATA.to_string(), service_data);
    }
    data
}
