//! Message type tags and field names of the hub WebSocket API.

// Message types consumed
pub const AUTH_REQUIRED: &str = "auth_required";
pub const AUTH_OK: &str = "auth_ok";
pub const AUTH_INVALID: &str = "auth_invalid";
pub const RESULT: &str = "result";
pub const EVENT: &str = "event";
pub const SUCCESS: &str = "success";

// Message types produced
pub const AUTH: &str = "auth";
pub const GET_CONFIG: &str = "get_config";
pub const GET_SERVICES: &str = "get_services";
pub const GET_STATES: &str = "get_states";
pub const CALL_SERVICE: &str = "call_service";
pub const SUBSCRIBE_EVENTS: &str = "subscribe_events";
pub const SUBSCRIBE_ENTITIES: &str = "subscribe_entities";

// Event types
pub const STATE_CHANGED: &str = "state_changed";

// Field names
pub const FIELD_ID: &str = "id";
pub const FIELD_TYPE: &str = "type";
pub const FIELD_ACCESS_TOKEN: &str = "access_token";
pub const FIELD_DOMAIN: &str = "domain";
pub const FIELD_SERVICE: &str = "service";
pub const FIELD_SERVICE_DATA: &str = "service_data";
pub const FIELD_EVENT_TYPE: &str = "event_type";
pub const FIELD_ENTITY_IDS: &str = "entity_ids";
