use crate::message::types::{AUTH_OK, EVENT, RESULT, STATE_CHANGED};
use crate::{Response, ResponseId, StateChangedData};

use serde_json::json;

/// **VALUE**: Verifies the handshake reply parses without an id and keeps the version.
///
/// **WHY THIS MATTERS**: `auth_ok` carries no numeric id, so it must be matched by type.
/// If parsing required an id, the handshake would never complete.
#[test]
fn given_auth_ok_when_parsed_then_has_no_id_and_keeps_version() {
    // GIVEN: A raw auth_ok message
    let raw = json!({"type": "auth_ok", "ha_version": "2024.1.0"});

    // WHEN: Parsing
    let response: Response = serde_json::from_value(raw).unwrap();

    // THEN: Type and version are kept, id is absent
    assert_eq!(response.message_type, AUTH_OK);
    assert_eq!(response.ha_version.as_deref(), Some("2024.1.0"));
    assert!(response.id.is_none());
}

/// **VALUE**: Verifies that unknown fields are tolerated.
///
/// **WHY THIS MATTERS**: The hub adds fields over time. A strict parser would make the
/// client drop every message after a hub upgrade.
///
/// **BUG THIS CATCHES**: Would catch `deny_unknown_fields` sneaking onto the struct.
#[test]
fn given_result_with_unknown_fields_when_parsed_then_fields_land_in_extra() {
    // GIVEN: A result message with an extra field
    let raw = json!({
        "id": 3,
        "type": "result",
        "success": true,
        "result": [],
        "brand_new_field": {"nested": true}
    });

    // WHEN: Parsing
    let response: Response = serde_json::from_value(raw).unwrap();

    // THEN: Known fields parse, unknown ones are kept aside
    assert_eq!(response.message_type, RESULT);
    assert_eq!(response.id, Some(ResponseId::Sequence(3)));
    assert_eq!(response.sequence_id(), Some(3));
    assert_eq!(response.success, Some(true));
    assert!(response.extra.contains_key("brand_new_field"));
}

#[test]
fn given_string_id_when_parsed_then_id_is_opaque() {
    // GIVEN: A message whose id is a string
    let raw = json!({"id": "abc123", "type": "success"});

    // WHEN: Parsing
    let response: Response = serde_json::from_value(raw).unwrap();

    // THEN: Opaque id, no sequence id
    assert_eq!(response.id, Some(ResponseId::Opaque(String::from("abc123"))));
    assert_eq!(response.sequence_id(), None);
}

/// **VALUE**: Verifies the nested state_changed event parses into typed data.
///
/// **BUG THIS CATCHES**: Would catch the event type being read only from the
/// top-level field, which the hub leaves unset for subscriptions.
#[test]
fn given_state_changed_event_when_parsed_then_event_type_and_data_are_available() {
    // GIVEN: A state_changed push event
    let raw = json!({
        "id": 4,
        "type": "event",
        "event": {
            "event_type": "state_changed",
            "data": {
                "entity_id": "sensor.temp",
                "old_state": {"state": "20"},
                "new_state": {"state": "21"}
            }
        }
    });

    // WHEN: Parsing the response and its event data
    let response: Response = serde_json::from_value(raw).unwrap();
    let data: StateChangedData =
        serde_json::from_value(response.event.clone().unwrap().data).unwrap();

    // THEN: Event type and entity data are available
    assert_eq!(response.message_type, EVENT);
    assert_eq!(response.effective_event_type(), Some(STATE_CHANGED));
    assert_eq!(data.entity_id, "sensor.temp");
    assert_eq!(data.new_state, Some(json!({"state": "21"})));
}

#[test]
fn given_null_error_when_parsed_then_error_is_none() {
    let raw = json!({"id": 1, "type": "result", "error": null});

    let response: Response = serde_json::from_value(raw).unwrap();

    assert!(response.error.is_none());
}
