use crate::Request;
use crate::message::outbound;

use serde_json::{Value, json};

/// **VALUE**: Verifies the auth message has exactly the shape the hub expects.
///
/// **BUG THIS CATCHES**: Would catch a renamed `access_token` field, which the hub
/// answers with `auth_invalid` and which looks like a bad token to the user.
#[test]
fn given_token_when_building_auth_then_message_carries_type_and_token() {
    // GIVEN / WHEN: Building the auth body
    let data = outbound::auth("T");

    // THEN: Only type and access_token, no id
    assert_eq!(Value::Object(data), json!({"type": "auth", "access_token": "T"}));
}

#[test]
fn given_service_call_without_data_when_built_then_service_data_is_omitted() {
    let data = outbound::call_service("light", "toggle", None);

    assert_eq!(
        Value::Object(data),
        json!({"type": "call_service", "domain": "light", "service": "toggle"})
    );
}

#[test]
fn given_two_requests_when_created_then_ids_differ() {
    // GIVEN / WHEN: Two requests with identical bodies
    let first = Request::new(outbound::get_states());
    let second = Request::new(outbound::get_states());

    // THEN: Local ids are fresh per request, no sequence id yet
    assert_ne!(first.id, second.id);
    assert_eq!(first.sequence_id(), None);
    assert_eq!(first.message_type(), Some("get_states"));
}
