use crate::{HubEndpointBuilder, ModelError};

/// **VALUE**: Verifies the connection URL is composed from host, port and TLS flag.
///
/// **WHY THIS MATTERS**: This URL is the only thing the transport is given. A wrong
/// scheme or a missing path means every connect attempt fails and the supervisor
/// burns its retry budget on a configuration bug.
///
/// **BUG THIS CATCHES**: Would catch a swapped `ws`/`wss` choice or a dropped
/// `/api/websocket` suffix.
#[test]
fn given_plain_and_secure_settings_when_building_then_urls_use_matching_scheme() {
    // GIVEN: The same host with and without TLS
    let plain = HubEndpointBuilder::default()
        .with_host("homeassistant.local")
        .with_port(8123)
        .build()
        .unwrap();
    let secure = HubEndpointBuilder::default()
        .with_host("hub.example.org")
        .with_port(443)
        .with_secure(true)
        .build()
        .unwrap();

    // WHEN: Composing URLs
    // THEN: Scheme follows the TLS flag
    assert_eq!(
        plain.websocket_url(),
        "ws://homeassistant.local:8123/api/websocket"
    );
    assert_eq!(
        secure.websocket_url(),
        "wss://hub.example.org:443/api/websocket"
    );
}

#[test]
fn given_missing_host_when_building_then_returns_validation_error() {
    // GIVEN: Builder without host
    let builder = HubEndpointBuilder::default().with_port(8123);

    // WHEN: Attempting to build
    let result = builder.build();

    // THEN: Should return validation error
    match result.unwrap_err() {
        ModelError::InvalidEndpoint { field, message, .. } => {
            assert_eq!(field, "host");
            assert_eq!(message, "Host is required");
        }
    }
}

/// **VALUE**: Verifies that a host pasted with its scheme is rejected.
///
/// **BUG THIS CATCHES**: Would catch `http://homeassistant.local` turning into
/// `ws://http://homeassistant.local:8123/...`, which fails with an opaque DNS error.
#[test]
fn given_host_with_scheme_when_building_then_returns_validation_error() {
    // GIVEN: Host including a scheme
    let builder = HubEndpointBuilder::default()
        .with_host("http://homeassistant.local")
        .with_port(8123);

    // WHEN: Attempting to build
    let result = builder.build();

    // THEN: Rejected
    assert!(result.is_err());
}

#[test]
fn given_zero_port_when_building_then_returns_validation_error() {
    // GIVEN: Port zero
    let builder = HubEndpointBuilder::default()
        .with_host("homeassistant.local")
        .with_port(0);

    // WHEN: Attempting to build
    let result = builder.build();

    // THEN: Should return validation error
    match result.unwrap_err() {
        ModelError::InvalidEndpoint { field, message, .. } => {
            assert_eq!(field, "port");
            assert_eq!(message, "Port must be non-zero");
        }
    }
}
