use crate::error::HubError;
use crate::sync::{SessionPhase, SequenceRegistry};
use crate::transport::Transport;
use crate::tests::fakes::{
    TestSettings, light, ready_signal, response, state_changed, synchronizer,
};

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::mpsc::UnboundedReceiver;

async fn assert_fired_once(rx: &mut UnboundedReceiver<()>) {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("ready callback fired")
        .expect("channel open");
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
    assert!(rx.try_recv().is_err(), "ready callback fired more than once");
}

fn result(id: u64, result: Value) -> Value {
    json!({"id": id, "type": "result", "success": true, "result": result})
}

fn initial_results() -> Vec<Value> {
    vec![
        result(1, json!({"version": "2024.1.0", "location_name": "Home"})),
        result(2, json!({"light": {"turn_on": {}}})),
        result(3, json!([light("light.kitchen", "on")])),
    ]
}

#[tokio::test]
async fn given_auth_required_when_token_configured_then_sends_auth_without_id() {
    // GIVEN
    let (sync, transport) = synchronizer(TestSettings::with_token("T"));

    // WHEN
    sync.handle_message(&response(json!({"type": "auth_required", "ha_version": "2024.1.0"})))
        .await
        .unwrap();

    // THEN
    assert_eq!(transport.sent(), vec![json!({"type": "auth", "access_token": "T"})]);
    assert_eq!(sync.phase(), SessionPhase::Authenticating);
}

/// **VALUE**: Verifies a missing token fails the attempt instead of sending an empty auth.
///
/// **BUG THIS CATCHES**: Would catch a silent fallback that loops on auth_invalid forever.
#[tokio::test]
async fn given_auth_required_when_no_token_then_missing_credentials() {
    // GIVEN
    let (sync, transport) = synchronizer(TestSettings::without_token());

    // WHEN
    let outcome = sync
        .handle_message(&response(json!({"type": "auth_required"})))
        .await;

    // THEN
    assert!(matches!(outcome, Err(HubError::MissingCredentials { .. })));
    assert!(transport.sent().is_empty());
}

/// **VALUE**: Verifies auth_ok triggers the three fetches with ids 1, 2, 3 and the
/// state_changed subscription, and that the registry remembers which id is which.
#[tokio::test]
async fn given_auth_ok_when_handled_then_issues_initial_sync() {
    // GIVEN
    let (sync, transport) = synchronizer(TestSettings::with_token("T"));

    // WHEN
    sync.handle_message(&response(json!({"type": "auth_ok", "ha_version": "2024.1.0"})))
        .await
        .unwrap();

    // THEN
    assert_eq!(
        transport.sent(),
        vec![
            json!({"type": "get_config", "id": 1}),
            json!({"type": "get_services", "id": 2}),
            json!({"type": "get_states", "id": 3}),
            json!({"type": "subscribe_events", "event_type": "state_changed", "id": 4}),
        ]
    );
    assert_eq!(
        sync.registry(),
        SequenceRegistry {
            id_config: Some(1),
            id_services: Some(2),
            id_states: Some(3),
        }
    );
    assert_eq!(sync.phase(), SessionPhase::Syncing);
    assert_eq!(sync.hub_version().as_deref(), Some("2024.1.0"));
}

#[tokio::test]
async fn given_auth_invalid_when_handled_then_authentication_error_with_hub_message() {
    let (sync, _) = synchronizer(TestSettings::with_token("wrong"));

    let outcome = sync
        .handle_message(&response(json!({"type": "auth_invalid", "message": "Invalid password"})))
        .await;

    match outcome {
        Err(HubError::Authentication { message, .. }) => assert_eq!(message, "Invalid password"),
        other => panic!("expected authentication error, got {other:?}"),
    }
    assert_eq!(sync.phase(), SessionPhase::Closed);
}

/// **VALUE**: Verifies readiness fires exactly once for every arrival order of the three results.
///
/// **WHY THIS MATTERS**: The hub answers concurrently; the tray must be built exactly once.
///
/// **BUG THIS CATCHES**: A gate that fires on the states result alone, or fires again on a
/// later result.
#[tokio::test]
async fn given_any_result_order_when_all_arrive_then_ready_fires_once() {
    for order in [[0, 1, 2], [2, 0, 1], [1, 2, 0]] {
        // GIVEN
        let (sync, _) = synchronizer(TestSettings::with_token("T"));
        let mut ready = ready_signal(&sync);
        sync.handle_message(&response(json!({"type": "auth_ok"})))
            .await
            .unwrap();
        let results = initial_results();

        // WHEN
        for (n, index) in order.iter().enumerate() {
            assert!(!sync.became_ready(), "ready before result {n} of {order:?}");
            sync.handle_message(&response(results[*index].clone()))
                .await
                .unwrap();
        }
        // A late duplicate must not re-fire.
        sync.handle_message(&response(results[0].clone()))
            .await
            .unwrap();

        // THEN
        assert_fired_once(&mut ready).await;
        assert!(sync.became_ready());
        assert_eq!(sync.phase(), SessionPhase::Ready);
    }
}

#[tokio::test]
async fn given_states_result_when_stored_then_states_replaced_exactly() {
    // GIVEN
    let (sync, _) = synchronizer(TestSettings::with_token("T"));
    sync.handle_message(&response(json!({"type": "auth_ok"})))
        .await
        .unwrap();
    sync.handle_message(&response(state_changed("sensor.stale", light("sensor.stale", "1"))))
        .await
        .unwrap();

    // WHEN
    let payload = json!([light("light.kitchen", "on"), light("switch.fan", "off")]);
    sync.handle_message(&response(result(3, payload))).await.unwrap();

    // THEN
    let states = sync.states().unwrap();
    assert_eq!(states.len(), 2);
    assert_eq!(states["light.kitchen"], light("light.kitchen", "on"));
    assert_eq!(states["switch.fan"], light("switch.fan", "off"));
    assert!(sync.config().is_none());
}

#[tokio::test]
async fn given_state_changed_events_when_dispatched_then_last_write_wins() {
    // GIVEN
    let (sync, _) = synchronizer(TestSettings::with_token("T"));
    let first = json!({"entity_id": "sensor.temp", "state": "20", "attributes": {"a": 1}});
    let second = json!({"entity_id": "sensor.temp", "state": "21", "attributes": {}});

    // WHEN
    sync.handle_message(&response(state_changed("sensor.temp", first)))
        .await
        .unwrap();
    sync.handle_message(&response(state_changed("sensor.temp", second.clone())))
        .await
        .unwrap();

    // THEN
    assert_eq!(sync.state("sensor.temp"), Some(second));
}

/// **VALUE**: Verifies the watcher fires for subscribed entities only.
///
/// **BUG THIS CATCHES**: Would catch a tray that redraws on every entity in the house.
#[tokio::test]
async fn given_subscribed_entity_when_state_changes_then_watcher_called_once() {
    // GIVEN
    let (sync, _) = synchronizer(TestSettings::with_token("T"));
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    sync.watch_subscribed_entities(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    sync.set_subscribed_entities(vec!["sensor.temp".to_string()]);

    // WHEN
    sync.handle_message(&response(state_changed("sensor.temp", light("sensor.temp", "20"))))
        .await
        .unwrap();
    sync.handle_message(&response(state_changed("sensor.other", light("sensor.other", "5"))))
        .await
        .unwrap();

    // THEN
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(sync.state("sensor.other").is_some());
}

#[tokio::test]
async fn given_second_watcher_when_registered_then_replaces_first() {
    // GIVEN
    let (sync, _) = synchronizer(TestSettings::with_token("T"));
    let old = Arc::new(AtomicUsize::new(0));
    let new = Arc::new(AtomicUsize::new(0));
    let (old_counter, new_counter) = (Arc::clone(&old), Arc::clone(&new));
    sync.watch_subscribed_entities(move || {
        old_counter.fetch_add(1, Ordering::SeqCst);
    });
    sync.watch_subscribed_entities(move || {
        new_counter.fetch_add(1, Ordering::SeqCst);
    });
    sync.set_subscribed_entities(vec!["sensor.temp".to_string()]);

    // WHEN
    sync.handle_message(&response(state_changed("sensor.temp", light("sensor.temp", "20"))))
        .await
        .unwrap();

    // THEN
    assert_eq!(old.load(Ordering::SeqCst), 0);
    assert_eq!(new.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn given_panicking_watcher_when_state_changes_then_mirror_still_updated() {
    let (sync, _) = synchronizer(TestSettings::with_token("T"));
    sync.watch_subscribed_entities(|| panic!("tray exploded"));
    sync.set_subscribed_entities(vec!["sensor.temp".to_string()]);

    let outcome = sync
        .handle_message(&response(state_changed("sensor.temp", light("sensor.temp", "20"))))
        .await;

    assert!(outcome.is_ok());
    assert_eq!(sync.state("sensor.temp"), Some(light("sensor.temp", "20")));
}

#[tokio::test]
async fn given_removed_entity_event_when_handled_then_last_state_is_kept() {
    let (sync, _) = synchronizer(TestSettings::with_token("T"));
    sync.handle_message(&response(state_changed("sensor.temp", light("sensor.temp", "20"))))
        .await
        .unwrap();

    sync.handle_message(&response(state_changed("sensor.temp", Value::Null)))
        .await
        .unwrap();

    assert_eq!(sync.state("sensor.temp"), Some(light("sensor.temp", "20")));
}

/// **VALUE**: Verifies a hub-reported error is logged and skipped, not fatal.
///
/// **BUG THIS CATCHES**: A failed get_config must not populate the mirror with the error body.
#[tokio::test]
async fn given_error_field_when_handled_then_ok_and_mirror_untouched() {
    // GIVEN
    let (sync, _) = synchronizer(TestSettings::with_token("T"));
    sync.handle_message(&response(json!({"type": "auth_ok"})))
        .await
        .unwrap();

    // WHEN
    let outcome = sync
        .handle_message(&response(json!({
            "id": 1,
            "type": "result",
            "success": false,
            "error": {"code": "unknown_error", "message": "boom"}
        })))
        .await;

    // THEN
    assert!(outcome.is_ok());
    assert!(sync.config().is_none());
    assert_eq!(sync.phase(), SessionPhase::Syncing);
}

#[tokio::test]
async fn given_unknown_type_when_handled_then_ignored() {
    let (sync, transport) = synchronizer(TestSettings::with_token("T"));

    let outcome = sync
        .handle_message(&response(json!({"type": "pong", "id": 12})))
        .await;

    assert!(outcome.is_ok());
    assert!(transport.sent().is_empty());
    assert_eq!(sync.phase(), SessionPhase::Unauthenticated);
}

#[tokio::test]
async fn given_invalid_entity_id_when_subscribe_entities_then_validation_error() {
    let (sync, transport) = synchronizer(TestSettings::with_token("T"));

    let outcome = sync
        .subscribe_entities(vec!["sensor.temp".to_string(), "Not An Entity".to_string()])
        .await;

    assert!(matches!(outcome, Err(HubError::Validation { .. })));
    assert!(transport.sent().is_empty());
    assert!(sync.subscribed_entities().is_none());
}

#[tokio::test]
async fn given_valid_ids_when_subscribe_entities_then_sends_and_returns_id() {
    // GIVEN
    let (sync, transport) = synchronizer(TestSettings::with_token("T"));
    let ids = vec!["sensor.temp".to_string(), "light.kitchen".to_string()];

    // WHEN
    let id = sync.subscribe_entities(ids.clone()).await.unwrap();
    let events_id = sync.subscribe_events("call_service").await.unwrap();

    // THEN
    assert_eq!(id, 1);
    assert_eq!(events_id, 2);
    assert_eq!(
        transport.sent()[0],
        json!({"type": "subscribe_entities", "entity_ids": ["sensor.temp", "light.kitchen"], "id": 1})
    );
    assert_eq!(sync.subscribed_entities(), Some(ids));
}

/// **VALUE**: The watched set never claims entities the hub was not told about.
///
/// **BUG THIS CATCHES**: Would catch the local list being replaced before the
/// send, leaving the tray watching entities with no subscription behind them.
#[tokio::test]
async fn given_closed_transport_when_subscribe_entities_then_watched_set_unchanged() {
    // GIVEN
    let (sync, transport) = synchronizer(TestSettings::with_token("T"));
    sync.set_subscribed_entities(vec!["sensor.temp".to_string()]);
    transport.close().await;

    // WHEN
    let outcome = sync.subscribe_entities(vec!["light.kitchen".to_string()]).await;

    // THEN
    assert!(matches!(outcome, Err(HubError::Closed { .. })));
    assert_eq!(sync.subscribed_entities(), Some(vec!["sensor.temp".to_string()]));
}

#[tokio::test]
async fn given_call_service_when_sent_then_carries_domain_service_and_data() {
    let (sync, transport) = synchronizer(TestSettings::with_token("T"));

    sync.call_service("light", "turn_on", Some(json!({"entity_id": "light.kitchen"})))
        .await
        .unwrap();

    assert_eq!(
        transport.sent(),
        vec![json!({
            "type": "call_service",
            "domain": "light",
            "service": "turn_on",
            "service_data": {"entity_id": "light.kitchen"},
            "id": 1
        })]
    );
}

/// **VALUE**: Verifies a reset session gets a fresh mirror and can become ready again.
///
/// **BUG THIS CATCHES**: A readiness flag that survives reconnects would never rebuild the tray.
#[tokio::test]
async fn given_ready_session_when_reset_then_mirror_empty_and_ready_can_fire_again() {
    // GIVEN
    let (sync, _) = synchronizer(TestSettings::with_token("T"));
    let mut ready = ready_signal(&sync);
    sync.handle_message(&response(json!({"type": "auth_ok"})))
        .await
        .unwrap();
    for message in initial_results() {
        sync.handle_message(&response(message)).await.unwrap();
    }
    assert_fired_once(&mut ready).await;

    // WHEN
    sync.reset();
    sync.session().reset();

    // THEN
    assert_eq!(sync.mirror(), Default::default());
    assert!(!sync.became_ready());
    assert_eq!(sync.phase(), SessionPhase::Unauthenticated);

    sync.handle_message(&response(json!({"type": "auth_ok"})))
        .await
        .unwrap();
    for message in initial_results() {
        sync.handle_message(&response(message)).await.unwrap();
    }
    assert_fired_once(&mut ready).await;
}

#[tokio::test]
async fn given_subscribed_states_when_summarized_then_tooltip_text() {
    let (sync, _) = synchronizer(TestSettings::with_token("T"));
    sync.set_subscribed_entities(vec!["sensor.temp".to_string()]);
    sync.handle_message(&response(state_changed(
        "sensor.temp",
        json!({
            "entity_id": "sensor.temp",
            "state": "21.5",
            "attributes": {"friendly_name": "Living Room", "unit_of_measurement": "°C"}
        }),
    )))
    .await
    .unwrap();

    assert_eq!(sync.entity_summary().as_deref(), Some("Living Room: 21.5°C"));
}
