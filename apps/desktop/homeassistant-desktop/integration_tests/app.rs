use homeassistant_desktop::app::{App, ConfigureArgs, configure};

use client_core::settings::{AppSettings, EnvSecrets};
use client_core::{RetryPolicy, SettingsStore};
use models::Response;

use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;

fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn store_for(dir: &TempDir, port: u16) -> SettingsStore {
    let settings = AppSettings {
        home_assistant_host: String::from("127.0.0.1"),
        home_assistant_port: port,
        home_assistant_subscribed_entities: vec![String::from("sensor.temp")],
        ..AppSettings::default()
    };
    SettingsStore::new(dir.path(), settings, EnvSecrets::environment_only())
}

/// **VALUE**: With nothing listening, the runner gives up and reports why.
///
/// **BUG THIS CATCHES**: Would catch the exhausted error being swallowed, which
/// would make the binary exit 0 when the hub is unreachable.
#[tokio::test]
async fn given_unreachable_hub_when_running_then_attempts_exhausted() {
    // GIVEN
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(store_for(&dir, unused_port()));
    let policy = RetryPolicy::default()
        .with_max_attempts(2)
        .with_delay(Duration::from_millis(10));
    let app = App::new(store).with_policy(policy);

    // WHEN
    let result = tokio::time::timeout(Duration::from_secs(10), app.run()).await.unwrap();

    // THEN
    let err = result.unwrap_err();
    assert!(err.is_attempts_exhausted(), "unexpected error: {err}");
    assert!(app.tray().tooltip().await.is_none());
    assert!(app.cancel_token().is_cancelled());
}

#[tokio::test]
async fn given_cancelled_token_when_running_then_returns_ok() {
    // GIVEN
    let dir = tempfile::tempdir().unwrap();
    let app = App::new(Arc::new(store_for(&dir, unused_port())));
    app.cancel_token().cancel();

    // WHEN
    let result = tokio::time::timeout(Duration::from_secs(5), app.run()).await.unwrap();

    // THEN
    assert!(result.is_ok());
    assert!(!app.client().connected());
}

fn temperature_changed(value: usize) -> Response {
    serde_json::from_value(json!({
        "id": 4,
        "type": "event",
        "event": {
            "event_type": "state_changed",
            "data": {
                "entity_id": "sensor.temp",
                "old_state": null,
                "new_state": {
                    "entity_id": "sensor.temp",
                    "state": value.to_string(),
                    "attributes": {}
                }
            }
        }
    }))
    .unwrap()
}

/// **VALUE**: After a burst of state changes the tray shows the mirror's final summary.
///
/// **BUG THIS CATCHES**: Would catch tray updates issued from independently
/// scheduled tasks, where an older summary can land after a newer one and stay
/// on screen until the next event.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn given_burst_of_state_changes_when_settled_then_tooltip_matches_mirror() {
    // GIVEN
    let dir = tempfile::tempdir().unwrap();
    let app = App::new(Arc::new(store_for(&dir, unused_port())));
    let sync = app.client().sync();
    sync.set_subscribed_entities(vec![String::from("sensor.temp")]);

    for round in 0..20 {
        // WHEN
        for value in 0..200 {
            sync.handle_message(&temperature_changed(round * 1000 + value))
                .await
                .unwrap();
        }

        // THEN
        let expected = sync.entity_summary();
        assert_eq!(expected.as_deref(), Some(format!("sensor.temp: {}", round * 1000 + 199).as_str()));
        let mut tooltip = app.tray().tooltip().await;
        for _ in 0..100 {
            if tooltip == expected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            tooltip = app.tray().tooltip().await;
        }
        assert_eq!(tooltip, expected, "round {round}");
    }
}

#[test]
fn given_configure_args_when_applied_then_persisted_and_reloaded() {
    // GIVEN
    let dir = tempfile::tempdir().unwrap();
    let store = SettingsStore::open(dir.path()).unwrap();
    let args = ConfigureArgs {
        host: Some(String::from("hub.lan")),
        port: Some(8443),
        secure: Some(true),
        entities: vec![String::from("light.kitchen")],
    };

    // WHEN
    let saved = configure(&store, args).unwrap();

    // THEN
    let reloaded = SettingsStore::open(dir.path()).unwrap().snapshot();
    assert_eq!(saved, reloaded);
    assert_eq!(reloaded.home_assistant_host, "hub.lan");
    assert_eq!(reloaded.home_assistant_port, 8443);
    assert!(reloaded.home_assistant_secure);
    assert_eq!(reloaded.home_assistant_subscribed_entities, vec!["light.kitchen"]);
}

/// **VALUE**: A bad value is rejected before anything is written.
#[test]
fn given_host_with_scheme_when_configuring_then_rejected_and_settings_unchanged() {
    // GIVEN
    let dir = tempfile::tempdir().unwrap();
    let store = SettingsStore::open(dir.path()).unwrap();
    let before = store.snapshot();

    // WHEN
    let result = configure(
        &store,
        ConfigureArgs {
            host: Some(String::from("http://hub.lan")),
            ..ConfigureArgs::default()
        },
    );

    // THEN
    assert!(result.unwrap_err().to_string().starts_with("Settings Error:"));
    assert_eq!(store.snapshot(), before);
    assert!(!dir.path().join(client_core::SETTINGS_FILE_NAME).exists());
}

#[test]
fn given_no_entities_when_configuring_then_saved_list_kept() {
    // GIVEN
    let dir = tempfile::tempdir().unwrap();
    let store = store_for(&dir, 8123);

    // WHEN
    let saved = configure(
        &store,
        ConfigureArgs {
            port: Some(8124),
            ..ConfigureArgs::default()
        },
    )
    .unwrap();

    // THEN
    assert_eq!(saved.home_assistant_port, 8124);
    assert_eq!(saved.home_assistant_subscribed_entities, vec!["sensor.temp"]);
}
