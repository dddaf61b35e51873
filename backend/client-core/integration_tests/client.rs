use crate::helpers::{
    HUB_VERSION, HubScript, StaticSettings, TEST_TOKEN, sensor, start_hub, state_changed,
    unused_port,
};

use client_core::{HubClient, HubError, WebSocketTransport};

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(5);

type Client = HubClient<WebSocketTransport>;

fn client(port: u16, token: Option<&str>) -> Arc<Client> {
    Arc::new(HubClient::new(
        WebSocketTransport::new(),
        Arc::new(StaticSettings::new(port, token)),
    ))
}

fn ready_channel(client: &Client) -> mpsc::UnboundedReceiver<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    client.sync().set_ready_callback(move || {
        let tx = tx.clone();
        Box::pin(async move {
            let _ = tx.send(());
        })
    });
    rx
}

fn spawn_listen(client: &Arc<Client>, cancel: &CancellationToken) -> JoinHandle<Result<(), HubError>> {
    let client = Arc::clone(client);
    let cancel = cancel.clone();
    tokio::spawn(async move { client.listen(&cancel).await })
}

/// **VALUE**: Full handshake and initial sync over a real WebSocket.
///
/// **WHY THIS MATTERS**: Exercises the tungstenite transport, type-based handshake
/// correlation, id-based result routing and the readiness gate together.
#[tokio::test]
async fn given_running_hub_when_client_connects_then_authenticates_and_syncs() {
    // GIVEN
    let hub = start_hub(HubScript::accepting(TEST_TOKEN)).await;
    let client = client(hub.port, Some(TEST_TOKEN));
    let mut ready = ready_channel(&client);
    let cancel = CancellationToken::new();

    // WHEN
    client.connect().await.unwrap();
    let listening = spawn_listen(&client, &cancel);
    let version = timeout(WAIT, client.authenticated()).await.unwrap().unwrap();
    timeout(WAIT, ready.recv()).await.unwrap();

    // THEN
    assert_eq!(version.as_deref(), Some(HUB_VERSION));
    assert!(client.sync().became_ready());
    assert_eq!(client.sync().state("sensor.temp"), Some(sensor("sensor.temp", "21")));
    assert!(client.sync().services().unwrap().contains_key("light"));
    assert_eq!(client.sync().config().unwrap()["location_name"], "Home");
    assert_eq!(hub.received()[0], json!({"type": "auth", "access_token": TEST_TOKEN}));
    assert_eq!(
        hub.received_types()[1..4],
        ["get_config", "get_services", "get_states"]
    );

    cancel.cancel();
    assert!(timeout(WAIT, listening).await.unwrap().unwrap().is_ok());
    client.close().await;
    assert!(client.sync().states().is_none());
}

#[tokio::test]
async fn given_wrong_token_when_client_connects_then_authentication_error() {
    // GIVEN
    let hub = start_hub(HubScript::accepting(TEST_TOKEN)).await;
    let client = client(hub.port, Some("not-the-token"));
    let cancel = CancellationToken::new();

    // WHEN
    client.connect().await.unwrap();
    let listening = spawn_listen(&client, &cancel);
    let handshake = timeout(WAIT, client.authenticated()).await.unwrap();
    let listen_outcome = timeout(WAIT, listening).await.unwrap().unwrap();

    // THEN
    assert!(matches!(handshake, Err(HubError::Authentication { .. })));
    assert!(matches!(listen_outcome, Err(HubError::Authentication { .. })));
    assert!(!client.sync().became_ready());
}

#[tokio::test]
async fn given_no_token_when_hub_asks_then_missing_credentials() {
    let hub = start_hub(HubScript::accepting(TEST_TOKEN)).await;
    let client = client(hub.port, None);

    client.connect().await.unwrap();
    let outcome = timeout(WAIT, client.listen(&CancellationToken::new()))
        .await
        .unwrap();

    assert!(matches!(outcome, Err(HubError::MissingCredentials { .. })));
    assert!(hub.received().is_empty());
    client.close().await;
}

#[tokio::test]
async fn given_nothing_listening_when_connect_then_connect_error() {
    let client = client(unused_port().await, Some(TEST_TOKEN));

    let outcome = client.connect().await;

    assert!(matches!(outcome, Err(HubError::Connect { .. })));
    assert!(!client.connected());
}

/// **VALUE**: Verifies pushed state_changed events reach the mirror and the watcher.
#[tokio::test]
async fn given_subscribed_entity_when_hub_pushes_change_then_watcher_fires() {
    // GIVEN
    let new_state = sensor("sensor.temp", "23");
    let hub = start_hub(
        HubScript::accepting(TEST_TOKEN)
            .with_events(vec![state_changed("sensor.temp", new_state.clone())]),
    )
    .await;
    let client = client(hub.port, Some(TEST_TOKEN));
    let calls = Arc::new(AtomicUsize::new(0));
    let (changed_tx, mut changed) = mpsc::unbounded_channel();
    let counter = Arc::clone(&calls);
    client.sync().watch_subscribed_entities(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        let _ = changed_tx.send(());
    });
    let cancel = CancellationToken::new();

    // WHEN
    client.connect().await.unwrap();
    // connect() starts from an empty mirror, so the watched set is applied after it.
    client
        .sync()
        .set_subscribed_entities(vec!["sensor.temp".to_string()]);
    let listening = spawn_listen(&client, &cancel);
    timeout(WAIT, changed.recv()).await.unwrap();

    // THEN
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(client.sync().state("sensor.temp"), Some(new_state));
    assert_eq!(
        client.sync().entity_summary().as_deref(),
        Some("Living Room: 23°C")
    );

    cancel.cancel();
    timeout(WAIT, listening).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn given_ready_session_when_calling_service_then_hub_receives_it() {
    // GIVEN
    let hub = start_hub(HubScript::accepting(TEST_TOKEN)).await;
    let client = client(hub.port, Some(TEST_TOKEN));
    let mut ready = ready_channel(&client);
    let cancel = CancellationToken::new();
    client.connect().await.unwrap();
    let listening = spawn_listen(&client, &cancel);
    timeout(WAIT, ready.recv()).await.unwrap();

    // WHEN
    client
        .sync()
        .call_service("light", "turn_on", Some(json!({"entity_id": "light.kitchen"})))
        .await
        .unwrap();
    let refreshed = timeout(WAIT, client.sync().refresh_states())
        .await
        .unwrap()
        .unwrap();

    // THEN
    let call = hub
        .received()
        .into_iter()
        .find(|m| m["type"] == "call_service")
        .unwrap();
    assert_eq!(call["domain"], "light");
    assert_eq!(call["service_data"]["entity_id"], "light.kitchen");
    assert_eq!(refreshed.len(), 2);

    cancel.cancel();
    timeout(WAIT, listening).await.unwrap().unwrap().unwrap();
}

/// **VALUE**: Verifies closing the client unblocks a pending receive.
///
/// **BUG THIS CATCHES**: Shutdown hanging forever on a quiet connection.
#[tokio::test]
async fn given_idle_listener_when_client_closed_then_listen_returns_closed() {
    // GIVEN
    let hub = start_hub(HubScript::accepting(TEST_TOKEN)).await;
    let client = client(hub.port, Some(TEST_TOKEN));
    let mut ready = ready_channel(&client);
    client.connect().await.unwrap();
    let listening = spawn_listen(&client, &CancellationToken::new());
    timeout(WAIT, ready.recv()).await.unwrap();

    // WHEN
    client.close().await;

    // THEN
    let outcome = timeout(WAIT, listening).await.unwrap().unwrap();
    assert!(matches!(outcome, Err(HubError::Closed { .. })));
    assert!(!client.connected());
    assert!(client.sync().mirror().states.is_none());
}

/// **VALUE**: A hub that stops answering ends `listen` instead of hanging it.
///
/// **WHY THIS MATTERS**: A half-open connection (laptop sleep, Wi-Fi change) yields
/// neither frames nor errors. The unanswered ping is the only signal the supervisor
/// gets to reconnect.
///
/// **BUG THIS CATCHES**: Pings sent without a pong deadline, or a transport left
/// open after the receive loop gave up.
#[tokio::test]
async fn given_silent_hub_when_pings_go_unanswered_then_listen_returns_closed() {
    // GIVEN
    let hub = start_hub(HubScript::accepting(TEST_TOKEN).silent_after_greeting()).await;
    let client = Arc::new(
        HubClient::new(
            WebSocketTransport::new(),
            Arc::new(StaticSettings::new(hub.port, Some(TEST_TOKEN))),
        )
        .with_heartbeat_interval(Duration::from_millis(100)),
    );
    client.connect().await.unwrap();

    // WHEN
    let outcome = timeout(WAIT, client.listen(&CancellationToken::new()))
        .await
        .expect("listen should give up on a silent hub");

    // THEN
    match outcome {
        Err(HubError::Closed { message, .. }) => assert!(message.contains("heartbeat"), "{message}"),
        other => panic!("expected Closed, got {other:?}"),
    }
    assert!(!client.connected(), "transport should be closed when listen returns");
}
