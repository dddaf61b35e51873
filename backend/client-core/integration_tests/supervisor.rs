use crate::helpers::{HubScript, StaticSettings, TEST_TOKEN, start_hub, unused_port};

use client_core::{HubClient, HubError, RetryPolicy, Supervisor, WebSocketTransport};

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

fn fast_policy() -> RetryPolicy {
    RetryPolicy::default().with_delay(Duration::from_millis(20))
}

#[tokio::test]
async fn given_unreachable_hub_when_supervised_then_gives_up_after_three_attempts() {
    // GIVEN
    let port = unused_port().await;
    let client = Arc::new(HubClient::new(
        WebSocketTransport::new(),
        Arc::new(StaticSettings::new(port, Some(TEST_TOKEN))),
    ));
    let supervisor = Supervisor::new(client, CancellationToken::new()).with_policy(fast_policy());

    // WHEN
    let outcome = timeout(Duration::from_secs(10), supervisor.run()).await.unwrap();

    // THEN
    assert!(matches!(
        outcome,
        Err(HubError::AttemptsExhausted { attempts: 3, .. })
    ));
}

/// **VALUE**: Verifies a hub that keeps dropping synced connections is reconnected
/// indefinitely, since every drop follows a ready session.
#[tokio::test]
async fn given_hub_dropping_after_sync_when_supervised_then_keeps_reconnecting() {
    // GIVEN
    let hub = start_hub(HubScript::accepting(TEST_TOKEN).closing_after_subscribe()).await;
    let client = Arc::new(HubClient::new(
        WebSocketTransport::new(),
        Arc::new(StaticSettings::new(hub.port, Some(TEST_TOKEN))),
    ));
    let cancel = CancellationToken::new();
    let supervisor = Supervisor::new(client, cancel.clone()).with_policy(fast_policy());
    let running = tokio::spawn(async move { supervisor.run().await });

    // WHEN
    timeout(Duration::from_secs(10), async {
        while hub.connections() < 5 {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    cancel.cancel();

    // THEN
    let outcome = timeout(Duration::from_secs(5), running).await.unwrap().unwrap();
    assert!(outcome.is_ok());
}

#[tokio::test]
async fn given_rejected_token_when_supervised_then_stops_on_first_attempt() {
    let hub = start_hub(HubScript::accepting(TEST_TOKEN)).await;
    let client = Arc::new(HubClient::new(
        WebSocketTransport::new(),
        Arc::new(StaticSettings::new(hub.port, Some("wrong"))),
    ));
    let supervisor = Supervisor::new(client, CancellationToken::new()).with_policy(fast_policy());

    let outcome = timeout(Duration::from_secs(10), supervisor.run()).await.unwrap();

    assert!(matches!(outcome, Err(HubError::Authentication { .. })));
    assert_eq!(hub.connections(), 1);
}
