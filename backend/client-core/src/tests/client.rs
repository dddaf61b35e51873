use crate::client::HubClient;
use crate::error::HubError;
use crate::tests::fakes::{FakeTransport, TestSettings};

use std::sync::Arc;
use std::sync::atomic::Ordering;

use tokio_util::sync::CancellationToken;

/// **VALUE**: A retryable read failure releases the socket before the supervisor
/// starts its backoff sleep.
///
/// **BUG THIS CATCHES**: Would catch the connection lingering for the whole retry
/// delay and only being closed by the next `connect`.
#[tokio::test]
async fn given_socket_error_when_listen_returns_then_transport_closed() {
    // GIVEN
    let client = HubClient::new(FakeTransport::new(), Arc::new(TestSettings::with_token("T")));
    client.connect().await.unwrap();
    let transport = Arc::clone(client.session().transport());
    transport.push_frame(Err(HubError::socket("connection reset by peer")));

    // WHEN
    let outcome = client.listen(&CancellationToken::new()).await;

    // THEN
    assert!(matches!(outcome, Err(HubError::Socket { .. })));
    assert_eq!(transport.closes.load(Ordering::SeqCst), 1);
    assert!(!client.connected());
}

#[tokio::test]
async fn given_cancelled_listen_when_returning_then_transport_closed() {
    // GIVEN
    let client = HubClient::new(FakeTransport::new(), Arc::new(TestSettings::with_token("T")));
    client.connect().await.unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    // WHEN
    let outcome = client.listen(&cancel).await;

    // THEN
    assert!(outcome.is_ok());
    assert!(!client.connected());
}
