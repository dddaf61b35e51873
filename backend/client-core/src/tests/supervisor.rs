use crate::error::HubError;
use crate::supervisor::{RetryPolicy, Session, Supervisor};

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use backoff::backoff::Backoff;
use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// One scripted connection: how `listen` ends and whether it reached readiness first.
struct Outcome {
    result: Result<(), HubError>,
    ready: bool,
}

fn lost() -> Outcome {
    Outcome {
        result: Err(HubError::closed("connection lost")),
        ready: false,
    }
}

fn lost_after_ready() -> Outcome {
    Outcome {
        result: Err(HubError::closed("connection lost")),
        ready: true,
    }
}

/// Connections follow the script; once it runs out `listen` blocks until cancelled.
#[derive(Default)]
struct MockSession {
    script: Mutex<VecDeque<Outcome>>,
    connects: AtomicUsize,
    closes: AtomicUsize,
    ready: AtomicBool,
}

impl MockSession {
    fn scripted(outcomes: Vec<Outcome>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(outcomes.into()),
            ..Default::default()
        })
    }

    fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl Session for MockSession {
    async fn connect(&self) -> Result<(), HubError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.ready.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn listen(&self, cancel: &CancellationToken) -> Result<(), HubError> {
        let next = self.script.lock().pop_front();
        match next {
            Some(outcome) => {
                self.ready.store(outcome.ready, Ordering::SeqCst);
                outcome.result
            }
            None => {
                cancel.cancelled().await;
                Ok(())
            }
        }
    }

    fn became_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// **VALUE**: Verifies the hard cap: three lost connections mean three connects, two
/// 5 s waits, then a fatal error with no fourth attempt.
///
/// **BUG THIS CATCHES**: Off-by-one in the attempt counter, a sleep before giving up,
/// or silent infinite retry.
#[tokio::test(start_paused = true)]
async fn given_three_lost_connections_when_running_then_gives_up_after_three_connects() {
    // GIVEN
    let session = MockSession::scripted(vec![lost(), lost(), lost(), lost()]);
    let supervisor = Supervisor::new(Arc::clone(&session), CancellationToken::new());
    let started = Instant::now();

    // WHEN
    let outcome = supervisor.run().await;

    // THEN
    assert!(matches!(
        outcome,
        Err(HubError::AttemptsExhausted { attempts: 3, .. })
    ));
    assert_eq!(session.connects(), 3);
    assert_eq!(started.elapsed(), Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn given_authentication_failure_when_running_then_stops_without_retry() {
    // GIVEN
    let session = MockSession::scripted(vec![Outcome {
        result: Err(HubError::authentication("Invalid password")),
        ready: false,
    }]);
    let supervisor = Supervisor::new(Arc::clone(&session), CancellationToken::new());
    let started = Instant::now();

    // WHEN
    let outcome = supervisor.run().await;

    // THEN
    assert!(matches!(outcome, Err(HubError::Authentication { .. })));
    assert_eq!(session.connects(), 1);
    assert_eq!(started.elapsed(), Duration::ZERO);
}

/// **VALUE**: Verifies cancellation cuts a pending backoff sleep short.
///
/// **WHY THIS MATTERS**: Exiting the app must not wait out the retry delay or
/// start another connection.
#[tokio::test(start_paused = true)]
async fn given_backoff_sleep_when_cancelled_then_returns_promptly_without_reconnect() {
    // GIVEN
    let session = MockSession::scripted(vec![lost()]);
    let cancel = CancellationToken::new();
    let supervisor = Supervisor::new(Arc::clone(&session), cancel.clone());
    let running = tokio::spawn(async move { supervisor.run().await });
    tokio::time::sleep(Duration::from_secs(1)).await;
    let started = Instant::now();

    // WHEN
    cancel.cancel();
    let outcome = running.await.unwrap();

    // THEN
    assert!(outcome.is_ok());
    assert_eq!(session.connects(), 1);
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(session.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn given_cancel_before_start_when_running_then_never_connects() {
    let session = MockSession::scripted(vec![]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = Supervisor::new(Arc::clone(&session), cancel).run().await;

    assert!(outcome.is_ok());
    assert_eq!(session.connects(), 0);
}

#[tokio::test(start_paused = true)]
async fn given_live_session_when_cancelled_then_listen_ends_and_ok() {
    let session = MockSession::scripted(vec![]);
    let cancel = CancellationToken::new();
    let supervisor = Supervisor::new(Arc::clone(&session), cancel.clone());
    let running = tokio::spawn(async move { supervisor.run().await });
    tokio::time::sleep(Duration::from_secs(120)).await;

    cancel.cancel();

    assert!(running.await.unwrap().is_ok());
    assert_eq!(session.connects(), 1);
}

/// **VALUE**: Verifies a connection that reached readiness restores the full attempt budget.
///
/// **BUG THIS CATCHES**: A long-lived client that drops three times over a week would
/// otherwise exit on the third blip.
#[tokio::test(start_paused = true)]
async fn given_session_that_became_ready_when_lost_then_attempts_reset() {
    // GIVEN
    let session = MockSession::scripted(vec![
        lost(),
        lost(),
        lost_after_ready(),
        lost(),
        lost(),
        lost(),
    ]);
    let supervisor = Supervisor::new(Arc::clone(&session), CancellationToken::new());

    // WHEN
    let outcome = supervisor.run().await;

    // THEN
    assert!(matches!(outcome, Err(HubError::AttemptsExhausted { .. })));
    assert_eq!(session.connects(), 6);
}

#[tokio::test(start_paused = true)]
async fn given_custom_policy_when_running_then_cap_is_respected() {
    let session = MockSession::scripted((0..10).map(|_| lost()).collect());
    let supervisor = Supervisor::new(Arc::clone(&session), CancellationToken::new())
        .with_policy(RetryPolicy::default().with_max_attempts(5).with_delay(Duration::from_secs(1)));

    let outcome = supervisor.run().await;

    assert!(matches!(outcome, Err(HubError::AttemptsExhausted { attempts: 5, .. })));
    assert_eq!(session.connects(), 5);
}

#[test]
fn given_default_policy_when_backing_off_then_delay_is_fixed_five_seconds() {
    let mut backoff = RetryPolicy::default().backoff();

    for _ in 0..4 {
        assert_eq!(backoff.next_backoff(), Some(Duration::from_secs(5)));
    }
}

#[test]
fn given_growth_policy_when_backing_off_then_delay_doubles_up_to_max() {
    let policy = RetryPolicy::default()
        .with_delay(Duration::from_secs(1))
        .with_growth(2.0, Duration::from_secs(4));
    let mut backoff = policy.backoff();

    let delays: Vec<Duration> = (0..4).filter_map(|_| backoff.next_backoff()).collect();

    assert_eq!(
        delays,
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4),
            Duration::from_secs(4),
        ]
    );
}
