use homeassistant_desktop::state::{TrayCommand, TrayState};

use std::time::Duration;

async fn settled_tooltip(tray: &TrayState, expected: Option<&str>) -> Option<String> {
    for _ in 0..50 {
        let tooltip = tray.tooltip().await;
        if tooltip.as_deref() == expected {
            return tooltip;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    tray.tooltip().await
}

#[tokio::test]
async fn given_fresh_tray_when_summary_set_then_tooltip_readable() {
    // GIVEN
    let tray = TrayState::new();
    assert!(tray.tooltip().await.is_none());

    // WHEN
    tray.update(TrayCommand::from_summary(Some(String::from("Kitchen: on"))))
        .unwrap();

    // THEN
    assert_eq!(
        settled_tooltip(&tray, Some("Kitchen: on")).await.as_deref(),
        Some("Kitchen: on")
    );
}

/// **VALUE**: Updates from the ready callback and the watcher land in send order.
///
/// **BUG THIS CATCHES**: Would catch updates applied out of order if the actor
/// were replaced by a spawned write per update.
#[tokio::test]
async fn given_sequential_updates_when_applied_then_last_one_wins() {
    // GIVEN
    let tray = TrayState::new();

    // WHEN
    tray.update(TrayCommand::SetTooltip(String::from("Temperature: 20°C")))
        .unwrap();
    tray.update(TrayCommand::ClearTooltip).unwrap();
    tray.update(TrayCommand::SetTooltip(String::from("Temperature: 21°C")))
        .unwrap();

    // THEN
    assert_eq!(
        settled_tooltip(&tray, Some("Temperature: 21°C")).await.as_deref(),
        Some("Temperature: 21°C")
    );
}

#[tokio::test]
async fn given_no_summary_when_applied_then_tooltip_cleared() {
    // GIVEN
    let tray = TrayState::new();
    tray.update(TrayCommand::SetTooltip(String::from("x"))).unwrap();

    // WHEN
    tray.update(TrayCommand::from_summary(None)).unwrap();

    // THEN
    assert!(settled_tooltip(&tray, None).await.is_none());
}

/// **VALUE**: Readers polling the tooltip never block the actor.
#[tokio::test]
async fn given_concurrent_reads_and_writes_when_executed_then_no_deadlock() {
    // GIVEN
    let tray = TrayState::new();
    let writer_tray = tray.clone();
    let reader_tray = tray.clone();
    let clearer_tray = tray.clone();

    // WHEN
    let writer = tokio::spawn(async move {
        writer_tray
            .update(TrayCommand::SetTooltip(String::from("Door: closed")))
    });
    let reader = tokio::spawn(async move { reader_tray.tooltip().await });
    let clearer = tokio::spawn(async move { clearer_tray.update(TrayCommand::ClearTooltip) });

    // THEN
    let result = tokio::time::timeout(Duration::from_secs(2), async {
        let (w, r, c) = tokio::join!(writer, reader, clearer);
        w.is_ok() && r.is_ok() && c.is_ok()
    })
    .await;

    assert_eq!(result, Ok(true), "Operations should complete within 2 seconds");
}
