//! Integration tests for relaying committed notifications.

use super::helpers::{CLIENT, Harness, PROVIDER_A, harness, notifications_for, post_request};
use acheiumpro::marketplace::{
    adapters::memory::{InMemoryMarketplace, RecordingDispatcher},
    domain::DeliveryState,
    ports::NotificationOutbox,
    services::{NotificationRelay, RelayReport, RelaySettings},
};
use eyre::{bail, ensure};
use rstest::rstest;
use std::sync::Arc;

fn relay_for(
    harness: &Harness,
    dispatcher: &Arc<RecordingDispatcher>,
) -> NotificationRelay<InMemoryMarketplace, RecordingDispatcher> {
    NotificationRelay::new(
        Arc::clone(&harness.store),
        Arc::clone(dispatcher),
        RelaySettings {
            max_attempts: 2,
            ..RelaySettings::default()
        },
    )
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn committed_bids_reach_the_dispatcher_once(harness: Harness) -> eyre::Result<()> {
    let request = post_request(&harness, None).await?;
    harness
        .marketplace
        .proposals
        .submit(PROVIDER_A, request.id(), "250", Some("Available next week".to_owned()))
        .await?;
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let relay = relay_for(&harness, &dispatcher);

    let first = relay.relay_pending().await?;
    let second = relay.relay_pending().await?;

    ensure!(first == RelayReport { delivered: 1, retrying: 0, failed: 0 });
    ensure!(second == RelayReport::default());
    let deliveries = dispatcher.deliveries();
    ensure!(deliveries.len() == 1);
    ensure!(deliveries.iter().all(|delivery| delivery.user_id == CLIENT.id()));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failing_service_keeps_the_workflow_result(harness: Harness) -> eyre::Result<()> {
    let request = post_request(&harness, None).await?;
    harness
        .marketplace
        .proposals
        .submit(PROVIDER_A, request.id(), "250", None)
        .await?;
    let dispatcher = Arc::new(RecordingDispatcher::new());
    dispatcher.set_failing(true);
    let relay = relay_for(&harness, &dispatcher);

    let retry = relay.relay_pending().await?;
    let exhausted = relay.relay_pending().await?;

    ensure!(retry.retrying == 1);
    ensure!(exhausted.failed == 1);
    let proposals = harness
        .marketplace
        .requests
        .list_proposals(CLIENT, request.id())
        .await?;
    ensure!(proposals.len() == 1, "the bid must survive dispatch failures");
    let stored = notifications_for(&harness, CLIENT)?;
    ensure!(stored
        .iter()
        .all(|notification| notification.delivery_state() == DeliveryState::Failed
            && notification.attempts() == 2));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn delivery_keeps_a_read_made_while_in_flight(harness: Harness) -> eyre::Result<()> {
    let request = post_request(&harness, None).await?;
    harness
        .marketplace
        .proposals
        .submit(PROVIDER_A, request.id(), "180", None)
        .await?;

    let pending = harness.store.pending_notifications(10, 5).await?;
    let Some(mut in_flight) = pending.into_iter().next() else {
        bail!("expected a pending notification");
    };
    harness.marketplace.inbox.mark_read(CLIENT, in_flight.id()).await?;
    in_flight.record_delivered();
    harness.store.record_delivery(&in_flight).await?;

    let stored = notifications_for(&harness, CLIENT)?;
    ensure!(stored
        .iter()
        .all(|notification| notification.is_read()
            && notification.delivery_state() == DeliveryState::Delivered));
    Ok(())
}
