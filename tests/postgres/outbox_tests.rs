//! Delivery bookkeeping beside inbox reads.

use crate::postgres::helpers::{
    CLIENT, MarketplaceContext, PROVIDER_A, marketplace_context, post_request,
};
use acheiumpro::marketplace::{domain::DeliveryState, ports::NotificationOutbox};
use eyre::{bail, ensure};
use rstest::rstest;

#[rstest]
fn delivery_keeps_a_read_made_while_in_flight(
    marketplace_context: eyre::Result<MarketplaceContext>,
) -> eyre::Result<()> {
    let context = marketplace_context?;
    let inbox = context.rt.block_on(async {
        let request = post_request(&context.marketplace, None).await?;
        context
            .marketplace
            .proposals
            .submit(PROVIDER_A, request.id(), "180", None)
            .await?;

        let pending = context.store.pending_notifications(10, 5).await?;
        let Some(mut in_flight) = pending.into_iter().next() else {
            bail!("expected a pending notification");
        };
        context.marketplace.inbox.mark_read(CLIENT, in_flight.id()).await?;
        in_flight.record_delivered();
        context.store.record_delivery(&in_flight).await?;
        eyre::Ok(context.marketplace.inbox.list(CLIENT, false).await?)
    })?;

    ensure!(!inbox.is_empty());
    ensure!(inbox.iter().all(|notification| notification.is_read()
        && notification.delivery_state() == DeliveryState::Delivered));
    Ok(())
}
