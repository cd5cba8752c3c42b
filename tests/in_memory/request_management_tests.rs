//! Integration tests for posting, viewing, bidding on, and deleting requests.

use super::helpers::{
    ADMIN, CLIENT, Harness, PROVIDER_A, PROVIDER_B, STRANGER, bid_of, harness, notifications_for,
    post_request, request_with_bids,
};
use acheiumpro::marketplace::{
    domain::{Actor, MarketplaceDomainError, RequestStatus, UserId},
    services::WorkflowError,
};
use eyre::ensure;
use rstest::rstest;

const LATE_PROVIDER: Actor = Actor::provider(UserId::new(50));

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn providers_only_see_their_own_bids(harness: Harness) -> eyre::Result<()> {
    let (request, _) = request_with_bids(&harness, None).await?;

    let own = harness
        .marketplace
        .requests
        .list_proposals(PROVIDER_A, request.id())
        .await?;
    ensure!(own.len() == 1);
    ensure!(own.iter().all(|proposal| proposal.provider_id() == PROVIDER_A.id()));

    let all = harness
        .marketplace
        .requests
        .list_proposals(ADMIN, request.id())
        .await?;
    ensure!(all.len() == 3);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn strangers_cannot_see_requests(harness: Harness) -> eyre::Result<()> {
    let request = post_request(&harness, None).await?;
    let result = harness.marketplace.requests.get(STRANGER, request.id()).await;
    ensure!(matches!(result, Err(WorkflowError::RequestNotFound(_))));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn bids_on_closed_requests_are_refused(harness: Harness) -> eyre::Result<()> {
    let (request, proposals) = request_with_bids(&harness, None).await?;
    let winner = bid_of(&proposals, PROVIDER_A)?;
    harness
        .marketplace
        .resolution
        .resolve(CLIENT, winner.id(), "accept")
        .await?;

    let late = harness
        .marketplace
        .proposals
        .submit(LATE_PROVIDER, request.id(), "100", None)
        .await;
    ensure!(matches!(
        late,
        Err(WorkflowError::Domain(MarketplaceDomainError::RequestNotOpen(_)))
    ));
    Ok(())
}

#[rstest]
#[case("0")]
#[case("-5")]
#[case("cheap")]
#[tokio::test(flavor = "multi_thread")]
async fn non_positive_prices_are_refused(harness: Harness, #[case] price: &str) -> eyre::Result<()> {
    let request = post_request(&harness, None).await?;
    let result = harness
        .marketplace
        .proposals
        .submit(PROVIDER_A, request.id(), price, None)
        .await;
    ensure!(matches!(
        result,
        Err(WorkflowError::Domain(MarketplaceDomainError::InvalidPrice(_)))
    ));
    ensure!(notifications_for(&harness, CLIENT)?.is_empty());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn withdrawal_respects_ownership(harness: Harness) -> eyre::Result<()> {
    let (request, proposals) = request_with_bids(&harness, None).await?;
    let bid_a = bid_of(&proposals, PROVIDER_A)?;
    let bid_b = bid_of(&proposals, PROVIDER_B)?;

    let foreign = harness.marketplace.proposals.withdraw(PROVIDER_B, bid_a.id()).await;
    ensure!(matches!(foreign, Err(WorkflowError::Forbidden(_))));

    harness.marketplace.proposals.withdraw(PROVIDER_B, bid_b.id()).await?;
    let remaining = harness
        .marketplace
        .requests
        .list_proposals(CLIENT, request.id())
        .await?;
    ensure!(remaining.iter().all(|proposal| proposal.id() != bid_b.id()));

    harness
        .marketplace
        .resolution
        .resolve(CLIENT, bid_a.id(), "accept")
        .await?;
    harness.marketplace.proposals.withdraw(PROVIDER_A, bid_a.id()).await?;
    let after = harness
        .marketplace
        .requests
        .list_proposals(CLIENT, request.id())
        .await?;
    ensure!(after.iter().all(|proposal| proposal.id() != bid_a.id()));
    ensure!(harness.marketplace.requests.get(CLIENT, request.id()).await?.request.status()
        == RequestStatus::InProgress);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn deleting_cascades_but_keeps_notifications(harness: Harness) -> eyre::Result<()> {
    let (request, proposals) = request_with_bids(&harness, None).await?;
    let notifications_before = harness.store.all_notifications()?.len();

    let refused = harness.marketplace.requests.delete(PROVIDER_A, request.id()).await;
    ensure!(matches!(refused, Err(WorkflowError::Forbidden(_))));

    harness.marketplace.requests.delete(CLIENT, request.id()).await?;

    let gone = harness.marketplace.requests.get(ADMIN, request.id()).await;
    ensure!(matches!(gone, Err(WorkflowError::RequestNotFound(_))));
    for proposal in &proposals {
        let resolved = harness
            .marketplace
            .resolution
            .resolve(CLIENT, proposal.id(), "reject")
            .await;
        ensure!(matches!(resolved, Err(WorkflowError::ProposalNotFound(_))));
    }
    ensure!(harness.store.all_notifications()?.len() == notifications_before);
    Ok(())
}
