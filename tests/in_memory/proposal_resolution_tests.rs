//! Integration tests for accepting and rejecting proposals.

use super::helpers::{
    ADMIN, CLIENT, Harness, PROVIDER_A, PROVIDER_B, PROVIDER_C, STRANGER, bid_of, harness,
    notification_kinds, request_with_bids,
};
use acheiumpro::marketplace::{
    domain::{
        AppointmentStatus, MarketplaceDomainError, ProposalId, ProposalStatus, RequestStatus,
    },
    services::WorkflowError,
};
use chrono::{Duration, Utc};
use eyre::{bail, ensure};
use rstest::rstest;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn acceptance_leaves_exactly_one_accepted_bid(harness: Harness) -> eyre::Result<()> {
    let (request, proposals) = request_with_bids(&harness, None).await?;
    let winner = bid_of(&proposals, PROVIDER_B)?;

    harness
        .marketplace
        .resolution
        .resolve(CLIENT, winner.id(), "accept")
        .await?;

    let after = harness
        .marketplace
        .requests
        .list_proposals(CLIENT, request.id())
        .await?;
    for proposal in &after {
        let expected = if proposal.id() == winner.id() {
            ProposalStatus::Accepted
        } else {
            ProposalStatus::Rejected
        };
        ensure!(proposal.status() == expected, "proposal {} has {}", proposal.id(), proposal.status());
    }
    let view = harness.marketplace.requests.get(CLIENT, request.id()).await?;
    ensure!(view.request.status() == RequestStatus::InProgress);
    ensure!(view.request.provider_id() == Some(PROVIDER_B.id()));
    ensure!(view.appointment.is_none());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn acceptance_confirms_scheduled_appointment(harness: Harness) -> eyre::Result<()> {
    let at = Utc::now() + Duration::days(4);
    let (request, proposals) = request_with_bids(&harness, Some(at)).await?;
    let winner = bid_of(&proposals, PROVIDER_A)?;

    harness
        .marketplace
        .resolution
        .resolve(CLIENT, winner.id(), "accept")
        .await?;

    let view = harness.marketplace.requests.get(PROVIDER_A, request.id()).await?;
    let Some(appointment) = view.appointment else {
        bail!("scheduled request should have an appointment");
    };
    ensure!(appointment.status() == AppointmentStatus::Confirmed);
    ensure!(appointment.scheduled_for() == at);
    ensure!(appointment.provider_id() == PROVIDER_A.id());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn reject_is_idempotent_and_isolated(harness: Harness) -> eyre::Result<()> {
    let (request, proposals) = request_with_bids(&harness, None).await?;
    let target = bid_of(&proposals, PROVIDER_C)?;

    for _ in 0..2 {
        let resolution = harness
            .marketplace
            .resolution
            .resolve(CLIENT, target.id(), "reject")
            .await?;
        ensure!(resolution.proposal.status() == ProposalStatus::Rejected);
        ensure!(resolution.request_status == RequestStatus::Pending);
    }

    let after = harness
        .marketplace
        .requests
        .list_proposals(CLIENT, request.id())
        .await?;
    ensure!(
        after
            .iter()
            .filter(|proposal| proposal.id() != target.id())
            .all(|proposal| proposal.status() == ProposalStatus::Pending)
    );
    ensure!(
        notification_kinds(&harness, PROVIDER_C)? == vec!["proposal_rejected", "proposal_rejected"]
    );
    Ok(())
}

#[rstest]
#[case(STRANGER)]
#[case(PROVIDER_A)]
#[tokio::test(flavor = "multi_thread")]
async fn only_owner_or_admin_may_resolve(
    harness: Harness,
    #[case] intruder: acheiumpro::marketplace::domain::Actor,
) -> eyre::Result<()> {
    let (request, proposals) = request_with_bids(&harness, None).await?;
    let target = bid_of(&proposals, PROVIDER_A)?;

    let result = harness
        .marketplace
        .resolution
        .resolve(intruder, target.id(), "accept")
        .await;
    ensure!(matches!(result, Err(WorkflowError::Forbidden(_))));

    let view = harness.marketplace.requests.get(CLIENT, request.id()).await?;
    ensure!(view.request.status() == RequestStatus::Pending);
    ensure!(notification_kinds(&harness, PROVIDER_A)?.is_empty());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn admin_overrides_ownership(harness: Harness) -> eyre::Result<()> {
    let (_, proposals) = request_with_bids(&harness, None).await?;
    let target = bid_of(&proposals, PROVIDER_A)?;

    let resolution = harness
        .marketplace
        .resolution
        .resolve(ADMIN, target.id(), "accept")
        .await?;
    ensure!(resolution.request_status == RequestStatus::InProgress);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn missing_proposal_has_no_side_effects(harness: Harness) -> eyre::Result<()> {
    request_with_bids(&harness, None).await?;
    let before = harness.store.all_notifications()?;

    let result = harness
        .marketplace
        .resolution
        .resolve(CLIENT, ProposalId::new(9_999), "accept")
        .await;

    ensure!(matches!(result, Err(WorkflowError::ProposalNotFound(id)) if id == ProposalId::new(9_999)));
    ensure!(harness.store.all_notifications()? == before);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn second_acceptance_is_an_invalid_transition(harness: Harness) -> eyre::Result<()> {
    let (_, proposals) = request_with_bids(&harness, None).await?;
    let first = bid_of(&proposals, PROVIDER_A)?;
    let second = bid_of(&proposals, PROVIDER_B)?;

    harness
        .marketplace
        .resolution
        .resolve(CLIENT, first.id(), "accept")
        .await?;
    let result = harness
        .marketplace
        .resolution
        .resolve(CLIENT, second.id(), "accept")
        .await;

    ensure!(matches!(
        result,
        Err(WorkflowError::Domain(MarketplaceDomainError::InvalidStateTransition {
            from: RequestStatus::InProgress,
            ..
        }))
    ));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_accepts_settle_on_one_winner(harness: Harness) -> eyre::Result<()> {
    let (request, proposals) = request_with_bids(&harness, None).await?;
    let left = bid_of(&proposals, PROVIDER_A)?;
    let right = bid_of(&proposals, PROVIDER_B)?;

    let resolution = harness.marketplace.resolution.clone();
    let racer = resolution.clone();
    let (left_result, right_result) = tokio::join!(
        tokio::spawn(async move { resolution.resolve(CLIENT, left.id(), "accept").await }),
        tokio::spawn(async move { racer.resolve(CLIENT, right.id(), "accept").await }),
    );
    let outcomes = [left_result?, right_result?];

    ensure!(outcomes.iter().filter(|outcome| outcome.is_ok()).count() == 1);
    ensure!(outcomes.iter().any(|outcome| matches!(
        outcome,
        Err(WorkflowError::Domain(MarketplaceDomainError::InvalidStateTransition { .. }))
    )));

    let after = harness
        .marketplace
        .requests
        .list_proposals(CLIENT, request.id())
        .await?;
    let accepted: Vec<_> = after
        .iter()
        .filter(|proposal| proposal.status() == ProposalStatus::Accepted)
        .collect();
    ensure!(accepted.len() == 1);
    let view = harness.marketplace.requests.get(CLIENT, request.id()).await?;
    ensure!(view.request.provider_id() == accepted.first().map(|winner| winner.provider_id()));
    Ok(())
}
