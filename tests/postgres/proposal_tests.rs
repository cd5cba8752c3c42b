//! Duplicate bid enforcement.

use crate::postgres::helpers::{
    MarketplaceContext, PROVIDER_A, count_rows, marketplace_context, post_request,
};
use acheiumpro::marketplace::{domain::MarketplaceDomainError, services::WorkflowError};
use eyre::{bail, ensure};
use rstest::rstest;

const BIDS_FOR_REQUEST: &str = "SELECT COUNT(*) AS count FROM proposals WHERE request_id = $1";

#[rstest]
fn second_bid_from_a_provider_is_refused(
    marketplace_context: eyre::Result<MarketplaceContext>,
) -> eyre::Result<()> {
    let context = marketplace_context?;
    let proposals = &context.marketplace.proposals;
    let (request, repeat) = context.rt.block_on(async {
        let request = post_request(&context.marketplace, None).await?;
        proposals.submit(PROVIDER_A, request.id(), "150", None).await?;
        let repeat = proposals.submit(PROVIDER_A, request.id(), "140", None).await;
        eyre::Ok((request, repeat))
    })?;

    let Err(WorkflowError::Domain(MarketplaceDomainError::DuplicateProposal(rejected))) = &repeat
    else {
        bail!("expected a duplicate proposal error, got {repeat:?}");
    };
    ensure!(*rejected == request.id());
    let mut conn = context.database.connect()?;
    let bids = count_rows(&mut conn, BIDS_FOR_REQUEST, request.id().value())?;
    ensure!(bids == 1, "found {bids} bids");
    Ok(())
}

#[rstest]
fn racing_bids_from_one_provider_store_one_row(
    marketplace_context: eyre::Result<MarketplaceContext>,
) -> eyre::Result<()> {
    let context = marketplace_context?;
    let proposals = &context.marketplace.proposals;
    let (request, outcomes) = context.rt.block_on(async {
        let request = post_request(&context.marketplace, None).await?;
        let (first, second) = tokio::join!(
            proposals.submit(PROVIDER_A, request.id(), "150", None),
            proposals.submit(PROVIDER_A, request.id(), "149", None),
        );
        eyre::Ok((request, [first, second]))
    })?;

    ensure!(
        outcomes.iter().filter(|outcome| outcome.is_ok()).count() == 1,
        "expected one stored bid, got {outcomes:?}"
    );
    ensure!(
        outcomes.iter().any(|outcome| matches!(
            outcome,
            Err(WorkflowError::Domain(MarketplaceDomainError::DuplicateProposal(_)))
        )),
        "the losing bid must be reported as a duplicate, got {outcomes:?}"
    );
    let mut conn = context.database.connect()?;
    let bids = count_rows(&mut conn, BIDS_FOR_REQUEST, request.id().value())?;
    ensure!(bids == 1, "found {bids} bids");
    Ok(())
}
