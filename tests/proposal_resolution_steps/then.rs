//! Then steps for proposal resolution BDD scenarios.

use super::world::{ResolutionWorld, run_async};
use acheiumpro::marketplace::{
    domain::{Actor, MarketplaceDomainError, ProposalStatus, RequestStatus, ServiceRequest, UserId},
    services::{ProposalResolution, WorkflowError},
};
use rstest_bdd_macros::then;
use serde_json::Value;

#[then(r#"the bid of provider {provider:i64} is "{status}""#)]
fn bid_status_is(
    world: &ResolutionWorld,
    provider: i64,
    status: String,
) -> Result<(), eyre::Report> {
    let expected = ProposalStatus::try_from(status.as_str())
        .map_err(|err| eyre::eyre!("invalid expected status in scenario: {err}"))?;
    let proposal = world.bid_of(provider)?;
    if proposal.status() != expected {
        return Err(eyre::eyre!(
            "expected bid of provider {provider} to be {expected}, found {}",
            proposal.status()
        ));
    }
    Ok(())
}

#[then(r#"the request is "{status}" and assigned to provider {provider:i64}"#)]
fn request_assigned(
    world: &ResolutionWorld,
    status: String,
    provider: i64,
) -> Result<(), eyre::Report> {
    let request = current_request(world)?;
    let expected = RequestStatus::try_from(status.as_str())
        .map_err(|err| eyre::eyre!("invalid expected status in scenario: {err}"))?;
    if request.status() != expected || request.provider_id() != Some(UserId::new(provider)) {
        return Err(eyre::eyre!(
            "expected {expected} assigned to {provider}, found {} assigned to {:?}",
            request.status(),
            request.provider_id()
        ));
    }
    Ok(())
}

#[then(r#"the request is "{status}" and unassigned"#)]
fn request_unassigned(world: &ResolutionWorld, status: String) -> Result<(), eyre::Report> {
    let request = current_request(world)?;
    let expected = RequestStatus::try_from(status.as_str())
        .map_err(|err| eyre::eyre!("invalid expected status in scenario: {err}"))?;
    if request.status() != expected || request.provider_id().is_some() {
        return Err(eyre::eyre!(
            "expected unassigned {expected}, found {} assigned to {:?}",
            request.status(),
            request.provider_id()
        ));
    }
    Ok(())
}

#[then(r#"provider {provider:i64} is notified with "{kind}""#)]
fn provider_notified(
    world: &ResolutionWorld,
    provider: i64,
    kind: String,
) -> Result<(), eyre::Report> {
    let notified = world
        .store
        .all_notifications()?
        .iter()
        .filter(|notification| notification.recipient() == UserId::new(provider))
        .any(|notification| {
            notification.metadata().get("kind").and_then(Value::as_str) == Some(kind.as_str())
        });
    if !notified {
        return Err(eyre::eyre!("provider {provider} has no {kind} notification"));
    }
    Ok(())
}

#[then("provider {provider:i64} receives no notification")]
fn provider_not_notified(world: &ResolutionWorld, provider: i64) -> Result<(), eyre::Report> {
    let received = world
        .store
        .all_notifications()?
        .iter()
        .filter(|notification| notification.recipient() == UserId::new(provider))
        .count();
    if received != 0 {
        return Err(eyre::eyre!(
            "provider {provider} unexpectedly has {received} notification(s)"
        ));
    }
    Ok(())
}

#[then("the resolution fails with an invalid state transition")]
fn fails_with_invalid_transition(world: &ResolutionWorld) -> Result<(), eyre::Report> {
    let result = last_resolution(world)?;
    if !matches!(
        result,
        Err(WorkflowError::Domain(
            MarketplaceDomainError::InvalidStateTransition { .. }
        ))
    ) {
        return Err(eyre::eyre!("expected InvalidStateTransition, got {result:?}"));
    }
    Ok(())
}

#[then("the resolution is forbidden")]
fn resolution_forbidden(world: &ResolutionWorld) -> Result<(), eyre::Report> {
    let result = last_resolution(world)?;
    if !matches!(result, Err(WorkflowError::Forbidden(_))) {
        return Err(eyre::eyre!("expected Forbidden, got {result:?}"));
    }
    Ok(())
}

#[then("the resolution fails with an invalid action")]
fn fails_with_invalid_action(world: &ResolutionWorld) -> Result<(), eyre::Report> {
    let result = last_resolution(world)?;
    if !matches!(result, Err(WorkflowError::InvalidAction(_))) {
        return Err(eyre::eyre!("expected InvalidAction, got {result:?}"));
    }
    Ok(())
}

fn current_request(world: &ResolutionWorld) -> Result<ServiceRequest, eyre::Report> {
    let request_id = world.request()?.id();
    let view = run_async(
        world
            .marketplace
            .requests
            .get(Actor::admin(UserId::new(0)), request_id),
    )?;
    Ok(view.request)
}

fn last_resolution(
    world: &ResolutionWorld,
) -> Result<&Result<ProposalResolution, WorkflowError>, eyre::Report> {
    world
        .last_resolution
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing resolution result"))
}
