//! Proposal resolution workflow: accepting or rejecting a bid.

use super::error::{WorkflowError, WorkflowResult};
use super::templates::NotificationTemplates;
use crate::marketplace::{
    domain::{
        Actor, NotificationKind, Proposal, ProposalAction, ProposalId, RequestStatus,
        RequestWorkspace, access,
    },
    ports::MarketplaceRepository,
};
use mockable::Clock;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Outcome of a resolved proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalResolution {
    /// The proposal after resolution.
    pub proposal: Proposal,
    /// The parent request's status after resolution.
    pub request_status: RequestStatus,
}

/// Accepts or rejects proposals on behalf of the owning client.
pub struct ProposalResolutionService<R, C>
where
    R: MarketplaceRepository,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    clock: Arc<C>,
    templates: Arc<NotificationTemplates>,
}

impl<R, C> Clone for ProposalResolutionService<R, C>
where
    R: MarketplaceRepository,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            clock: Arc::clone(&self.clock),
            templates: Arc::clone(&self.templates),
        }
    }
}

impl<R, C> ProposalResolutionService<R, C>
where
    R: MarketplaceRepository,
    C: Clock + Send + Sync + 'static,
{
    /// Creates a new resolution service.
    #[must_use]
    pub const fn new(
        repository: Arc<R>,
        clock: Arc<C>,
        templates: Arc<NotificationTemplates>,
    ) -> Self {
        Self {
            repository,
            clock,
            templates,
        }
    }

    /// Applies `action` to a proposal.
    ///
    /// Accepting rejects every sibling, assigns the proposal's provider, and
    /// moves the request to `in_progress`, all while the request is locked.
    /// A second accept on the same request therefore fails with an invalid
    /// state transition instead of overwriting the first. Rejecting affects
    /// only the target proposal. Either way the provider is notified through
    /// the outbox in the same unit of work.
    ///
    /// # Errors
    ///
    /// Checks run in this order: [`WorkflowError::ProposalNotFound`] or
    /// [`WorkflowError::RequestNotFound`] for missing records,
    /// [`WorkflowError::Forbidden`] unless the actor owns the request or is an
    /// admin, then [`WorkflowError::InvalidAction`] for unknown actions.
    /// Refused transitions give [`WorkflowError::Domain`] and storage failures
    /// give [`WorkflowError::TransactionFailed`].
    pub async fn resolve(
        &self,
        actor: Actor,
        proposal_id: ProposalId,
        action: &str,
    ) -> WorkflowResult<ProposalResolution> {
        let proposal = self
            .repository
            .find_proposal(proposal_id)
            .await?
            .ok_or(WorkflowError::ProposalNotFound(proposal_id))?;
        let request_id = proposal.request_id();

        let clock = Arc::clone(&self.clock);
        let templates = Arc::clone(&self.templates);
        let raw_action = action.to_owned();
        let outcome = self
            .repository
            .with_request_locked(request_id, move |workspace| {
                if !access::resolve_proposal(&actor, workspace.request()).is_granted() {
                    return Err(WorkflowError::Forbidden("resolve proposals on this request"));
                }
                if workspace.proposal(proposal_id).is_none() {
                    return Err(WorkflowError::ProposalNotFound(proposal_id));
                }
                let parsed = ProposalAction::try_from(raw_action.as_str())
                    .map_err(|_| WorkflowError::InvalidAction(raw_action.clone()))?;
                apply_action(workspace, parsed, proposal_id, &*clock, &templates)
            })
            .await;

        match &outcome {
            Ok(resolution) => tracing::info!(
                actor_id = %actor.id(),
                proposal_id = %proposal_id,
                request_id = %request_id,
                action,
                request_status = %resolution.request_status,
                "proposal resolved"
            ),
            Err(err) => tracing::warn!(
                actor_id = %actor.id(),
                proposal_id = %proposal_id,
                request_id = %request_id,
                action,
                error = %err,
                "proposal resolution refused"
            ),
        }
        outcome
    }
}

fn apply_action(
    workspace: &mut RequestWorkspace,
    action: ProposalAction,
    proposal_id: ProposalId,
    clock: &impl Clock,
    templates: &NotificationTemplates,
) -> WorkflowResult<ProposalResolution> {
    let (proposal, kind) = match action {
        ProposalAction::Accept => (
            workspace.accept_proposal(proposal_id, clock)?.clone(),
            NotificationKind::ProposalAccepted,
        ),
        ProposalAction::Reject => (
            workspace.reject_proposal(proposal_id, clock)?.clone(),
            NotificationKind::ProposalRejected,
        ),
    };

    let request = workspace.request();
    let mut context = Map::new();
    context.insert("request_id".to_owned(), Value::from(request.id().value()));
    context.insert("proposal_id".to_owned(), Value::from(proposal_id.value()));
    context.insert("category".to_owned(), Value::from(request.category()));
    context.insert("price".to_owned(), Value::from(proposal.price().to_string()));
    let notification = templates.compose(kind, proposal.provider_id(), context, clock)?;
    let request_status = request.status();
    workspace.enqueue(notification);

    Ok(ProposalResolution {
        proposal,
        request_status,
    })
}
