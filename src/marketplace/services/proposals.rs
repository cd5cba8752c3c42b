//! Proposal submission and withdrawal by providers.

use super::error::{WorkflowError, WorkflowResult};
use super::templates::NotificationTemplates;
use crate::marketplace::{
    domain::{Actor, NewProposal, NotificationKind, ProposalId, ProposedPrice, RequestId, access},
    ports::MarketplaceRepository,
};
use mockable::Clock;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Provider-side proposal operations.
pub struct ProposalService<R, C>
where
    R: MarketplaceRepository,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    clock: Arc<C>,
    templates: Arc<NotificationTemplates>,
}

impl<R, C> Clone for ProposalService<R, C>
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

impl<R, C> ProposalService<R, C>
where
    R: MarketplaceRepository,
    C: Clock + Send + Sync + 'static,
{
    /// Creates a new proposal service.
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

    /// Places a bid on a pending request and notifies its client.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::Forbidden`] unless the actor is a provider,
    /// [`WorkflowError::RequestNotFound`] for missing requests, and
    /// [`WorkflowError::Domain`] for non-positive prices, requests that are
    /// no longer pending, or a second bid by the same provider.
    pub async fn submit(
        &self,
        actor: Actor,
        request_id: RequestId,
        price: &str,
        message: Option<String>,
    ) -> WorkflowResult<NewProposal> {
        if !access::submit_proposal(&actor).is_granted() {
            return Err(WorkflowError::Forbidden("submit proposals"));
        }
        let proposed_price = ProposedPrice::parse(price)?;
        let proposal = NewProposal::new(request_id, actor.id(), proposed_price, message, &*self.clock);

        let clock = Arc::clone(&self.clock);
        let templates = Arc::clone(&self.templates);
        let submitted = proposal.clone();
        self.repository
            .with_request_locked(request_id, move |workspace| {
                let client_id = workspace.request().client_id();
                let mut context = Map::new();
                context.insert("request_id".to_owned(), Value::from(request_id.value()));
                context.insert(
                    "category".to_owned(),
                    Value::from(workspace.request().category()),
                );
                context.insert("price".to_owned(), Value::from(proposal.price().to_string()));
                context.insert(
                    "provider_id".to_owned(),
                    Value::from(proposal.provider_id().value()),
                );

                workspace.submit_proposal(proposal)?;
                workspace.enqueue(templates.compose(
                    NotificationKind::ProposalReceived,
                    client_id,
                    context,
                    &*clock,
                )?);
                Ok::<_, WorkflowError>(())
            })
            .await?;

        tracing::info!(
            provider_id = %actor.id(),
            request_id = %request_id,
            price = %submitted.price(),
            "proposal submitted"
        );
        Ok(submitted)
    }

    /// Withdraws a proposal in any status.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::ProposalNotFound`] for missing proposals,
    /// [`WorkflowError::Forbidden`] unless the actor submitted it or is an
    /// admin, and [`WorkflowError::TransactionFailed`] when storage fails.
    pub async fn withdraw(&self, actor: Actor, proposal_id: ProposalId) -> WorkflowResult<()> {
        let proposal = self
            .repository
            .find_proposal(proposal_id)
            .await?
            .ok_or(WorkflowError::ProposalNotFound(proposal_id))?;
        if !access::withdraw_proposal(&actor, &proposal).is_granted() {
            return Err(WorkflowError::Forbidden("withdraw this proposal"));
        }

        self.repository
            .with_request_locked(proposal.request_id(), move |workspace| {
                if workspace.proposal(proposal_id).is_none() {
                    return Err(WorkflowError::ProposalNotFound(proposal_id));
                }
                workspace.withdraw_proposal(proposal_id)?;
                Ok(())
            })
            .await?;

        tracing::info!(
            actor_id = %actor.id(),
            proposal_id = %proposal_id,
            request_id = %proposal.request_id(),
            "proposal withdrawn"
        );
        Ok(())
    }
}
