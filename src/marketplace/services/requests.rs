//! Request management: posting, viewing, listing bids, and deleting.

use super::error::{WorkflowError, WorkflowResult};
use crate::marketplace::{
    domain::{
        AccessDecision, Actor, Appointment, NewServiceRequest, Proposal, RequestId,
        ServiceRequest, Urgency, UserId, access,
    },
    ports::MarketplaceRepository,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::Serialize;
use std::sync::Arc;

/// Caller-supplied fields for a new request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestDraft {
    /// Service category.
    pub category: String,
    /// Free-text description.
    pub description: String,
    /// Work location.
    pub location: Option<String>,
    /// Free-text budget.
    pub budget: Option<String>,
    /// Urgency; defaults to medium.
    pub urgency: Option<Urgency>,
    /// Preferred appointment time.
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Provider to book directly, skipping the bidding stage.
    pub provider_id: Option<UserId>,
}

/// A request together with its appointment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestView {
    /// The request.
    #[serde(flatten)]
    pub request: ServiceRequest,
    /// The appointment, once one was scheduled.
    pub appointment: Option<Appointment>,
}

/// Request management service.
pub struct RequestService<R, C>
where
    R: MarketplaceRepository,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    clock: Arc<C>,
}

impl<R, C> Clone for RequestService<R, C>
where
    R: MarketplaceRepository,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<R, C> RequestService<R, C>
where
    R: MarketplaceRepository,
    C: Clock + Send + Sync,
{
    /// Creates a new request service.
    #[must_use]
    pub const fn new(repository: Arc<R>, clock: Arc<C>) -> Self {
        Self { repository, clock }
    }

    /// Posts a new pending request owned by the actor.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::Forbidden`] for providers and
    /// [`WorkflowError::Domain`] when the category or description is blank.
    pub async fn create(&self, actor: Actor, draft: RequestDraft) -> WorkflowResult<ServiceRequest> {
        if !access::create_request(&actor).is_granted() {
            return Err(WorkflowError::Forbidden("post service requests"));
        }

        let RequestDraft {
            category,
            description,
            location,
            budget,
            urgency,
            scheduled_at,
            provider_id,
        } = draft;
        let mut new_request = NewServiceRequest::new(actor.id(), category, description, &*self.clock)?
            .with_urgency(urgency.unwrap_or_default());
        if let Some(place) = location {
            new_request = new_request.with_location(place);
        }
        if let Some(amount) = budget {
            new_request = new_request.with_budget(amount);
        }
        if let Some(at) = scheduled_at {
            new_request = new_request.with_scheduled_at(at);
        }
        if let Some(provider) = provider_id {
            new_request = new_request.with_provider(provider);
        }

        let stored = self.repository.insert_request(new_request).await?;
        tracing::info!(
            request_id = %stored.id(),
            client_id = %stored.client_id(),
            category = stored.category(),
            "service request created"
        );
        Ok(stored)
    }

    /// Returns a request visible to the actor.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::RequestNotFound`] when the request is missing
    /// or hidden from the actor.
    pub async fn get(&self, actor: Actor, request_id: RequestId) -> WorkflowResult<RequestView> {
        let request = self.visible_request(&actor, request_id).await?;
        let appointment = self.repository.find_appointment(request_id).await?;
        Ok(RequestView {
            request,
            appointment,
        })
    }

    /// Lists the proposals of a request that the actor may see.
    ///
    /// Owners and admins see every proposal; providers see only their own.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::RequestNotFound`] when the request is missing
    /// or hidden from the actor.
    pub async fn list_proposals(
        &self,
        actor: Actor,
        request_id: RequestId,
    ) -> WorkflowResult<Vec<Proposal>> {
        let request = self
            .repository
            .find_request(request_id)
            .await?
            .ok_or(WorkflowError::RequestNotFound(request_id))?;
        let visibility = access::proposal_visibility(&actor, &request)
            .ok_or(WorkflowError::RequestNotFound(request_id))?;
        let proposals = self.repository.list_proposals(request_id).await?;
        Ok(proposals
            .into_iter()
            .filter(|proposal| visibility.shows(proposal))
            .collect())
    }

    /// Deletes a request and everything attached to it.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::RequestNotFound`] when the request is missing
    /// or hidden, and [`WorkflowError::Forbidden`] when the actor neither owns
    /// it nor is an admin.
    pub async fn delete(&self, actor: Actor, request_id: RequestId) -> WorkflowResult<()> {
        let request = self
            .repository
            .find_request(request_id)
            .await?
            .ok_or(WorkflowError::RequestNotFound(request_id))?;
        match access::delete_request(&actor, &request) {
            AccessDecision::Granted => {}
            AccessDecision::Forbidden => return Err(WorkflowError::Forbidden("delete this request")),
            AccessDecision::Hidden => return Err(WorkflowError::RequestNotFound(request_id)),
        }
        self.repository.delete_request(request_id).await?;
        tracing::info!(actor_id = %actor.id(), request_id = %request_id, "service request deleted");
        Ok(())
    }

    async fn visible_request(
        &self,
        actor: &Actor,
        request_id: RequestId,
    ) -> WorkflowResult<ServiceRequest> {
        let request = self
            .repository
            .find_request(request_id)
            .await?
            .filter(|candidate| access::view_request(actor, candidate).is_granted())
            .ok_or(WorkflowError::RequestNotFound(request_id))?;
        Ok(request)
    }
}
