//! Request status workflow driven by the assigned provider or an admin.

use super::error::{WorkflowError, WorkflowResult};
use super::templates::NotificationTemplates;
use crate::marketplace::{
    domain::{
        AccessDecision, Actor, NotificationKind, RequestId, RequestStatus, ServiceRequest, UserId,
        access,
    },
    ports::MarketplaceRepository,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Statuses a direct status update may target.
pub const SETTABLE_STATUSES: [RequestStatus; 4] = [
    RequestStatus::Pending,
    RequestStatus::Accepted,
    RequestStatus::Rejected,
    RequestStatus::Completed,
];

/// Raw status update as received from a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    status: String,
    scheduled_at: Option<DateTime<Utc>>,
}

impl StatusUpdate {
    /// Creates an update to `status`.
    #[must_use]
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            scheduled_at: None,
        }
    }

    /// Sets the appointment time to apply with the update.
    #[must_use]
    pub const fn with_scheduled_at(mut self, scheduled_at: Option<DateTime<Utc>>) -> Self {
        self.scheduled_at = scheduled_at;
        self
    }

    fn target(&self) -> WorkflowResult<RequestStatus> {
        RequestStatus::try_from(self.status.as_str())
            .ok()
            .filter(|status| SETTABLE_STATUSES.contains(status))
            .ok_or_else(|| WorkflowError::InvalidStatus(self.status.clone()))
    }
}

/// Moves requests through the state machine on the provider side.
pub struct RequestStatusService<R, C>
where
    R: MarketplaceRepository,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    clock: Arc<C>,
    templates: Arc<NotificationTemplates>,
}

impl<R, C> Clone for RequestStatusService<R, C>
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

impl<R, C> RequestStatusService<R, C>
where
    R: MarketplaceRepository,
    C: Clock + Send + Sync + 'static,
{
    /// Creates a new status service.
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

    /// Applies a status update and returns the updated request.
    ///
    /// Accepting upserts a confirmed appointment and completing marks it
    /// completed. Rejecting or reopening as `pending` cancels it. The counterpart of the actor is
    /// notified through the outbox.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::InvalidStatus`] for values outside
    /// [`SETTABLE_STATUSES`], [`WorkflowError::RequestNotFound`] when the
    /// request is missing or not assigned to the acting provider,
    /// [`WorkflowError::Forbidden`] for clients, [`WorkflowError::Domain`]
    /// for refused transitions, and [`WorkflowError::TransactionFailed`] when
    /// storage fails.
    pub async fn set_status(
        &self,
        actor: Actor,
        request_id: RequestId,
        update: StatusUpdate,
    ) -> WorkflowResult<ServiceRequest> {
        let target = update.target()?;
        let scheduled_at = update.scheduled_at;
        let clock = Arc::clone(&self.clock);
        let templates = Arc::clone(&self.templates);

        let outcome = self
            .repository
            .with_request_locked(request_id, move |workspace| {
                match access::set_request_status(&actor, workspace.request()) {
                    AccessDecision::Granted => {}
                    AccessDecision::Forbidden => {
                        return Err(WorkflowError::Forbidden("change the status of this request"));
                    }
                    AccessDecision::Hidden => return Err(WorkflowError::RequestNotFound(request_id)),
                }

                workspace.apply_status(target, scheduled_at, &*clock)?;
                let request = workspace.request().clone();

                if let Some(recipient) = counterpart(&actor, &request) {
                    let mut context = Map::new();
                    context.insert("request_id".to_owned(), Value::from(request_id.value()));
                    context.insert("category".to_owned(), Value::from(request.category()));
                    context.insert("status".to_owned(), Value::from(target.as_str()));
                    workspace.enqueue(templates.compose(
                        NotificationKind::RequestStatusChanged,
                        recipient,
                        context,
                        &*clock,
                    )?);
                }
                Ok(request)
            })
            .await;

        match &outcome {
            Ok(request) => tracing::info!(
                actor_id = %actor.id(),
                request_id = %request_id,
                status = %request.status(),
                "request status updated"
            ),
            Err(err) => tracing::warn!(
                actor_id = %actor.id(),
                request_id = %request_id,
                target = target.as_str(),
                error = %err,
                "request status update refused"
            ),
        }
        outcome
    }
}

/// The party to notify: the client, unless the client is the actor, in which
/// case the assigned provider.
fn counterpart(actor: &Actor, request: &ServiceRequest) -> Option<UserId> {
    if request.is_owned_by(actor.id()) {
        request.provider_id().filter(|provider| *provider != actor.id())
    } else {
        Some(request.client_id())
    }
}
