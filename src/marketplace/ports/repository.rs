//! Repository ports for requests, proposals, and the notification outbox.

use crate::marketplace::domain::{
    Appointment, NewServiceRequest, Notification, NotificationId, Proposal, ProposalId,
    RequestId, RequestWorkspace, ServiceRequest, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Result type for marketplace repository operations.
pub type MarketplaceRepositoryResult<T> = Result<T, MarketplaceRepositoryError>;

/// Request and proposal persistence contract.
///
/// Every state-changing workflow goes through
/// [`MarketplaceRepository::with_request_locked`]; the remaining methods are
/// plain reads and single-row writes.
#[async_trait]
pub trait MarketplaceRepository: Send + Sync {
    /// Stores a new request and returns it with its assigned identifier.
    ///
    /// # Errors
    ///
    /// Returns [`MarketplaceRepositoryError::Persistence`] when storage fails.
    async fn insert_request(
        &self,
        request: NewServiceRequest,
    ) -> MarketplaceRepositoryResult<ServiceRequest>;

    /// Finds a request by identifier.
    ///
    /// Returns `None` when the request does not exist.
    async fn find_request(&self, id: RequestId)
    -> MarketplaceRepositoryResult<Option<ServiceRequest>>;

    /// Deletes a request together with its proposals and appointment.
    ///
    /// Notifications already written stay in the recipients' inboxes.
    ///
    /// # Errors
    ///
    /// Returns [`MarketplaceRepositoryError::RequestNotFound`] when the
    /// request does not exist.
    async fn delete_request(&self, id: RequestId) -> MarketplaceRepositoryResult<()>;

    /// Finds a proposal by identifier.
    ///
    /// Returns `None` when the proposal does not exist.
    async fn find_proposal(&self, id: ProposalId) -> MarketplaceRepositoryResult<Option<Proposal>>;

    /// Returns the proposals of a request, oldest first.
    async fn list_proposals(&self, request_id: RequestId)
    -> MarketplaceRepositoryResult<Vec<Proposal>>;

    /// Returns the appointment of a request, if one was scheduled.
    async fn find_appointment(
        &self,
        request_id: RequestId,
    ) -> MarketplaceRepositoryResult<Option<Appointment>>;

    /// Runs `work` against the request with the request row locked.
    ///
    /// The request, its proposals, and its appointment are loaded inside one
    /// transaction. When `work` succeeds its recorded changes are persisted
    /// and committed before the lock is released; when it fails nothing is
    /// written. Concurrent units of work on the same request are serialized.
    ///
    /// # Errors
    ///
    /// Returns `work`'s error unchanged, or a converted
    /// [`MarketplaceRepositoryError::RequestNotFound`] or
    /// [`MarketplaceRepositoryError::Persistence`].
    async fn with_request_locked<T, E, F>(&self, request_id: RequestId, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut RequestWorkspace) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<MarketplaceRepositoryError> + Send + 'static;
}

/// Notification outbox contract.
#[async_trait]
pub trait NotificationOutbox: Send + Sync {
    /// Returns a recipient's notifications, newest first.
    async fn list_notifications(
        &self,
        recipient: UserId,
        unread_only: bool,
    ) -> MarketplaceRepositoryResult<Vec<Notification>>;

    /// Sets the read timestamp of a recipient's notification.
    ///
    /// An already read notification keeps its original timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`MarketplaceRepositoryError::NotificationNotFound`] when the
    /// notification does not exist or belongs to someone else.
    async fn mark_notification_read(
        &self,
        id: NotificationId,
        recipient: UserId,
        read_at: DateTime<Utc>,
    ) -> MarketplaceRepositoryResult<Notification>;

    /// Returns up to `limit` pending notifications with fewer than
    /// `max_attempts` delivery attempts, oldest first.
    async fn pending_notifications(
        &self,
        limit: usize,
        max_attempts: u32,
    ) -> MarketplaceRepositoryResult<Vec<Notification>>;

    /// Stores the delivery bookkeeping of a notification.
    ///
    /// # Errors
    ///
    /// Returns [`MarketplaceRepositoryError::NotificationNotFound`] when the
    /// notification no longer exists.
    async fn record_delivery(&self, notification: &Notification)
    -> MarketplaceRepositoryResult<()>;
}

/// Storage backend offering both the repository and the outbox.
pub trait MarketplaceStore: MarketplaceRepository + NotificationOutbox + 'static {}

impl<T> MarketplaceStore for T where T: MarketplaceRepository + NotificationOutbox + 'static {}

/// Errors returned by marketplace repository implementations.
#[derive(Debug, Clone, Error)]
pub enum MarketplaceRepositoryError {
    /// The request was not found.
    #[error("request not found: {0}")]
    RequestNotFound(RequestId),

    /// The proposal was not found.
    #[error("proposal not found: {0}")]
    ProposalNotFound(ProposalId),

    /// The notification was not found for the recipient.
    #[error("notification not found: {0}")]
    NotificationNotFound(NotificationId),

    /// The provider already has a proposal on the request.
    #[error("provider {provider_id} already submitted a proposal for request {request_id}")]
    DuplicateProposal {
        /// Request bid on.
        request_id: RequestId,
        /// Provider who bid twice.
        provider_id: UserId,
    },

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl MarketplaceRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
