//! Service-level errors shared by marketplace workflows.

use crate::marketplace::{
    domain::{MarketplaceDomainError, NotificationId, ProposalId, RequestId},
    ports::MarketplaceRepositoryError,
};
use std::sync::Arc;
use thiserror::Error;

/// Errors returned by marketplace services.
#[derive(Debug, Clone, Error)]
pub enum WorkflowError {
    /// The request does not exist or is hidden from the actor.
    #[error("request not found: {0}")]
    RequestNotFound(RequestId),

    /// The proposal does not exist.
    #[error("proposal not found: {0}")]
    ProposalNotFound(ProposalId),

    /// The notification does not exist for the actor.
    #[error("notification not found: {0}")]
    NotificationNotFound(NotificationId),

    /// The actor is authenticated but not entitled to the operation.
    #[error("not allowed to {0}")]
    Forbidden(&'static str),

    /// The proposal action is neither `accept` nor `reject`.
    #[error("invalid proposal action: {0}")]
    InvalidAction(String),

    /// The status is outside the values a status update may set.
    #[error("invalid request status: {0}")]
    InvalidStatus(String),

    /// Domain validation or a state transition failed.
    #[error(transparent)]
    Domain(#[from] MarketplaceDomainError),

    /// The unit of work was rolled back because storage failed.
    #[error("transaction failed: {0}")]
    TransactionFailed(Arc<dyn std::error::Error + Send + Sync>),

    /// A notification template could not be rendered.
    #[error("notification template failed: {0}")]
    Template(String),
}

impl From<MarketplaceRepositoryError> for WorkflowError {
    fn from(err: MarketplaceRepositoryError) -> Self {
        match err {
            MarketplaceRepositoryError::RequestNotFound(id) => Self::RequestNotFound(id),
            MarketplaceRepositoryError::ProposalNotFound(id) => Self::ProposalNotFound(id),
            MarketplaceRepositoryError::NotificationNotFound(id) => Self::NotificationNotFound(id),
            MarketplaceRepositoryError::DuplicateProposal { request_id, .. } => {
                Self::Domain(MarketplaceDomainError::DuplicateProposal(request_id))
            }
            MarketplaceRepositoryError::Persistence(source) => Self::TransactionFailed(source),
        }
    }
}

/// Result type for marketplace service operations.
pub type WorkflowResult<T> = Result<T, WorkflowError>;
