//! Error types for marketplace domain validation and parsing.

use super::{ProposalId, RequestId, RequestStatus};
use thiserror::Error;

/// Errors returned while constructing or mutating marketplace domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MarketplaceDomainError {
    /// The request state machine does not allow the transition.
    #[error("request {request_id} cannot transition from {from} to {to}")]
    InvalidStateTransition {
        /// Request being transitioned.
        request_id: RequestId,
        /// Current request status.
        from: RequestStatus,
        /// Requested target status.
        to: RequestStatus,
    },

    /// The proposal is not part of the request being worked on.
    #[error("proposal {proposal_id} does not belong to request {request_id}")]
    UnknownProposal {
        /// Request whose proposals were searched.
        request_id: RequestId,
        /// Proposal that was not found.
        proposal_id: ProposalId,
    },

    /// The request no longer accepts new proposals.
    #[error("request {0} is not open for proposals")]
    RequestNotOpen(RequestId),

    /// The request has no assigned provider to schedule work with.
    #[error("request {0} has no assigned provider")]
    MissingProvider(RequestId),

    /// The provider already submitted a proposal for the request.
    #[error("provider already submitted a proposal for request {0}")]
    DuplicateProposal(RequestId),

    /// The proposed price is zero or negative.
    #[error("proposed price must be greater than zero, got {0}")]
    InvalidPrice(String),

    /// The request category is empty after trimming.
    #[error("request category must not be empty")]
    EmptyCategory,

    /// The request description is empty after trimming.
    #[error("request description must not be empty")]
    EmptyDescription,

    /// The notification title is empty after trimming.
    #[error("notification title must not be empty")]
    EmptyNotificationTitle,

    /// The notification targets no delivery channel.
    #[error("notification must target at least one channel")]
    NoNotificationChannels,
}

/// Error returned while parsing a closed marketplace enumeration from text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind}: {value}")]
pub struct ParseValueError {
    /// Name of the enumeration being parsed.
    pub kind: &'static str,
    /// Raw value that failed to parse.
    pub value: String,
}

impl ParseValueError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}
