//! Authorization rules for marketplace operations.
//!
//! Each function answers one question about one operation. A
//! [`AccessDecision::Hidden`] outcome means the actor must not learn that the
//! resource exists, so callers report it as not found.

use super::{Actor, Proposal, RequestStatus, Role, ServiceRequest, UserId};

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    /// The actor may proceed.
    Granted,
    /// The actor can see the resource but may not perform the operation.
    Forbidden,
    /// The resource is not visible to the actor.
    Hidden,
}

impl AccessDecision {
    const fn from_flag(allowed: bool, denied: Self) -> Self {
        if allowed { Self::Granted } else { denied }
    }

    /// Returns `true` for [`AccessDecision::Granted`].
    #[must_use]
    pub const fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }
}

/// Which proposals of a request an actor may list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalVisibility {
    /// Every proposal.
    All,
    /// Only proposals submitted by this provider.
    OwnOnly(UserId),
}

impl ProposalVisibility {
    /// Returns `true` when `proposal` is visible.
    #[must_use]
    pub fn shows(self, proposal: &Proposal) -> bool {
        match self {
            Self::All => true,
            Self::OwnOnly(provider_id) => proposal.provider_id() == provider_id,
        }
    }
}

/// Only the owning client or an admin may accept or reject proposals.
#[must_use]
pub fn resolve_proposal(actor: &Actor, request: &ServiceRequest) -> AccessDecision {
    AccessDecision::from_flag(
        actor.is_admin() || request.is_owned_by(actor.id()),
        AccessDecision::Forbidden,
    )
}

/// Clients never drive request status. Providers only see requests assigned
/// to them.
#[must_use]
pub fn set_request_status(actor: &Actor, request: &ServiceRequest) -> AccessDecision {
    match actor.role() {
        Role::Admin => AccessDecision::Granted,
        Role::Client => AccessDecision::Forbidden,
        Role::Provider => {
            AccessDecision::from_flag(request.is_assigned_to(actor.id()), AccessDecision::Hidden)
        }
    }
}

/// Only providers bid on requests.
#[must_use]
pub const fn submit_proposal(actor: &Actor) -> AccessDecision {
    AccessDecision::from_flag(
        matches!(actor.role(), Role::Provider),
        AccessDecision::Forbidden,
    )
}

/// The submitting provider or an admin may withdraw a proposal.
#[must_use]
pub fn withdraw_proposal(actor: &Actor, proposal: &Proposal) -> AccessDecision {
    AccessDecision::from_flag(
        actor.is_admin() || proposal.provider_id() == actor.id(),
        AccessDecision::Forbidden,
    )
}

/// Clients and admins post requests.
#[must_use]
pub const fn create_request(actor: &Actor) -> AccessDecision {
    AccessDecision::from_flag(
        matches!(actor.role(), Role::Client | Role::Admin),
        AccessDecision::Forbidden,
    )
}

/// Open requests are visible to every provider; otherwise only the parties
/// and admins see them.
#[must_use]
pub fn view_request(actor: &Actor, request: &ServiceRequest) -> AccessDecision {
    let visible = match actor.role() {
        Role::Admin => true,
        Role::Client => request.is_owned_by(actor.id()),
        Role::Provider => {
            request.is_assigned_to(actor.id()) || request.status() == RequestStatus::Pending
        }
    };
    AccessDecision::from_flag(visible, AccessDecision::Hidden)
}

/// The owning client or an admin may delete a request.
#[must_use]
pub fn delete_request(actor: &Actor, request: &ServiceRequest) -> AccessDecision {
    if actor.is_admin() || request.is_owned_by(actor.id()) {
        return AccessDecision::Granted;
    }
    match view_request(actor, request) {
        AccessDecision::Granted => AccessDecision::Forbidden,
        denied => denied,
    }
}

/// Returns which proposals the actor may list, or `None` when the request is
/// hidden from them.
#[must_use]
pub fn proposal_visibility(actor: &Actor, request: &ServiceRequest) -> Option<ProposalVisibility> {
    if actor.is_admin() || request.is_owned_by(actor.id()) {
        return Some(ProposalVisibility::All);
    }
    match actor.role() {
        Role::Provider if view_request(actor, request).is_granted() => {
            Some(ProposalVisibility::OwnOnly(actor.id()))
        }
        _ => None,
    }
}
