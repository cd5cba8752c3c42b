//! Unit-of-work view over one request and everything that hangs off it.
//!
//! Repositories load a [`RequestWorkspace`] while holding the request lock,
//! hand it to the caller's closure, then persist [`WorkspaceChanges`] in the
//! same transaction. Nothing is written when the closure fails.

use super::{
    Appointment, MarketplaceDomainError, NewNotification, NewProposal, Proposal, ProposalId,
    ProposalStatus, RequestStatus, ServiceRequest, UserId,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use std::collections::BTreeSet;

/// Mutable snapshot of a locked request.
#[derive(Debug, Clone)]
pub struct RequestWorkspace {
    request: ServiceRequest,
    proposals: Vec<Proposal>,
    appointment: Option<Appointment>,
    request_changed: bool,
    changed_proposals: BTreeSet<ProposalId>,
    new_proposals: Vec<NewProposal>,
    withdrawn_proposals: Vec<ProposalId>,
    appointment_changed: bool,
    outbox: Vec<NewNotification>,
}

/// Everything a unit of work needs to write back.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceChanges {
    /// Updated request, when it changed.
    pub request: Option<ServiceRequest>,
    /// Existing proposals whose status changed.
    pub proposals: Vec<Proposal>,
    /// Proposals to insert.
    pub new_proposals: Vec<NewProposal>,
    /// Proposals to delete.
    pub withdrawn_proposals: Vec<ProposalId>,
    /// Appointment to upsert by request id.
    pub appointment: Option<Appointment>,
    /// Notifications to append to the outbox.
    pub notifications: Vec<NewNotification>,
}

impl WorkspaceChanges {
    /// Returns `true` when nothing needs writing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.request.is_none()
            && self.proposals.is_empty()
            && self.new_proposals.is_empty()
            && self.withdrawn_proposals.is_empty()
            && self.appointment.is_none()
            && self.notifications.is_empty()
    }
}

impl RequestWorkspace {
    /// Wraps freshly loaded state.
    #[must_use]
    pub const fn new(
        request: ServiceRequest,
        proposals: Vec<Proposal>,
        appointment: Option<Appointment>,
    ) -> Self {
        Self {
            request,
            proposals,
            appointment,
            request_changed: false,
            changed_proposals: BTreeSet::new(),
            new_proposals: Vec::new(),
            withdrawn_proposals: Vec::new(),
            appointment_changed: false,
            outbox: Vec::new(),
        }
    }

    /// Returns the locked request.
    #[must_use]
    pub const fn request(&self) -> &ServiceRequest {
        &self.request
    }

    /// Returns the request's proposals, including pending changes.
    #[must_use]
    pub fn proposals(&self) -> &[Proposal] {
        &self.proposals
    }

    /// Returns the proposal with `id`, if it belongs to the request.
    #[must_use]
    pub fn proposal(&self, id: ProposalId) -> Option<&Proposal> {
        self.proposals.iter().find(|proposal| proposal.id() == id)
    }

    /// Returns the request's appointment, if any.
    #[must_use]
    pub const fn appointment(&self) -> Option<&Appointment> {
        self.appointment.as_ref()
    }

    /// Returns the notifications queued so far.
    #[must_use]
    pub fn outbox(&self) -> &[NewNotification] {
        &self.outbox
    }

    /// Accepts one proposal and rejects every sibling.
    ///
    /// The request is assigned to the proposal's provider and moves to
    /// `in_progress`. When the request carries a scheduled time, the
    /// appointment is confirmed for it.
    ///
    /// # Errors
    ///
    /// Returns [`MarketplaceDomainError::UnknownProposal`] when the proposal is
    /// not part of the request, or
    /// [`MarketplaceDomainError::InvalidStateTransition`] when the request can
    /// no longer move to `in_progress`. Nothing changes on error.
    pub fn accept_proposal(
        &mut self,
        proposal_id: ProposalId,
        clock: &impl Clock,
    ) -> Result<&Proposal, MarketplaceDomainError> {
        let provider_id = self.require_proposal(proposal_id)?.provider_id();

        let mut request = self.request.clone();
        request.transition_to(RequestStatus::InProgress, clock)?;
        request.assign_provider(provider_id, clock);
        let scheduled_at = request.scheduled_at();
        self.replace_request(request);

        for proposal in &mut self.proposals {
            let target = if proposal.id() == proposal_id {
                ProposalStatus::Accepted
            } else {
                ProposalStatus::Rejected
            };
            if proposal.status() != target {
                proposal.set_status(target, clock);
                self.changed_proposals.insert(proposal.id());
            }
        }

        if let Some(at) = scheduled_at {
            self.confirm_appointment(provider_id, at, clock);
        }

        self.require_proposal(proposal_id)
    }

    /// Rejects a single proposal; siblings and the request are untouched.
    ///
    /// # Errors
    ///
    /// Returns [`MarketplaceDomainError::UnknownProposal`] when the proposal is
    /// not part of the request.
    pub fn reject_proposal(
        &mut self,
        proposal_id: ProposalId,
        clock: &impl Clock,
    ) -> Result<&Proposal, MarketplaceDomainError> {
        let request_id = self.request.id();
        let proposal = self
            .proposals
            .iter_mut()
            .find(|candidate| candidate.id() == proposal_id)
            .ok_or(MarketplaceDomainError::UnknownProposal {
                request_id,
                proposal_id,
            })?;
        let before = proposal.status();
        proposal.reject(clock);
        if proposal.status() != before {
            self.changed_proposals.insert(proposal_id);
        }
        self.require_proposal(proposal_id)
    }

    /// Applies a status chosen by the assigned provider or an admin.
    ///
    /// A supplied `scheduled_at` replaces the request's scheduled time before
    /// the transition. Accepting inserts the appointment or, when one exists,
    /// updates its time and confirms it again. Completing marks it completed.
    /// Rejecting or reopening as `pending` cancels it.
    ///
    /// # Errors
    ///
    /// Returns [`MarketplaceDomainError::MissingProvider`] when accepting an
    /// unassigned request and
    /// [`MarketplaceDomainError::InvalidStateTransition`] for edges outside the
    /// transition table.
    pub fn apply_status(
        &mut self,
        target: RequestStatus,
        scheduled_at: Option<DateTime<Utc>>,
        clock: &impl Clock,
    ) -> Result<(), MarketplaceDomainError> {
        let assigned = self.request.provider_id();
        if target == RequestStatus::Accepted && assigned.is_none() {
            return Err(MarketplaceDomainError::MissingProvider(self.request.id()));
        }

        let mut request = self.request.clone();
        if let Some(at) = scheduled_at {
            request.reschedule(at, clock);
        }
        request.transition_to(target, clock)?;
        let appointment_time = request.scheduled_at();
        self.replace_request(request);

        match (target, assigned) {
            (RequestStatus::Accepted, Some(provider_id)) => {
                let at = appointment_time.unwrap_or_else(|| clock.utc());
                self.confirm_appointment(provider_id, at, clock);
            }
            (RequestStatus::Completed, _) => {
                if let Some(appointment) = self.appointment.as_mut() {
                    appointment.complete(clock);
                    self.appointment_changed = true;
                }
            }
            (RequestStatus::Rejected | RequestStatus::Pending, _) => {
                if let Some(appointment) = self.appointment.as_mut() {
                    appointment.cancel(clock);
                    self.appointment_changed = true;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Queues a new proposal for insertion.
    ///
    /// # Errors
    ///
    /// Returns [`MarketplaceDomainError::RequestNotOpen`] unless the request
    /// is pending, and [`MarketplaceDomainError::DuplicateProposal`] when the
    /// provider already bid on it.
    pub fn submit_proposal(&mut self, proposal: NewProposal) -> Result<(), MarketplaceDomainError> {
        let request_id = self.request.id();
        if !self.request.status().is_open() {
            return Err(MarketplaceDomainError::RequestNotOpen(request_id));
        }
        let provider_id = proposal.provider_id();
        if self.has_bid_from(provider_id) {
            return Err(MarketplaceDomainError::DuplicateProposal(request_id));
        }
        self.new_proposals.push(proposal);
        Ok(())
    }

    /// Removes a proposal at its provider's request, whatever its status.
    ///
    /// # Errors
    ///
    /// Returns [`MarketplaceDomainError::UnknownProposal`] when the proposal is
    /// not part of the request.
    pub fn withdraw_proposal(&mut self, proposal_id: ProposalId) -> Result<Proposal, MarketplaceDomainError> {
        let position = self
            .proposals
            .iter()
            .position(|candidate| candidate.id() == proposal_id)
            .ok_or(MarketplaceDomainError::UnknownProposal {
                request_id: self.request.id(),
                proposal_id,
            })?;
        let removed = self.proposals.remove(position);
        self.changed_proposals.remove(&proposal_id);
        self.withdrawn_proposals.push(proposal_id);
        Ok(removed)
    }

    /// Queues a notification to be written with the other changes.
    pub fn enqueue(&mut self, notification: NewNotification) {
        self.outbox.push(notification);
    }

    /// Consumes the workspace and returns the changes to persist.
    #[must_use]
    pub fn into_changes(self) -> WorkspaceChanges {
        let Self {
            request,
            proposals,
            appointment,
            request_changed,
            changed_proposals,
            new_proposals,
            withdrawn_proposals,
            appointment_changed,
            outbox,
        } = self;

        WorkspaceChanges {
            request: request_changed.then_some(request),
            proposals: proposals
                .into_iter()
                .filter(|proposal| changed_proposals.contains(&proposal.id()))
                .collect(),
            new_proposals,
            withdrawn_proposals,
            appointment: appointment.filter(|_| appointment_changed),
            notifications: outbox,
        }
    }

    fn require_proposal(&self, proposal_id: ProposalId) -> Result<&Proposal, MarketplaceDomainError> {
        self.proposal(proposal_id)
            .ok_or(MarketplaceDomainError::UnknownProposal {
                request_id: self.request.id(),
                proposal_id,
            })
    }

    fn has_bid_from(&self, provider_id: UserId) -> bool {
        self.proposals
            .iter()
            .any(|proposal| proposal.provider_id() == provider_id)
            || self
                .new_proposals
                .iter()
                .any(|proposal| proposal.provider_id() == provider_id)
    }

    fn replace_request(&mut self, request: ServiceRequest) {
        self.request = request;
        self.request_changed = true;
    }

    fn confirm_appointment(&mut self, provider_id: UserId, at: DateTime<Utc>, clock: &impl Clock) {
        let request_id = self.request.id();
        let client_id = self.request.client_id();
        match &mut self.appointment {
            Some(appointment) => appointment.reconfirm(provider_id, at, clock),
            slot @ None => {
                *slot = Some(Appointment::confirmed(
                    request_id,
                    provider_id,
                    client_id,
                    at,
                    clock,
                ));
            }
        }
        self.appointment_changed = true;
    }
}
