//! Service request aggregate and the request status state machine.

use super::{MarketplaceDomainError, ParseValueError, RequestId, UserId};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a service request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Posted and open for proposals.
    Pending,
    /// Confirmed by the assigned provider.
    Accepted,
    /// A proposal was accepted and work is under way.
    InProgress,
    /// Work has been delivered.
    Completed,
    /// Declined by the assigned provider.
    Rejected,
    /// Withdrawn before completion.
    Cancelled,
}

impl RequestStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns whether the transition table allows moving to `target`.
    ///
    /// Every request status change goes through this table. `accepted` may
    /// be re-entered so a confirmed booking can be rescheduled, and an active
    /// request may fall back to `pending` to reopen it for bids. Terminal
    /// states have no outgoing edges.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (
                Self::Pending,
                Self::Accepted | Self::InProgress | Self::Rejected | Self::Cancelled
            ) | (
                Self::Accepted,
                Self::Pending
                    | Self::Accepted
                    | Self::InProgress
                    | Self::Completed
                    | Self::Rejected
                    | Self::Cancelled
            ) | (
                Self::InProgress,
                Self::Pending | Self::Accepted | Self::Completed | Self::Cancelled
            )
        )
    }

    /// Returns `true` when no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Rejected | Self::Cancelled)
    }

    /// Returns `true` while the request accepts new proposals.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Pending)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for RequestStatus {
    type Error = ParseValueError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "rejected" => Ok(Self::Rejected),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(ParseValueError::new("request status", value)),
        }
    }
}

/// How soon the client needs the work done.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    /// No particular rush.
    Low,
    /// Normal priority.
    #[default]
    Medium,
    /// Needed as soon as possible.
    High,
}

impl Urgency {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl TryFrom<&str> for Urgency {
    type Error = ParseValueError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(ParseValueError::new("urgency", value)),
        }
    }
}

/// A validated service request that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewServiceRequest {
    client_id: UserId,
    provider_id: Option<UserId>,
    category: String,
    description: String,
    location: Option<String>,
    budget: Option<String>,
    urgency: Urgency,
    scheduled_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl NewServiceRequest {
    /// Creates a pending request for a client.
    ///
    /// # Errors
    ///
    /// Returns [`MarketplaceDomainError::EmptyCategory`] or
    /// [`MarketplaceDomainError::EmptyDescription`] when either field is
    /// blank.
    pub fn new(
        client_id: UserId,
        category: impl Into<String>,
        description: impl Into<String>,
        clock: &impl Clock,
    ) -> Result<Self, MarketplaceDomainError> {
        let category_text = category.into().trim().to_owned();
        if category_text.is_empty() {
            return Err(MarketplaceDomainError::EmptyCategory);
        }
        let description_text = description.into().trim().to_owned();
        if description_text.is_empty() {
            return Err(MarketplaceDomainError::EmptyDescription);
        }

        Ok(Self {
            client_id,
            provider_id: None,
            category: category_text,
            description: description_text,
            location: None,
            budget: None,
            urgency: Urgency::default(),
            scheduled_at: None,
            created_at: clock.utc(),
        })
    }

    /// Books the request directly with a provider.
    #[must_use]
    pub const fn with_provider(mut self, provider_id: UserId) -> Self {
        self.provider_id = Some(provider_id);
        self
    }

    /// Sets where the work takes place.
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = non_blank(location.into());
        self
    }

    /// Sets the free-text budget.
    #[must_use]
    pub fn with_budget(mut self, budget: impl Into<String>) -> Self {
        self.budget = non_blank(budget.into());
        self
    }

    /// Sets the urgency.
    #[must_use]
    pub const fn with_urgency(mut self, urgency: Urgency) -> Self {
        self.urgency = urgency;
        self
    }

    /// Sets the preferred appointment time.
    #[must_use]
    pub const fn with_scheduled_at(mut self, scheduled_at: DateTime<Utc>) -> Self {
        self.scheduled_at = Some(scheduled_at);
        self
    }

    /// Returns the owning client.
    #[must_use]
    pub const fn client_id(&self) -> UserId {
        self.client_id
    }

    /// Returns the directly booked provider, if any.
    #[must_use]
    pub const fn provider_id(&self) -> Option<UserId> {
        self.provider_id
    }

    /// Returns the service category.
    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Returns the request description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the location, if any.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Returns the budget, if any.
    #[must_use]
    pub fn budget(&self) -> Option<&str> {
        self.budget.as_deref()
    }

    /// Returns the urgency.
    #[must_use]
    pub const fn urgency(&self) -> Urgency {
        self.urgency
    }

    /// Returns the preferred appointment time, if any.
    #[must_use]
    pub const fn scheduled_at(&self) -> Option<DateTime<Utc>> {
        self.scheduled_at
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Builds the persisted aggregate once storage has assigned an id.
    #[must_use]
    pub fn into_persisted(self, id: RequestId) -> ServiceRequest {
        ServiceRequest {
            id,
            client_id: self.client_id,
            provider_id: self.provider_id,
            category: self.category,
            description: self.description,
            location: self.location,
            budget: self.budget,
            urgency: self.urgency,
            status: RequestStatus::Pending,
            scheduled_at: self.scheduled_at,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

/// Service request aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRequest {
    id: RequestId,
    client_id: UserId,
    provider_id: Option<UserId>,
    category: String,
    description: String,
    location: Option<String>,
    budget: Option<String>,
    urgency: Urgency,
    status: RequestStatus,
    scheduled_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedRequestData {
    /// Persisted request identifier.
    pub id: RequestId,
    /// Owning client.
    pub client_id: UserId,
    /// Assigned provider, if any.
    pub provider_id: Option<UserId>,
    /// Service category.
    pub category: String,
    /// Free-text description.
    pub description: String,
    /// Work location.
    pub location: Option<String>,
    /// Free-text budget.
    pub budget: Option<String>,
    /// Urgency.
    pub urgency: Urgency,
    /// Lifecycle status.
    pub status: RequestStatus,
    /// Scheduled appointment time.
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Latest modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl ServiceRequest {
    /// Reconstructs a request from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedRequestData) -> Self {
        Self {
            id: data.id,
            client_id: data.client_id,
            provider_id: data.provider_id,
            category: data.category,
            description: data.description,
            location: data.location,
            budget: data.budget,
            urgency: data.urgency,
            status: data.status,
            scheduled_at: data.scheduled_at,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the request identifier.
    #[must_use]
    pub const fn id(&self) -> RequestId {
        self.id
    }

    /// Returns the owning client.
    #[must_use]
    pub const fn client_id(&self) -> UserId {
        self.client_id
    }

    /// Returns the assigned provider, if any.
    #[must_use]
    pub const fn provider_id(&self) -> Option<UserId> {
        self.provider_id
    }

    /// Returns the service category.
    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Returns the request description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the location, if any.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Returns the budget, if any.
    #[must_use]
    pub fn budget(&self) -> Option<&str> {
        self.budget.as_deref()
    }

    /// Returns the urgency.
    #[must_use]
    pub const fn urgency(&self) -> Urgency {
        self.urgency
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub const fn status(&self) -> RequestStatus {
        self.status
    }

    /// Returns the scheduled appointment time, if any.
    #[must_use]
    pub const fn scheduled_at(&self) -> Option<DateTime<Utc>> {
        self.scheduled_at
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest modification timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns `true` when `user` is the owning client.
    #[must_use]
    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.client_id == user
    }

    /// Returns `true` when `user` is the assigned provider.
    #[must_use]
    pub fn is_assigned_to(&self, user: UserId) -> bool {
        self.provider_id == Some(user)
    }

    /// Moves the request to `target` if the transition table allows it.
    ///
    /// # Errors
    ///
    /// Returns [`MarketplaceDomainError::InvalidStateTransition`] when the
    /// edge is not in the table; the request is left unchanged.
    pub fn transition_to(
        &mut self,
        target: RequestStatus,
        clock: &impl Clock,
    ) -> Result<(), MarketplaceDomainError> {
        if !self.status.can_transition_to(target) {
            return Err(MarketplaceDomainError::InvalidStateTransition {
                request_id: self.id,
                from: self.status,
                to: target,
            });
        }
        self.status = target;
        self.touch(clock);
        Ok(())
    }

    /// Assigns the provider who will perform the work.
    pub fn assign_provider(&mut self, provider_id: UserId, clock: &impl Clock) {
        self.provider_id = Some(provider_id);
        self.touch(clock);
    }

    /// Replaces the scheduled appointment time.
    pub fn reschedule(&mut self, scheduled_at: DateTime<Utc>, clock: &impl Clock) {
        self.scheduled_at = Some(scheduled_at);
        self.touch(clock);
    }

    fn touch(&mut self, clock: &impl Clock) {
        self.updated_at = clock.utc();
    }
}
