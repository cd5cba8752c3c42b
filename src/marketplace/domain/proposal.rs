//! Provider proposals placed against service requests.

use super::{MarketplaceDomainError, ParseValueError, ProposalId, RequestId, UserId};
use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status of a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    /// Waiting for the client's decision.
    Pending,
    /// Chosen by the client; at most one per request.
    Accepted,
    /// Declined, either directly or because a sibling was accepted.
    Rejected,
}

impl ProposalStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProposalStatus {
    type Error = ParseValueError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            _ => Err(ParseValueError::new("proposal status", value)),
        }
    }
}

/// Decision a client takes on a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalAction {
    /// Accept the proposal, rejecting every sibling.
    Accept,
    /// Reject only this proposal.
    Reject,
}

impl ProposalAction {
    /// Returns the wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Reject => "reject",
        }
    }
}

impl TryFrom<&str> for ProposalAction {
    type Error = ParseValueError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "accept" => Ok(Self::Accept),
            "reject" => Ok(Self::Reject),
            _ => Err(ParseValueError::new("proposal action", value)),
        }
    }
}

/// Strictly positive price offered by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProposedPrice(BigDecimal);

impl ProposedPrice {
    /// Creates a validated price.
    ///
    /// # Errors
    ///
    /// Returns [`MarketplaceDomainError::InvalidPrice`] when the amount is
    /// zero or negative.
    pub fn new(amount: BigDecimal) -> Result<Self, MarketplaceDomainError> {
        if amount <= BigDecimal::zero() {
            return Err(MarketplaceDomainError::InvalidPrice(amount.to_string()));
        }
        Ok(Self(amount.normalized()))
    }

    /// Parses a decimal price such as `"150.50"`.
    ///
    /// # Errors
    ///
    /// Returns [`MarketplaceDomainError::InvalidPrice`] when the text is not a
    /// positive decimal number.
    pub fn parse(raw: &str) -> Result<Self, MarketplaceDomainError> {
        let amount = BigDecimal::from_str(raw.trim())
            .map_err(|_| MarketplaceDomainError::InvalidPrice(raw.to_owned()))?;
        Self::new(amount)
    }

    /// Returns the decimal amount.
    #[must_use]
    pub const fn amount(&self) -> &BigDecimal {
        &self.0
    }
}

impl fmt::Display for ProposedPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A proposal that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProposal {
    request_id: RequestId,
    provider_id: UserId,
    price: ProposedPrice,
    message: Option<String>,
    created_at: DateTime<Utc>,
}

impl NewProposal {
    /// Creates a pending proposal.
    #[must_use]
    pub fn new(
        request_id: RequestId,
        provider_id: UserId,
        price: ProposedPrice,
        message: Option<String>,
        clock: &impl Clock,
    ) -> Self {
        let trimmed_message = message
            .map(|text| text.trim().to_owned())
            .filter(|text| !text.is_empty());
        Self {
            request_id,
            provider_id,
            price,
            message: trimmed_message,
            created_at: clock.utc(),
        }
    }

    /// Returns the parent request.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the submitting provider.
    #[must_use]
    pub const fn provider_id(&self) -> UserId {
        self.provider_id
    }

    /// Returns the proposed price.
    #[must_use]
    pub const fn price(&self) -> &ProposedPrice {
        &self.price
    }

    /// Returns the message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Builds the persisted proposal once storage has assigned an id.
    #[must_use]
    pub fn into_persisted(self, id: ProposalId) -> Proposal {
        Proposal {
            id,
            request_id: self.request_id,
            provider_id: self.provider_id,
            price: self.price,
            message: self.message,
            status: ProposalStatus::Pending,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

/// A provider's priced bid against a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    id: ProposalId,
    request_id: RequestId,
    provider_id: UserId,
    price: ProposedPrice,
    message: Option<String>,
    status: ProposalStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedProposalData {
    /// Persisted identifier.
    pub id: ProposalId,
    /// Parent request.
    pub request_id: RequestId,
    /// Submitting provider.
    pub provider_id: UserId,
    /// Proposed price.
    pub price: ProposedPrice,
    /// Free-text message.
    pub message: Option<String>,
    /// Proposal status.
    pub status: ProposalStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Latest modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Proposal {
    /// Reconstructs a proposal from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedProposalData) -> Self {
        Self {
            id: data.id,
            request_id: data.request_id,
            provider_id: data.provider_id,
            price: data.price,
            message: data.message,
            status: data.status,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the proposal identifier.
    #[must_use]
    pub const fn id(&self) -> ProposalId {
        self.id
    }

    /// Returns the parent request.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the submitting provider.
    #[must_use]
    pub const fn provider_id(&self) -> UserId {
        self.provider_id
    }

    /// Returns the proposed price.
    #[must_use]
    pub const fn price(&self) -> &ProposedPrice {
        &self.price
    }

    /// Returns the message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns the proposal status.
    #[must_use]
    pub const fn status(&self) -> ProposalStatus {
        self.status
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

    /// Rejects the proposal on the client's behalf.
    ///
    /// Any proposal may be rejected, including an accepted one; rejecting an
    /// already rejected proposal is a no-op.
    pub fn reject(&mut self, clock: &impl Clock) {
        self.set_status(ProposalStatus::Rejected, clock);
    }

    pub(super) fn set_status(&mut self, status: ProposalStatus, clock: &impl Clock) {
        if self.status != status {
            self.status = status;
            self.updated_at = clock.utc();
        }
    }
}

