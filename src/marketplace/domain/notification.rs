//! Notification outbox records.
//!
//! A notification is written alongside the state change it describes and
//! later handed to the external notification service by the relay. Delivery
//! bookkeeping lives on the record so failed deliveries can be retried
//! without repeating the state change.

use super::{MarketplaceDomainError, NotificationId, ParseValueError, UserId};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Delivery channel requested for a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    /// In-app inbox; stored locally.
    InApp,
    /// E-mail delivery.
    Email,
    /// Text message delivery.
    Sms,
    /// Browser push delivery.
    WebPush,
}

impl NotificationChannel {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InApp => "in_app",
            Self::Email => "email",
            Self::Sms => "sms",
            Self::WebPush => "web_push",
        }
    }

    /// Returns `true` when delivery requires the external service.
    #[must_use]
    pub const fn is_external(self) -> bool {
        !matches!(self, Self::InApp)
    }
}

impl fmt::Display for NotificationChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for NotificationChannel {
    type Error = ParseValueError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "in_app" => Ok(Self::InApp),
            "email" => Ok(Self::Email),
            "sms" => Ok(Self::Sms),
            "web_push" => Ok(Self::WebPush),
            _ => Err(ParseValueError::new("notification channel", value)),
        }
    }
}

/// Outbox delivery state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
    /// Waiting for the relay.
    Pending,
    /// Accepted by the notification service.
    Delivered,
    /// Gave up after the maximum number of attempts.
    Failed,
}

impl DeliveryState {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for DeliveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for DeliveryState {
    type Error = ParseValueError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "pending" => Ok(Self::Pending),
            "delivered" => Ok(Self::Delivered),
            "failed" => Ok(Self::Failed),
            _ => Err(ParseValueError::new("delivery state", value)),
        }
    }
}

/// Event that produced a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A provider bid on the client's request.
    ProposalReceived,
    /// The client accepted the provider's proposal.
    ProposalAccepted,
    /// The client rejected the provider's proposal.
    ProposalRejected,
    /// The request moved to a new status.
    RequestStatusChanged,
}

impl NotificationKind {
    /// Returns the value stored under the `kind` metadata key.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ProposalReceived => "proposal_received",
            Self::ProposalAccepted => "proposal_accepted",
            Self::ProposalRejected => "proposal_rejected",
            Self::RequestStatusChanged => "request_status_changed",
        }
    }
}

/// Channels used when the caller does not choose any.
pub const DEFAULT_CHANNELS: [NotificationChannel; 2] =
    [NotificationChannel::InApp, NotificationChannel::Email];

/// A notification that has not been written to the outbox yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    recipient: UserId,
    channels: Vec<NotificationChannel>,
    title: String,
    body: String,
    metadata: Map<String, Value>,
    delivery_key: Uuid,
    created_at: DateTime<Utc>,
}

impl NewNotification {
    /// Creates a notification for `recipient`.
    ///
    /// Channels are deduplicated while keeping their first-seen order.
    ///
    /// # Errors
    ///
    /// Returns [`MarketplaceDomainError::EmptyNotificationTitle`] when the
    /// title is blank and [`MarketplaceDomainError::NoNotificationChannels`]
    /// when no channel is given.
    pub fn new(
        recipient: UserId,
        channels: impl IntoIterator<Item = NotificationChannel>,
        title: impl Into<String>,
        body: impl Into<String>,
        clock: &impl Clock,
    ) -> Result<Self, MarketplaceDomainError> {
        let title_text = title.into().trim().to_owned();
        if title_text.is_empty() {
            return Err(MarketplaceDomainError::EmptyNotificationTitle);
        }

        let mut unique_channels = Vec::new();
        for channel in channels {
            if !unique_channels.contains(&channel) {
                unique_channels.push(channel);
            }
        }
        if unique_channels.is_empty() {
            return Err(MarketplaceDomainError::NoNotificationChannels);
        }

        Ok(Self {
            recipient,
            channels: unique_channels,
            title: title_text,
            body: body.into(),
            metadata: Map::new(),
            delivery_key: Uuid::new_v4(),
            created_at: clock.utc(),
        })
    }

    /// Adds a metadata entry, replacing any existing value for `key`.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Returns the recipient.
    #[must_use]
    pub const fn recipient(&self) -> UserId {
        self.recipient
    }

    /// Returns the requested channels.
    #[must_use]
    pub fn channels(&self) -> &[NotificationChannel] {
        &self.channels
    }

    /// Returns the title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the body.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Returns the metadata object.
    #[must_use]
    pub const fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Returns the idempotency key sent to the notification service.
    #[must_use]
    pub const fn delivery_key(&self) -> Uuid {
        self.delivery_key
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Builds the stored notification once the outbox has assigned an id.
    #[must_use]
    pub fn into_persisted(self, id: NotificationId) -> Notification {
        Notification {
            id,
            recipient: self.recipient,
            channels: self.channels,
            title: self.title,
            body: self.body,
            metadata: self.metadata,
            read_at: None,
            delivery_state: DeliveryState::Pending,
            attempts: 0,
            last_error: None,
            delivery_key: self.delivery_key,
            created_at: self.created_at,
        }
    }
}

/// A stored notification with its delivery bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    id: NotificationId,
    recipient: UserId,
    channels: Vec<NotificationChannel>,
    title: String,
    body: String,
    metadata: Map<String, Value>,
    read_at: Option<DateTime<Utc>>,
    delivery_state: DeliveryState,
    attempts: u32,
    last_error: Option<String>,
    delivery_key: Uuid,
    created_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a stored notification.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedNotificationData {
    /// Persisted identifier.
    pub id: NotificationId,
    /// Recipient user.
    pub recipient: UserId,
    /// Delivery channels.
    pub channels: Vec<NotificationChannel>,
    /// Title.
    pub title: String,
    /// Body.
    pub body: String,
    /// Metadata object.
    pub metadata: Map<String, Value>,
    /// Read timestamp.
    pub read_at: Option<DateTime<Utc>>,
    /// Outbox delivery state.
    pub delivery_state: DeliveryState,
    /// Delivery attempts made so far.
    pub attempts: u32,
    /// Error reported by the latest failed attempt.
    pub last_error: Option<String>,
    /// Idempotency key.
    pub delivery_key: Uuid,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Reconstructs a notification from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedNotificationData) -> Self {
        Self {
            id: data.id,
            recipient: data.recipient,
            channels: data.channels,
            title: data.title,
            body: data.body,
            metadata: data.metadata,
            read_at: data.read_at,
            delivery_state: data.delivery_state,
            attempts: data.attempts,
            last_error: data.last_error,
            delivery_key: data.delivery_key,
            created_at: data.created_at,
        }
    }

    /// Returns the identifier.
    #[must_use]
    pub const fn id(&self) -> NotificationId {
        self.id
    }

    /// Returns the recipient.
    #[must_use]
    pub const fn recipient(&self) -> UserId {
        self.recipient
    }

    /// Returns the delivery channels.
    #[must_use]
    pub fn channels(&self) -> &[NotificationChannel] {
        &self.channels
    }

    /// Returns the title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the body.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Returns the metadata object.
    #[must_use]
    pub const fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Returns when the recipient read the notification.
    #[must_use]
    pub const fn read_at(&self) -> Option<DateTime<Utc>> {
        self.read_at
    }

    /// Returns `true` once the recipient has read the notification.
    #[must_use]
    pub const fn is_read(&self) -> bool {
        self.read_at.is_some()
    }

    /// Returns the outbox delivery state.
    #[must_use]
    pub const fn delivery_state(&self) -> DeliveryState {
        self.delivery_state
    }

    /// Returns the number of delivery attempts made.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Returns the latest delivery error.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Returns the idempotency key.
    #[must_use]
    pub const fn delivery_key(&self) -> Uuid {
        self.delivery_key
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns `true` when some channel needs the external service.
    #[must_use]
    pub fn needs_dispatch(&self) -> bool {
        self.channels.iter().any(|channel| channel.is_external())
    }

    /// Marks the notification as read.
    ///
    /// Returns `false` and keeps the original timestamp when it was already
    /// read.
    pub fn mark_read(&mut self, clock: &impl Clock) -> bool {
        self.mark_read_at(clock.utc())
    }

    /// Marks the notification as read at `read_at`.
    ///
    /// Same contract as [`Notification::mark_read`].
    pub fn mark_read_at(&mut self, read_at: DateTime<Utc>) -> bool {
        if self.read_at.is_some() {
            return false;
        }
        self.read_at = Some(read_at);
        true
    }

    /// Records a successful delivery.
    pub fn record_delivered(&mut self) {
        self.attempts = self.attempts.saturating_add(1);
        self.delivery_state = DeliveryState::Delivered;
        self.last_error = None;
    }

    /// Takes the delivery bookkeeping of `attempt`, leaving read state and
    /// content untouched.
    pub fn apply_delivery(&mut self, attempt: &Self) {
        self.delivery_state = attempt.delivery_state;
        self.attempts = attempt.attempts;
        self.last_error.clone_from(&attempt.last_error);
    }

    /// Records a failed delivery attempt.
    ///
    /// The state becomes [`DeliveryState::Failed`] once `max_attempts` is
    /// reached; otherwise it stays pending for the next relay pass.
    pub fn record_failure(&mut self, error: impl Into<String>, max_attempts: u32) {
        self.attempts = self.attempts.saturating_add(1);
        self.last_error = Some(error.into());
        if self.attempts >= max_attempts {
            self.delivery_state = DeliveryState::Failed;
        }
    }
}
