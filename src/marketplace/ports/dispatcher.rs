//! Port for handing notifications to the external notification service.

use crate::marketplace::domain::{Notification, NotificationChannel, UserId};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

/// Payload sent to the notification service.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationDelivery {
    /// Recipient user.
    pub user_id: UserId,
    /// Title.
    pub title: String,
    /// Body.
    pub body: String,
    /// Requested channels.
    pub channels: Vec<NotificationChannel>,
    /// Metadata object.
    pub metadata: Map<String, Value>,
    /// Key the service uses to drop duplicate deliveries.
    pub idempotency_key: Uuid,
}

impl From<&Notification> for NotificationDelivery {
    fn from(notification: &Notification) -> Self {
        Self {
            user_id: notification.recipient(),
            title: notification.title().to_owned(),
            body: notification.body().to_owned(),
            channels: notification.channels().to_vec(),
            metadata: notification.metadata().clone(),
            idempotency_key: notification.delivery_key(),
        }
    }
}

/// Errors reported by notification dispatchers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotificationDispatchError {
    /// The service answered with a non-success status.
    #[error("notification service rejected delivery with status {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },
    /// The service could not be reached.
    #[error("notification service unreachable: {0}")]
    Transport(String),
}

/// Delivers notifications to users.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync + 'static {
    /// Triggers delivery of one notification.
    ///
    /// # Errors
    ///
    /// Returns [`NotificationDispatchError`] when the service cannot accept
    /// the delivery.
    async fn trigger(&self, delivery: &NotificationDelivery)
    -> Result<(), NotificationDispatchError>;
}
