//! Notification dispatchers backed by a webhook or by the log.

use crate::marketplace::ports::{
    NotificationDelivery, NotificationDispatchError, NotificationDispatcher,
};
use async_trait::async_trait;
use std::time::Duration;

const MAX_ERROR_BODY_CHARS: usize = 512;

/// Posts deliveries as JSON to the notification service.
#[derive(Debug, Clone)]
pub struct WebhookDispatcher {
    client: reqwest::Client,
    endpoint: String,
}

impl WebhookDispatcher {
    /// Creates a dispatcher posting to `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`NotificationDispatchError::Transport`] when the HTTP client
    /// cannot be built.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, NotificationDispatchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| NotificationDispatchError::Transport(err.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Returns the configured endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl NotificationDispatcher for WebhookDispatcher {
    async fn trigger(
        &self,
        delivery: &NotificationDelivery,
    ) -> Result<(), NotificationDispatchError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Idempotency-Key", delivery.idempotency_key.to_string())
            .json(delivery)
            .send()
            .await
            .map_err(|err| NotificationDispatchError::Transport(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response
            .text()
            .await
            .unwrap_or_default()
            .chars()
            .take(MAX_ERROR_BODY_CHARS)
            .collect();
        Err(NotificationDispatchError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

/// Writes deliveries to the log; used when no webhook is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingDispatcher;

#[async_trait]
impl NotificationDispatcher for LoggingDispatcher {
    async fn trigger(
        &self,
        delivery: &NotificationDelivery,
    ) -> Result<(), NotificationDispatchError> {
        tracing::info!(
            user_id = %delivery.user_id,
            idempotency_key = %delivery.idempotency_key,
            title = %delivery.title,
            "notification delivery (no webhook configured)"
        );
        Ok(())
    }
}
