//! Outbox relay delivering committed notifications to the notification
//! service.
//!
//! Workflows only append notifications to the outbox. The relay picks up
//! pending rows after commit, so a failing notification service never rolls
//! back a resolved proposal or a status change.

use super::error::WorkflowResult;
use crate::marketplace::{
    domain::{DeliveryState, Notification},
    ports::{NotificationDelivery, NotificationDispatcher, NotificationOutbox},
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Shortest delay between passes; `tokio::time::interval` refuses zero.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Tunables for the relay loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelaySettings {
    /// Attempts after which a notification is marked failed.
    pub max_attempts: u32,
    /// Notifications fetched per pass.
    pub batch_size: usize,
    /// Delay between passes.
    pub poll_interval: Duration,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            batch_size: 50,
            poll_interval: Duration::from_secs(5),
        }
    }
}

/// Counts from one relay pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayReport {
    /// Notifications delivered, including in-app only ones.
    pub delivered: usize,
    /// Failed attempts that will be retried.
    pub retrying: usize,
    /// Notifications that ran out of attempts.
    pub failed: usize,
}

/// Drains the outbox into a [`NotificationDispatcher`].
pub struct NotificationRelay<R, D>
where
    R: NotificationOutbox,
    D: NotificationDispatcher,
{
    outbox: Arc<R>,
    dispatcher: Arc<D>,
    settings: RelaySettings,
}

impl<R, D> NotificationRelay<R, D>
where
    R: NotificationOutbox,
    D: NotificationDispatcher,
{
    /// Creates a relay.
    #[must_use]
    pub const fn new(outbox: Arc<R>, dispatcher: Arc<D>, settings: RelaySettings) -> Self {
        Self {
            outbox,
            dispatcher,
            settings,
        }
    }

    /// Returns the relay settings.
    #[must_use]
    pub const fn settings(&self) -> RelaySettings {
        self.settings
    }

    /// Delivers one batch of pending notifications.
    ///
    /// Failures of individual deliveries are recorded on the notification and
    /// never abort the batch.
    ///
    /// # Errors
    ///
    /// Returns [`super::WorkflowError::TransactionFailed`] when the pending
    /// batch cannot be loaded.
    pub async fn relay_pending(&self) -> WorkflowResult<RelayReport> {
        let pending = self
            .outbox
            .pending_notifications(self.settings.batch_size, self.settings.max_attempts)
            .await?;

        let mut report = RelayReport::default();
        for mut notification in pending {
            self.deliver(&mut notification).await;
            match notification.delivery_state() {
                DeliveryState::Delivered => report.delivered += 1,
                DeliveryState::Pending => report.retrying += 1,
                DeliveryState::Failed => report.failed += 1,
            }
            if let Err(err) = self.outbox.record_delivery(&notification).await {
                tracing::error!(
                    notification_id = %notification.id(),
                    error = %err,
                    "failed to record notification delivery"
                );
            }
        }

        if report != RelayReport::default() {
            tracing::debug!(
                delivered = report.delivered,
                retrying = report.retrying,
                failed = report.failed,
                "notification relay pass finished"
            );
        }
        Ok(report)
    }

    /// Runs relay passes until `shutdown` resolves.
    pub async fn run<S>(&self, shutdown: S)
    where
        S: Future<Output = ()> + Send,
    {
        let period = self.settings.poll_interval.max(MIN_POLL_INTERVAL);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        tracing::info!(
            poll_interval_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX),
            max_attempts = self.settings.max_attempts,
            "notification relay started"
        );
        loop {
            tokio::select! {
                () = &mut shutdown => break,
                _ = ticker.tick() => {
                    if let Err(err) = self.relay_pending().await {
                        tracing::warn!(error = %err, "notification relay pass failed");
                    }
                }
            }
        }
        tracing::info!("notification relay stopped");
    }

    async fn deliver(&self, notification: &mut Notification) {
        if !notification.needs_dispatch() {
            notification.record_delivered();
            return;
        }

        let delivery = NotificationDelivery::from(&*notification);
        match self.dispatcher.trigger(&delivery).await {
            Ok(()) => notification.record_delivered(),
            Err(err) => {
                tracing::warn!(
                    event = "NotificationDispatchFailed",
                    notification_id = %notification.id(),
                    user_id = %notification.recipient(),
                    attempt = notification.attempts().saturating_add(1),
                    error = %err,
                    "notification dispatch failed"
                );
                notification.record_failure(err.to_string(), self.settings.max_attempts);
            }
        }
    }
}
