//! Notification inbox for the authenticated user.

use super::error::WorkflowResult;
use crate::marketplace::{
    domain::{Actor, Notification, NotificationId},
    ports::NotificationOutbox,
};
use mockable::Clock;
use std::sync::Arc;

/// Reads and acknowledges a user's notifications.
pub struct InboxService<R, C>
where
    R: NotificationOutbox,
    C: Clock + Send + Sync,
{
    outbox: Arc<R>,
    clock: Arc<C>,
}

impl<R, C> Clone for InboxService<R, C>
where
    R: NotificationOutbox,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            outbox: Arc::clone(&self.outbox),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<R, C> InboxService<R, C>
where
    R: NotificationOutbox,
    C: Clock + Send + Sync,
{
    /// Creates a new inbox service.
    #[must_use]
    pub const fn new(outbox: Arc<R>, clock: Arc<C>) -> Self {
        Self { outbox, clock }
    }

    /// Returns the actor's notifications, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`super::WorkflowError::TransactionFailed`] when storage fails.
    pub async fn list(&self, actor: Actor, unread_only: bool) -> WorkflowResult<Vec<Notification>> {
        Ok(self.outbox.list_notifications(actor.id(), unread_only).await?)
    }

    /// Marks one of the actor's notifications as read.
    ///
    /// # Errors
    ///
    /// Returns [`super::WorkflowError::NotificationNotFound`] when the
    /// notification does not belong to the actor.
    pub async fn mark_read(
        &self,
        actor: Actor,
        notification_id: NotificationId,
    ) -> WorkflowResult<Notification> {
        let notification = self
            .outbox
            .mark_notification_read(notification_id, actor.id(), self.clock.utc())
            .await?;
        tracing::debug!(
            user_id = %actor.id(),
            notification_id = %notification_id,
            "notification marked read"
        );
        Ok(notification)
    }
}
