//! `PostgreSQL` implementation of the notification outbox.

use super::{
    conversions::row_to_notification,
    models::{DeliveryChangeset, NotificationRow},
    repository::PostgresMarketplace,
    schema::notifications,
};
use crate::marketplace::{
    domain::{DeliveryState, Notification, NotificationId, UserId},
    ports::{MarketplaceRepositoryError, MarketplaceRepositoryResult, NotificationOutbox},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;

#[async_trait]
impl NotificationOutbox for PostgresMarketplace {
    async fn list_notifications(
        &self,
        recipient: UserId,
        unread_only: bool,
    ) -> MarketplaceRepositoryResult<Vec<Notification>> {
        self.run_blocking(move |connection| {
            let mut query = notifications::table
                .filter(notifications::recipient_id.eq(recipient.value()))
                .select(NotificationRow::as_select())
                .order(notifications::id.desc())
                .into_boxed();
            if unread_only {
                query = query.filter(notifications::read_at.is_null());
            }
            query
                .load::<NotificationRow>(connection)
                .map_err(MarketplaceRepositoryError::persistence)?
                .into_iter()
                .map(row_to_notification)
                .collect()
        })
        .await
    }

    async fn mark_notification_read(
        &self,
        id: NotificationId,
        recipient: UserId,
        read_at: DateTime<Utc>,
    ) -> MarketplaceRepositoryResult<Notification> {
        self.run_blocking(move |connection| {
            diesel::update(
                notifications::table
                    .filter(notifications::id.eq(id.value()))
                    .filter(notifications::recipient_id.eq(recipient.value()))
                    .filter(notifications::read_at.is_null()),
            )
            .set(notifications::read_at.eq(Some(read_at)))
            .execute(connection)
            .map_err(MarketplaceRepositoryError::persistence)?;

            let row = notifications::table
                .filter(notifications::id.eq(id.value()))
                .filter(notifications::recipient_id.eq(recipient.value()))
                .select(NotificationRow::as_select())
                .first::<NotificationRow>(connection)
                .optional()
                .map_err(MarketplaceRepositoryError::persistence)?
                .ok_or(MarketplaceRepositoryError::NotificationNotFound(id))?;
            row_to_notification(row)
        })
        .await
    }

    async fn pending_notifications(
        &self,
        limit: usize,
        max_attempts: u32,
    ) -> MarketplaceRepositoryResult<Vec<Notification>> {
        let row_limit = i64::try_from(limit).map_err(MarketplaceRepositoryError::persistence)?;
        let attempt_ceiling =
            i32::try_from(max_attempts).map_err(MarketplaceRepositoryError::persistence)?;
        self.run_blocking(move |connection| {
            notifications::table
                .filter(notifications::delivery_state.eq(DeliveryState::Pending.as_str()))
                .filter(notifications::attempts.lt(attempt_ceiling))
                .order(notifications::id.asc())
                .limit(row_limit)
                .select(NotificationRow::as_select())
                .load::<NotificationRow>(connection)
                .map_err(MarketplaceRepositoryError::persistence)?
                .into_iter()
                .map(row_to_notification)
                .collect()
        })
        .await
    }

    async fn record_delivery(
        &self,
        notification: &Notification,
    ) -> MarketplaceRepositoryResult<()> {
        let id = notification.id();
        let changeset = DeliveryChangeset {
            delivery_state: notification.delivery_state().as_str().to_owned(),
            attempts: i32::try_from(notification.attempts())
                .map_err(MarketplaceRepositoryError::persistence)?,
            last_error: notification.last_error().map(str::to_owned),
        };
        self.run_blocking(move |connection| {
            let updated = diesel::update(notifications::table.find(id.value()))
                .set(&changeset)
                .execute(connection)
                .map_err(MarketplaceRepositoryError::persistence)?;
            if updated == 0 {
                return Err(MarketplaceRepositoryError::NotificationNotFound(id));
            }
            Ok(())
        })
        .await
    }
}
