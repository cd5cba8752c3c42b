//! Notification inbox routes.

use super::{auth::AuthenticatedActor, error::ApiError, state::AppState};
use crate::marketplace::{
    domain::{Notification, NotificationId},
    ports::MarketplaceStore,
};
use axum::{
    Json,
    extract::{Path, Query, State, rejection::PathRejection},
};
use mockable::Clock;
use serde::Deserialize;
use serde_json::{Value, json};

/// Query string of `GET /api/notifications`.
#[derive(Debug, Default, Deserialize)]
pub struct InboxQuery {
    #[serde(default)]
    unread: bool,
}

pub(super) async fn list_notifications<R, C>(
    State(state): State<AppState<R, C>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Query(query): Query<InboxQuery>,
) -> Result<Json<Vec<Notification>>, ApiError>
where
    R: MarketplaceStore,
    C: Clock + Send + Sync + 'static,
{
    let notifications = state.marketplace.inbox.list(actor, query.unread).await?;
    Ok(Json(notifications))
}

pub(super) async fn mark_read<R, C>(
    State(state): State<AppState<R, C>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Value>, ApiError>
where
    R: MarketplaceStore,
    C: Clock + Send + Sync + 'static,
{
    let Path(id) = path?;
    state
        .marketplace
        .inbox
        .mark_read(actor, NotificationId::new(id))
        .await?;
    Ok(Json(json!({ "success": true })))
}
