//! Service request routes.

use super::{auth::AuthenticatedActor, error::ApiError, state::AppState};
use crate::marketplace::{
    domain::{Proposal, RequestId, ServiceRequest, Urgency, UserId},
    ports::MarketplaceStore,
    services::{RequestDraft, RequestView, StatusUpdate},
};
use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::Deserialize;
use serde_json::{Value, json};

/// Body of `POST /api/requests`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequestBody {
    category: String,
    description: String,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    budget: Option<String>,
    #[serde(default)]
    urgency: Option<Urgency>,
    #[serde(default, alias = "scheduled_at")]
    scheduled_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "provider_id")]
    provider_id: Option<i64>,
}

/// Body of `PATCH /api/requests/{id}`.
#[derive(Debug, Deserialize)]
pub struct StatusBody {
    status: String,
    #[serde(default, alias = "scheduledAt")]
    scheduled_at: Option<DateTime<Utc>>,
}

pub(super) async fn create_request<R, C>(
    State(state): State<AppState<R, C>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    payload: Result<Json<CreateRequestBody>, JsonRejection>,
) -> Result<(StatusCode, Json<ServiceRequest>), ApiError>
where
    R: MarketplaceStore,
    C: Clock + Send + Sync + 'static,
{
    let Json(body) = payload?;
    let draft = RequestDraft {
        category: body.category,
        description: body.description,
        location: body.location,
        budget: body.budget,
        urgency: body.urgency,
        scheduled_at: body.scheduled_at,
        provider_id: body.provider_id.map(UserId::new),
    };
    let request = state.marketplace.requests.create(actor, draft).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

pub(super) async fn get_request<R, C>(
    State(state): State<AppState<R, C>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<RequestView>, ApiError>
where
    R: MarketplaceStore,
    C: Clock + Send + Sync + 'static,
{
    let Path(id) = path?;
    let view = state.marketplace.requests.get(actor, RequestId::new(id)).await?;
    Ok(Json(view))
}

pub(super) async fn update_status<R, C>(
    State(state): State<AppState<R, C>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<StatusBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError>
where
    R: MarketplaceStore,
    C: Clock + Send + Sync + 'static,
{
    let Path(id) = path?;
    let Json(body) = payload?;
    let update = StatusUpdate::new(body.status).with_scheduled_at(body.scheduled_at);
    let request = state
        .marketplace
        .status
        .set_status(actor, RequestId::new(id), update)
        .await?;
    Ok(Json(json!({
        "message": format!("request status updated to {}", request.status()),
    })))
}

pub(super) async fn delete_request<R, C>(
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
        .requests
        .delete(actor, RequestId::new(id))
        .await?;
    Ok(Json(json!({ "success": true })))
}

pub(super) async fn list_proposals<R, C>(
    State(state): State<AppState<R, C>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Vec<Proposal>>, ApiError>
where
    R: MarketplaceStore,
    C: Clock + Send + Sync + 'static,
{
    let Path(id) = path?;
    let proposals = state
        .marketplace
        .requests
        .list_proposals(actor, RequestId::new(id))
        .await?;
    Ok(Json(proposals))
}
