//! Proposal routes.

use super::{auth::AuthenticatedActor, error::ApiError, state::AppState};
use crate::marketplace::{
    domain::{ProposalId, RequestId},
    ports::MarketplaceStore,
};
use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
};
use mockable::Clock;
use serde::Deserialize;
use serde_json::{Value, json};

/// Body of `POST /api/requests/{id}/proposals`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitProposalBody {
    #[serde(alias = "proposed_price")]
    proposed_price: Value,
    #[serde(default)]
    message: Option<String>,
}

/// Body of `PATCH /api/proposals/{id}`.
#[derive(Debug, Deserialize)]
pub struct ResolveBody {
    action: String,
}

pub(super) async fn submit_proposal<R, C>(
    State(state): State<AppState<R, C>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<SubmitProposalBody>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError>
where
    R: MarketplaceStore,
    C: Clock + Send + Sync + 'static,
{
    let Path(id) = path?;
    let Json(body) = payload?;
    let price = match body.proposed_price {
        Value::String(text) => text,
        Value::Number(number) => number.to_string(),
        other => {
            return Err(ApiError::InvalidBody(format!(
                "proposedPrice must be a number or string, got {other}"
            )));
        }
    };
    state
        .marketplace
        .proposals
        .submit(actor, RequestId::new(id), &price, body.message)
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "success": true }))))
}

pub(super) async fn resolve_proposal<R, C>(
    State(state): State<AppState<R, C>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<ResolveBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError>
where
    R: MarketplaceStore,
    C: Clock + Send + Sync + 'static,
{
    let Path(id) = path?;
    let Json(body) = payload?;
    state
        .marketplace
        .resolution
        .resolve(actor, ProposalId::new(id), &body.action)
        .await?;
    Ok(Json(json!({ "success": true })))
}

pub(super) async fn withdraw_proposal<R, C>(
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
        .proposals
        .withdraw(actor, ProposalId::new(id))
        .await?;
    Ok(Json(json!({ "success": true })))
}
