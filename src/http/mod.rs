//! JSON HTTP surface over the marketplace services.
//!
//! Every route under `/api` requires a bearer token; `/health` does not.
//! Workflow errors are mapped to status codes in [`ApiError`].

mod auth;
mod error;
mod notifications;
mod proposals;
mod requests;
mod state;

pub use auth::AuthenticatedActor;
pub use error::ApiError;
pub use state::AppState;

use crate::marketplace::ports::MarketplaceStore;
use axum::{
    Json, Router,
    routing::{get, patch, post},
};
use mockable::Clock;
use serde_json::{Value, json};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Builds the application router.
#[must_use]
pub fn router<R, C>(state: AppState<R, C>) -> Router
where
    R: MarketplaceStore,
    C: Clock + Send + Sync + 'static,
{
    let api = Router::new()
        .route("/requests", post(requests::create_request::<R, C>))
        .route(
            "/requests/{id}",
            get(requests::get_request::<R, C>)
                .patch(requests::update_status::<R, C>)
                .delete(requests::delete_request::<R, C>),
        )
        .route(
            "/requests/{id}/proposals",
            get(requests::list_proposals::<R, C>).post(proposals::submit_proposal::<R, C>),
        )
        .route(
            "/proposals/{id}",
            patch(proposals::resolve_proposal::<R, C>)
                .delete(proposals::withdraw_proposal::<R, C>),
        )
        .route(
            "/notifications",
            get(notifications::list_notifications::<R, C>),
        )
        .route(
            "/notifications/{id}/read",
            patch(notifications::mark_read::<R, C>),
        );

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
