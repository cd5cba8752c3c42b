//! Bearer token authentication.

use super::{error::ApiError, state::AppState};
use crate::marketplace::{domain::Actor, ports::MarketplaceStore};
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use mockable::Clock;

/// The authenticated caller, resolved from the `Authorization` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedActor(pub Actor);

impl<R, C> FromRequestParts<AppState<R, C>> for AuthenticatedActor
where
    R: MarketplaceStore,
    C: Clock + Send + Sync + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<R, C>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(ApiError::Unauthorized)?;
        match state.identity.user_from_token(token).await {
            Ok(Some(actor)) => Ok(Self(actor)),
            Ok(None) => {
                tracing::debug!(path = %parts.uri.path(), "rejected bearer token");
                Err(ApiError::Unauthorized)
            }
            Err(err) => {
                tracing::error!(error = %err, "identity provider failed");
                Err(ApiError::Unauthorized)
            }
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
