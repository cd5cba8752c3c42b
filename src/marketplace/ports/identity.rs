//! Identity port resolving bearer tokens to actors.

use crate::marketplace::domain::Actor;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Resolves an access token to the user it was issued for.
#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    /// Returns the actor for `token`, or `None` when the token is invalid or
    /// expired.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError`] when the identity backend cannot answer.
    async fn user_from_token(&self, token: &str) -> Result<Option<Actor>, IdentityError>;
}

/// Failure of the identity backend itself, as opposed to a rejected token.
#[derive(Debug, Clone, Error)]
#[error("identity backend unavailable: {0}")]
pub struct IdentityError(Arc<dyn std::error::Error + Send + Sync>);

impl IdentityError {
    /// Wraps a backend error.
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self(Arc::new(err))
    }
}
