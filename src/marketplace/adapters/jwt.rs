//! HS256 JWT identity adapter.

use crate::marketplace::{
    domain::{Actor, Role, UserId},
    ports::{IdentityError, IdentityProvider},
};
use async_trait::async_trait;
use chrono::Duration;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Claims carried by marketplace access tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User identifier as a decimal string.
    pub sub: String,
    /// Marketplace role.
    pub role: String,
    /// Expiry as seconds since the Unix epoch.
    pub exp: usize,
}

/// Resolves bearer tokens signed with a shared secret.
#[derive(Clone)]
pub struct JwtIdentityProvider {
    decoding_key: DecodingKey,
    encoding_key: EncodingKey,
    validation: Validation,
}

impl fmt::Debug for JwtIdentityProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtIdentityProvider").finish_non_exhaustive()
    }
}

impl JwtIdentityProvider {
    /// Creates a provider for tokens signed with `secret`.
    #[must_use]
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Signs a token for `actor` valid for `ttl` from the clock's current
    /// time.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError`] when the expiry cannot be represented or
    /// signing fails.
    pub fn issue(
        &self,
        actor: &Actor,
        ttl: Duration,
        clock: &impl Clock,
    ) -> Result<String, IdentityError> {
        let now = clock.utc();
        let expires_at = now.checked_add_signed(ttl).unwrap_or(now).timestamp();
        let claims = Claims {
            sub: actor.id().to_string(),
            role: actor.role().as_str().to_owned(),
            exp: usize::try_from(expires_at).map_err(IdentityError::backend)?,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(IdentityError::backend)
    }

    fn actor_from_claims(claims: &Claims) -> Option<Actor> {
        let id = claims.sub.trim().parse::<i64>().ok()?;
        let role = Role::try_from(claims.role.as_str()).ok()?;
        Some(Actor::new(UserId::new(id), role))
    }
}

#[async_trait]
impl IdentityProvider for JwtIdentityProvider {
    async fn user_from_token(&self, token: &str) -> Result<Option<Actor>, IdentityError> {
        match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => {
                let actor = Self::actor_from_claims(&data.claims);
                if actor.is_none() {
                    tracing::debug!(sub = %data.claims.sub, "token claims do not name a marketplace user");
                }
                Ok(actor)
            }
            Err(err) => {
                tracing::debug!(error = %err, "rejected bearer token");
                Ok(None)
            }
        }
    }
}
