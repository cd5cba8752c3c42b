//! Shared application state handed to every handler.

use crate::marketplace::{ports::IdentityProvider, ports::MarketplaceStore, services::Marketplace};
use mockable::Clock;
use std::sync::Arc;

/// Marketplace services plus the identity provider resolving bearer tokens.
pub struct AppState<R, C>
where
    R: MarketplaceStore,
    C: Clock + Send + Sync + 'static,
{
    /// Marketplace services.
    pub marketplace: Arc<Marketplace<R, C>>,
    /// Bearer token resolver.
    pub identity: Arc<dyn IdentityProvider>,
}

impl<R, C> AppState<R, C>
where
    R: MarketplaceStore,
    C: Clock + Send + Sync + 'static,
{
    /// Creates the state.
    #[must_use]
    pub fn new(marketplace: Marketplace<R, C>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            marketplace: Arc::new(marketplace),
            identity,
        }
    }
}

impl<R, C> Clone for AppState<R, C>
where
    R: MarketplaceStore,
    C: Clock + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            marketplace: Arc::clone(&self.marketplace),
            identity: Arc::clone(&self.identity),
        }
    }
}
