//! Port contracts for the marketplace.
//!
//! Ports define infrastructure-agnostic interfaces used by marketplace
//! services.

pub mod dispatcher;
pub mod identity;
pub mod repository;

pub use dispatcher::{NotificationDelivery, NotificationDispatchError, NotificationDispatcher};
pub use identity::{IdentityError, IdentityProvider};
pub use repository::{
    MarketplaceRepository, MarketplaceRepositoryError, MarketplaceRepositoryResult,
    MarketplaceStore, NotificationOutbox,
};
