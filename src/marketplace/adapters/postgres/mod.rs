//! `PostgreSQL` adapters for marketplace persistence.

mod conversions;
mod models;
mod outbox;
mod repository;
mod schema;

pub use repository::{MarketplacePgPool, PostgresMarketplace};
