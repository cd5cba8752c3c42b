//! In-memory adapters for tests and local development.

mod dispatcher;
mod repository;

pub use dispatcher::RecordingDispatcher;
pub use repository::InMemoryMarketplace;
