//! Shared fixtures for in-memory marketplace integration tests.

use acheiumpro::marketplace::{
    adapters::memory::InMemoryMarketplace,
    domain::{Actor, Notification, Proposal, ServiceRequest, UserId},
    services::{Marketplace, NotificationTemplates, RequestDraft},
};
use chrono::{DateTime, Utc};
use mockable::DefaultClock;
use rstest::fixture;
use serde_json::Value;
use std::sync::Arc;

/// Client who owns the requests created by [`post_request`].
pub const CLIENT: Actor = Actor::client(UserId::new(1));
/// Another client who owns nothing.
pub const STRANGER: Actor = Actor::client(UserId::new(2));
/// First bidding provider.
pub const PROVIDER_A: Actor = Actor::provider(UserId::new(10));
/// Second bidding provider.
pub const PROVIDER_B: Actor = Actor::provider(UserId::new(11));
/// Third bidding provider.
pub const PROVIDER_C: Actor = Actor::provider(UserId::new(12));
/// Administrator.
pub const ADMIN: Actor = Actor::admin(UserId::new(99));

/// The marketplace services wired to an in-memory store.
pub type TestMarketplace = Marketplace<InMemoryMarketplace, DefaultClock>;

/// Services plus direct access to the store they share.
pub struct Harness {
    /// Backing store.
    pub store: Arc<InMemoryMarketplace>,
    /// Services under test.
    pub marketplace: TestMarketplace,
}

/// Provides a fresh marketplace for each test.
#[fixture]
pub fn harness() -> Harness {
    let store = Arc::new(InMemoryMarketplace::new());
    let marketplace = Marketplace::new(
        Arc::clone(&store),
        Arc::new(DefaultClock),
        NotificationTemplates::default(),
    );
    Harness { store, marketplace }
}

/// Returns a valid request draft, optionally scheduled.
pub fn draft(scheduled_at: Option<DateTime<Utc>>) -> RequestDraft {
    RequestDraft {
        category: "carpentry".to_owned(),
        description: "Build fitted wardrobes".to_owned(),
        location: Some("Leeds".to_owned()),
        scheduled_at,
        ..RequestDraft::default()
    }
}

/// Posts a request owned by [`CLIENT`].
///
/// # Errors
///
/// Returns an error when the request cannot be created.
pub async fn post_request(
    harness: &Harness,
    scheduled_at: Option<DateTime<Utc>>,
) -> eyre::Result<ServiceRequest> {
    Ok(harness
        .marketplace
        .requests
        .create(CLIENT, draft(scheduled_at))
        .await?)
}

/// Posts a request and a bid from each of the three providers.
///
/// # Errors
///
/// Returns an error when any step fails.
pub async fn request_with_bids(
    harness: &Harness,
    scheduled_at: Option<DateTime<Utc>>,
) -> eyre::Result<(ServiceRequest, Vec<Proposal>)> {
    let request = post_request(harness, scheduled_at).await?;
    for (provider, price) in [(PROVIDER_A, "400"), (PROVIDER_B, "385.5"), (PROVIDER_C, "420")] {
        harness
            .marketplace
            .proposals
            .submit(provider, request.id(), price, None)
            .await?;
    }
    let proposals = harness
        .marketplace
        .requests
        .list_proposals(CLIENT, request.id())
        .await?;
    eyre::ensure!(proposals.len() == 3, "expected three bids, got {}", proposals.len());
    Ok((request, proposals))
}

/// Returns the bid submitted by `provider`.
///
/// # Errors
///
/// Returns an error when the provider has no bid in `proposals`.
pub fn bid_of(proposals: &[Proposal], provider: Actor) -> eyre::Result<Proposal> {
    proposals
        .iter()
        .find(|proposal| proposal.provider_id() == provider.id())
        .cloned()
        .ok_or_else(|| eyre::eyre!("no bid from provider {}", provider.id()))
}

/// Returns the `kind` metadata of every notification stored for `recipient`.
///
/// # Errors
///
/// Returns an error when the store cannot be read.
pub fn notification_kinds(harness: &Harness, recipient: Actor) -> eyre::Result<Vec<String>> {
    Ok(notifications_for(harness, recipient)?
        .iter()
        .filter_map(|notification| {
            notification
                .metadata()
                .get("kind")
                .and_then(Value::as_str)
                .map(str::to_owned)
        })
        .collect())
}

/// Returns every notification stored for `recipient`, oldest first.
///
/// # Errors
///
/// Returns an error when the store cannot be read.
pub fn notifications_for(harness: &Harness, recipient: Actor) -> eyre::Result<Vec<Notification>> {
    Ok(harness
        .store
        .all_notifications()?
        .into_iter()
        .filter(|notification| notification.recipient() == recipient.id())
        .collect())
}
