//! Per-test databases and marketplace wiring over the shared cluster.

pub use super::cluster::{BoxError, PostgresCluster, postgres_cluster};
use acheiumpro::marketplace::{
    adapters::postgres::{MarketplacePgPool, PostgresMarketplace},
    domain::{Actor, Proposal, ServiceRequest, UserId},
    services::{Marketplace, NotificationTemplates, RequestDraft},
};
use chrono::{DateTime, Utc};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use eyre::eyre;
use mockable::DefaultClock;
use rstest::fixture;
use std::sync::Arc;
use tokio::runtime::Runtime;
use uuid::Uuid;

/// Schema applied to the template database.
pub const MARKETPLACE_SCHEMA_SQL: &str =
    include_str!("../../migrations/2026-10-01-000000_create_marketplace_tables/up.sql");

/// Pre-migrated database every test database is cloned from.
pub const TEMPLATE_DB: &str = "acheiumpro_test_template";

/// Client who owns the requests the tests post.
pub const CLIENT: Actor = Actor::client(UserId::new(1));
/// First bidding provider.
pub const PROVIDER_A: Actor = Actor::provider(UserId::new(10));
/// Second bidding provider.
pub const PROVIDER_B: Actor = Actor::provider(UserId::new(11));

/// Marketplace services over the `PostgreSQL` adapter.
pub type PgMarketplace = Marketplace<PostgresMarketplace, DefaultClock>;

fn report(err: &BoxError) -> eyre::Report {
    eyre!("{err}")
}

/// A database cloned from [`TEMPLATE_DB`], dropped with the value.
pub struct TestDatabase {
    cluster: PostgresCluster,
    name: String,
}

impl TestDatabase {
    /// Connection URL for this database.
    #[must_use]
    pub fn url(&self) -> String {
        self.cluster.database_url(&self.name)
    }

    /// Opens a direct connection for assertions the services do not expose.
    ///
    /// # Errors
    ///
    /// Returns an error when the connection cannot be established.
    pub fn connect(&self) -> eyre::Result<PgConnection> {
        Ok(PgConnection::establish(&self.url())?)
    }
}

impl Drop for TestDatabase {
    fn drop(&mut self) {
        drop(self.cluster.drop_database(&self.name));
    }
}

/// A fresh database with marketplace services wired over it.
pub struct MarketplaceContext {
    /// Runtime the async services run on.
    pub rt: Runtime,
    /// Services under test.
    pub marketplace: PgMarketplace,
    /// Store shared by the services.
    pub store: Arc<PostgresMarketplace>,
    /// Backing database. Declared last so the pool closes before it is dropped.
    pub database: TestDatabase,
}

/// Creates the template database and applies the schema when missing.
///
/// # Errors
///
/// Returns an error when template creation or migration fails.
pub fn ensure_template(cluster: PostgresCluster) -> eyre::Result<()> {
    cluster
        .ensure_template_exists(TEMPLATE_DB, |url| {
            let mut conn = PgConnection::establish(url).map_err(|err| Box::new(err) as BoxError)?;
            conn.batch_execute(MARKETPLACE_SCHEMA_SQL)
                .map_err(|err| Box::new(err) as BoxError)
        })
        .map_err(|err| report(&err))
}

/// Provides services over a database of their own.
#[fixture]
pub fn marketplace_context(postgres_cluster: PostgresCluster) -> eyre::Result<MarketplaceContext> {
    let cluster = postgres_cluster;
    ensure_template(cluster)?;
    let name = format!("test_{}", Uuid::new_v4().simple());
    cluster
        .create_database_from_template(&name, TEMPLATE_DB)
        .map_err(|err| report(&err))?;
    let database = TestDatabase { cluster, name };

    let pool: MarketplacePgPool = Pool::builder()
        .max_size(4)
        .build(ConnectionManager::<PgConnection>::new(database.url()))?;
    let store = Arc::new(PostgresMarketplace::new(pool));
    let marketplace = Marketplace::new(
        Arc::clone(&store),
        Arc::new(DefaultClock),
        NotificationTemplates::default(),
    );
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;
    Ok(MarketplaceContext {
        rt,
        marketplace,
        store,
        database,
    })
}

/// Posts a request owned by [`CLIENT`].
///
/// # Errors
///
/// Returns an error when the request cannot be created.
pub async fn post_request(
    marketplace: &PgMarketplace,
    scheduled_at: Option<DateTime<Utc>>,
) -> eyre::Result<ServiceRequest> {
    let draft = RequestDraft {
        category: "plumbing".to_owned(),
        description: "Replace the kitchen mixer tap".to_owned(),
        location: Some("York".to_owned()),
        scheduled_at,
        ..RequestDraft::default()
    };
    Ok(marketplace.requests.create(CLIENT, draft).await?)
}

/// Posts a request and one bid from each of [`PROVIDER_A`] and [`PROVIDER_B`].
///
/// # Errors
///
/// Returns an error when any step fails.
pub async fn request_with_two_bids(
    marketplace: &PgMarketplace,
) -> eyre::Result<(ServiceRequest, Proposal, Proposal)> {
    let request = post_request(marketplace, None).await?;
    for (provider, price) in [(PROVIDER_A, "120"), (PROVIDER_B, "95.50")] {
        marketplace
            .proposals
            .submit(provider, request.id(), price, None)
            .await?;
    }
    let bids = marketplace.requests.list_proposals(CLIENT, request.id()).await?;
    let bid_of = |provider: Actor| {
        bids.iter()
            .find(|bid| bid.provider_id() == provider.id())
            .cloned()
            .ok_or_else(|| eyre!("no bid from provider {}", provider.id()))
    };
    let first = bid_of(PROVIDER_A)?;
    let second = bid_of(PROVIDER_B)?;
    Ok((request, first, second))
}

#[derive(QueryableByName)]
struct Count {
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    count: i64,
}

/// Runs a `SELECT COUNT(*) AS count ...` query bound to one `BIGINT` id.
///
/// # Errors
///
/// Returns an error when the query fails.
pub fn count_rows(conn: &mut PgConnection, sql: &str, id: i64) -> eyre::Result<i64> {
    Ok(diesel::sql_query(sql)
        .bind::<diesel::sql_types::BigInt, _>(id)
        .get_result::<Count>(conn)?
        .count)
}
