//! AcheiUmPro API server.
//!
//! Serves the marketplace HTTP API and runs the notification relay until
//! the process receives Ctrl-C.

use acheiumpro::{
    config::{AppConfig, ConfigError},
    http::{self, AppState},
    marketplace::{
        adapters::{
            dispatch::{LoggingDispatcher, WebhookDispatcher},
            jwt::JwtIdentityProvider,
            postgres::{MarketplacePgPool, PostgresMarketplace},
        },
        ports::{NotificationDispatchError, NotificationDispatcher},
        services::{Marketplace, NotificationRelay, NotificationTemplates, RelaySettings},
    },
    telemetry,
};
use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use mockable::DefaultClock;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to build database pool: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("failed to build notification dispatcher: {0}")]
    Dispatcher(#[from] NotificationDispatchError),
    #[error("server I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        telemetry::init("info");
        tracing::error!(error = %err, "acheiumpro exited with an error");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), StartupError> {
    let config = AppConfig::from_env()?;
    telemetry::init(&config.log_level);

    let pool: MarketplacePgPool = Pool::builder()
        .max_size(config.database_max_connections)
        .build(ConnectionManager::<PgConnection>::new(&config.database_url))?;
    let store = Arc::new(PostgresMarketplace::new(pool));
    let clock = Arc::new(DefaultClock);
    let marketplace = Marketplace::new(Arc::clone(&store), clock, NotificationTemplates::default());
    let identity = Arc::new(JwtIdentityProvider::new(&config.jwt_secret));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let settings = RelaySettings {
        max_attempts: config.notification_max_attempts,
        batch_size: config.notification_batch_size,
        poll_interval: config.notification_poll_interval,
    };
    let relay = match config.notification_webhook_url.as_deref() {
        Some(url) => {
            tracing::info!(endpoint = url, "delivering notifications by webhook");
            spawn_relay(
                Arc::clone(&store),
                Arc::new(WebhookDispatcher::new(url, WEBHOOK_TIMEOUT)?),
                settings,
                shutdown_rx.clone(),
            )
        }
        None => {
            tracing::info!("no notification webhook configured; notifications are logged");
            spawn_relay(
                Arc::clone(&store),
                Arc::new(LoggingDispatcher),
                settings,
                shutdown_rx.clone(),
            )
        }
    };

    let app = http::router(AppState::new(marketplace, identity));
    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "acheiumpro listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await?;

    if let Err(err) = relay.await {
        tracing::warn!(error = %err, "notification relay task ended abnormally");
    }
    tracing::info!("shutdown complete");
    Ok(())
}

fn spawn_relay<D>(
    store: Arc<PostgresMarketplace>,
    dispatcher: Arc<D>,
    settings: RelaySettings,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    D: NotificationDispatcher,
{
    tokio::spawn(async move {
        let relay = NotificationRelay::new(store, dispatcher, settings);
        relay
            .run(async move {
                if shutdown.wait_for(|stopping| *stopping).await.is_err() {
                    tracing::debug!("shutdown sender dropped");
                }
            })
            .await;
    })
}

async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for Ctrl-C");
    }
    tracing::info!("received Ctrl-C, shutting down");
    if shutdown_tx.send(true).is_err() {
        tracing::debug!("notification relay already stopped");
    }
}
