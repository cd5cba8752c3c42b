//! Process configuration read from the environment.

use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while reading configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required variable is unset or blank.
    #[error("{0} must be set")]
    Missing(&'static str),

    /// A variable could not be parsed.
    #[error("{key} has an invalid value {value:?}: {reason}")]
    Invalid {
        /// Variable name.
        key: &'static str,
        /// Raw value.
        value: String,
        /// Parser message.
        reason: String,
    },
}

/// Runtime configuration of the API server and notification relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// `PostgreSQL` connection string.
    pub database_url: String,
    /// Maximum pooled database connections.
    pub database_max_connections: u32,
    /// Shared HS256 secret for bearer tokens.
    pub jwt_secret: String,
    /// Listen address.
    pub bind_addr: SocketAddr,
    /// Notification service webhook; notifications are only logged when
    /// unset.
    pub notification_webhook_url: Option<String>,
    /// Delivery attempts before a notification is marked failed.
    pub notification_max_attempts: u32,
    /// Delay between relay passes.
    pub notification_poll_interval: Duration,
    /// Notifications fetched per relay pass.
    pub notification_batch_size: usize,
    /// `tracing` filter directive.
    pub log_level: String,
}

impl AppConfig {
    /// Reads configuration from the process environment, after loading a
    /// `.env` file when one exists.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a required variable is missing or a value
    /// does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            tracing::warn!(error = %err, "failed to load .env file");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a required variable is missing or a value
    /// does not parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &'static str| {
            lookup(key)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };
        let required = |key: &'static str| read(key).ok_or(ConfigError::Missing(key));

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            database_max_connections: parse_positive_or(
                read("DATABASE_MAX_CONNECTIONS"),
                "DATABASE_MAX_CONNECTIONS",
                10,
            )?,
            jwt_secret: required("JWT_SECRET")?,
            bind_addr: parse_or(
                read("BIND_ADDR"),
                "BIND_ADDR",
                SocketAddr::from(([0, 0, 0, 0], 8000)),
            )?,
            notification_webhook_url: read("NOTIFICATION_WEBHOOK_URL"),
            notification_max_attempts: parse_positive_or(
                read("NOTIFICATION_MAX_ATTEMPTS"),
                "NOTIFICATION_MAX_ATTEMPTS",
                5,
            )?,
            notification_poll_interval: Duration::from_secs(parse_positive_or(
                read("NOTIFICATION_POLL_INTERVAL_SECS"),
                "NOTIFICATION_POLL_INTERVAL_SECS",
                5,
            )?),
            notification_batch_size: parse_positive_or(
                read("NOTIFICATION_BATCH_SIZE"),
                "NOTIFICATION_BATCH_SIZE",
                50,
            )?,
            log_level: read("LOG_LEVEL").unwrap_or_else(|| "info".to_owned()),
        })
    }
}

fn parse_or<T>(raw: Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.map_or(Ok(default), |value| {
        value.parse().map_err(|err: T::Err| ConfigError::Invalid {
            key,
            reason: err.to_string(),
            value,
        })
    })
}

/// Like [`parse_or`], but refuses zero.
fn parse_positive_or<T>(raw: Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + Default + PartialEq,
    T::Err: std::fmt::Display,
{
    let original = raw.clone();
    let value = parse_or(raw, key, default)?;
    if value == T::default() {
        return Err(ConfigError::Invalid {
            key,
            value: original.unwrap_or_default(),
            reason: "must be greater than zero".to_owned(),
        });
    }
    Ok(value)
}
