//! Connection configuration read from the environment.

use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::error::StoreError;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 5;

/// Database settings for the PostgreSQL store.
#[derive(Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// `DATABASE_URL`, required.
    pub database_url: String,
    /// `DATABASE_MAX_CONNECTIONS`, default 10.
    pub max_connections: u32,
    /// `DATABASE_ACQUIRE_TIMEOUT_SECS`, default 5.
    pub acquire_timeout: Duration,
}

// The URL carries credentials.
impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("database_url", &"<redacted>")
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout", &self.acquire_timeout)
            .finish()
    }
}

impl StoreConfig {
    /// Builds the configuration from a key lookup.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Config` if `DATABASE_URL` is missing or a numeric
    /// setting does not parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, StoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                StoreError::Config("DATABASE_URL environment variable must be set".into())
            })?;
        let max_connections = parse_or(
            &lookup,
            "DATABASE_MAX_CONNECTIONS",
            DEFAULT_MAX_CONNECTIONS,
        )?;
        let acquire_timeout_secs = parse_or(
            &lookup,
            "DATABASE_ACQUIRE_TIMEOUT_SECS",
            DEFAULT_ACQUIRE_TIMEOUT_SECS,
        )?;
        Ok(Self {
            database_url,
            max_connections,
            acquire_timeout: Duration::from_secs(acquire_timeout_secs),
        })
    }

    /// Builds the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// See [`StoreConfig::from_lookup`].
    pub fn from_env() -> Result<Self, StoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Opens a connection pool.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the database cannot be reached.
    pub async fn connect(&self) -> Result<PgPool, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout)
            .connect(&self.database_url)
            .await?;
        Ok(pool)
    }
}

/// Parses an optional numeric setting, falling back to `default`.
fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, StoreError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| StoreError::Config(format!("{key} must be a valid number: {e}"))),
    }
}
