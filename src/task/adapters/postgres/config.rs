//! Connection settings for the `PostgreSQL` task repository.

use super::repository::TaskPgPool;
use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use std::env;
use thiserror::Error;

/// Environment variable holding the database URL.
pub const DATABASE_URL_ENV: &str = "PIPEWRIGHT_DATABASE_URL";

/// Environment variable holding the maximum pool size.
pub const POOL_SIZE_ENV: &str = "PIPEWRIGHT_DB_POOL_SIZE";

/// Pool size used when none is configured.
pub const DEFAULT_POOL_SIZE: u32 = 8;

/// Errors raised while loading configuration or building the pool.
#[derive(Debug, Error)]
pub enum PostgresConfigError {
    /// The database URL is not set.
    #[error("PIPEWRIGHT_DATABASE_URL is not set")]
    MissingDatabaseUrl,

    /// The pool size is not a positive integer.
    #[error("invalid pool size '{0}', expected a positive integer")]
    InvalidPoolSize(String),

    /// The connection pool could not be built.
    #[error("failed to build connection pool: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
}

/// Settings for connecting the task repository to `PostgreSQL`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresStoreConfig {
    database_url: String,
    max_pool_size: u32,
}

impl PostgresStoreConfig {
    /// Creates settings for the given database URL with the default pool
    /// size.
    #[must_use]
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_pool_size: DEFAULT_POOL_SIZE,
        }
    }

    /// Sets the maximum number of pooled connections.
    #[must_use]
    pub const fn with_max_pool_size(mut self, size: u32) -> Self {
        self.max_pool_size = size;
        self
    }

    /// Loads settings from `PIPEWRIGHT_DATABASE_URL` and
    /// `PIPEWRIGHT_DB_POOL_SIZE`.
    ///
    /// # Errors
    ///
    /// Returns [`PostgresConfigError::MissingDatabaseUrl`] when the URL is
    /// unset or blank, and [`PostgresConfigError::InvalidPoolSize`] when the
    /// pool size does not parse as a positive integer.
    pub fn from_env() -> Result<Self, PostgresConfigError> {
        let database_url = env::var(DATABASE_URL_ENV)
            .ok()
            .filter(|url| !url.trim().is_empty())
            .ok_or(PostgresConfigError::MissingDatabaseUrl)?;
        let config = Self::new(database_url);
        match env::var(POOL_SIZE_ENV) {
            Ok(raw) => Ok(config.with_max_pool_size(parse_pool_size(&raw)?)),
            Err(_) => Ok(config),
        }
    }

    /// Returns the database URL.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Returns the maximum pool size.
    #[must_use]
    pub const fn max_pool_size(&self) -> u32 {
        self.max_pool_size
    }

    /// Builds a connection pool from these settings.
    ///
    /// # Errors
    ///
    /// Returns [`PostgresConfigError::Pool`] when the pool cannot open its
    /// initial connections.
    pub fn build_pool(&self) -> Result<TaskPgPool, PostgresConfigError> {
        let manager = ConnectionManager::<PgConnection>::new(self.database_url.as_str());
        Ok(Pool::builder()
            .max_size(self.max_pool_size)
            .build(manager)?)
    }
}

fn parse_pool_size(raw: &str) -> Result<u32, PostgresConfigError> {
    raw.trim()
        .parse::<u32>()
        .ok()
        .filter(|size| *size > 0)
        .ok_or_else(|| PostgresConfigError::InvalidPoolSize(raw.to_owned()))
}
