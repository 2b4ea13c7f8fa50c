//! `PostgreSQL` adapters for task lifecycle persistence.

mod config;
mod models;
mod repository;
mod schema;

pub use config::{
    DATABASE_URL_ENV, DEFAULT_POOL_SIZE, POOL_SIZE_ENV, PostgresConfigError, PostgresStoreConfig,
};
pub use repository::{PostgresTaskRepository, TaskPgPool};
