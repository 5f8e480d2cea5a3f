//! Postgres persistence for mail administration: limit counters, accounts,
//! domains and aliases, plus the Postgres implementations of the core
//! collaborator traits.

pub mod config;
pub mod directory;
pub mod error;
pub mod models;
pub mod registry;
pub mod repositories;

use sqlx::postgres::PgPoolOptions;

pub use config::DbConfig;
pub use directory::PgDirectory;
pub use registry::PgLimitRegistry;

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from configuration.
pub async fn create_pool(config: &DbConfig) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
}

/// Apply the embedded migrations.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
