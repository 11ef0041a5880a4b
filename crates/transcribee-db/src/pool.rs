//! Connection pool setup and migration runner.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::error::DbError;

/// Shared, cloneable Postgres connection pool handle.
pub type DbPool = PgPool;

/// Open a connection pool against `database_url`, capped at
/// `max_connections`.
///
/// # Errors
///
/// Returns [`DbError`] if the pool cannot be established (bad URL,
/// connection refused, authentication failure).
pub async fn connect(database_url: &str, max_connections: u32) -> Result<DbPool, DbError> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .map_err(DbError::from)
}

/// Apply all pending migrations embedded in `migrations/`.
///
/// # Errors
///
/// Returns [`DbError`] if a migration fails to apply.
pub async fn run_migrations(pool: &DbPool) -> Result<(), DbError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| DbError::Migration(e.to_string()))
}
