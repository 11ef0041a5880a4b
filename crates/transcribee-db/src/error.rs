//! Repository-layer error taxonomy.
//!
//! These are intentionally coarse — the HTTP-facing taxonomy in
//! `SPEC_FULL.md` §7 lives in `transcribee-server::error`, which converts
//! `DbError` into the right status code. This enum only distinguishes what
//! a repository caller needs to branch on.

/// Failure returned by a repository function.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// The requested row does not exist.
    #[error("not found")]
    NotFound,
    /// A uniqueness constraint was violated (e.g. duplicate username).
    #[error("conflict: {0}")]
    Conflict(String),
    /// Migrations failed to apply.
    #[error("migration failed: {0}")]
    Migration(String),
    /// Any other database error (connection loss, constraint violation not
    /// otherwise classified, etc).
    #[error("database error: {0}")]
    Sql(#[from] sqlx::Error),
}

impl DbError {
    /// True if this error represents a unique-constraint violation on
    /// Postgres (SQLSTATE `23505`).
    #[must_use]
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::Sql(sqlx::Error::Database(db)) if db.code().as_deref() == Some("23505"))
    }
}
