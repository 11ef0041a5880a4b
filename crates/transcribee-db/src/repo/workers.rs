//! Worker persistence.

use chrono::Utc;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::DbError;
use crate::models::Worker;

/// Register a new worker with a freshly generated cleartext token.
///
/// # Errors
///
/// Propagates any database error.
pub async fn create(conn: &mut PgConnection, name: &str, token: &str) -> Result<Worker, DbError> {
    sqlx::query_as::<_, Worker>(
        r#"
        insert into workers (name, token)
        values ($1, $2)
        returning id, name, token, last_seen, deactivated_at
        "#,
    )
    .bind(name)
    .bind(token)
    .fetch_one(conn)
    .await
    .map_err(DbError::from)
}

/// List all active (non-deactivated) workers.
///
/// # Errors
///
/// Propagates any database error.
pub async fn list_active(conn: &mut PgConnection) -> Result<Vec<Worker>, DbError> {
    sqlx::query_as::<_, Worker>(
        "select id, name, token, last_seen, deactivated_at
         from workers where deactivated_at is null",
    )
    .fetch_all(conn)
    .await
    .map_err(DbError::from)
}

/// Find a worker by id, regardless of activation state.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no such worker exists.
pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Worker, DbError> {
    sqlx::query_as::<_, Worker>(
        "select id, name, token, last_seen, deactivated_at from workers where id = $1",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or(DbError::NotFound)
}

/// Find every active worker and let the caller compare tokens in
/// constant time; cleartext tokens are never filtered in SQL.
///
/// # Errors
///
/// Propagates any database error.
pub async fn find_active_by_token_candidates(
    conn: &mut PgConnection,
) -> Result<Vec<Worker>, DbError> {
    list_active(conn).await
}

/// Stamp `last_seen = now` for a worker, called on every authenticated
/// worker request.
///
/// # Errors
///
/// Propagates any database error.
pub async fn touch_last_seen(conn: &mut PgConnection, worker_id: Uuid) -> Result<(), DbError> {
    sqlx::query("update workers set last_seen = $2 where id = $1")
        .bind(worker_id)
        .bind(Utc::now())
        .execute(conn)
        .await?;
    Ok(())
}

/// Mark a worker deactivated; it can no longer authenticate.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no such worker exists.
pub async fn deactivate(conn: &mut PgConnection, worker_id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query("update workers set deactivated_at = $2 where id = $1")
        .bind(worker_id)
        .bind(Utc::now())
        .execute(conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}
