//! Document share-token persistence.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::DbError;
use crate::models::DocumentShareToken;

/// Create a share token scoped to `document_id`.
///
/// # Errors
///
/// Propagates any database error.
pub async fn create(
    conn: &mut PgConnection,
    document_id: Uuid,
    token: &str,
    name: &str,
    valid_until: Option<DateTime<Utc>>,
    can_write: bool,
) -> Result<DocumentShareToken, DbError> {
    sqlx::query_as::<_, DocumentShareToken>(
        r#"
        insert into document_share_tokens (document_id, token, name, valid_until, can_write)
        values ($1, $2, $3, $4, $5)
        returning id, document_id, token, name, valid_until, can_write
        "#,
    )
    .bind(document_id)
    .bind(token)
    .bind(name)
    .bind(valid_until)
    .bind(can_write)
    .fetch_one(conn)
    .await
    .map_err(DbError::from)
}

/// List every share token for a document.
///
/// # Errors
///
/// Propagates any database error.
pub async fn list_for_document(
    conn: &mut PgConnection,
    document_id: Uuid,
) -> Result<Vec<DocumentShareToken>, DbError> {
    sqlx::query_as::<_, DocumentShareToken>(
        "select id, document_id, token, name, valid_until, can_write
         from document_share_tokens where document_id = $1",
    )
    .bind(document_id)
    .fetch_all(conn)
    .await
    .map_err(DbError::from)
}

/// Find a non-expired share token scoped to `document_id`, for the
/// caller to compare against a presented token in constant time.
///
/// # Errors
///
/// Propagates any database error.
pub async fn active_for_document(
    conn: &mut PgConnection,
    document_id: Uuid,
) -> Result<Vec<DocumentShareToken>, DbError> {
    sqlx::query_as::<_, DocumentShareToken>(
        "select id, document_id, token, name, valid_until, can_write
         from document_share_tokens
         where document_id = $1 and (valid_until is null or valid_until > now())",
    )
    .bind(document_id)
    .fetch_all(conn)
    .await
    .map_err(DbError::from)
}

/// Delete one share token scoped to a document.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no matching row exists.
pub async fn delete(
    conn: &mut PgConnection,
    document_id: Uuid,
    token_id: Uuid,
) -> Result<(), DbError> {
    let result = sqlx::query("delete from document_share_tokens where id = $1 and document_id = $2")
        .bind(token_id)
        .bind(document_id)
        .execute(conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}
