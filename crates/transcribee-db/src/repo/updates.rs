//! DocumentUpdate persistence — the append-only change log the sync hub
//! replays and broadcasts.

use chrono::Utc;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::DbError;
use crate::models::DocumentUpdate;

/// Append one change record, and bump the owning document's
/// `changed_at` in the same statement set. Callers run this inside the
/// same transaction as the broadcast so persistence always precedes
/// delivery.
///
/// # Errors
///
/// Propagates any database error.
pub async fn append(
    conn: &mut PgConnection,
    document_id: Uuid,
    change_bytes: &[u8],
) -> Result<DocumentUpdate, DbError> {
    let now = Utc::now();
    let update = sqlx::query_as::<_, DocumentUpdate>(
        r#"
        insert into document_updates (document_id, change_bytes, created_at)
        values ($1, $2, $3)
        returning id, seq, document_id, change_bytes, created_at
        "#,
    )
    .bind(document_id)
    .bind(change_bytes)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query("update documents set changed_at = $2 where id = $1")
        .bind(document_id)
        .bind(now)
        .execute(conn)
        .await?;

    Ok(update)
}

/// Replay every update for a document in insertion order, the backlog a
/// fresh subscriber receives before live streaming.
///
/// # Errors
///
/// Propagates any database error.
pub async fn backlog(
    conn: &mut PgConnection,
    document_id: Uuid,
) -> Result<Vec<DocumentUpdate>, DbError> {
    sqlx::query_as::<_, DocumentUpdate>(
        "select id, seq, document_id, change_bytes, created_at
         from document_updates where document_id = $1 order by seq asc",
    )
    .bind(document_id)
    .fetch_all(conn)
    .await
    .map_err(DbError::from)
}
