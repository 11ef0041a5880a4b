//! Document and media-file persistence.

use chrono::Utc;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::DbError;
use crate::models::{Document, DocumentMediaFile};

/// Create a document owned by `user_id`.
///
/// # Errors
///
/// Propagates any database error.
pub async fn create(
    conn: &mut PgConnection,
    user_id: Uuid,
    name: &str,
) -> Result<Document, DbError> {
    let now = Utc::now();
    sqlx::query_as::<_, Document>(
        r#"
        insert into documents (user_id, name, created_at, changed_at)
        values ($1, $2, $3, $3)
        returning id, user_id, name, duration, created_at, changed_at
        "#,
    )
    .bind(user_id)
    .bind(name)
    .bind(now)
    .fetch_one(conn)
    .await
    .map_err(DbError::from)
}

/// Load a document by id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no such document exists.
pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Document, DbError> {
    sqlx::query_as::<_, Document>(
        "select id, user_id, name, duration, created_at, changed_at from documents where id = $1",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or(DbError::NotFound)
}

/// List every document owned by `user_id`, most recently changed first.
///
/// # Errors
///
/// Propagates any database error.
pub async fn list_for_user(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> Result<Vec<Document>, DbError> {
    sqlx::query_as::<_, Document>(
        "select id, user_id, name, duration, created_at, changed_at
         from documents where user_id = $1 order by changed_at desc",
    )
    .bind(user_id)
    .fetch_all(conn)
    .await
    .map_err(DbError::from)
}

/// Rename a document, bumping `changed_at`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no such document exists.
pub async fn rename(
    conn: &mut PgConnection,
    id: Uuid,
    name: &str,
) -> Result<Document, DbError> {
    sqlx::query_as::<_, Document>(
        r#"
        update documents set name = $2, changed_at = $3
        where id = $1
        returning id, user_id, name, duration, created_at, changed_at
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(Utc::now())
    .fetch_optional(conn)
    .await?
    .ok_or(DbError::NotFound)
}

/// Set the document's media duration in seconds, bumping `changed_at`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no such document exists.
pub async fn set_duration(
    conn: &mut PgConnection,
    id: Uuid,
    duration: f64,
) -> Result<Document, DbError> {
    sqlx::query_as::<_, Document>(
        r#"
        update documents set duration = $2, changed_at = $3
        where id = $1
        returning id, user_id, name, duration, created_at, changed_at
        "#,
    )
    .bind(id)
    .bind(duration)
    .bind(Utc::now())
    .fetch_optional(conn)
    .await?
    .ok_or(DbError::NotFound)
}

/// Delete a document; foreign keys cascade to every owned row
/// (updates, tasks, attempts, media files, share tokens).
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no such document exists.
pub async fn delete(conn: &mut PgConnection, id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query("delete from documents where id = $1")
        .bind(id)
        .execute(conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Attach a media file to a document.
///
/// # Errors
///
/// Propagates any database error.
pub async fn add_media_file(
    conn: &mut PgConnection,
    document_id: Uuid,
    file: &str,
    content_type: &str,
    tags: &[String],
) -> Result<DocumentMediaFile, DbError> {
    let now = Utc::now();
    sqlx::query_as::<_, DocumentMediaFile>(
        r#"
        insert into document_media_files (document_id, file, content_type, tags, created_at, changed_at)
        values ($1, $2, $3, $4, $5, $5)
        returning id, document_id, file, content_type, tags, created_at, changed_at
        "#,
    )
    .bind(document_id)
    .bind(file)
    .bind(content_type)
    .bind(tags)
    .bind(now)
    .fetch_one(conn)
    .await
    .map_err(DbError::from)
}

/// List every media file attached to a document.
///
/// # Errors
///
/// Propagates any database error.
pub async fn media_files_for_document(
    conn: &mut PgConnection,
    document_id: Uuid,
) -> Result<Vec<DocumentMediaFile>, DbError> {
    sqlx::query_as::<_, DocumentMediaFile>(
        "select id, document_id, file, content_type, tags, created_at, changed_at
         from document_media_files where document_id = $1",
    )
    .bind(document_id)
    .fetch_all(conn)
    .await
    .map_err(DbError::from)
}
