//! User and user-token persistence.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::DbError;
use crate::models::{User, UserToken};

/// Insert a new user. Returns [`DbError::Conflict`] on a duplicate
/// username rather than the raw SQL error.
///
/// # Errors
///
/// Propagates any other database error.
pub async fn create(
    conn: &mut PgConnection,
    username: &str,
    password_hash: &[u8],
    password_salt: &[u8],
) -> Result<User, DbError> {
    sqlx::query_as::<_, User>(
        r#"
        insert into users (username, password_hash, password_salt)
        values ($1, $2, $3)
        returning id, username, password_hash, password_salt, created_at
        "#,
    )
    .bind(username)
    .bind(password_hash)
    .bind(password_salt)
    .fetch_one(conn)
    .await
    .map_err(|e| {
        let db_err = DbError::from(e);
        if db_err.is_unique_violation() {
            DbError::Conflict("A user with this username already exists.".to_string())
        } else {
            db_err
        }
    })
}

/// Look up a user by username.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no such user exists.
pub async fn find_by_username(conn: &mut PgConnection, username: &str) -> Result<User, DbError> {
    sqlx::query_as::<_, User>(
        "select id, username, password_hash, password_salt, created_at from users where username = $1",
    )
    .bind(username)
    .fetch_optional(conn)
    .await?
    .ok_or(DbError::NotFound)
}

/// Look up a user by id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no such user exists.
pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> Result<User, DbError> {
    sqlx::query_as::<_, User>(
        "select id, username, password_hash, password_salt, created_at from users where id = $1",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or(DbError::NotFound)
}

/// Overwrite a user's password hash/salt, used by the change-password flow.
///
/// # Errors
///
/// Propagates any database error.
pub async fn update_password(
    conn: &mut PgConnection,
    user_id: Uuid,
    password_hash: &[u8],
    password_salt: &[u8],
) -> Result<(), DbError> {
    sqlx::query("update users set password_hash = $2, password_salt = $3 where id = $1")
        .bind(user_id)
        .bind(password_hash)
        .bind(password_salt)
        .execute(conn)
        .await?;
    Ok(())
}

/// Mint a new login token row.
///
/// # Errors
///
/// Propagates any database error.
pub async fn create_token(
    conn: &mut PgConnection,
    user_id: Uuid,
    token_hash: &[u8],
    token_salt: &[u8],
    valid_until: DateTime<Utc>,
) -> Result<UserToken, DbError> {
    sqlx::query_as::<_, UserToken>(
        r#"
        insert into user_tokens (user_id, token_hash, token_salt, valid_until)
        values ($1, $2, $3, $4)
        returning id, user_id, token_hash, token_salt, valid_until
        "#,
    )
    .bind(user_id)
    .bind(token_hash)
    .bind(token_salt)
    .bind(valid_until)
    .fetch_one(conn)
    .await
    .map_err(DbError::from)
}

/// List all non-expired tokens for a user. Candidates are filtered by
/// `valid_until` in SQL, then the caller verifies the scrypt secret in
/// constant time against each.
///
/// # Errors
///
/// Propagates any database error.
pub async fn tokens_for_user(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> Result<Vec<UserToken>, DbError> {
    sqlx::query_as::<_, UserToken>(
        "select id, user_id, token_hash, token_salt, valid_until
         from user_tokens where user_id = $1 and valid_until > now()",
    )
    .bind(user_id)
    .fetch_all(conn)
    .await
    .map_err(DbError::from)
}

/// Delete a single token (logout).
///
/// # Errors
///
/// Propagates any database error.
pub async fn delete_token(conn: &mut PgConnection, token_id: Uuid) -> Result<(), DbError> {
    sqlx::query("delete from user_tokens where id = $1")
        .bind(token_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Delete all tokens for a user (change-password invalidation).
///
/// # Errors
///
/// Propagates any database error.
pub async fn delete_all_tokens_for_user(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> Result<(), DbError> {
    sqlx::query("delete from user_tokens where user_id = $1")
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Delete every token whose `valid_until` has passed. Used by the
/// expired-token sweeper.
///
/// # Errors
///
/// Propagates any database error.
pub async fn delete_expired_tokens(conn: &mut PgConnection) -> Result<u64, DbError> {
    let result = sqlx::query("delete from user_tokens where valid_until < now()")
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}
