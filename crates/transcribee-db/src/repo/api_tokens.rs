//! Admin API token persistence. These are provisioned out of band (no
//! HTTP endpoint mints them); the repository only reads them back for
//! verification.

use sqlx::PgConnection;

use crate::error::DbError;
use crate::models::ApiToken;

/// Load every admin token for the caller to compare in constant time.
///
/// # Errors
///
/// Propagates any database error.
pub async fn all(conn: &mut PgConnection) -> Result<Vec<ApiToken>, DbError> {
    sqlx::query_as::<_, ApiToken>("select id, name, token, created_at from api_tokens")
        .fetch_all(conn)
        .await
        .map_err(DbError::from)
}
