//! The Authorization Resolver (component C3): turns [`PresentedCredentials`]
//! plus a target document into an effective [`AuthLevel`], per
//! `SPEC_FULL.md` §4.3.

use axum::http::HeaderMap;
use sqlx::PgConnection;
use transcribee_db::models::{Document, User, Worker};
use uuid::Uuid;

use crate::auth::credentials::{self, PresentedCredentials};
use crate::error::AppError;

/// The highest privilege a caller proved toward a document. Variants are
/// declared least to most privileged so the derived [`Ord`] matches
/// `SPEC_FULL.md` §4.3's table (`FULL > WORKER > READ_WRITE > READ_ONLY`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AuthLevel {
    ReadOnly,
    ReadWrite,
    Worker,
    Full,
}

/// The resolved identity and level for one request against one document.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub document: Document,
    pub level: AuthLevel,
    pub user: Option<User>,
    pub worker: Option<Worker>,
}

impl AuthContext {
    /// Fail with [`AppError::Forbidden`] unless the resolved level meets
    /// `min_level`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Forbidden`] if `self.level < min_level`.
    pub fn require(&self, min_level: AuthLevel) -> Result<(), AppError> {
        if self.level < min_level {
            return Err(AppError::Forbidden(
                "credential does not confer the required access level".to_string(),
            ));
        }
        Ok(())
    }
}

/// Verify a presented user token against every live token for the user it
/// names, in constant time per candidate.
///
/// # Errors
///
/// Propagates any database error. Returns `Ok(None)` (not an error) if the
/// user or a matching token doesn't exist.
pub async fn resolve_user(
    conn: &mut PgConnection,
    presented: &PresentedCredentials,
) -> Result<Option<User>, AppError> {
    let Some((user_id, secret)) = &presented.user else {
        return Ok(None);
    };
    let user = match transcribee_db::repo::users::find_by_id(conn, *user_id).await {
        Ok(user) => user,
        Err(transcribee_db::DbError::NotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let tokens = transcribee_db::repo::users::tokens_for_user(conn, *user_id).await?;
    let matches = tokens
        .iter()
        .any(|t| transcribee_auth::verify_secret(secret, &t.token_salt, &t.token_hash));
    Ok(matches.then_some(user))
}

/// Verify a presented worker token against every active worker's
/// cleartext token, in constant time per candidate.
///
/// # Errors
///
/// Propagates any database error.
pub async fn resolve_worker(
    conn: &mut PgConnection,
    presented: &PresentedCredentials,
) -> Result<Option<Worker>, AppError> {
    let Some(token) = &presented.worker_token else {
        return Ok(None);
    };
    let workers = transcribee_db::repo::workers::find_active_by_token_candidates(conn).await?;
    Ok(workers
        .into_iter()
        .find(|w| transcribee_auth::verify_worker_token(token, &w.token)))
}

/// Verify a presented `Api-Token` against every configured admin token.
///
/// # Errors
///
/// Propagates any database error.
pub async fn resolve_api_token(
    conn: &mut PgConnection,
    presented: &PresentedCredentials,
) -> Result<bool, AppError> {
    let Some(token) = &presented.api_token else {
        return Ok(false);
    };
    let candidates = transcribee_db::repo::api_tokens::all(conn).await?;
    Ok(candidates
        .iter()
        .any(|c| transcribee_auth::verify_api_token(token, &c.token)))
}

/// Compute the effective [`AuthLevel`] for `presented` against
/// `document_id`, per `SPEC_FULL.md` §4.3: the maximum of whatever each
/// credential proves.
///
/// # Errors
///
/// Returns [`AppError::NotFound`] if the document doesn't exist.
/// Propagates any database error from verifying a credential.
pub async fn resolve_document_auth(
    conn: &mut PgConnection,
    document_id: Uuid,
    presented: &PresentedCredentials,
) -> Result<AuthContext, AppError> {
    let document = transcribee_db::repo::documents::find_by_id(conn, document_id).await?;

    let user = resolve_user(conn, presented).await?;
    let worker = resolve_worker(conn, presented).await?;

    let mut level = None;

    if let Some(user) = &user {
        if user.id == document.user_id {
            level = Some(level.map_or(AuthLevel::Full, |l: AuthLevel| l.max(AuthLevel::Full)));
        }
    }

    if let Some(worker) = &worker {
        if transcribee_db::repo::tasks::worker_holds_attempt_in_document(
            conn,
            document_id,
            worker.id,
        )
        .await?
        {
            level = Some(level.map_or(AuthLevel::Worker, |l: AuthLevel| l.max(AuthLevel::Worker)));
        }
    }

    if let Some(share_token) = &presented.share_token {
        let active = transcribee_db::repo::share_tokens::active_for_document(conn, document_id)
            .await?;
        if let Some(matched) = active
            .iter()
            .find(|t| transcribee_auth::verify_worker_token(share_token, &t.token))
        {
            let share_level = if matched.can_write {
                AuthLevel::ReadWrite
            } else {
                AuthLevel::ReadOnly
            };
            level = Some(level.map_or(share_level, |l: AuthLevel| l.max(share_level)));
        }
    }

    let Some(level) = level else {
        return Err(AppError::Forbidden(
            "no credential grants access to this document".to_string(),
        ));
    };

    Ok(AuthContext {
        document,
        level,
        user,
        worker,
    })
}

/// Authenticate the caller as a user from the `Authorization: Token`
/// header, for endpoints that aren't scoped to a document (`/users/me/`,
/// `/users/logout/`, `POST /documents/`, …).
///
/// # Errors
///
/// Returns [`AppError::AuthFailure`] if no credential is presented or it
/// doesn't match a live user token. Propagates any database error.
pub async fn authenticate_user(
    conn: &mut PgConnection,
    headers: &HeaderMap,
) -> Result<User, AppError> {
    let presented = credentials::from_headers(headers)?;
    resolve_user(conn, &presented)
        .await?
        .ok_or_else(|| AppError::AuthFailure("invalid or expired user token".to_string()))
}

/// Authenticate the caller as a worker from the `Authorization: Worker`
/// header, for the worker-facing task endpoints. Also rejects a
/// deactivated worker.
///
/// # Errors
///
/// Returns [`AppError::AuthFailure`] if no credential is presented, it
/// doesn't match an active worker, or the worker has been deactivated.
/// Propagates any database error.
pub async fn authenticate_worker(
    conn: &mut PgConnection,
    headers: &HeaderMap,
) -> Result<Worker, AppError> {
    let presented = credentials::from_headers(headers)?;
    let worker = resolve_worker(conn, &presented)
        .await?
        .ok_or_else(|| AppError::AuthFailure("invalid or unknown worker token".to_string()))?;
    if !worker.is_active() {
        return Err(AppError::AuthFailure("worker is deactivated".to_string()));
    }
    Ok(worker)
}

/// Authenticate the caller as the admin via `Api-Token`, for worker
/// management endpoints.
///
/// # Errors
///
/// Returns [`AppError::AuthFailure`] if no `Api-Token` header is present
/// or it doesn't match a configured admin token. Propagates any database
/// error.
pub async fn authenticate_admin(
    conn: &mut PgConnection,
    headers: &HeaderMap,
) -> Result<(), AppError> {
    let presented = credentials::from_headers(headers)?;
    if resolve_api_token(conn, &presented).await? {
        Ok(())
    } else {
        Err(AppError::AuthFailure("invalid or missing API token".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_level_ordering_matches_spec_table() {
        assert!(AuthLevel::Full > AuthLevel::Worker);
        assert!(AuthLevel::Worker > AuthLevel::ReadWrite);
        assert!(AuthLevel::ReadWrite > AuthLevel::ReadOnly);
    }
}
