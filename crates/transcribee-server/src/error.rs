//! HTTP-facing error taxonomy (`SPEC_FULL.md` §7).
//!
//! Every variant maps to exactly one status code and is rendered as the
//! single deterministic `{"detail": "..."}` JSON envelope. Lower layers
//! (`transcribee_db::DbError`, `transcribee_auth::CredentialError`,
//! `transcribee_tasks::DispatchError`) convert in via `From` rather than
//! leaking as opaque 500s.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use transcribee_auth::CredentialError;
use transcribee_db::DbError;
use transcribee_tasks::DispatchError;

/// Convenience alias for handlers.
pub type AppResult<T> = Result<T, AppError>;

/// The coordinator's HTTP-facing error taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Missing, malformed, or unrecognized credential. 401.
    #[error("{0}")]
    AuthFailure(String),
    /// Credential parsed but does not confer the required auth level. 403.
    #[error("{0}")]
    Forbidden(String),
    /// Document, task, or share token id does not exist. 404.
    #[error("{0}")]
    NotFound(String),
    /// Request body failed schema or domain validation. 422.
    #[error("{0}")]
    Validation(String),
    /// Duplicate username, or other request-shape conflict. 400.
    #[error("{0}")]
    Conflict(String),
    /// Malformed credential encoding (bad base64, missing delimiter). 400.
    #[error("{0}")]
    BadRequest(String),
    /// Inconsistent server-side state — a protocol violation, not a
    /// client error. 500.
    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
struct DetailBody {
    detail: String,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::AuthFailure(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Conflict(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> String {
        match self {
            Self::AuthFailure(m)
            | Self::Forbidden(m)
            | Self::NotFound(m)
            | Self::Validation(m)
            | Self::Conflict(m)
            | Self::BadRequest(m)
            | Self::Internal(m) => m.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if matches!(self, Self::Internal(_)) {
            tracing::error!(error = %self, "internal error");
        }
        let status = self.status();
        let body = DetailBody {
            detail: self.detail(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<DbError> for AppError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound => Self::NotFound("not found".to_string()),
            DbError::Conflict(msg) => Self::Conflict(msg),
            DbError::Migration(msg) => Self::Internal(msg),
            DbError::Sql(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<CredentialError> for AppError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::NoScheme | CredentialError::WrongScheme => {
                Self::AuthFailure(err.to_string())
            }
            CredentialError::InvalidBase64
            | CredentialError::InvalidUtf8
            | CredentialError::MissingDelimiter
            | CredentialError::InvalidId => Self::BadRequest(err.to_string()),
        }
    }
}

impl From<DispatchError> for AppError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::NotHolder => Self::Forbidden(err.to_string()),
            DispatchError::NoCurrentAttempt => Self::Internal(err.to_string()),
            DispatchError::Db(e) => Self::from(e),
        }
    }
}
