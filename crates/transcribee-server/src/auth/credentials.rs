//! Reads the four credential schemes from `SPEC_FULL.md` §4.1 off an HTTP
//! request (headers) or a websocket handshake (query parameters, since
//! browsers cannot set headers on the upgrade request).

use std::collections::HashMap;

use axum::http::HeaderMap;
use transcribee_auth::CredentialError;
use uuid::Uuid;

use crate::error::AppError;

/// Every credential a single request presented, parsed but not yet
/// verified against the database.
#[derive(Debug, Default, Clone)]
pub struct PresentedCredentials {
    /// `Authorization: Token <user token>` — `(user_id, secret)`.
    pub user: Option<(Uuid, String)>,
    /// `Authorization: Worker <token>`.
    pub worker_token: Option<String>,
    /// `Share-Token: <token>`.
    pub share_token: Option<String>,
    /// `Api-Token: <token>`.
    pub api_token: Option<String>,
}

/// Parse the `Authorization`, `Share-Token`, and `Api-Token` headers of an
/// HTTP request.
///
/// # Errors
///
/// Returns [`AppError::AuthFailure`] for an `Authorization` header with no
/// scheme separator or an unrecognized scheme, and [`AppError::BadRequest`]
/// for a `Token` payload that isn't valid `base64(id:secret)`.
pub fn from_headers(headers: &HeaderMap) -> Result<PresentedCredentials, AppError> {
    let mut creds = PresentedCredentials::default();

    if let Some(value) = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        let (scheme, payload) = value.split_once(' ').ok_or(CredentialError::NoScheme)?;
        match scheme {
            "Token" => creds.user = Some(transcribee_auth::parse_scoped_token(payload)?),
            "Worker" => creds.worker_token = Some(payload.to_string()),
            _ => return Err(CredentialError::WrongScheme.into()),
        }
    }
    if let Some(value) = headers.get("Share-Token").and_then(|v| v.to_str().ok()) {
        creds.share_token = Some(value.to_string());
    }
    if let Some(value) = headers.get("Api-Token").and_then(|v| v.to_str().ok()) {
        creds.api_token = Some(value.to_string());
    }
    Ok(creds)
}

/// Parse the same three credential kinds from websocket handshake query
/// parameters (`token`, `worker_token`, `share_token`).
///
/// # Errors
///
/// Returns [`AppError::BadRequest`] if `token` is present but not valid
/// `base64(id:secret)`.
pub fn from_query(query: &HashMap<String, String>) -> Result<PresentedCredentials, AppError> {
    let mut creds = PresentedCredentials::default();
    if let Some(payload) = query.get("token") {
        creds.user = Some(transcribee_auth::parse_scoped_token(payload)?);
    }
    if let Some(value) = query.get("worker_token") {
        creds.worker_token = Some(value.clone());
    }
    if let Some(value) = query.get("share_token") {
        creds.share_token = Some(value.clone());
    }
    Ok(creds)
}
