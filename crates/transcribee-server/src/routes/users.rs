//! `/users/*` — account creation, login, logout, and profile endpoints.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::{self, credentials};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateUserBody {
    username: String,
    password: String,
}

#[derive(Debug, Serialize)]
pub struct UsernameResponse {
    username: String,
}

/// `POST /users/create/`.
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<CreateUserBody>,
) -> AppResult<Json<UsernameResponse>> {
    let hash = transcribee_auth::hash_password(&body.password);
    let mut conn = state.conn().await?;
    let user =
        transcribee_db::repo::users::create(&mut conn, &body.username, &hash.hash, &hash.salt)
            .await?;
    Ok(Json(UsernameResponse {
        username: user.username,
    }))
}

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    username: String,
    password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    token: String,
}

/// `POST /users/login/`.
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginBody>,
) -> AppResult<Json<TokenResponse>> {
    let mut conn = state.conn().await?;
    let user = transcribee_db::repo::users::find_by_username(&mut conn, &body.username)
        .await
        .map_err(|_| AppError::Forbidden("invalid username or password".to_string()))?;

    if !transcribee_auth::verify_password(&body.password, &user.password_salt, &user.password_hash)
    {
        return Err(AppError::Forbidden(
            "invalid username or password".to_string(),
        ));
    }

    let secret = transcribee_auth::generate_secret();
    let hash = transcribee_auth::hash_secret(&secret);
    let valid_until = Utc::now() + Duration::days(state.settings.user_token_lifetime_days);
    transcribee_db::repo::users::create_token(&mut conn, user.id, &hash.hash, &hash.salt, valid_until)
        .await?;

    Ok(Json(TokenResponse {
        token: transcribee_auth::encode_scoped_token(user.id, &secret),
    }))
}

/// `POST /users/logout/`.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<StatusCode> {
    let mut conn = state.conn().await?;
    let presented = credentials::from_headers(&headers)?;
    let Some((user_id, secret)) = &presented.user else {
        return Err(AppError::AuthFailure("no user token presented".to_string()));
    };
    let tokens = transcribee_db::repo::users::tokens_for_user(&mut conn, *user_id).await?;
    let matched = tokens
        .iter()
        .find(|t| transcribee_auth::verify_secret(secret, &t.token_salt, &t.token_hash))
        .ok_or_else(|| AppError::AuthFailure("invalid or expired user token".to_string()))?;
    transcribee_db::repo::users::delete_token(&mut conn, matched.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /users/me/`.
pub async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<UsernameResponse>> {
    let mut conn = state.conn().await?;
    let user = auth::authenticate_user(&mut conn, &headers).await?;
    Ok(Json(UsernameResponse {
        username: user.username,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordBody {
    old_password: String,
    new_password: String,
}

/// `POST /users/change_password/`. Invalidates every existing user token.
pub async fn change_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ChangePasswordBody>,
) -> AppResult<Json<UsernameResponse>> {
    let mut conn = state.conn().await?;
    let user = auth::authenticate_user(&mut conn, &headers).await?;

    if !transcribee_auth::verify_password(
        &body.old_password,
        &user.password_salt,
        &user.password_hash,
    ) {
        return Err(AppError::Forbidden("old password does not match".to_string()));
    }
    if body.new_password.len() < 6 {
        return Err(AppError::Validation(
            "new password must be at least 6 characters".to_string(),
        ));
    }

    let hash = transcribee_auth::hash_password(&body.new_password);
    transcribee_db::repo::users::update_password(&mut conn, user.id, &hash.hash, &hash.salt)
        .await?;
    transcribee_db::repo::users::delete_all_tokens_for_user(&mut conn, user.id).await?;

    Ok(Json(UsernameResponse {
        username: user.username,
    }))
}
