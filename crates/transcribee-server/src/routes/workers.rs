//! `/worker/*` — admin-only worker provisioning.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth;
use crate::error::AppResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateWorkerBody {
    name: String,
}

#[derive(Debug, Serialize)]
pub struct WorkerCreatedResponse {
    id: Uuid,
    name: String,
    token: String,
}

/// `POST /worker/create/`. Admin-only; the freshly generated cleartext
/// token is only ever returned here.
pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateWorkerBody>,
) -> AppResult<Json<WorkerCreatedResponse>> {
    let mut conn = state.conn().await?;
    auth::authenticate_admin(&mut conn, &headers).await?;

    let token = transcribee_auth::generate_secret();
    let worker = transcribee_db::repo::workers::create(&mut conn, &body.name, &token).await?;

    Ok(Json(WorkerCreatedResponse {
        id: worker.id,
        name: worker.name,
        token: worker.token,
    }))
}

#[derive(Debug, Deserialize)]
pub struct DeactivateWorkerBody {
    id: Uuid,
}

/// `POST /worker/deactivate/`. Admin-only.
pub async fn deactivate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<DeactivateWorkerBody>,
) -> AppResult<StatusCode> {
    let mut conn = state.conn().await?;
    auth::authenticate_admin(&mut conn, &headers).await?;

    transcribee_db::repo::workers::deactivate(&mut conn, body.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
