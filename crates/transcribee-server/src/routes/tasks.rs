//! `/tasks/*` — claiming, keepalive, and terminal reporting for workers,
//! plus the user-facing ad-hoc task creation endpoint.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::auth::{self, credentials, AuthLevel};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateTaskBody {
    document_id: Uuid,
    task_type: String,
    #[serde(default = "default_task_parameters")]
    task_parameters: Value,
}

fn default_task_parameters() -> Value {
    Value::Object(serde_json::Map::new())
}

#[derive(Debug, Serialize)]
pub struct TaskResponse {
    id: Uuid,
    document_id: Uuid,
    task_type: String,
    state: String,
}

impl From<transcribee_db::models::Task> for TaskResponse {
    fn from(t: transcribee_db::models::Task) -> Self {
        Self {
            id: t.id,
            document_id: t.document_id,
            task_type: t.task_type.to_string(),
            state: t.state.as_str().to_string(),
        }
    }
}

/// `POST /tasks/`. Lets a caller with full access to a document enqueue
/// an ad-hoc task outside the default dependency chain (`SPEC_FULL.md`
/// §6's supplemental endpoint).
pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateTaskBody>,
) -> AppResult<Json<TaskResponse>> {
    let mut conn = state.conn().await?;
    let presented = credentials::from_headers(&headers)?;
    let ctx = auth::resolve_document_auth(&mut conn, body.document_id, &presented).await?;
    ctx.require(AuthLevel::Full)?;

    let task = transcribee_db::repo::tasks::create_task(
        &mut conn,
        body.document_id,
        &transcribee_db::models::TaskType::from(body.task_type.as_str()),
        body.task_parameters,
        state.dispatcher.attempt_limit(),
    )
    .await?;

    Ok(Json(task.into()))
}

#[derive(Debug, Serialize)]
struct MediaFileDescriptor {
    id: Uuid,
    tags: Vec<String>,
    content_type: String,
    url: String,
}

#[derive(Debug, Serialize)]
struct DocumentDescriptor {
    id: Uuid,
    name: String,
    duration: Option<f64>,
    media_files: Vec<MediaFileDescriptor>,
}

#[derive(Debug, Serialize)]
pub struct ClaimedTaskResponse {
    id: Uuid,
    task_type: String,
    task_parameters: Value,
    attempt_id: Uuid,
    document: DocumentDescriptor,
}

/// `POST /tasks/claim_unassigned_task/`. Returns the claimed task with a
/// signed-URL document descriptor, or `null` if nothing is claimable.
pub async fn claim_unassigned_task(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> AppResult<Json<Option<ClaimedTaskResponse>>> {
    let mut conn = state.conn().await?;
    let worker = auth::authenticate_worker(&mut conn, &headers).await?;

    let task_types: Vec<String> = params
        .into_iter()
        .filter(|(k, _)| k == "task_type")
        .map(|(_, v)| v)
        .collect();
    if task_types.is_empty() {
        return Err(AppError::Validation(
            "at least one task_type query parameter is required".to_string(),
        ));
    }

    let Some(claimed) = state.dispatcher.claim(worker.id, &task_types).await? else {
        return Ok(Json(None));
    };

    transcribee_db::repo::workers::touch_last_seen(&mut conn, worker.id).await?;

    let document =
        transcribee_db::repo::documents::find_by_id(&mut conn, claimed.task.document_id).await?;
    let media_files =
        transcribee_db::repo::documents::media_files_for_document(&mut conn, document.id).await?;

    Ok(Json(Some(ClaimedTaskResponse {
        id: claimed.task.id,
        task_type: claimed.task.task_type.to_string(),
        task_parameters: claimed.task.task_parameters,
        attempt_id: claimed.attempt.id,
        document: DocumentDescriptor {
            id: document.id,
            name: document.name,
            duration: document.duration,
            media_files: media_files
                .into_iter()
                .map(|m| MediaFileDescriptor {
                    id: m.id,
                    tags: m.tags,
                    content_type: m.content_type,
                    url: state.sign_media_url(&m.file),
                })
                .collect(),
        },
    })))
}

#[derive(Debug, Deserialize)]
pub struct KeepaliveBody {
    progress: Option<f64>,
}

/// `POST /tasks/{id}/keepalive/`.
pub async fn keepalive(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<KeepaliveBody>,
) -> AppResult<StatusCode> {
    let mut conn = state.conn().await?;
    let worker = auth::authenticate_worker(&mut conn, &headers).await?;
    state.dispatcher.keepalive(id, worker.id, body.progress).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Raw `extra_data` payload workers attach when a task ends, passed
/// through unmodified to the task attempt and, for `EXPORT` tasks, to
/// the waiting HTTP caller.
type ExtraData = Option<Value>;

async fn require_holder(
    conn: &mut sqlx::PgConnection,
    task_id: Uuid,
    worker_id: Uuid,
) -> AppResult<transcribee_db::models::Task> {
    let task = transcribee_db::repo::tasks::find_by_id(conn, task_id).await?;
    match transcribee_db::repo::tasks::current_attempt(conn, task_id).await? {
        Some(attempt) if attempt.assigned_worker_id == Some(worker_id) => Ok(task),
        _ => Err(AppError::Forbidden(
            "worker does not hold the current attempt".to_string(),
        )),
    }
}

/// `POST /tasks/{id}/mark_completed/`. For an `EXPORT` task, unblocks
/// the HTTP caller blocked in `GET /documents/{id}/export/`.
pub async fn mark_completed(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(extra_data): Json<ExtraData>,
) -> AppResult<StatusCode> {
    let mut conn = state.conn().await?;
    let worker = auth::authenticate_worker(&mut conn, &headers).await?;
    let task = require_holder(&mut conn, id, worker.id).await?;

    state.dispatcher.mark_completed(id, extra_data.clone()).await?;

    if task.task_type == transcribee_db::models::TaskType::Export {
        state
            .exports
            .deliver(
                id,
                transcribee_tasks::export::ExportOutcome::Result(
                    extra_data.unwrap_or(Value::Null),
                ),
            )
            .await;
    }

    Ok(StatusCode::NO_CONTENT)
}

/// `POST /tasks/{id}/mark_failed/`. For an `EXPORT` task, unblocks the
/// HTTP caller with an error outcome.
pub async fn mark_failed(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(extra_data): Json<ExtraData>,
) -> AppResult<StatusCode> {
    let mut conn = state.conn().await?;
    let worker = auth::authenticate_worker(&mut conn, &headers).await?;
    let task = require_holder(&mut conn, id, worker.id).await?;

    state.dispatcher.mark_failed(id, extra_data.clone()).await?;

    if task.task_type == transcribee_db::models::TaskType::Export {
        state
            .exports
            .deliver(
                id,
                transcribee_tasks::export::ExportOutcome::Error(
                    extra_data.unwrap_or(Value::Null),
                ),
            )
            .await;
    }

    Ok(StatusCode::NO_CONTENT)
}
