//! `/documents/*` — document CRUD, share tokens, media upload, and export.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use transcribee_db::blob::BlobStore as _;
use uuid::Uuid;

use crate::auth::{self, credentials, AuthLevel};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Languages the coordinator accepts for a new document's `TRANSCRIBE`
/// stage. Not named by `SPEC_FULL.md`; a small illustrative allow-list
/// stands in for whatever set of installed models a deployment ships.
const SUPPORTED_LANGUAGES: &[&str] = &[
    "en", "de", "fr", "es", "it", "pt", "nl", "pl", "ru", "zh", "ja", "ko",
];

#[derive(Debug, Serialize)]
pub struct DocumentResponse {
    id: Uuid,
    name: String,
    duration: Option<f64>,
    can_write: bool,
    has_full_access: bool,
}

impl DocumentResponse {
    fn from_context(document: &transcribee_db::models::Document, level: AuthLevel) -> Self {
        Self {
            id: document.id,
            name: document.name.clone(),
            duration: document.duration,
            can_write: level >= AuthLevel::ReadWrite,
            has_full_access: level >= AuthLevel::Full,
        }
    }
}

/// Multipart fields for `POST /documents/`.
struct CreateDocumentForm {
    name: String,
    model: String,
    lang: String,
    number_of_speakers: Option<i32>,
    file_bytes: Vec<u8>,
    content_type: String,
}

async fn parse_create_form(mut multipart: Multipart) -> AppResult<CreateDocumentForm> {
    let mut name = None;
    let mut model = None;
    let mut lang = None;
    let mut number_of_speakers = None;
    let mut file_bytes = None;
    let mut content_type = "application/octet-stream".to_string();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.to_string()))?
    {
        let Some(field_name) = field.name().map(str::to_string) else {
            continue;
        };
        match field_name.as_str() {
            "name" => {
                name = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| AppError::Validation(e.to_string()))?,
                );
            }
            "model" => {
                model = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| AppError::Validation(e.to_string()))?,
                );
            }
            "language" => {
                lang = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| AppError::Validation(e.to_string()))?,
                );
            }
            "number_of_speakers" => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(e.to_string()))?;
                number_of_speakers = Some(
                    raw.parse::<i32>()
                        .map_err(|_| AppError::Validation("number_of_speakers must be an integer".to_string()))?,
                );
            }
            "file" => {
                if let Some(ct) = field.content_type() {
                    content_type = ct.to_string();
                }
                file_bytes = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| AppError::Validation(e.to_string()))?
                        .to_vec(),
                );
            }
            _ => {}
        }
    }

    let name = name.ok_or_else(|| AppError::Validation("missing field: name".to_string()))?;
    let model = model.ok_or_else(|| AppError::Validation("missing field: model".to_string()))?;
    let lang = lang.ok_or_else(|| AppError::Validation("missing field: language".to_string()))?;
    let file_bytes =
        file_bytes.ok_or_else(|| AppError::Validation("missing field: file".to_string()))?;

    if !SUPPORTED_LANGUAGES.contains(&lang.as_str()) {
        return Err(AppError::Validation(format!("unsupported language: {lang}")));
    }

    Ok(CreateDocumentForm {
        name,
        model,
        lang,
        number_of_speakers,
        file_bytes,
        content_type,
    })
}

/// `POST /documents/`. Creates the document, stores the uploaded media
/// as the `original` file, and lays down the default dependency chain.
pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> AppResult<Json<DocumentResponse>> {
    let mut conn = state.conn().await?;
    let user = auth::authenticate_user(&mut conn, &headers).await?;
    let form = parse_create_form(multipart).await?;

    let document = transcribee_db::repo::documents::create(&mut conn, user.id, &form.name).await?;

    let file_id = Uuid::new_v4().to_string();
    state.blobs.put(&file_id, &form.file_bytes).await?;
    transcribee_db::repo::documents::add_media_file(
        &mut conn,
        document.id,
        &file_id,
        &form.content_type,
        &["original".to_string()],
    )
    .await?;

    transcribee_db::repo::tasks::insert_default_chain(
        &mut conn,
        document.id,
        &transcribee_db::repo::tasks::DefaultChainParams {
            model: form.model,
            lang: form.lang,
            number_of_speakers: form.number_of_speakers,
        },
        state.dispatcher.attempt_limit(),
    )
    .await?;

    Ok(Json(DocumentResponse::from_context(
        &document,
        AuthLevel::Full,
    )))
}

/// `GET /documents/`. Every document the caller owns.
pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<Vec<DocumentResponse>>> {
    let mut conn = state.conn().await?;
    let user = auth::authenticate_user(&mut conn, &headers).await?;
    let documents = transcribee_db::repo::documents::list_for_user(&mut conn, user.id).await?;
    Ok(Json(
        documents
            .iter()
            .map(|d| DocumentResponse::from_context(d, AuthLevel::Full))
            .collect(),
    ))
}

/// `GET /documents/{id}/`.
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> AppResult<Json<DocumentResponse>> {
    let mut conn = state.conn().await?;
    let presented = credentials::from_headers(&headers)?;
    let ctx = auth::resolve_document_auth(&mut conn, id, &presented).await?;
    ctx.require(AuthLevel::ReadOnly)?;
    Ok(Json(DocumentResponse::from_context(&ctx.document, ctx.level)))
}

#[derive(Debug, Deserialize)]
pub struct PatchDocumentBody {
    name: Option<String>,
}

/// `PATCH /documents/{id}/`.
pub async fn patch(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<PatchDocumentBody>,
) -> AppResult<Json<DocumentResponse>> {
    let mut conn = state.conn().await?;
    let presented = credentials::from_headers(&headers)?;
    let ctx = auth::resolve_document_auth(&mut conn, id, &presented).await?;
    ctx.require(AuthLevel::Full)?;

    let document = if let Some(name) = &body.name {
        transcribee_db::repo::documents::rename(&mut conn, id, name).await?
    } else {
        ctx.document
    };
    Ok(Json(DocumentResponse::from_context(&document, ctx.level)))
}

/// `DELETE /documents/{id}/`. Best-effort blob cleanup; the database
/// delete is authoritative and cascades to every owned row.
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> AppResult<StatusCode> {
    let mut conn = state.conn().await?;
    let presented = credentials::from_headers(&headers)?;
    let ctx = auth::resolve_document_auth(&mut conn, id, &presented).await?;
    ctx.require(AuthLevel::Full)?;

    let media_files = transcribee_db::repo::documents::media_files_for_document(&mut conn, id).await?;
    transcribee_db::repo::documents::delete(&mut conn, id).await?;

    for media_file in media_files {
        if let Err(err) = state.blobs.delete(&media_file.file).await {
            tracing::warn!(file = %media_file.file, error = %err, "failed to delete blob on document delete");
        }
    }

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct TaskResponse {
    id: Uuid,
    task_type: String,
    state: String,
    task_parameters: Value,
    attempt_counter: i32,
    remaining_attempts: i32,
}

impl From<transcribee_db::models::Task> for TaskResponse {
    fn from(t: transcribee_db::models::Task) -> Self {
        Self {
            id: t.id,
            task_type: t.task_type.to_string(),
            state: t.state.as_str().to_string(),
            task_parameters: t.task_parameters,
            attempt_counter: t.attempt_counter,
            remaining_attempts: t.remaining_attempts,
        }
    }
}

/// `GET /documents/{id}/tasks/`.
pub async fn list_tasks(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> AppResult<Json<Vec<TaskResponse>>> {
    let mut conn = state.conn().await?;
    let presented = credentials::from_headers(&headers)?;
    let ctx = auth::resolve_document_auth(&mut conn, id, &presented).await?;
    ctx.require(AuthLevel::ReadOnly)?;
    let tasks = transcribee_db::repo::tasks::list_for_document(&mut conn, id).await?;
    Ok(Json(tasks.into_iter().map(TaskResponse::from).collect()))
}

#[derive(Debug, Deserialize)]
pub struct CreateShareTokenBody {
    name: String,
    can_write: bool,
}

#[derive(Debug, Serialize)]
pub struct ShareTokenCreatedResponse {
    token: String,
}

/// `POST /documents/{id}/share_tokens/`.
pub async fn create_share_token(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<CreateShareTokenBody>,
) -> AppResult<Json<ShareTokenCreatedResponse>> {
    let mut conn = state.conn().await?;
    let presented = credentials::from_headers(&headers)?;
    let ctx = auth::resolve_document_auth(&mut conn, id, &presented).await?;
    ctx.require(AuthLevel::Full)?;

    let token = transcribee_auth::generate_secret();
    transcribee_db::repo::share_tokens::create(&mut conn, id, &token, &body.name, None, body.can_write)
        .await?;

    Ok(Json(ShareTokenCreatedResponse { token }))
}

#[derive(Debug, Serialize)]
pub struct ShareTokenResponse {
    id: Uuid,
    name: String,
    can_write: bool,
}

/// `GET /documents/{id}/share_tokens/`.
pub async fn list_share_tokens(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> AppResult<Json<Vec<ShareTokenResponse>>> {
    let mut conn = state.conn().await?;
    let presented = credentials::from_headers(&headers)?;
    let ctx = auth::resolve_document_auth(&mut conn, id, &presented).await?;
    ctx.require(AuthLevel::Full)?;

    let tokens = transcribee_db::repo::share_tokens::list_for_document(&mut conn, id).await?;
    Ok(Json(
        tokens
            .into_iter()
            .map(|t| ShareTokenResponse {
                id: t.id,
                name: t.name,
                can_write: t.can_write,
            })
            .collect(),
    ))
}

/// `DELETE /documents/{id}/share_tokens/{token_id}/`.
pub async fn delete_share_token(
    State(state): State<AppState>,
    Path((id, token_id)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
) -> AppResult<StatusCode> {
    let mut conn = state.conn().await?;
    let presented = credentials::from_headers(&headers)?;
    let ctx = auth::resolve_document_auth(&mut conn, id, &presented).await?;
    ctx.require(AuthLevel::Full)?;

    transcribee_db::repo::share_tokens::delete(&mut conn, id, token_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct MediaFileResponse {
    id: Uuid,
    file: String,
    content_type: String,
    tags: Vec<String>,
}

/// Multipart fields for `POST /documents/{id}/add_media_file/`.
struct AddMediaFileForm {
    tags: Vec<String>,
    file_bytes: Vec<u8>,
    content_type: String,
}

async fn parse_add_media_form(mut multipart: Multipart) -> AppResult<AddMediaFileForm> {
    let mut tags = Vec::new();
    let mut file_bytes = None;
    let mut content_type = "application/octet-stream".to_string();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.to_string()))?
    {
        let Some(field_name) = field.name().map(str::to_string) else {
            continue;
        };
        match field_name.as_str() {
            "tags[]" | "tags" => {
                tags.push(
                    field
                        .text()
                        .await
                        .map_err(|e| AppError::Validation(e.to_string()))?,
                );
            }
            "file" => {
                if let Some(ct) = field.content_type() {
                    content_type = ct.to_string();
                }
                file_bytes = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| AppError::Validation(e.to_string()))?
                        .to_vec(),
                );
            }
            _ => {}
        }
    }

    let file_bytes =
        file_bytes.ok_or_else(|| AppError::Validation("missing field: file".to_string()))?;

    Ok(AddMediaFileForm {
        tags,
        file_bytes,
        content_type,
    })
}

/// `POST /documents/{id}/add_media_file/`. Restricted to the worker
/// currently holding the document's `REENCODE` attempt; any other
/// caller (including the owner) sees 404, per the literal endpoint
/// table rather than 403, since the resource is deliberately invisible
/// to non-holders.
pub async fn add_media_file(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    multipart: Multipart,
) -> AppResult<Json<MediaFileResponse>> {
    let mut conn = state.conn().await?;
    let worker = auth::authenticate_worker(&mut conn, &headers).await?;
    require_reencode_holder(&mut conn, id, worker.id).await?;
    let form = parse_add_media_form(multipart).await?;

    let file_id = Uuid::new_v4().to_string();
    state.blobs.put(&file_id, &form.file_bytes).await?;

    let media_file = transcribee_db::repo::documents::add_media_file(
        &mut conn,
        id,
        &file_id,
        &form.content_type,
        &form.tags,
    )
    .await?;

    Ok(Json(MediaFileResponse {
        id: media_file.id,
        file: media_file.file,
        content_type: media_file.content_type,
        tags: media_file.tags,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SetDurationBody {
    duration: f64,
}

/// `POST /documents/{id}/set_duration/`. Same holder restriction as
/// [`add_media_file`].
pub async fn set_duration(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<SetDurationBody>,
) -> AppResult<Json<DocumentResponse>> {
    let mut conn = state.conn().await?;
    let worker = auth::authenticate_worker(&mut conn, &headers).await?;
    require_reencode_holder(&mut conn, id, worker.id).await?;

    let document = transcribee_db::repo::documents::set_duration(&mut conn, id, body.duration).await?;
    Ok(Json(DocumentResponse::from_context(&document, AuthLevel::Worker)))
}

async fn require_reencode_holder(
    conn: &mut sqlx::PgConnection,
    document_id: Uuid,
    worker_id: Uuid,
) -> AppResult<()> {
    let holds = transcribee_db::repo::tasks::worker_holds_attempt_of_type(
        conn,
        document_id,
        worker_id,
        "REENCODE",
    )
    .await?;
    if holds {
        Ok(())
    } else {
        Err(AppError::NotFound("document not found".to_string()))
    }
}

/// `GET /documents/{id}/export/`. Blocks on the worker's `EXPORT`
/// result and relays it as a raw text body, per `SPEC_FULL.md` §6.
pub async fn export(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> AppResult<String> {
    let mut conn = state.conn().await?;
    let presented = credentials::from_headers(&headers)?;
    let ctx = auth::resolve_document_auth(&mut conn, id, &presented).await?;
    ctx.require(AuthLevel::ReadOnly)?;

    let task_parameters = serde_json::Value::Object(
        params
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect(),
    );

    let task = transcribee_db::repo::tasks::create_task(
        &mut conn,
        id,
        &transcribee_db::models::TaskType::Export,
        task_parameters,
        state.dispatcher.attempt_limit(),
    )
    .await?;
    drop(conn);

    let outcome = state
        .exports
        .wait(task.id, transcribee_tasks::export::DEFAULT_EXPORT_TTL)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    match outcome {
        transcribee_tasks::export::ExportOutcome::Result(value) => Ok(value_to_text(&value)),
        transcribee_tasks::export::ExportOutcome::Error(value) => {
            Err(AppError::Internal(value_to_text(&value)))
        }
    }
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
