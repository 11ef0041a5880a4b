//! The HTTP + WebSocket surface (component C7), mounted under `/api/v1`
//! per `SPEC_FULL.md` §6.

pub mod documents;
pub mod sync;
pub mod tasks;
pub mod users;
pub mod workers;

use axum::routing::{delete, get, post};
use axum::Router;

use crate::state::AppState;

/// Build the full application router.
#[must_use]
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/users/create/", post(users::create))
        .route("/users/login/", post(users::login))
        .route("/users/logout/", post(users::logout))
        .route("/users/me/", get(users::me))
        .route("/users/change_password/", post(users::change_password))
        .route(
            "/documents/",
            post(documents::create).get(documents::list),
        )
        .route(
            "/documents/{id}/",
            get(documents::get)
                .patch(documents::patch)
                .delete(documents::delete),
        )
        .route("/documents/{id}/tasks/", get(documents::list_tasks))
        .route(
            "/documents/{id}/share_tokens/",
            post(documents::create_share_token).get(documents::list_share_tokens),
        )
        .route(
            "/documents/{id}/share_tokens/{token_id}/",
            delete(documents::delete_share_token),
        )
        .route("/documents/sync/{id}/", get(sync::handle))
        .route(
            "/tasks/claim_unassigned_task/",
            post(tasks::claim_unassigned_task),
        )
        .route("/tasks/", post(tasks::create))
        .route("/tasks/{id}/keepalive/", post(tasks::keepalive))
        .route("/tasks/{id}/mark_completed/", post(tasks::mark_completed))
        .route("/tasks/{id}/mark_failed/", post(tasks::mark_failed))
        .route(
            "/documents/{id}/add_media_file/",
            post(documents::add_media_file),
        )
        .route("/documents/{id}/set_duration/", post(documents::set_duration))
        .route("/documents/{id}/export/", get(documents::export))
        .route("/worker/create/", post(workers::create))
        .route("/worker/deactivate/", post(workers::deactivate));

    Router::new().nest("/api/v1", api).with_state(state)
}
