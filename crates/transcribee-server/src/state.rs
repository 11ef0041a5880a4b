//! Shared application state handed into every handler.
//!
//! The connection pool, the sync hub, and configuration live in a single
//! context constructed once at startup (`SPEC_FULL.md` §9, "Global
//! state") and cloned cheaply (every field is an `Arc` or already
//! `Clone`) into each request.

use std::sync::Arc;

use sqlx::pool::PoolConnection;
use sqlx::Postgres;
use transcribee_core::Settings;
use transcribee_db::blob::LocalFsBlobStore;
use transcribee_db::{DbError, DbPool};
use transcribee_sync::SyncHub;
use transcribee_tasks::{ExportChannel, TaskDispatcher};

/// Everything a handler needs, grouped so `AppState::clone()` is the only
/// thing route construction has to thread through.
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub settings: Arc<Settings>,
    pub hub: Arc<SyncHub>,
    pub dispatcher: Arc<TaskDispatcher>,
    pub exports: Arc<ExportChannel>,
    pub blobs: Arc<LocalFsBlobStore>,
}

impl AppState {
    /// Assemble the shared state from a connection pool and settings.
    #[must_use]
    pub fn new(pool: DbPool, settings: Settings) -> Self {
        let settings = Arc::new(settings);
        let blobs = Arc::new(LocalFsBlobStore::new(settings.storage_path.clone()));
        let dispatcher = Arc::new(TaskDispatcher::new(
            pool.clone(),
            settings.task_attempt_limit,
        ));
        Self {
            pool,
            settings,
            hub: Arc::new(SyncHub::new()),
            dispatcher,
            exports: Arc::new(ExportChannel::new()),
            blobs,
        }
    }

    /// Check out a connection from the pool for a handler that doesn't
    /// need an explicit transaction.
    ///
    /// # Errors
    ///
    /// Propagates any error acquiring a connection.
    pub async fn conn(&self) -> Result<PoolConnection<Postgres>, DbError> {
        self.pool.acquire().await.map_err(DbError::from)
    }

    /// Build the full signed URL a client/worker uses to fetch a blob,
    /// per `SPEC_FULL.md` §4.2's wire format.
    #[must_use]
    pub fn sign_media_url(&self, file: &str) -> String {
        let signature = transcribee_db::blob::sign(&self.settings.secret_key, file);
        format!(
            "{}media/{file}?X-Transcribee-Signature={signature}",
            self.settings.media_url_base
        )
    }
}
