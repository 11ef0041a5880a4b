//! Transcribee Coordinator binary: loads configuration, migrates the
//! database, starts the background sweepers, and serves the HTTP +
//! WebSocket surface.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transcribee_core::Settings;
use transcribee_server::scheduler::Scheduler;
use transcribee_server::{AppState, Server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "transcribee_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::from_env()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_addr = %settings.bind_addr,
        "starting transcribee coordinator"
    );

    let pool = transcribee_db::connect(&settings.database_url, settings.database_max_connections)
        .await?;
    transcribee_db::run_migrations(&pool).await?;
    tokio::fs::create_dir_all(&settings.storage_path).await?;

    let scheduler = Scheduler::start(pool.clone(), &settings);
    let state = AppState::new(pool, settings);

    Server::new(state).serve().await?;

    scheduler.shutdown();
    Ok(())
}
