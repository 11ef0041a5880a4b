//! Periodic background jobs: reclaiming timed-out attempts and pruning
//! expired user tokens. Each tick runs inside its own transaction and
//! locks the rows it touches with `FOR UPDATE`, so it never races the
//! request path.

use std::time::Duration;

use tokio::task::JoinHandle;
use transcribee_db::DbPool;

/// Spawn the timeout sweeper: reclaims tasks whose current attempt has
/// gone silent for longer than `worker_timeout_secs`.
///
/// Runs at `min(30s, worker_timeout_secs)`, per the coordinator's
/// reclamation policy — frequent enough that a lapsed worker is noticed
/// well before a second timeout window elapses.
pub fn spawn_timeout_sweeper(pool: DbPool, worker_timeout_secs: i64) -> JoinHandle<()> {
    let period = Duration::from_secs(worker_timeout_secs.clamp(1, 30) as u64);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            if let Err(error) = sweep_timed_out_once(&pool, worker_timeout_secs).await {
                tracing::error!(%error, "timeout sweep failed");
            }
        }
    })
}

async fn sweep_timed_out_once(
    pool: &DbPool,
    worker_timeout_secs: i64,
) -> Result<(), transcribee_db::DbError> {
    let mut tx = pool.begin().await?;
    let timed_out = transcribee_db::repo::tasks::find_timed_out(&mut tx, worker_timeout_secs).await?;
    let count = timed_out.len();
    for task in timed_out {
        transcribee_db::repo::tasks::mark_failed(&mut tx, task.id, None).await?;
    }
    tx.commit().await?;
    if count > 0 {
        tracing::info!(count, "reclaimed timed-out task attempts");
    }
    Ok(())
}

/// Spawn the expired-token sweeper: deletes `UserToken`s whose
/// `valid_until` has passed, once an hour.
pub fn spawn_expired_token_sweeper(pool: DbPool) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(3600));
        loop {
            ticker.tick().await;
            if let Err(error) = sweep_expired_tokens_once(&pool).await {
                tracing::error!(%error, "expired token sweep failed");
            }
        }
    })
}

async fn sweep_expired_tokens_once(pool: &DbPool) -> Result<(), transcribee_db::DbError> {
    let mut tx = pool.begin().await?;
    let deleted = transcribee_db::repo::users::delete_expired_tokens(&mut tx).await?;
    tx.commit().await?;
    if deleted > 0 {
        tracing::info!(deleted, "pruned expired user tokens");
    }
    Ok(())
}
