//! The periodic background scheduler: bundles the timeout sweeper and
//! the expired-token sweeper into a single handle the binary can hold
//! onto for the life of the process (`SPEC_FULL.md` §9, "Periodic
//! scheduler").

use tokio::task::JoinHandle;
use transcribee_core::Settings;
use transcribee_db::DbPool;

/// Owns the two background sweeper tasks. Dropping it does not stop
/// them — they're detached `tokio::spawn` handles — but holding one
/// around for the process lifetime keeps the intent visible at the
/// call site in `main`.
pub struct Scheduler {
    timeout_sweeper: JoinHandle<()>,
    expired_token_sweeper: JoinHandle<()>,
}

impl Scheduler {
    /// Start both sweepers against `pool`.
    #[must_use]
    pub fn start(pool: DbPool, settings: &Settings) -> Self {
        Self {
            timeout_sweeper: transcribee_tasks::sweeper::spawn_timeout_sweeper(
                pool.clone(),
                settings.worker_timeout_secs,
            ),
            expired_token_sweeper: transcribee_tasks::sweeper::spawn_expired_token_sweeper(pool),
        }
    }

    /// Abort both sweepers, e.g. during a graceful shutdown sequence or
    /// in a test that doesn't want them outliving the pool.
    pub fn shutdown(self) {
        self.timeout_sweeper.abort();
        self.expired_token_sweeper.abort();
    }
}
