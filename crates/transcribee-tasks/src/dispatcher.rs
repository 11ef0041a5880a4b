//! The claim/keepalive/complete/fail state-machine operations, each run
//! inside its own transaction.

use transcribee_db::models::{Task, TaskAttempt};
use transcribee_db::{DbError, DbPool};
use uuid::Uuid;

/// A task freshly handed to a worker, plus the attempt leasing it.
#[derive(Debug, Clone)]
pub struct ClaimedTask {
    pub task: Task,
    pub attempt: TaskAttempt,
}

/// Failure specific to the dispatch operations, layered over [`DbError`].
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The caller is not the worker holding the task's current attempt.
    #[error("worker does not hold the current attempt")]
    NotHolder,
    /// The task has no current attempt — a protocol violation.
    #[error("task has no current attempt")]
    NoCurrentAttempt,
    /// Any underlying persistence error.
    #[error(transparent)]
    Db(#[from] DbError),
}

/// Dispatches task-lifecycle operations against the database.
pub struct TaskDispatcher {
    pool: DbPool,
    attempt_limit: i32,
}

impl TaskDispatcher {
    /// Build a dispatcher bound to `pool`; `attempt_limit` seeds
    /// `remaining_attempts` on every newly created task.
    #[must_use]
    pub fn new(pool: DbPool, attempt_limit: i32) -> Self {
        Self { pool, attempt_limit }
    }

    #[must_use]
    pub fn attempt_limit(&self) -> i32 {
        self.attempt_limit
    }

    /// Atomically claim one ready task of any of `task_types`.
    ///
    /// # Errors
    ///
    /// Propagates any database error.
    pub async fn claim(
        &self,
        worker_id: Uuid,
        task_types: &[String],
    ) -> Result<Option<ClaimedTask>, DispatchError> {
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;
        let claimed =
            transcribee_db::repo::tasks::claim_unassigned_task(&mut tx, worker_id, task_types)
                .await?;
        tx.commit().await.map_err(DbError::from)?;
        Ok(claimed.map(|(task, attempt)| ClaimedTask { task, attempt }))
    }

    /// Refresh the keepalive clock on `task_id`'s current attempt,
    /// enforcing that `worker_id` actually holds it.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::NoCurrentAttempt`] if the task has no
    /// live attempt, [`DispatchError::NotHolder`] if `worker_id` does
    /// not hold it, or a wrapped [`DbError`] otherwise.
    pub async fn keepalive(
        &self,
        task_id: Uuid,
        worker_id: Uuid,
        progress: Option<f64>,
    ) -> Result<(), DispatchError> {
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;
        let attempt = transcribee_db::repo::tasks::current_attempt(&mut tx, task_id).await?;
        match attempt {
            None => Err(DispatchError::NoCurrentAttempt),
            Some(a) if a.assigned_worker_id != Some(worker_id) => Err(DispatchError::NotHolder),
            Some(_) => {
                transcribee_db::repo::tasks::keepalive(&mut tx, task_id, progress).await?;
                tx.commit().await.map_err(DbError::from)?;
                Ok(())
            }
        }
    }

    /// Mark a task completed.
    ///
    /// # Errors
    ///
    /// Propagates any database error, including a conflict if the task
    /// has no current attempt.
    pub async fn mark_completed(
        &self,
        task_id: Uuid,
        extra_data: Option<serde_json::Value>,
    ) -> Result<Task, DispatchError> {
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;
        let task = transcribee_db::repo::tasks::mark_completed(&mut tx, task_id, extra_data).await?;
        tx.commit().await.map_err(DbError::from)?;
        Ok(task)
    }

    /// Mark a task failed; requeues to `NEW` or terminates to `FAILED`
    /// depending on `remaining_attempts`.
    ///
    /// # Errors
    ///
    /// Propagates any database error, including a conflict if the task
    /// has no current attempt.
    pub async fn mark_failed(
        &self,
        task_id: Uuid,
        extra_data: Option<serde_json::Value>,
    ) -> Result<Task, DispatchError> {
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;
        let task = transcribee_db::repo::tasks::mark_failed(&mut tx, task_id, extra_data).await?;
        tx.commit().await.map_err(DbError::from)?;
        Ok(task)
    }
}
