//! The export task's one-shot results channel.
//!
//! `EXPORT` tasks are unusual: the HTTP caller that created the task
//! blocks waiting for the worker's result instead of polling. The
//! channel is keyed by task id, delivers at most once, and bounds how
//! long a waiter blocks if the worker never reports back.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{oneshot, Mutex};
use uuid::Uuid;

/// How long [`ExportChannel::wait`] blocks before giving up on a worker
/// that never posts a result. Not specified by the source system; a
/// bounded, generous timeout that still frees the waiting HTTP
/// connection eventually.
pub const DEFAULT_EXPORT_TTL: Duration = Duration::from_secs(600);

/// Outcome delivered to an export waiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    Result(serde_json::Value),
    Error(serde_json::Value),
}

/// Failure waiting on an export result.
#[derive(Debug, thiserror::Error)]
pub enum ExportWaitError {
    /// No result arrived within the channel's TTL.
    #[error("export result timed out")]
    TimedOut,
    /// The sender was dropped without delivering a result.
    #[error("export result sender dropped")]
    Cancelled,
}

/// Per-task, single-use, at-most-once delivery channel for export
/// results.
#[derive(Default)]
pub struct ExportChannel {
    waiters: Mutex<HashMap<Uuid, oneshot::Sender<ExportOutcome>>>,
}

impl ExportChannel {
    /// Build an empty channel registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until a result is posted for `task_id`, or `ttl` elapses.
    ///
    /// # Errors
    ///
    /// Returns [`ExportWaitError::TimedOut`] if `ttl` elapses first, or
    /// [`ExportWaitError::Cancelled`] if the channel is dropped without
    /// a delivery.
    pub async fn wait(&self, task_id: Uuid, ttl: Duration) -> Result<ExportOutcome, ExportWaitError> {
        let (tx, rx) = oneshot::channel();
        self.waiters.lock().await.insert(task_id, tx);

        let outcome = tokio::time::timeout(ttl, rx).await;
        self.waiters.lock().await.remove(&task_id);

        match outcome {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(_)) => Err(ExportWaitError::Cancelled),
            Err(_) => Err(ExportWaitError::TimedOut),
        }
    }

    /// Deliver a result to whoever is waiting on `task_id`. Returns
    /// `false` if nobody was waiting (already timed out, or never
    /// called [`Self::wait`]).
    pub async fn deliver(&self, task_id: Uuid, outcome: ExportOutcome) -> bool {
        match self.waiters.lock().await.remove(&task_id) {
            Some(tx) => tx.send(outcome).is_ok(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn delivers_result_to_waiter() {
        let channel = ExportChannel::new();
        let task_id = Uuid::new_v4();

        let (wait_result, delivered) = tokio::join!(
            channel.wait(task_id, Duration::from_secs(1)),
            async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                channel.deliver(task_id, ExportOutcome::Result(json!({"ok": true}))).await
            }
        );

        assert!(delivered);
        assert_eq!(
            wait_result.expect("delivered before timeout"),
            ExportOutcome::Result(json!({"ok": true}))
        );
    }

    #[tokio::test]
    async fn times_out_when_nobody_delivers() {
        let channel = ExportChannel::new();
        let task_id = Uuid::new_v4();
        let result = channel.wait(task_id, Duration::from_millis(20)).await;
        assert!(matches!(result, Err(ExportWaitError::TimedOut)));
    }

    #[tokio::test]
    async fn delivery_with_no_waiter_is_a_no_op() {
        let channel = ExportChannel::new();
        let delivered = channel
            .deliver(Uuid::new_v4(), ExportOutcome::Error(json!({"error": "boom"})))
            .await;
        assert!(!delivered);
    }
}
