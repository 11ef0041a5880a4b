//! Domain types mirroring `SPEC_FULL.md` §3 — semantic shapes, not raw row
//! structs; repositories do the `FromRow` mapping into these.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered account.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub password_hash: Vec<u8>,
    pub password_salt: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

/// A bearer token minted for a [`User`] at login.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: Vec<u8>,
    pub token_salt: Vec<u8>,
    pub valid_until: DateTime<Utc>,
}

/// A stateless compute worker.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Worker {
    pub id: Uuid,
    pub name: String,
    pub token: String,
    pub last_seen: Option<DateTime<Utc>>,
    pub deactivated_at: Option<DateTime<Utc>>,
}

impl Worker {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.deactivated_at.is_none()
    }
}

/// Out-of-band admin bearer used only by worker management endpoints.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApiToken {
    pub id: Uuid,
    pub name: String,
    pub token: String,
    pub created_at: DateTime<Utc>,
}

/// The unit of ownership, collaboration, and cascading deletion.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Document {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub duration: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub changed_at: DateTime<Utc>,
}

/// A media file belonging to a document (the "original" upload, or a
/// derived re-encode) plus free-form tags.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DocumentMediaFile {
    pub id: Uuid,
    pub document_id: Uuid,
    pub file: String,
    pub content_type: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub changed_at: DateTime<Utc>,
}

/// One append-only entry in a document's change log.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DocumentUpdate {
    pub id: Uuid,
    pub seq: i64,
    pub document_id: Uuid,
    pub change_bytes: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

/// A document-scoped share link.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DocumentShareToken {
    pub id: Uuid,
    pub document_id: Uuid,
    pub token: String,
    pub name: String,
    pub valid_until: Option<DateTime<Utc>>,
    pub can_write: bool,
}

/// The five named task types from `SPEC_FULL.md` §4.4, plus a verbatim
/// fallback for any other string — "the coordinator never schedules
/// [unknown types] against a worker that does not list the type" (§9),
/// it does not reject them at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum TaskType {
    Reencode,
    Transcribe,
    Align,
    IdentifySpeakers,
    Export,
    Unknown(String),
}

impl TaskType {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Reencode => "REENCODE",
            Self::Transcribe => "TRANSCRIBE",
            Self::Align => "ALIGN",
            Self::IdentifySpeakers => "IDENTIFY_SPEAKERS",
            Self::Export => "EXPORT",
            Self::Unknown(s) => s,
        }
    }
}

impl From<&str> for TaskType {
    fn from(s: &str) -> Self {
        match s {
            "REENCODE" => Self::Reencode,
            "TRANSCRIBE" => Self::Transcribe,
            "ALIGN" => Self::Align,
            "IDENTIFY_SPEAKERS" => Self::IdentifySpeakers,
            "EXPORT" => Self::Export,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl From<String> for TaskType {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<TaskType> for String {
    fn from(t: TaskType) -> Self {
        t.as_str().to_string()
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The task state machine from `SPEC_FULL.md` §4.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum TaskState {
    New,
    Assigned,
    Completed,
    Failed,
}

impl TaskState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Assigned => "ASSIGNED",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl From<&str> for TaskState {
    fn from(s: &str) -> Self {
        match s {
            "ASSIGNED" => Self::Assigned,
            "COMPLETED" => Self::Completed,
            "FAILED" => Self::Failed,
            _ => Self::New,
        }
    }
}

impl From<String> for TaskState {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<TaskState> for String {
    fn from(s: TaskState) -> Self {
        s.as_str().to_string()
    }
}

/// A unit of dependency-gated work (`SPEC_FULL.md` §4.4).
#[derive(Debug, Clone)]
pub struct Task {
    pub id: Uuid,
    pub document_id: Uuid,
    pub task_type: TaskType,
    pub task_parameters: serde_json::Value,
    pub state: TaskState,
    pub state_changed_at: DateTime<Utc>,
    pub attempt_counter: i32,
    pub remaining_attempts: i32,
    pub current_attempt_id: Option<Uuid>,
}

/// One worker-held lease on a [`Task`].
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TaskAttempt {
    pub id: Uuid,
    pub task_id: Uuid,
    pub assigned_worker_id: Option<Uuid>,
    pub attempt_number: i32,
    pub started_at: DateTime<Utc>,
    pub last_keepalive: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub progress: Option<f64>,
    pub extra_data: Option<serde_json::Value>,
}

/// A directed `(dependent, dependant_on)` edge between two tasks in the
/// same document.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TaskDependency {
    pub id: Uuid,
    pub dependent_task_id: Uuid,
    pub dependant_on_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_type_round_trips_known_variants() {
        for (raw, expected) in [
            ("REENCODE", TaskType::Reencode),
            ("TRANSCRIBE", TaskType::Transcribe),
            ("ALIGN", TaskType::Align),
            ("IDENTIFY_SPEAKERS", TaskType::IdentifySpeakers),
            ("EXPORT", TaskType::Export),
        ] {
            assert_eq!(TaskType::from(raw), expected);
            assert_eq!(expected.as_str(), raw);
        }
    }

    #[test]
    fn task_type_preserves_unknown_strings_verbatim() {
        let t = TaskType::from("DENOISE_AUDIO");
        assert_eq!(t, TaskType::Unknown("DENOISE_AUDIO".to_string()));
        assert_eq!(t.as_str(), "DENOISE_AUDIO");
    }

    #[test]
    fn task_state_terminal_classification() {
        assert!(TaskState::Completed.is_terminal());
        assert!(TaskState::Failed.is_terminal());
        assert!(!TaskState::New.is_terminal());
        assert!(!TaskState::Assigned.is_terminal());
    }
}
