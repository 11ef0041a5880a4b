//! Task, TaskAttempt, and TaskDependency persistence — the state machine
//! at the center of the coordinator.

use chrono::Utc;
use serde_json::json;
use sqlx::{PgConnection, Row as _};
use uuid::Uuid;

use crate::error::DbError;
use crate::models::{Task, TaskAttempt, TaskState, TaskType};

fn row_to_task(row: sqlx::postgres::PgRow) -> Task {
    Task {
        id: row.get("id"),
        document_id: row.get("document_id"),
        task_type: TaskType::from(row.get::<String, _>("task_type")),
        task_parameters: row.get("task_parameters"),
        state: TaskState::from(row.get::<String, _>("state")),
        state_changed_at: row.get("state_changed_at"),
        attempt_counter: row.get("attempt_counter"),
        remaining_attempts: row.get("remaining_attempts"),
        current_attempt_id: row.get("current_attempt_id"),
    }
}

const TASK_COLUMNS: &str = "id, document_id, task_type, task_parameters, state, \
     state_changed_at, attempt_counter, remaining_attempts, current_attempt_id";

/// Insert a single task in its initial `NEW` state.
///
/// # Errors
///
/// Propagates any database error.
pub async fn create_task(
    conn: &mut PgConnection,
    document_id: Uuid,
    task_type: &TaskType,
    task_parameters: serde_json::Value,
    attempt_limit: i32,
) -> Result<Task, DbError> {
    let row = sqlx::query(&format!(
        r#"
        insert into tasks (document_id, task_type, task_parameters, remaining_attempts)
        values ($1, $2, $3, $4)
        returning {TASK_COLUMNS}
        "#
    ))
    .bind(document_id)
    .bind(task_type.as_str())
    .bind(task_parameters)
    .bind(attempt_limit)
    .fetch_one(conn)
    .await?;
    Ok(row_to_task(row))
}

/// Record a dependency edge: `dependent_task_id` cannot be claimed until
/// `dependant_on_id` reaches `COMPLETED`.
///
/// # Errors
///
/// Propagates any database error.
pub async fn add_dependency(
    conn: &mut PgConnection,
    dependent_task_id: Uuid,
    dependant_on_id: Uuid,
) -> Result<(), DbError> {
    sqlx::query(
        "insert into task_dependencies (dependent_task_id, dependant_on_id) values ($1, $2)",
    )
    .bind(dependent_task_id)
    .bind(dependant_on_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Parameters for the default dependency chain created alongside a new
/// document.
pub struct DefaultChainParams {
    pub model: String,
    pub lang: String,
    pub number_of_speakers: Option<i32>,
}

/// Insert the fixed dependency chain for a freshly uploaded document:
/// `REENCODE → TRANSCRIBE → ALIGN → IDENTIFY_SPEAKERS` (the last stage
/// only when a speaker count other than 0 or 1 was requested).
///
/// # Errors
///
/// Propagates any database error.
pub async fn insert_default_chain(
    conn: &mut PgConnection,
    document_id: Uuid,
    params: &DefaultChainParams,
    attempt_limit: i32,
) -> Result<Vec<Task>, DbError> {
    let reencode = create_task(
        conn,
        document_id,
        &TaskType::Reencode,
        json!({}),
        attempt_limit,
    )
    .await?;

    let transcribe = create_task(
        conn,
        document_id,
        &TaskType::Transcribe,
        json!({"model": params.model, "lang": params.lang}),
        attempt_limit,
    )
    .await?;
    add_dependency(conn, transcribe.id, reencode.id).await?;

    let align = create_task(
        conn,
        document_id,
        &TaskType::Align,
        json!({}),
        attempt_limit,
    )
    .await?;
    add_dependency(conn, align.id, transcribe.id).await?;

    let mut chain = vec![reencode, transcribe, align];

    if !matches!(params.number_of_speakers, Some(0) | Some(1)) {
        let mut payload = serde_json::Map::new();
        if let Some(n) = params.number_of_speakers {
            payload.insert("number_of_speakers".to_string(), json!(n));
        }
        let identify = create_task(
            conn,
            document_id,
            &TaskType::IdentifySpeakers,
            serde_json::Value::Object(payload),
            attempt_limit,
        )
        .await?;
        add_dependency(conn, identify.id, chain[2].id).await?;
        chain.push(identify);
    }

    Ok(chain)
}

/// Load a task by id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no such task exists.
pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Task, DbError> {
    let row = sqlx::query(&format!("select {TASK_COLUMNS} from tasks where id = $1"))
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or(DbError::NotFound)?;
    Ok(row_to_task(row))
}

/// List every task belonging to a document.
///
/// # Errors
///
/// Propagates any database error.
pub async fn list_for_document(
    conn: &mut PgConnection,
    document_id: Uuid,
) -> Result<Vec<Task>, DbError> {
    let rows = sqlx::query(&format!(
        "select {TASK_COLUMNS} from tasks where document_id = $1 order by state_changed_at asc"
    ))
    .bind(document_id)
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().map(row_to_task).collect())
}

/// Atomically claim one ready task of any of `task_types` for `worker_id`.
///
/// Must run inside a transaction: the caller commits or rolls back after
/// this returns. Mirrors the claim algorithm verbatim — row-level lock
/// via `FOR UPDATE`, oldest `state_changed_at` first, dependency gate via
/// `NOT EXISTS` over uncompleted dependencies.
///
/// # Errors
///
/// Propagates any database error.
pub async fn claim_unassigned_task(
    conn: &mut PgConnection,
    worker_id: Uuid,
    task_types: &[String],
) -> Result<Option<(Task, TaskAttempt)>, DbError> {
    let row = sqlx::query(&format!(
        r#"
        select {TASK_COLUMNS} from tasks t
        where t.task_type = any($1)
          and t.current_attempt_id is null
          and t.state not in ('COMPLETED', 'FAILED')
          and not exists (
              select 1 from task_dependencies td
              join tasks dep on dep.id = td.dependant_on_id
              where td.dependent_task_id = t.id and dep.state <> 'COMPLETED'
          )
        order by t.state_changed_at asc, t.id asc
        limit 1
        for update of t
        "#
    ))
    .bind(task_types)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let task = row_to_task(row);

    let now = Utc::now();
    let attempt_number = task.attempt_counter + 1;

    let attempt = sqlx::query_as::<_, TaskAttempt>(
        r#"
        insert into task_attempts
            (task_id, assigned_worker_id, attempt_number, started_at, last_keepalive)
        values ($1, $2, $3, $4, $4)
        returning id, task_id, assigned_worker_id, attempt_number, started_at,
                  last_keepalive, ended_at, progress, extra_data
        "#,
    )
    .bind(task.id)
    .bind(worker_id)
    .bind(attempt_number)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;

    let updated_row = sqlx::query(&format!(
        r#"
        update tasks
        set current_attempt_id = $2,
            attempt_counter = $3,
            remaining_attempts = remaining_attempts - 1,
            state = 'ASSIGNED',
            state_changed_at = $4
        where id = $1
        returning {TASK_COLUMNS}
        "#
    ))
    .bind(task.id)
    .bind(attempt.id)
    .bind(attempt_number)
    .bind(now)
    .fetch_one(conn)
    .await?;

    Ok(Some((row_to_task(updated_row), attempt)))
}

/// Load the attempt a task currently points at, if any.
///
/// # Errors
///
/// Propagates any database error.
pub async fn current_attempt(
    conn: &mut PgConnection,
    task_id: Uuid,
) -> Result<Option<TaskAttempt>, DbError> {
    sqlx::query_as::<_, TaskAttempt>(
        r#"select ta.id, ta.task_id, ta.assigned_worker_id, ta.attempt_number, ta.started_at,
                  ta.last_keepalive, ta.ended_at, ta.progress, ta.extra_data
           from task_attempts ta
           join tasks t on t.current_attempt_id = ta.id
           where t.id = $1"#,
    )
    .bind(task_id)
    .fetch_optional(conn)
    .await
    .map_err(DbError::from)
}

/// Update `last_keepalive` (and optionally `progress`) on the attempt
/// `task_id` currently points at.
///
/// Returns `None` if the task has no current attempt (a protocol
/// violation the caller surfaces as 500, per the error taxonomy).
///
/// # Errors
///
/// Propagates any database error.
pub async fn keepalive(
    conn: &mut PgConnection,
    task_id: Uuid,
    progress: Option<f64>,
) -> Result<Option<TaskAttempt>, DbError> {
    let Some(attempt) = current_attempt(&mut *conn, task_id).await? else {
        return Ok(None);
    };
    let updated = sqlx::query_as::<_, TaskAttempt>(
        r#"
        update task_attempts
        set last_keepalive = $2, progress = coalesce($3, progress)
        where id = $1
        returning id, task_id, assigned_worker_id, attempt_number, started_at,
                  last_keepalive, ended_at, progress, extra_data
        "#,
    )
    .bind(attempt.id)
    .bind(Utc::now())
    .bind(progress)
    .fetch_one(conn)
    .await?;
    Ok(Some(updated))
}

async fn end_current_attempt(
    conn: &mut PgConnection,
    task_id: Uuid,
    extra_data: Option<serde_json::Value>,
) -> Result<Option<TaskAttempt>, DbError> {
    let Some(attempt) = current_attempt(&mut *conn, task_id).await? else {
        return Ok(None);
    };
    let now = Utc::now();
    let updated = sqlx::query_as::<_, TaskAttempt>(
        r#"
        update task_attempts
        set ended_at = $2, last_keepalive = $2, extra_data = $3
        where id = $1
        returning id, task_id, assigned_worker_id, attempt_number, started_at,
                  last_keepalive, ended_at, progress, extra_data
        "#,
    )
    .bind(attempt.id)
    .bind(now)
    .bind(extra_data)
    .fetch_one(conn)
    .await?;
    Ok(Some(updated))
}

/// Transition a task to `COMPLETED`: detach its attempt and mark it
/// terminal. Dependant tasks become claimable once this commits.
///
/// # Errors
///
/// Returns [`DbError::Conflict`] if the task has no current attempt.
/// Propagates any other database error.
pub async fn mark_completed(
    conn: &mut PgConnection,
    task_id: Uuid,
    extra_data: Option<serde_json::Value>,
) -> Result<Task, DbError> {
    if end_current_attempt(&mut *conn, task_id, extra_data).await?.is_none() {
        return Err(DbError::Conflict(
            "task has no current attempt".to_string(),
        ));
    }

    let row = sqlx::query(&format!(
        r#"
        update tasks
        set state = 'COMPLETED', state_changed_at = $2, current_attempt_id = null
        where id = $1
        returning {TASK_COLUMNS}
        "#
    ))
    .bind(task_id)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    Ok(row_to_task(row))
}

/// Transition a task on failure: detach its attempt, then either requeue
/// (`remaining_attempts > 0`) to `NEW` or terminate to `FAILED`.
///
/// # Errors
///
/// Returns [`DbError::Conflict`] if the task has no current attempt.
/// Propagates any other database error.
pub async fn mark_failed(
    conn: &mut PgConnection,
    task_id: Uuid,
    extra_data: Option<serde_json::Value>,
) -> Result<Task, DbError> {
    if end_current_attempt(&mut *conn, task_id, extra_data).await?.is_none() {
        return Err(DbError::Conflict(
            "task has no current attempt".to_string(),
        ));
    }

    let row = sqlx::query(&format!(
        r#"
        update tasks
        set current_attempt_id = null,
            state_changed_at = $2,
            state = case when remaining_attempts > 0 then 'NEW' else 'FAILED' end
        where id = $1
        returning {TASK_COLUMNS}
        "#
    ))
    .bind(task_id)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    Ok(row_to_task(row))
}

/// Find every `ASSIGNED` task whose current attempt's `last_keepalive`
/// is older than `worker_timeout_secs`, with its row locked for update.
/// The sweeper calls [`mark_failed`] on each.
///
/// # Errors
///
/// Propagates any database error.
pub async fn find_timed_out(
    conn: &mut PgConnection,
    worker_timeout_secs: i64,
) -> Result<Vec<Task>, DbError> {
    let rows = sqlx::query(&format!(
        r#"
        select {TASK_COLUMNS} from tasks t
        join task_attempts ta on ta.id = t.current_attempt_id
        where t.state = 'ASSIGNED'
          and ta.ended_at is null
          and ta.last_keepalive < now() - make_interval(secs => $1)
        for update of t
        "#
    ))
    .bind(worker_timeout_secs as f64)
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().map(row_to_task).collect())
}

/// True if `worker_id` currently holds the attempt on any task belonging
/// to `document_id` — the `WORKER` auth level from `SPEC_FULL.md` §4.3.
///
/// # Errors
///
/// Propagates any database error.
pub async fn worker_holds_attempt_in_document(
    conn: &mut PgConnection,
    document_id: Uuid,
    worker_id: Uuid,
) -> Result<bool, DbError> {
    let row: Option<(i64,)> = sqlx::query_as(
        r#"
        select 1::bigint from tasks t
        join task_attempts ta on ta.id = t.current_attempt_id
        where t.document_id = $1 and ta.assigned_worker_id = $2
        limit 1
        "#,
    )
    .bind(document_id)
    .bind(worker_id)
    .fetch_optional(conn)
    .await?;
    Ok(row.is_some())
}

/// True if `worker_id` currently holds the attempt on a task of
/// `task_type` belonging to `document_id` — used to gate
/// `add_media_file`/`set_duration` to the worker running the `REENCODE`
/// stage.
///
/// # Errors
///
/// Propagates any database error.
pub async fn worker_holds_attempt_of_type(
    conn: &mut PgConnection,
    document_id: Uuid,
    worker_id: Uuid,
    task_type: &str,
) -> Result<bool, DbError> {
    let row: Option<(i64,)> = sqlx::query_as(
        r#"
        select 1::bigint from tasks t
        join task_attempts ta on ta.id = t.current_attempt_id
        where t.document_id = $1 and ta.assigned_worker_id = $2 and t.task_type = $3
        limit 1
        "#,
    )
    .bind(document_id)
    .bind(worker_id)
    .bind(task_type)
    .fetch_optional(conn)
    .await?;
    Ok(row.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_chain_params_speaker_gate() {
        assert!(matches!(Some(0), Some(0) | Some(1)));
        assert!(matches!(Some(1), Some(0) | Some(1)));
        assert!(!matches!(Some(3), Some(0) | Some(1)));
        assert!(!matches!(None::<i32>, Some(0) | Some(1)));
    }
}
