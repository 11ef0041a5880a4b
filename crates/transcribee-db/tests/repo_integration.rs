//! Repository-level integration tests against a real Postgres instance:
//! the dependency-gated claim order, attempt retry/exhaustion, and
//! share-token/media-file round trips that the unit tests in `src/`
//! can't exercise without a database.

mod support;

use serde_json::json;
use transcribee_db::models::{Task, TaskAttempt, TaskType};
use transcribee_db::repo::{documents, share_tokens, tasks, users, workers};
use uuid::Uuid;

/// Stand-in for `transcribee_tasks::TaskDispatcher::claim`: the repo
/// function must run inside a transaction, which this crate's tests
/// cannot pull in from `transcribee-tasks` without a dependency cycle.
async fn claim(
    pool: &transcribee_db::DbPool,
    worker_id: Uuid,
    task_types: &[String],
) -> Option<(Task, TaskAttempt)> {
    let mut tx = pool.begin().await.unwrap();
    let claimed = tasks::claim_unassigned_task(&mut tx, worker_id, task_types)
        .await
        .unwrap();
    tx.commit().await.unwrap();
    claimed
}

async fn complete(pool: &transcribee_db::DbPool, task_id: Uuid) -> Task {
    let mut tx = pool.begin().await.unwrap();
    let task = tasks::mark_completed(&mut tx, task_id, None).await.unwrap();
    tx.commit().await.unwrap();
    task
}

async fn fail(pool: &transcribee_db::DbPool, task_id: Uuid) -> Task {
    let mut tx = pool.begin().await.unwrap();
    let task = tasks::mark_failed(&mut tx, task_id, None).await.unwrap();
    tx.commit().await.unwrap();
    task
}

async fn make_user(pool: &transcribee_db::DbPool, username: &str) -> transcribee_db::models::User {
    let mut conn = pool.acquire().await.unwrap();
    users::create(&mut conn, username, b"hash", b"salt").await.unwrap()
}

async fn make_document(
    pool: &transcribee_db::DbPool,
    user_id: Uuid,
    name: &str,
) -> transcribee_db::models::Document {
    let mut conn = pool.acquire().await.unwrap();
    documents::create(&mut conn, user_id, name).await.unwrap()
}

async fn make_worker(pool: &transcribee_db::DbPool, name: &str) -> transcribee_db::models::Worker {
    let mut conn = pool.acquire().await.unwrap();
    workers::create(&mut conn, name, &Uuid::new_v4().to_string()).await.unwrap()
}

#[tokio::test]
async fn dependency_chain_gates_claim_order() {
    let (_container, pool) = support::spawn_postgres().await;

    let user = make_user(&pool, "alice").await;
    let document = make_document(&pool, user.id, "interview.mp3").await;

    {
        let mut conn = pool.acquire().await.unwrap();
        tasks::insert_default_chain(
            &mut conn,
            document.id,
            &tasks::DefaultChainParams {
                model: "small".to_string(),
                lang: "en".to_string(),
                number_of_speakers: None,
            },
            3,
        )
        .await
        .unwrap();
    }

    let worker = make_worker(&pool, "worker-1").await;

    // TRANSCRIBE and ALIGN both depend on REENCODE completing first.
    let blocked = claim(&pool, worker.id, &["TRANSCRIBE".to_string(), "ALIGN".to_string()]).await;
    assert!(blocked.is_none());

    let (reencode, _) = claim(&pool, worker.id, &["REENCODE".to_string()])
        .await
        .expect("reencode is immediately claimable");
    assert_eq!(reencode.task_type, TaskType::Reencode);

    // ALIGN still isn't ready; TRANSCRIBE's only dependency just ended.
    assert!(claim(&pool, worker.id, &["ALIGN".to_string()]).await.is_none());

    complete(&pool, reencode.id).await;

    let (transcribe, _) = claim(&pool, worker.id, &["TRANSCRIBE".to_string()])
        .await
        .expect("transcribe unblocks once reencode completes");
    assert_eq!(transcribe.task_type, TaskType::Transcribe);

    assert!(claim(&pool, worker.id, &["ALIGN".to_string()]).await.is_none());
}

#[tokio::test]
async fn failed_attempts_requeue_until_the_limit_is_exhausted() {
    let (_container, pool) = support::spawn_postgres().await;

    let user = make_user(&pool, "bob").await;
    let document = make_document(&pool, user.id, "lecture.wav").await;
    let worker = make_worker(&pool, "worker-2").await;

    let task = {
        let mut conn = pool.acquire().await.unwrap();
        tasks::create_task(&mut conn, document.id, &TaskType::Reencode, json!({}), 2)
            .await
            .unwrap()
    };

    let (claimed, _) = claim(&pool, worker.id, &["REENCODE".to_string()]).await.unwrap();
    assert_eq!(claimed.remaining_attempts, 1);

    let requeued = fail(&pool, task.id).await;
    assert_eq!(requeued.state, transcribee_db::models::TaskState::New);

    let (claimed_again, _) = claim(&pool, worker.id, &["REENCODE".to_string()]).await.unwrap();
    assert_eq!(claimed_again.remaining_attempts, 0);

    let terminated = fail(&pool, task.id).await;
    assert_eq!(terminated.state, transcribee_db::models::TaskState::Failed);

    assert!(claim(&pool, worker.id, &["REENCODE".to_string()]).await.is_none());
}

#[tokio::test]
async fn worker_holder_checks_reflect_the_live_attempt() {
    let (_container, pool) = support::spawn_postgres().await;

    let user = make_user(&pool, "carol").await;
    let document = make_document(&pool, user.id, "podcast.mp3").await;
    let holder = make_worker(&pool, "holder").await;
    let bystander = make_worker(&pool, "bystander").await;

    {
        let mut conn = pool.acquire().await.unwrap();
        tasks::create_task(&mut conn, document.id, &TaskType::Reencode, json!({}), 3)
            .await
            .unwrap();
    }

    claim(&pool, holder.id, &["REENCODE".to_string()])
        .await
        .expect("reencode task is claimable");

    let mut conn = pool.acquire().await.unwrap();
    assert!(tasks::worker_holds_attempt_in_document(&mut conn, document.id, holder.id)
        .await
        .unwrap());
    assert!(!tasks::worker_holds_attempt_in_document(&mut conn, document.id, bystander.id)
        .await
        .unwrap());

    assert!(
        tasks::worker_holds_attempt_of_type(&mut conn, document.id, holder.id, "REENCODE")
            .await
            .unwrap()
    );
    assert!(
        !tasks::worker_holds_attempt_of_type(&mut conn, document.id, holder.id, "TRANSCRIBE")
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn share_tokens_and_media_files_round_trip() {
    let (_container, pool) = support::spawn_postgres().await;

    let user = make_user(&pool, "dana").await;
    let document = make_document(&pool, user.id, "notes.mp4").await;
    let mut conn = pool.acquire().await.unwrap();

    documents::add_media_file(&mut conn, document.id, "blob-1", "audio/mpeg", &["original".to_string()])
        .await
        .unwrap();
    documents::add_media_file(
        &mut conn,
        document.id,
        "blob-2",
        "audio/wav",
        &["reencoded".to_string()],
    )
    .await
    .unwrap();
    let media = documents::media_files_for_document(&mut conn, document.id).await.unwrap();
    assert_eq!(media.len(), 2);

    let read_only = share_tokens::create(&mut conn, document.id, "tok-ro", "viewer link", None, false)
        .await
        .unwrap();
    let read_write = share_tokens::create(&mut conn, document.id, "tok-rw", "editor link", None, true)
        .await
        .unwrap();

    let active = share_tokens::active_for_document(&mut conn, document.id).await.unwrap();
    assert_eq!(active.len(), 2);
    assert!(active.iter().any(|t| t.id == read_only.id && !t.can_write));
    assert!(active.iter().any(|t| t.id == read_write.id && t.can_write));

    share_tokens::delete(&mut conn, document.id, read_only.id).await.unwrap();
    let remaining = share_tokens::list_for_document(&mut conn, document.id).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, read_write.id);
}

#[tokio::test]
async fn optional_identify_speakers_task_only_appears_when_requested() {
    let (_container, pool) = support::spawn_postgres().await;

    let user = make_user(&pool, "erin").await;
    let solo = make_document(&pool, user.id, "solo.mp3").await;
    let mut conn = pool.acquire().await.unwrap();

    let solo_chain = tasks::insert_default_chain(
        &mut conn,
        solo.id,
        &tasks::DefaultChainParams {
            model: "small".to_string(),
            lang: "en".to_string(),
            number_of_speakers: Some(1),
        },
        3,
    )
    .await
    .unwrap();
    assert_eq!(solo_chain.len(), 3);
    assert!(!solo_chain.iter().any(|t| t.task_type == TaskType::IdentifySpeakers));

    let panel = make_document(&pool, user.id, "panel.mp3").await;
    let panel_chain = tasks::insert_default_chain(
        &mut conn,
        panel.id,
        &tasks::DefaultChainParams {
            model: "small".to_string(),
            lang: "en".to_string(),
            number_of_speakers: Some(4),
        },
        3,
    )
    .await
    .unwrap();
    assert_eq!(panel_chain.len(), 4);
    assert!(panel_chain.iter().any(|t| t.task_type == TaskType::IdentifySpeakers));
}
