//! End-to-end HTTP tests driving the router in-process via
//! `tower::ServiceExt::oneshot` — no bound TCP listener — against a real
//! Postgres instance.

mod support;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn send(router: axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.expect("router call");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response body is json")
    };
    (status, body)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn user_signup_login_me_logout_flow() {
    let env = support::spawn().await;

    let (status, body) = send(
        env.router(),
        json_request(
            "POST",
            "/api/v1/users/create/",
            json!({"username": "alice", "password": "hunter22"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "alice");

    let (status, body) = send(
        env.router(),
        json_request(
            "POST",
            "/api/v1/users/login/",
            json!({"username": "alice", "password": "hunter22"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().expect("token string").to_string();

    let (status, body) = send(
        env.router(),
        empty_request("GET", "/api/v1/users/me/")
            .tap_header("Authorization", &format!("Token {token}")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "alice");

    let (status, _) = send(
        env.router(),
        empty_request("POST", "/api/v1/users/logout/")
            .tap_header("Authorization", &format!("Token {token}")),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        env.router(),
        empty_request("GET", "/api/v1/users/me/")
            .tap_header("Authorization", &format!("Token {token}")),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_rejects_wrong_password_and_unknown_username() {
    let env = support::spawn().await;

    send(
        env.router(),
        json_request(
            "POST",
            "/api/v1/users/create/",
            json!({"username": "bob", "password": "correct-horse"}),
        ),
    )
    .await;

    let (status, _) = send(
        env.router(),
        json_request(
            "POST",
            "/api/v1/users/login/",
            json!({"username": "bob", "password": "wrong"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        env.router(),
        json_request(
            "POST",
            "/api/v1/users/login/",
            json!({"username": "nobody", "password": "wrong"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn worker_admin_endpoints_require_the_api_token() {
    let env = support::spawn().await;
    env.insert_admin_token("ops", "super-secret-admin-token").await;

    let (status, _) = send(
        env.router(),
        json_request("POST", "/api/v1/worker/create/", json!({"name": "gpu-1"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        env.router(),
        json_request("POST", "/api/v1/worker/create/", json!({"name": "gpu-1"}))
            .tap_header("Api-Token", "super-secret-admin-token"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let worker_id = body["id"].as_str().expect("worker id").to_string();
    assert_eq!(body["name"], "gpu-1");
    assert!(body["token"].as_str().is_some());

    let (status, _) = send(
        env.router(),
        json_request(
            "POST",
            "/api/v1/worker/deactivate/",
            json!({"id": worker_id}),
        )
        .tap_header("Api-Token", "super-secret-admin-token"),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

fn multipart_body(boundary: &str, name: &str, model: &str, lang: &str, file_bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    for (field, value) in [("name", name), ("model", model), ("language", lang)] {
        body.extend_from_slice(
            format!("--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"\r\n\r\n{value}\r\n")
                .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"clip.wav\"\r\nContent-Type: audio/wav\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(file_bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

async fn signup_and_login(env: &support::TestEnv, username: &str) -> String {
    send(
        env.router(),
        json_request(
            "POST",
            "/api/v1/users/create/",
            json!({"username": username, "password": "hunter22"}),
        ),
    )
    .await;
    let (_, body) = send(
        env.router(),
        json_request(
            "POST",
            "/api/v1/users/login/",
            json!({"username": username, "password": "hunter22"}),
        ),
    )
    .await;
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn document_create_list_and_get_round_trip() {
    let env = support::spawn().await;
    let token = signup_and_login(&env, "carol").await;

    let boundary = "x-test-boundary-1";
    let body = multipart_body(boundary, "interview.wav", "small", "en", b"RIFF-fake-audio-bytes");
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/documents/")
        .header("Authorization", format!("Token {token}"))
        .header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();

    let (status, body) = send(env.router(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "interview.wav");
    assert_eq!(body["has_full_access"], true);
    let document_id = body["id"].as_str().expect("document id").to_string();

    let (status, body) = send(
        env.router(),
        empty_request("GET", "/api/v1/documents/")
            .tap_header("Authorization", &format!("Token {token}")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().expect("array").len(), 1);

    let (status, _) = send(
        env.router(),
        empty_request("GET", &format!("/api/v1/documents/{document_id}/")),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        env.router(),
        empty_request("GET", &format!("/api/v1/documents/{document_id}/"))
            .tap_header("Authorization", &format!("Token {token}")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["has_full_access"], true);
}

#[tokio::test]
async fn worker_claims_gated_task_then_keeps_it_alive_and_completes_it() {
    let env = support::spawn().await;
    env.insert_admin_token("ops", "super-secret-admin-token").await;
    let token = signup_and_login(&env, "dave").await;

    let boundary = "x-test-boundary-2";
    let body = multipart_body(boundary, "lecture.wav", "small", "en", b"fake-bytes");
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/documents/")
        .header("Authorization", format!("Token {token}"))
        .header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();
    send(env.router(), request).await;

    let (_, body) = send(
        env.router(),
        json_request("POST", "/api/v1/worker/create/", json!({"name": "worker-a"}))
            .tap_header("Api-Token", "super-secret-admin-token"),
    )
    .await;
    let worker_token = body["token"].as_str().unwrap().to_string();

    // TRANSCRIBE depends on REENCODE; nothing is claimable for it yet.
    let (status, body) = send(
        env.router(),
        empty_request(
            "POST",
            "/api/v1/tasks/claim_unassigned_task/?task_type=TRANSCRIBE",
        )
        .tap_header("Authorization", &format!("Worker {worker_token}")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Null);

    let (status, body) = send(
        env.router(),
        empty_request(
            "POST",
            "/api/v1/tasks/claim_unassigned_task/?task_type=REENCODE",
        )
        .tap_header("Authorization", &format!("Worker {worker_token}")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let task_id = body["id"].as_str().expect("claimed task id").to_string();
    assert_eq!(body["task_type"], "REENCODE");
    assert!(body["document"]["media_files"].as_array().unwrap().len() == 1);

    let (status, _) = send(
        env.router(),
        json_request(
            "POST",
            &format!("/api/v1/tasks/{task_id}/keepalive/"),
            json!({"progress": 0.5}),
        )
        .tap_header("Authorization", &format!("Worker {worker_token}")),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        env.router(),
        json_request(
            "POST",
            &format!("/api/v1/tasks/{task_id}/mark_completed/"),
            Value::Null,
        )
        .tap_header("Authorization", &format!("Worker {worker_token}")),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(
        env.router(),
        empty_request(
            "POST",
            "/api/v1/tasks/claim_unassigned_task/?task_type=TRANSCRIBE",
        )
        .tap_header("Authorization", &format!("Worker {worker_token}")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["task_type"], "TRANSCRIBE");
}

fn media_file_multipart_body(boundary: &str, tags: &[&str], file_bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    for tag in tags {
        body.extend_from_slice(
            format!("--{boundary}\r\nContent-Disposition: form-data; name=\"tags[]\"\r\n\r\n{tag}\r\n")
                .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"reencoded.wav\"\r\nContent-Type: audio/wav\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(file_bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

#[tokio::test]
async fn reencode_holder_can_deliver_media_file_bytes_via_multipart() {
    let env = support::spawn().await;
    env.insert_admin_token("ops", "super-secret-admin-token").await;
    let token = signup_and_login(&env, "erin").await;

    let boundary = "x-test-boundary-3";
    let create_body = multipart_body(boundary, "talk.wav", "small", "en", b"original-bytes");
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/documents/")
        .header("Authorization", format!("Token {token}"))
        .header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(create_body))
        .unwrap();
    let (_, body) = send(env.router(), request).await;
    let document_id = body["id"].as_str().expect("document id").to_string();

    let (_, body) = send(
        env.router(),
        json_request("POST", "/api/v1/worker/create/", json!({"name": "holder"}))
            .tap_header("Api-Token", "super-secret-admin-token"),
    )
    .await;
    let holder_token = body["token"].as_str().unwrap().to_string();
    let (_, body) = send(
        env.router(),
        json_request("POST", "/api/v1/worker/create/", json!({"name": "bystander"}))
            .tap_header("Api-Token", "super-secret-admin-token"),
    )
    .await;
    let bystander_token = body["token"].as_str().unwrap().to_string();

    send(
        env.router(),
        empty_request(
            "POST",
            "/api/v1/tasks/claim_unassigned_task/?task_type=REENCODE",
        )
        .tap_header("Authorization", &format!("Worker {holder_token}")),
    )
    .await;

    let media_boundary = "x-test-boundary-4";
    let media_body = media_file_multipart_body(media_boundary, &["reencoded"], b"reencoded-pcm-bytes");
    let request = Request::builder()
        .method("POST")
        .uri(format!("/api/v1/documents/{document_id}/add_media_file/"))
        .header("Authorization", format!("Worker {bystander_token}"))
        .header(
            "content-type",
            format!("multipart/form-data; boundary={media_boundary}"),
        )
        .body(Body::from(media_body.clone()))
        .unwrap();
    let (status, _) = send(env.router(), request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let request = Request::builder()
        .method("POST")
        .uri(format!("/api/v1/documents/{document_id}/add_media_file/"))
        .header("Authorization", format!("Worker {holder_token}"))
        .header(
            "content-type",
            format!("multipart/form-data; boundary={media_boundary}"),
        )
        .body(Body::from(media_body))
        .unwrap();
    let (status, body) = send(env.router(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tags"], json!(["reencoded"]));
    assert!(body["content_type"].as_str().unwrap().contains("audio/wav"));
    assert!(body["file"].as_str().is_some());
}

/// Small extension so the JSON/empty request builders above can stay
/// header-free until a specific test needs one — avoids threading an
/// optional header list through every call site.
trait TapHeader {
    fn tap_header(self, key: &str, value: &str) -> Self;
}

impl TapHeader for Request<Body> {
    fn tap_header(self, key: &str, value: &str) -> Self {
        let (mut parts, body) = self.into_parts();
        parts.headers.insert(
            axum::http::HeaderName::from_bytes(key.as_bytes()).unwrap(),
            axum::http::HeaderValue::from_str(value).unwrap(),
        );
        Request::from_parts(parts, body)
    }
}
