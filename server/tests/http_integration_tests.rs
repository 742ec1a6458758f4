//! End-to-end HTTP integration tests against a live `gov-server`
//! instance bound to a real socket, exercised with `reqwest`.
//!
//! Replaces the teacher's JSON-RPC-over-SSE transport tests (all of
//! which were `#[ignore]`d pending a rewrite) with tests against this
//! crate's actual REST surface: plain JSON request/response, no
//! envelope framing beyond the uniform error shape `protocol::ApiError`
//! produces.

use std::net::TcpListener as StdTcpListener;
use std::time::Duration;

use gov_server::config::Config;
use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;

/// Binds an ephemeral port, builds the full app (in-memory database),
/// and spawns `axum::serve` in the background. Returns the base URL.
async fn start_test_server() -> (tokio::task::JoinHandle<()>, String, TempDir) {
    let temp_dir = TempDir::new().expect("tempdir");
    let db_path = temp_dir.path().join("integration.sqlite");

    let mut config = Config::default();
    config.database.url = Some(format!("sqlite://{}", db_path.display()));

    let std_listener = StdTcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    std_listener.set_nonblocking(true).expect("nonblocking");
    let port = std_listener.local_addr().expect("local addr").port();
    let base_url = format!("http://127.0.0.1:{port}");

    let server = gov_server::initialize_app(&config).await.expect("initialize app");
    let router = server.create_router();

    let handle = tokio::spawn(async move {
        let listener = tokio::net::TcpListener::from_std(std_listener).expect("tokio listener");
        axum::serve(listener, router).await.expect("server error");
    });

    // Give the listener a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    (handle, base_url, temp_dir)
}

fn sample_task_payload(title: &str) -> Value {
    json!({
        "title": title,
        "description": "Created by an end-to-end HTTP test",
        "task_type": "chore",
        "priority": "P2",
        "reviewer": "bob",
        "assignee": null,
        "done_criteria": ["it works"],
        "created_by": "alice",
        "blocked_by": [],
        "tags": [],
        "team_id": null,
        "metadata": {}
    })
}

#[tokio::test]
async fn full_task_lifecycle_over_http() {
    let (handle, base_url, _temp_dir) = start_test_server().await;
    let client = Client::new();

    let create_response = client
        .post(format!("{base_url}/tasks"))
        .json(&sample_task_payload("End-to-end HTTP task"))
        .send()
        .await
        .expect("create request");
    assert_eq!(create_response.status(), 200);
    let task: Value = create_response.json().await.expect("create body");
    let task_id = task["id"].as_i64().expect("task id");
    assert_eq!(task["status"], "todo");

    let list_response = client.get(format!("{base_url}/tasks")).send().await.expect("list request");
    assert_eq!(list_response.status(), 200);
    let tasks: Vec<Value> = list_response.json().await.expect("list body");
    assert!(tasks.iter().any(|t| t["id"] == task_id));

    let claim_response = client
        .post(format!("{base_url}/tasks/{task_id}/claim"))
        .json(&json!({ "agent_name": "alice" }))
        .send()
        .await
        .expect("claim request");
    assert_eq!(claim_response.status(), 200);
    let claimed: Value = claim_response.json().await.expect("claim body");
    assert_eq!(claimed["status"], "doing");
    assert_eq!(claimed["assignee"], "alice");

    let get_response = client.get(format!("{base_url}/tasks/{task_id}")).send().await.expect("get request");
    assert_eq!(get_response.status(), 200);
    let fetched: Value = get_response.json().await.expect("get body");
    assert_eq!(fetched["id"], task_id);

    handle.abort();
}

#[tokio::test]
async fn unknown_task_id_returns_the_uniform_error_envelope() {
    let (handle, base_url, _temp_dir) = start_test_server().await;
    let client = Client::new();

    let response = client.get(format!("{base_url}/tasks/999999")).send().await.expect("get request");
    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.expect("error body");
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "not_found");

    handle.abort();
}

#[tokio::test]
async fn malformed_create_payload_returns_a_field_validation_error() {
    let (handle, base_url, _temp_dir) = start_test_server().await;
    let client = Client::new();

    let mut payload = sample_task_payload("");
    payload["title"] = json!("");

    let response = client.post(format!("{base_url}/tasks")).json(&payload).send().await.expect("create request");
    assert_eq!(response.status(), 400);

    handle.abort();
}

#[tokio::test]
async fn health_check_reports_a_live_database_connection() {
    let (handle, base_url, _temp_dir) = start_test_server().await;
    let client = Client::new();

    let response = client.get(format!("{base_url}/health")).send().await.expect("health request");
    assert_eq!(response.status(), 200);

    handle.abort();
}
