//! Shared harness for the end-to-end tests in `tests/`: spins up a
//! real `gov-server` instance (in-memory SQLite, ephemeral TCP port)
//! and hands back a ready-to-use `reqwest::Client` plus base URL, the
//! same pattern `server/tests/http_integration_tests.rs` uses for its
//! own in-crate HTTP tests.
//!
//! `gov_server::initialize_app` always wires the real
//! `ReqwestPrClient`, which is no good for scenarios that need to
//! dictate a PR's merged/open/closed state without a live GitHub call.
//! `TestServer::start_with_pr_client` bypasses `initialize_app` and
//! assembles the same `SqliteGovRepository` + `GovHandlerImpl` +
//! `GovServer` chain by hand, substituting `mocks::MockPrIntegrityClient`
//! for the PR-integrity collaborator — the same "swap the PR client"
//! seam `GovHandlerImpl`'s `Pr` type parameter exists for.

use std::net::TcpListener as StdTcpListener;
use std::sync::Arc;
use std::time::Duration;

use database::SqliteGovRepository;
use gov_core::gate_chain::GatePolicy;
use gov_server::config::Config;
use mocks::MockPrIntegrityClient;
use protocol::{GovHandlerImpl, GovServer};
use reqwest::Client;
use tempfile::TempDir;

pub type TestHandler = GovHandlerImpl<SqliteGovRepository, MockPrIntegrityClient>;

pub struct TestServer {
    handle: tokio::task::JoinHandle<()>,
    pub base_url: String,
    pub client: Client,
    pub pr_client: Option<Arc<MockPrIntegrityClient>>,
    _temp_dir: TempDir,
}

impl TestServer {
    /// Plain server wired the production way (`ReqwestPrClient`). Use
    /// for scenarios that never touch PR integrity.
    pub async fn start() -> Self {
        let temp_dir = TempDir::new().expect("tempdir");
        let db_path = temp_dir.path().join("integration.sqlite");

        let mut config = Config::default();
        config.database.url = Some(format!("sqlite://{}", db_path.display()));

        let (handle, base_url) = spawn_router(gov_server::initialize_app(&config).await.expect("initialize app").create_router()).await;

        Self { handle, base_url, client: Client::new(), pr_client: None, _temp_dir: temp_dir }
    }

    /// Server with auth gating turned on, still the production PR
    /// client (auth scenarios don't touch PR state).
    pub async fn start_with_auth(auth_enabled: bool) -> Self {
        let temp_dir = TempDir::new().expect("tempdir");
        let db_path = temp_dir.path().join("integration.sqlite");

        let mut config = Config::default();
        config.database.url = Some(format!("sqlite://{}", db_path.display()));
        config.server.auth_enabled = auth_enabled;

        let server = gov_server::initialize_app(&config).await.expect("initialize app");
        let router = if auth_enabled {
            server.create_router_with_auth(Arc::new(protocol::GovAuth::new(true)))
        } else {
            server.create_router()
        };
        let (handle, base_url) = spawn_router(router).await;

        Self { handle, base_url, client: Client::new(), pr_client: None, _temp_dir: temp_dir }
    }

    /// Server with a `MockPrIntegrityClient` in place of the real HTTP
    /// lookup, so tests can dictate PR state via `pr_client().set_snapshot`.
    pub async fn start_with_pr_client() -> Self {
        let temp_dir = TempDir::new().expect("tempdir");
        let db_path = temp_dir.path().join("integration.sqlite");
        let database_url = format!("sqlite://{}", db_path.display());

        let repo = Arc::new(SqliteGovRepository::new(&database_url).await.expect("connect"));
        repo.migrate().await.expect("migrate");
        let pr_client = Arc::new(MockPrIntegrityClient::new());
        let handler = Arc::new(GovHandlerImpl::new(repo, pr_client.clone(), GatePolicy::default()));
        let router = GovServer::new(handler).create_router();

        let (handle, base_url) = spawn_router(router).await;

        Self { handle, base_url, client: Client::new(), pr_client: Some(pr_client), _temp_dir: temp_dir }
    }

    pub fn pr_client(&self) -> &MockPrIntegrityClient {
        self.pr_client.as_deref().expect("server was not started with start_with_pr_client")
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

async fn spawn_router(router: axum::Router) -> (tokio::task::JoinHandle<()>, String) {
    let std_listener = StdTcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    std_listener.set_nonblocking(true).expect("nonblocking");
    let port = std_listener.local_addr().expect("local addr").port();
    let base_url = format!("http://127.0.0.1:{port}");

    let handle = tokio::spawn(async move {
        let listener = tokio::net::TcpListener::from_std(std_listener).expect("tokio listener");
        axum::serve(listener, router).await.expect("server error");
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    (handle, base_url)
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub fn sample_task_payload(title: &str, reviewer: &str) -> serde_json::Value {
    serde_json::json!({
        "title": title,
        "description": "Created by an end-to-end integration test",
        "task_type": "bug",
        "priority": "P1",
        "reviewer": reviewer,
        "assignee": null,
        "done_criteria": ["SSO callback handles missing state", "No 500 in prod logs"],
        "created_by": "test-harness",
        "blocked_by": [],
        "tags": [],
        "team_id": null,
        "metadata": {}
    })
}
