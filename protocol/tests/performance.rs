//! Latency smoke tests for the governance handler.
//!
//! Same spirit as the teacher's per-operation timing assertions, but run
//! against a real in-memory SQLite repository rather than a hand-rolled
//! fast mock, so the bound reflects an actual round trip through the
//! gate chain and storage layer instead of an in-memory no-op.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use database::SqliteGovRepository;
use gov_core::gate_chain::GatePolicy;
use gov_core::pr_integrity::{PrIntegrityClient, PrSnapshot, PrState};
use gov_core::protocol::*;
use protocol::GovHandlerImpl;
use serde_json::json;

struct NoopPrClient;

#[async_trait]
impl PrIntegrityClient for NoopPrClient {
    async fn fetch(&self, pr_url: &str) -> PrSnapshot {
        PrSnapshot { pr_url: pr_url.to_string(), state: PrState::Unknown, changed_files: vec![], checks_passed: None }
    }
}

async fn test_handler() -> GovHandlerImpl<SqliteGovRepository, NoopPrClient> {
    let repo = SqliteGovRepository::new(":memory:").await.expect("connect");
    repo.migrate().await.expect("migrate");
    GovHandlerImpl::new(Arc::new(repo), Arc::new(NoopPrClient), GatePolicy::default())
}

fn task_params(title: &str) -> CreateTaskParams {
    CreateTaskParams {
        title: title.to_string(),
        description: "Latency smoke test task".to_string(),
        task_type: TaskType::Chore,
        priority: Priority::P3,
        reviewer: "bob".to_string(),
        assignee: None,
        done_criteria: vec!["done".to_string()],
        created_by: "alice".to_string(),
        blocked_by: vec![],
        tags: vec![],
        team_id: None,
        metadata: json!({}),
    }
}

/// In-memory SQLite on a local socket; a single round trip should stay
/// well under this bound even with gate-chain evaluation in the path.
const BUDGET_MS: u128 = 250;

#[tokio::test]
async fn create_task_is_fast() {
    let handler = test_handler().await;
    let start = Instant::now();
    handler.create_task(task_params("perf-create")).await.expect("create");
    let elapsed = start.elapsed();
    assert!(elapsed.as_millis() < BUDGET_MS, "create_task took {}ms, budget is {BUDGET_MS}ms", elapsed.as_millis());
}

#[tokio::test]
async fn get_and_list_tasks_are_fast() {
    let handler = test_handler().await;
    let task = handler.create_task(task_params("perf-get")).await.expect("create");

    let start = Instant::now();
    handler.get_task(&task.id.to_string()).await.expect("get");
    let get_elapsed = start.elapsed();
    assert!(get_elapsed.as_millis() < BUDGET_MS, "get_task took {}ms", get_elapsed.as_millis());

    let start = Instant::now();
    handler.list_tasks(ListTasksParams::default()).await.expect("list");
    let list_elapsed = start.elapsed();
    assert!(list_elapsed.as_millis() < BUDGET_MS, "list_tasks took {}ms", list_elapsed.as_millis());
}

#[tokio::test]
async fn claim_task_is_fast() {
    let handler = test_handler().await;
    let task = handler.create_task(task_params("perf-claim")).await.expect("create");

    let start = Instant::now();
    handler
        .claim_task(&task.id.to_string(), ClaimTaskParams { agent_name: "alice".to_string() })
        .await
        .expect("claim");
    let elapsed = start.elapsed();
    assert!(elapsed.as_millis() < BUDGET_MS, "claim_task took {}ms", elapsed.as_millis());
}

#[tokio::test]
async fn concurrent_task_creation_stays_within_budget() {
    let handler = Arc::new(test_handler().await);
    let start = Instant::now();

    let mut handles = Vec::new();
    for i in 0..10 {
        let handler = handler.clone();
        handles.push(tokio::spawn(async move {
            handler.create_task(task_params(&format!("perf-concurrent-{i}"))).await
        }));
    }
    for handle in handles {
        handle.await.expect("join").expect("create");
    }

    let elapsed = start.elapsed();
    assert!(
        elapsed.as_millis() < BUDGET_MS * 4,
        "10 concurrent creates took {}ms, budget is {}ms",
        elapsed.as_millis(),
        BUDGET_MS * 4
    );
}

#[test]
fn error_status_code_lookup_is_cheap() {
    use gov_core::error::GovError;
    let errors = vec![
        GovError::not_found_code("x"),
        GovError::validation("bad"),
        GovError::storage("db down"),
        GovError::gate_failure("artifacts", "empty"),
    ];

    let start = Instant::now();
    for _ in 0..1000 {
        for err in &errors {
            let _ = err.status_code();
        }
    }
    let elapsed = start.elapsed();
    assert!(elapsed.as_millis() < 50, "4000 status_code() lookups took {}ms", elapsed.as_millis());
}
