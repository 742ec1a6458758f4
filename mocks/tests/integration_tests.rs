//! Integration tests for the mocks crate: exercises the in-memory
//! repository, builders, fixtures, generators and assertions together
//! to make sure they provide the testing capabilities the rest of the
//! workspace relies on.

use gov_core::error::GovError;
use gov_core::models::TaskStatus;
use gov_core::pr_integrity::{PrIntegrityClient, PrSnapshot, PrState};
use gov_core::repository::TaskRepository;
use mocks::*;

#[tokio::test]
async fn mock_repository_basic_operations() {
    let repo = MockGovRepository::new();

    let new_task = create_new_task();
    let task = repo.create(&new_task).await.unwrap();

    assert_eq!(task.id, 1);
    assert_eq!(task.title, new_task.title);
    assert_eq!(task.status, TaskStatus::Todo);

    repo.assert_called("TaskRepository::create");

    let retrieved = repo.get_by_id(task.id).await.unwrap();
    assert_eq!(retrieved.id, task.id);

    repo.assert_called("TaskRepository::get_by_id");
}

#[tokio::test]
async fn mock_repository_error_injection() {
    let repo = MockGovRepository::new();
    let task = repo.create(&create_new_task()).await.unwrap();

    repo.inject_error("TaskRepository::get_by_id", GovError::transient("simulated outage"));

    let result = repo.get_by_id(task.id).await;
    assert!(result.is_err());
    assert!(result.unwrap_err().is_transient());

    // injection is one-shot: the next call goes through to the real data.
    let result = repo.get_by_id(task.id).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn mock_repository_code_generation_matches_sqlite_convention() {
    let repo = MockGovRepository::new();
    let task = repo.create(&create_new_task_with_title("Ship the thing")).await.unwrap();
    assert_eq!(task.code, format!("SHIP-{}", task.id));
}

#[tokio::test]
async fn fixtures_create_tasks_in_all_statuses() {
    let tasks = create_tasks_in_all_statuses();
    assert_eq!(tasks.len(), 5);

    let statuses: Vec<_> = tasks.iter().map(|t| t.status).collect();
    assert!(statuses.contains(&TaskStatus::Todo));
    assert!(statuses.contains(&TaskStatus::Doing));
    assert!(statuses.contains(&TaskStatus::Blocked));
    assert!(statuses.contains(&TaskStatus::Validating));
    assert!(statuses.contains(&TaskStatus::Done));
}

#[tokio::test]
async fn builders_task_builder() {
    let task = TaskBuilder::new().with_id(42).with_code("BUILD-1").with_title("Built Task").with_status(TaskStatus::Doing).with_assignee("builder-agent").build();

    assert_eq!(task.id, 42);
    assert_eq!(task.code, "BUILD-1");
    assert_eq!(task.title, "Built Task");
    assert_eq!(task.status, TaskStatus::Doing);
    assert_eq!(task.assignee.as_deref(), Some("builder-agent"));
}

#[tokio::test]
async fn assertions_task_equals() {
    let task1 = create_test_task();
    let mut task2 = task1.clone();
    assert_task_equals(&task1, &task2);

    task2.title = "Different Title".to_string();
    let result = std::panic::catch_unwind(|| assert_task_equals(&task1, &task2));
    assert!(result.is_err());
}

#[tokio::test]
async fn assertions_status_transitions() {
    assert_status_transition_valid(TaskStatus::Todo, TaskStatus::Doing);
    assert_status_transition_valid(TaskStatus::Validating, TaskStatus::Done);
    assert_status_transition_invalid(TaskStatus::Todo, TaskStatus::Done);
    assert_status_transition_invalid(TaskStatus::Done, TaskStatus::Doing);
}

#[tokio::test]
async fn generators_realistic_data() {
    let task = generate_random_task();

    assert!(task.id > 0);
    assert!(!task.code.is_empty());
    assert!(task.code.contains('-'));
    assert!(!task.title.is_empty());
    assert!(!task.description.is_empty());
    assert!(task.assignee.is_some());
}

#[tokio::test]
async fn mock_repository_concurrent_access() {
    use std::sync::Arc;
    use tokio::task::JoinSet;

    let repo = Arc::new(MockGovRepository::new());
    let mut set = JoinSet::new();

    for i in 0..10 {
        let repo_clone = repo.clone();
        set.spawn(async move {
            let new_task = NewTaskBuilder::new().with_title(format!("Concurrent Task {i}")).build();
            repo_clone.create(&new_task).await.unwrap()
        });
    }

    let mut tasks = Vec::new();
    while let Some(result) = set.join_next().await {
        tasks.push(result.unwrap());
    }

    assert_eq!(tasks.len(), 10);

    let mut ids: Vec<_> = tasks.iter().map(|t| t.id).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 10, "all task IDs should be unique");
}

#[tokio::test]
async fn mock_repository_stats() {
    let tasks = create_tasks_in_all_statuses();
    let repo_with_tasks = MockGovRepository::with_tasks(tasks);

    let stats = repo_with_tasks.stats().await.unwrap();

    assert_eq!(stats.total_tasks, 5);
    assert!(stats.tasks_by_status.contains_key(&TaskStatus::Todo));
    assert!(stats.tasks_by_status.contains_key(&TaskStatus::Done));
    assert!(stats.latest_created.is_some());
}

#[tokio::test]
async fn contract_tests_with_mock() {
    let repo = MockGovRepository::new();

    test_repository_contract(&repo).await;

    let history = repo.call_history();
    assert!(!history.is_empty(), "mock should have recorded method calls");
    assert!(history.iter().any(|call| call.contains("create")));
    assert!(history.iter().any(|call| call.contains("get_by_id")));
}

#[tokio::test]
async fn mock_pr_integrity_client_returns_registered_snapshots() {
    let client = MockPrIntegrityClient::new();
    let url = "https://github.com/acme/widget/pull/7";
    client.set_snapshot(
        url,
        PrSnapshot { pr_url: url.to_string(), state: PrState::Open { head_sha: "abc1234".to_string() }, changed_files: vec!["src/lib.rs".to_string()], checks_passed: Some(true) },
    );

    let snapshot = client.fetch(url).await;
    assert!(matches!(snapshot.state, PrState::Open { .. }));
    assert_eq!(snapshot.changed_files, vec!["src/lib.rs".to_string()]);
}

#[tokio::test]
async fn mock_pr_integrity_client_degrades_to_unknown_for_unregistered_urls() {
    let client = MockPrIntegrityClient::new();
    let snapshot = client.fetch("https://github.com/acme/widget/pull/999").await;
    assert!(matches!(snapshot.state, PrState::Unknown));
}
