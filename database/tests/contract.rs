//! Contract tests every `TaskRepository` implementation must pass.

use database::{GovError, NewTask, Priority, TaskFilter, TaskRepository, TaskStatus, TaskType};
use std::sync::Arc;

#[allow(dead_code)]
pub async fn test_repository_contract<R: TaskRepository + 'static>(repo: Arc<R>) {
    test_health_check(repo.clone()).await;
    test_create_and_fetch(repo.clone()).await;
    test_list_with_filter(repo.clone()).await;
    test_not_found_errors(repo.clone()).await;
    test_ambiguous_prefix(repo.clone()).await;
    test_stats(repo.clone()).await;
}

fn sample(title: &str) -> NewTask {
    NewTask {
        title: title.to_string(),
        description: "contract test task".into(),
        task_type: TaskType::Bug,
        priority: Priority::P2,
        reviewer: "kai".into(),
        assignee: Some("contract-agent".into()),
        done_criteria: vec!["verified".into()],
        created_by: "contract-suite".into(),
        blocked_by: vec![],
        tags: vec!["contract".into()],
        team_id: None,
        metadata: serde_json::json!({}),
    }
}

async fn test_health_check<R: TaskRepository>(repo: Arc<R>) {
    assert!(repo.health_check().await.is_ok());
}

async fn test_create_and_fetch<R: TaskRepository>(repo: Arc<R>) {
    let created = repo.create(&sample("Contract create")).await.expect("create");
    assert_eq!(created.status, TaskStatus::Todo);

    let by_id = repo.get_by_id(created.id).await.expect("get_by_id");
    assert_eq!(by_id.code, created.code);

    let by_code = repo.get_by_code(&created.code).await.expect("get_by_code");
    assert_eq!(by_code.id, created.id);
}

async fn test_list_with_filter<R: TaskRepository>(repo: Arc<R>) {
    repo.create(&sample("Contract listing candidate")).await.expect("create");
    let filter = TaskFilter { assignee: Some("contract-agent".into()), ..Default::default() };
    let tasks = repo.list(&filter).await.expect("list");
    assert!(!tasks.is_empty());
    assert!(tasks.iter().all(|t| t.assignee.as_deref() == Some("contract-agent")));
}

async fn test_not_found_errors<R: TaskRepository>(repo: Arc<R>) {
    let err = repo.get_by_id(i64::MAX).await.unwrap_err();
    assert!(err.is_not_found());
}

async fn test_ambiguous_prefix<R: TaskRepository>(repo: Arc<R>) {
    repo.create(&sample("Prefix collision one")).await.expect("create");
    repo.create(&sample("Prefix collision two")).await.expect("create");
    let err = repo.resolve_prefix("PREFIX").await.unwrap_err();
    assert!(matches!(err, GovError::AmbiguousPrefix { .. }));
}

async fn test_stats<R: TaskRepository>(repo: Arc<R>) {
    repo.create(&sample("Stats candidate")).await.expect("create");
    let stats = repo.stats().await.expect("stats");
    assert!(stats.total_tasks > 0);
}
