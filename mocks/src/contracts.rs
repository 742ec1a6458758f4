//! Contract tests for validating `TaskRepository` implementations.
//!
//! Generalized from the teacher's state-machine-aware contract suite:
//! this repository trait is a plain CRUD surface (the lifecycle
//! whitelist and gate evidence checks live in `gov_core::gate_chain`,
//! not here), so the contract narrows to what the trait itself
//! promises: id/code lookup, filtering, and the per-agent counters the
//! WIP gate depends on.

use crate::builders::{NewTaskBuilder, TaskFilterBuilder};
use gov_core::models::TaskStatus;
use gov_core::repository::TaskRepository;

/// Run the full contract suite against any `TaskRepository`.
pub async fn test_repository_contract<R: TaskRepository>(repo: &R) {
    test_create_contract(repo).await;
    test_update_contract(repo).await;
    test_get_contract(repo).await;
    test_list_contract(repo).await;
    test_counters_contract(repo).await;
    test_health_check_contract(repo).await;
    test_stats_contract(repo).await;
}

pub async fn test_create_contract<R: TaskRepository>(repo: &R) {
    let new_task = NewTaskBuilder::new().with_title("Contract create task").build();
    let task = repo.create(&new_task).await.expect("create should succeed");

    assert!(task.id > 0, "created task should have a positive ID");
    assert_eq!(task.title, new_task.title);
    assert_eq!(task.status, TaskStatus::Todo, "new task should start in Todo");
}

pub async fn test_update_contract<R: TaskRepository>(repo: &R) {
    let new_task = NewTaskBuilder::new().with_title("Contract update task").build();
    let task = repo.create(&new_task).await.expect("create should succeed");

    let mut updated = task.clone();
    updated.title = "Updated Title".to_string();
    let result = repo.update(&updated).await.expect("update should succeed");
    assert_eq!(result.title, "Updated Title");
    assert_eq!(result.id, task.id, "ID should remain unchanged");
    assert_eq!(result.code, task.code, "code should remain unchanged");

    let mut missing = task.clone();
    missing.id = 999_999;
    let update_result = repo.update(&missing).await;
    assert!(update_result.is_err(), "should fail to update a non-existent task");
}

pub async fn test_get_contract<R: TaskRepository>(repo: &R) {
    let new_task = NewTaskBuilder::new().with_title("Contract get task").build();
    let task = repo.create(&new_task).await.expect("create should succeed");

    let by_id = repo.get_by_id(task.id).await.expect("get by id should succeed");
    assert_eq!(by_id.id, task.id);

    let by_code = repo.get_by_code(&task.code).await.expect("get by code should succeed");
    assert_eq!(by_code.id, task.id);

    let not_found = repo.get_by_id(999_999).await;
    assert!(not_found.is_err(), "should error for a non-existent ID");

    let not_found_code = repo.get_by_code("NON-EXISTENT").await;
    assert!(not_found_code.is_err(), "should error for a non-existent code");
}

pub async fn test_list_contract<R: TaskRepository>(repo: &R) {
    let one = repo.create(&NewTaskBuilder::new().with_title("List one").with_assignee("agent-1").build()).await.expect("create should succeed");
    repo.create(&NewTaskBuilder::new().with_title("List two").with_assignee("agent-2").build()).await.expect("create should succeed");
    repo.create(&NewTaskBuilder::new().with_title("List three").with_assignee("agent-1").build()).await.expect("create should succeed");

    let mut doing = one.clone();
    doing.status = TaskStatus::Doing;
    repo.update(&doing).await.expect("update should succeed");

    let all = repo.list(&TaskFilterBuilder::new().build()).await.expect("list all should succeed");
    assert!(all.len() >= 3, "should contain at least our created tasks");

    let agent1_tasks = repo.list(&TaskFilterBuilder::new().with_assignee("agent-1").build()).await.expect("filter by assignee should succeed");
    assert!(agent1_tasks.iter().all(|t| t.assignee.as_deref() == Some("agent-1")), "all returned tasks should be assigned to agent-1");

    let doing_tasks = repo.list(&TaskFilterBuilder::new().with_status(TaskStatus::Doing).build()).await.expect("filter by status should succeed");
    assert!(doing_tasks.iter().all(|t| t.status == TaskStatus::Doing), "all returned tasks should be Doing");
}

pub async fn test_counters_contract<R: TaskRepository>(repo: &R) {
    let task = repo.create(&NewTaskBuilder::new().with_title("Counter task").with_assignee("counter-agent").build()).await.expect("create should succeed");
    let mut doing = task.clone();
    doing.status = TaskStatus::Doing;
    repo.update(&doing).await.expect("update should succeed");

    let count = repo.count_doing_for_assignee("counter-agent").await.expect("count should succeed");
    assert!(count >= 1, "should count the task we just moved to Doing");
}

pub async fn test_health_check_contract<R: TaskRepository>(repo: &R) {
    repo.health_check().await.expect("health check should succeed for a working repository");
}

pub async fn test_stats_contract<R: TaskRepository>(repo: &R) {
    repo.create(&NewTaskBuilder::new().with_title("Stats task").build()).await.expect("create should succeed");

    let stats = repo.stats().await.expect("get stats should succeed");
    assert!(stats.total_tasks > 0, "should report at least one task");
    assert!(!stats.tasks_by_status.is_empty(), "should have a status breakdown");
    assert!(stats.latest_created.is_some(), "should have a latest creation timestamp");
}
