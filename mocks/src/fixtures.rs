//! Standard test fixtures: pre-built tasks, reflections and webhook
//! events covering the lifecycle states the gate chain and pipeline
//! exercise.

use chrono::Utc;
use gov_core::models::{
    NewTask, Priority, Reflection, Severity, Task, TaskPatch, TaskStatus, TaskType, WebhookEvent, WebhookStatus,
};

/// Create a basic test task with sensible defaults.
pub fn create_test_task() -> Task {
    let now = Utc::now();
    Task {
        id: 1,
        code: "TEST-1".to_string(),
        title: "Test Task".to_string(),
        description: "A standard test task with default values".to_string(),
        task_type: TaskType::Chore,
        status: TaskStatus::Todo,
        priority: Priority::P2,
        assignee: None,
        reviewer: Some("test-reviewer".to_string()),
        done_criteria: vec!["it works".to_string()],
        created_by: "test-agent".to_string(),
        created_at: now,
        updated_at: now,
        blocked_by: vec![],
        tags: vec![],
        team_id: None,
        metadata: serde_json::json!({}),
    }
}

/// Create a task in a specific lifecycle status.
pub fn create_test_task_with_status(status: TaskStatus) -> Task {
    let mut task = create_test_task();
    task.status = status;
    task.updated_at = Utc::now();
    task
}

/// Create a task with a specific assignee.
pub fn create_test_task_with_assignee(assignee: &str) -> Task {
    let mut task = create_test_task();
    task.assignee = Some(assignee.to_string());
    task
}

/// Create `count` unique tasks cycling through the lifecycle statuses.
pub fn create_test_tasks(count: usize) -> Vec<Task> {
    let now = Utc::now();
    (1..=count)
        .map(|i| {
            let status = match i % 5 {
                0 => TaskStatus::Todo,
                1 => TaskStatus::Doing,
                2 => TaskStatus::Blocked,
                3 => TaskStatus::Validating,
                _ => TaskStatus::Done,
            };
            Task {
                id: i as i64,
                code: format!("TEST-{i}"),
                title: format!("Test Task {i}"),
                description: format!("Test task number {i} for bulk testing"),
                task_type: TaskType::Chore,
                status,
                priority: Priority::P2,
                assignee: Some(format!("agent-{}", i % 3 + 1)),
                reviewer: Some("test-reviewer".to_string()),
                done_criteria: vec!["it works".to_string()],
                created_by: "test-agent".to_string(),
                created_at: now,
                updated_at: now,
                blocked_by: vec![],
                tags: vec![],
                team_id: None,
                metadata: serde_json::json!({}),
            }
        })
        .collect()
}

/// Create one task in each possible lifecycle status.
pub fn create_tasks_in_all_statuses() -> Vec<Task> {
    [TaskStatus::Todo, TaskStatus::Doing, TaskStatus::Blocked, TaskStatus::Validating, TaskStatus::Done]
        .iter()
        .enumerate()
        .map(|(i, status)| {
            let mut task = create_test_task();
            task.id = i as i64 + 1;
            task.code = format!("{:?}-1", status).to_uppercase();
            task.status = *status;
            task
        })
        .collect()
}

/// Create a standard `NewTask` for testing creation.
pub fn create_new_task() -> NewTask {
    NewTask {
        title: "New Test Task".to_string(),
        description: "A new task for testing creation".to_string(),
        task_type: TaskType::Chore,
        priority: Priority::P2,
        reviewer: "test-reviewer".to_string(),
        assignee: None,
        done_criteria: vec!["it works".to_string()],
        created_by: "test-agent".to_string(),
        blocked_by: vec![],
        tags: vec![],
        team_id: None,
        metadata: serde_json::json!({}),
    }
}

/// Create a `NewTask` with a specific title.
pub fn create_new_task_with_title(title: &str) -> NewTask {
    let mut task = create_new_task();
    task.title = title.to_string();
    task
}

/// Create a `TaskPatch` exercising the common claim/assign shape.
pub fn create_task_patch() -> TaskPatch {
    TaskPatch {
        title: Some("Updated Task Name".to_string()),
        description: Some("Updated task description".to_string()),
        assignee: Some("updated-agent".to_string()),
        actor: Some("updated-agent".to_string()),
        ..Default::default()
    }
}

/// Create a standard `Reflection` for testing the reflection pipeline.
pub fn create_reflection() -> Reflection {
    Reflection {
        id: 1,
        pain: "Flaky integration test blocked the release".to_string(),
        impact: "Delayed deploy by half a day".to_string(),
        evidence: vec!["ci-run-42".to_string()],
        went_well: None,
        suspected_why: Some("Test depended on wall-clock time".to_string()),
        proposed_fix: Some("Inject a clock".to_string()),
        confidence: 7,
        role_type: "engineer".to_string(),
        severity: Severity::Medium,
        author: "test-agent".to_string(),
        tags: vec!["ci".to_string(), "flaky".to_string()],
        task_id: None,
        team_id: None,
        created_at: Utc::now(),
    }
}

/// Create a standard pending `WebhookEvent` for testing delivery.
pub fn create_webhook_event() -> WebhookEvent {
    let now = Utc::now();
    WebhookEvent {
        id: 1,
        idempotency_key: "evt-1".to_string(),
        provider: "test-provider".to_string(),
        event_type: "task.done".to_string(),
        payload: serde_json::json!({ "task_id": 1 }),
        target_url: "https://example.test/webhook".to_string(),
        status: WebhookStatus::Pending,
        attempts: 0,
        max_attempts: 5,
        next_retry_at: None,
        last_attempt_at: None,
        last_error: None,
        last_status_code: None,
        delivered_at: None,
        created_at: now,
        expires_at: None,
        metadata: serde_json::json!({}),
    }
}
