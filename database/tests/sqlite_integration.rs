use database::{
    AuditEntry, AuditRepository, ChatMessage, ChatRepository, Insight, InsightRepository,
    InsightStatus, NewTask, Priority, Reflection, ReflectionRepository, Severity,
    SqliteGovRepository, TaskRepository, TaskType, WebhookEvent, WebhookRepository, WebhookStatus,
};

mod contract;

async fn create_test_repository() -> SqliteGovRepository {
    let repo = SqliteGovRepository::new(":memory:").await.unwrap();
    repo.migrate().await.unwrap();
    repo
}

#[tokio::test]
async fn repository_creation_and_health() {
    let repo = create_test_repository().await;
    assert!(repo.health_check().await.is_ok());
}

#[tokio::test]
async fn full_contract_suite() {
    let repo = std::sync::Arc::new(create_test_repository().await);
    contract::test_repository_contract(repo).await;
}

fn sample_task(title: &str) -> NewTask {
    NewTask {
        title: title.to_string(),
        description: "integration test task".into(),
        task_type: TaskType::Bug,
        priority: Priority::P1,
        reviewer: "kai".into(),
        assignee: Some("priya".into()),
        done_criteria: vec!["fix verified".into()],
        created_by: "integration-suite".into(),
        blocked_by: vec![],
        tags: vec!["integration".into()],
        team_id: None,
        metadata: serde_json::json!({}),
    }
}

#[tokio::test]
async fn reflection_to_insight_pipeline_persists_across_repositories() {
    let repo = create_test_repository().await;

    let reflection = Reflection {
        id: 0,
        pain: "deploy pipeline silently drops failed migrations".into(),
        impact: "two incidents last week".into(),
        evidence: vec!["log://deploy-142".into()],
        went_well: None,
        suspected_why: Some("missing exit code check".into()),
        proposed_fix: Some("fail the job on non-zero migrate exit".into()),
        confidence: 8,
        role_type: "engineer".into(),
        severity: Severity::High,
        author: "priya".into(),
        tags: vec!["deploy".into(), "migrations".into()],
        task_id: None,
        team_id: None,
        created_at: chrono::Utc::now(),
    };
    let created_reflection = ReflectionRepository::create(&repo, &reflection).await.unwrap();
    assert!(created_reflection.id > 0);

    let insight = Insight {
        id: 0,
        title: "deploy pipeline swallows migration failures".into(),
        cluster_key: "deploy|migrations".into(),
        status: InsightStatus::PendingTriage,
        score: 6.4,
        severity_max: Severity::High,
        priority: Priority::P1,
        reflection_ids: vec![created_reflection.id],
        authors: vec!["priya".into()],
        independent_count: 1,
        evidence_refs: vec!["log://deploy-142".into()],
        task_id: None,
        created_at: created_reflection.created_at,
        updated_at: created_reflection.created_at,
    };
    let created_insight = InsightRepository::create(&repo, &insight).await.unwrap();

    let fetched = InsightRepository::get_by_cluster_key(&repo, "deploy|migrations").await.unwrap();
    assert_eq!(fetched.unwrap().id, created_insight.id);
}

#[tokio::test]
async fn webhook_enqueue_is_idempotent_and_updates_persist() {
    let repo = create_test_repository().await;

    let event = WebhookEvent {
        id: 0,
        idempotency_key: "task-created-42".into(),
        provider: "slack".into(),
        event_type: "task.created".into(),
        payload: serde_json::json!({"task_id": 42}),
        target_url: "https://hooks.example.com/slack".into(),
        status: WebhookStatus::Pending,
        attempts: 0,
        max_attempts: 5,
        next_retry_at: None,
        last_attempt_at: None,
        last_error: None,
        last_status_code: None,
        delivered_at: None,
        created_at: chrono::Utc::now(),
        expires_at: None,
        metadata: serde_json::json!({}),
    };

    let first = WebhookRepository::enqueue(&repo, &event).await.unwrap();
    let duplicate = WebhookRepository::enqueue(&repo, &event).await.unwrap();
    assert_eq!(first.id, duplicate.id);

    let mut retried = first.clone();
    retried.attempts = 1;
    retried.status = WebhookStatus::Retrying;
    retried.last_status_code = Some(503);
    let updated = WebhookRepository::update(&repo, &retried).await.unwrap();
    assert_eq!(updated.attempts, 1);
    assert_eq!(updated.status, WebhookStatus::Retrying);
}

#[tokio::test]
async fn audit_trail_and_chat_mentions_round_trip() {
    let repo = create_test_repository().await;
    let task = repo.create(&sample_task("Investigate webhook 503s")).await.unwrap();

    let entry = AuditEntry {
        id: 0,
        task_id: task.id,
        actor: "kai".into(),
        context: "gate_chain".into(),
        field_path: "status".into(),
        before: serde_json::json!("todo"),
        after: serde_json::json!("doing"),
        timestamp: chrono::Utc::now(),
    };
    AuditRepository::append(&repo, &entry).await.unwrap();
    let history = AuditRepository::list_for_task(&repo, task.id).await.unwrap();
    assert_eq!(history.len(), 1);

    let message = ChatMessage {
        id: 0,
        channel: "eng-general".into(),
        author_agent_name: "kai".into(),
        content: "@priya can you take a look at this?".into(),
        mentions: vec!["priya".into()],
        task_id: Some(task.id),
        created_at: chrono::Utc::now(),
    };
    ChatRepository::append(&repo, &message).await.unwrap();
    let pending = ChatRepository::list_pending_mentions(&repo, "priya", message.created_at - chrono::Duration::minutes(1))
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
}
