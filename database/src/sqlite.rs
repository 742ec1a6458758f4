use crate::common::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gov_core::error::{GovError, Result};
use gov_core::models::*;
use gov_core::repository::*;
use sqlx::{migrate::MigrateDatabase, Row, Sqlite, SqlitePool};
use std::collections::HashMap;

/// SQLite-backed implementation of every storage trait in
/// `gov_core::repository`. One pool, one struct, mirroring the teacher's
/// `SqliteTaskRepository` (which likewise implements more than one
/// repository trait against a single connection pool).
#[derive(Debug, Clone)]
pub struct SqliteGovRepository {
    pool: SqlitePool,
}

impl SqliteGovRepository {
    pub async fn new(database_url: &str) -> Result<Self> {
        let db_url = if database_url.starts_with(":memory:") || database_url.starts_with("sqlite://") {
            database_url.to_string()
        } else {
            format!("sqlite://{database_url}")
        };

        if !db_url.contains(":memory:") && !Sqlite::database_exists(&db_url).await.unwrap_or(false) {
            Sqlite::create_database(&db_url).await.map_err(|e| {
                GovError::storage(format!("failed to create database: {e}"))
            })?;
        }

        let connect_options = if db_url.contains(":memory:") {
            sqlx::sqlite::SqliteConnectOptions::new()
                .filename(&db_url)
                .create_if_missing(true)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Memory)
                .busy_timeout(std::time::Duration::from_secs(5))
                .foreign_keys(true)
        } else {
            sqlx::sqlite::SqliteConnectOptions::new()
                .filename(db_url.replace("sqlite://", ""))
                .create_if_missing(true)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .busy_timeout(std::time::Duration::from_secs(5))
                .foreign_keys(true)
        };

        let pool = SqlitePool::connect_with(connect_options).await.map_err(sqlx_error_to_gov_error)?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations/sqlite")
            .run(&self.pool)
            .await
            .map_err(|e| GovError::storage(format!("migration failed: {e}")))?;
        tracing::info!("database migrations completed successfully");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl TaskRepository for SqliteGovRepository {
    async fn create(&self, task: &NewTask) -> Result<Task> {
        let now = now();
        let code = format!("{}-{}", task.title.split_whitespace().next().unwrap_or("TASK").to_uppercase(), now.timestamp_millis());

        let row = sqlx::query(
            r#"INSERT INTO tasks
               (code, title, description, task_type, status, priority, assignee, reviewer,
                done_criteria, created_by, created_at, updated_at, blocked_by, tags, team_id, metadata)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               RETURNING id, code, title, description, task_type, status, priority, assignee, reviewer,
                         done_criteria, created_by, created_at, updated_at, blocked_by, tags, team_id, metadata"#,
        )
        .bind(&code)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task_type_to_string(task.task_type))
        .bind(status_to_string(TaskStatus::Todo))
        .bind(priority_to_string(task.priority))
        .bind(&task.assignee)
        .bind(&task.reviewer)
        .bind(serde_json::to_string(&task.done_criteria).unwrap_or_default())
        .bind(&task.created_by)
        .bind(now)
        .bind(now)
        .bind(serde_json::to_string(&task.blocked_by).unwrap_or_default())
        .bind(serde_json::to_string(&task.tags).unwrap_or_default())
        .bind(&task.team_id)
        .bind(task.metadata.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_gov_error)?;

        row_to_task(&row)
    }

    async fn get_by_id(&self, id: i64) -> Result<Task> {
        let row = sqlx::query(
            "SELECT id, code, title, description, task_type, status, priority, assignee, reviewer, \
             done_criteria, created_by, created_at, updated_at, blocked_by, tags, team_id, metadata \
             FROM tasks WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(sqlx_error_to_gov_error)?
        .ok_or_else(|| GovError::not_found_id(id))?;

        row_to_task(&row)
    }

    async fn get_by_code(&self, code: &str) -> Result<Task> {
        let row = sqlx::query(
            "SELECT id, code, title, description, task_type, status, priority, assignee, reviewer, \
             done_criteria, created_by, created_at, updated_at, blocked_by, tags, team_id, metadata \
             FROM tasks WHERE code = ?",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(sqlx_error_to_gov_error)?
        .ok_or_else(|| GovError::not_found_code(code))?;

        row_to_task(&row)
    }

    async fn resolve_prefix(&self, prefix: &str) -> Result<Task> {
        if let Ok(task) = self.get_by_code(prefix).await {
            return Ok(task);
        }

        let rows = sqlx::query(
            "SELECT id, code, title, description, task_type, status, priority, assignee, reviewer, \
             done_criteria, created_by, created_at, updated_at, blocked_by, tags, team_id, metadata \
             FROM tasks WHERE code LIKE ? ORDER BY code",
        )
        .bind(format!("{prefix}%"))
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_error_to_gov_error)?;

        match rows.len() {
            0 => Err(GovError::not_found_code(prefix)),
            1 => row_to_task(&rows[0]),
            _ => {
                let candidates = rows.iter().map(|r| r.get::<String, _>("code")).collect();
                Err(GovError::ambiguous_prefix(prefix, candidates))
            }
        }
    }

    async fn update(&self, task: &Task) -> Result<Task> {
        let row = sqlx::query(
            r#"UPDATE tasks SET title = ?, description = ?, status = ?, priority = ?, assignee = ?,
               reviewer = ?, done_criteria = ?, blocked_by = ?, tags = ?, team_id = ?, metadata = ?,
               updated_at = ?
               WHERE id = ?
               RETURNING id, code, title, description, task_type, status, priority, assignee, reviewer,
                         done_criteria, created_by, created_at, updated_at, blocked_by, tags, team_id, metadata"#,
        )
        .bind(&task.title)
        .bind(&task.description)
        .bind(status_to_string(task.status))
        .bind(priority_to_string(task.priority))
        .bind(&task.assignee)
        .bind(&task.reviewer)
        .bind(serde_json::to_string(&task.done_criteria).unwrap_or_default())
        .bind(serde_json::to_string(&task.blocked_by).unwrap_or_default())
        .bind(serde_json::to_string(&task.tags).unwrap_or_default())
        .bind(&task.team_id)
        .bind(task.metadata.to_string())
        .bind(now())
        .bind(task.id)
        .fetch_optional(&self.pool)
        .await
        .map_err(sqlx_error_to_gov_error)?
        .ok_or_else(|| GovError::not_found_id(task.id))?;

        row_to_task(&row)
    }

    async fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let mut qb = build_task_filter_query(filter);
        let rows = qb.build().fetch_all(&self.pool).await.map_err(sqlx_error_to_gov_error)?;
        rows.iter().map(row_to_task).collect()
    }

    async fn count_doing_for_assignee(&self, assignee: &str) -> Result<u32> {
        let row = sqlx::query("SELECT COUNT(*) as c FROM tasks WHERE assignee = ? AND status = ?")
            .bind(assignee)
            .bind(status_to_string(TaskStatus::Doing))
            .fetch_one(&self.pool)
            .await
            .map_err(sqlx_error_to_gov_error)?;
        let c: i64 = row.get("c");
        Ok(c as u32)
    }

    async fn count_validating_for_reviewer(&self, reviewer: &str) -> Result<u32> {
        let row = sqlx::query("SELECT COUNT(*) as c FROM tasks WHERE reviewer = ? AND status = ?")
            .bind(reviewer)
            .bind(status_to_string(TaskStatus::Validating))
            .fetch_one(&self.pool)
            .await
            .map_err(sqlx_error_to_gov_error)?;
        let c: i64 = row.get("c");
        Ok(c as u32)
    }

    async fn stats(&self) -> Result<RepositoryStats> {
        let total_row = sqlx::query("SELECT COUNT(*) as c FROM tasks").fetch_one(&self.pool).await.map_err(sqlx_error_to_gov_error)?;
        let total_tasks: i64 = total_row.get("c");

        let status_rows = sqlx::query("SELECT status, COUNT(*) as c FROM tasks GROUP BY status")
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_gov_error)?;
        let mut tasks_by_status = HashMap::new();
        for r in &status_rows {
            let s: String = r.get("status");
            let c: i64 = r.get("c");
            tasks_by_status.insert(string_to_status(&s)?, c as u64);
        }

        let assignee_rows = sqlx::query("SELECT assignee, COUNT(*) as c FROM tasks WHERE assignee IS NOT NULL GROUP BY assignee")
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_gov_error)?;
        let mut tasks_by_assignee = HashMap::new();
        for r in &assignee_rows {
            let a: String = r.get("assignee");
            let c: i64 = r.get("c");
            tasks_by_assignee.insert(a, c as u64);
        }

        let latest_created: Option<DateTime<Utc>> = sqlx::query("SELECT MAX(created_at) as m FROM tasks")
            .fetch_one(&self.pool)
            .await
            .map_err(sqlx_error_to_gov_error)?
            .get("m");

        let latest_done: Option<DateTime<Utc>> = sqlx::query(
            "SELECT MAX(updated_at) as m FROM tasks WHERE status = ?",
        )
        .bind(status_to_string(TaskStatus::Done))
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_gov_error)?
        .get("m");

        Ok(RepositoryStats { total_tasks: total_tasks as u64, tasks_by_status, tasks_by_assignee, latest_created, latest_done })
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.map_err(sqlx_error_to_gov_error)?;
        Ok(())
    }
}

#[async_trait]
impl ReflectionRepository for SqliteGovRepository {
    async fn create(&self, reflection: &Reflection) -> Result<Reflection> {
        let row = sqlx::query(
            r#"INSERT INTO reflections
               (pain, impact, evidence, went_well, suspected_why, proposed_fix, confidence, role_type,
                severity, author, tags, task_id, team_id, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               RETURNING id, pain, impact, evidence, went_well, suspected_why, proposed_fix, confidence,
                         role_type, severity, author, tags, task_id, team_id, created_at"#,
        )
        .bind(&reflection.pain)
        .bind(&reflection.impact)
        .bind(serde_json::to_string(&reflection.evidence).unwrap_or_default())
        .bind(&reflection.went_well)
        .bind(&reflection.suspected_why)
        .bind(&reflection.proposed_fix)
        .bind(reflection.confidence as i64)
        .bind(&reflection.role_type)
        .bind(severity_to_string(reflection.severity))
        .bind(&reflection.author)
        .bind(serde_json::to_string(&reflection.tags).unwrap_or_default())
        .bind(reflection.task_id)
        .bind(&reflection.team_id)
        .bind(reflection.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_gov_error)?;

        row_to_reflection(&row)
    }

    async fn get_by_id(&self, id: i64) -> Result<Reflection> {
        let row = sqlx::query("SELECT * FROM reflections WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_error_to_gov_error)?
            .ok_or_else(|| GovError::not_found(format!("reflection {id} not found")))?;
        row_to_reflection(&row)
    }

    async fn list_by_cluster_candidates(&self, tags: &[String]) -> Result<Vec<Reflection>> {
        if tags.is_empty() {
            return Ok(vec![]);
        }
        let mut qb: sqlx::QueryBuilder<sqlx::Sqlite> = sqlx::QueryBuilder::new("SELECT * FROM reflections WHERE ");
        for (i, tag) in tags.iter().enumerate() {
            if i > 0 {
                qb.push(" OR ");
            }
            qb.push("tags LIKE ");
            qb.push_bind(format!("%\"{tag}\"%"));
        }
        qb.push(" ORDER BY created_at DESC");
        let rows = qb.build().fetch_all(&self.pool).await.map_err(sqlx_error_to_gov_error)?;
        rows.iter().map(row_to_reflection).collect()
    }

    async fn list_recent(&self, since: DateTime<Utc>) -> Result<Vec<Reflection>> {
        let rows = sqlx::query("SELECT * FROM reflections WHERE created_at >= ? ORDER BY created_at DESC")
            .bind(since)
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_gov_error)?;
        rows.iter().map(row_to_reflection).collect()
    }

    async fn debt_owed(&self, author: &str, task_threshold: u32, hours: i64, now: DateTime<Utc>) -> Result<bool> {
        let since = now - chrono::Duration::hours(hours);
        let done_row = sqlx::query("SELECT COUNT(*) as c FROM tasks WHERE assignee = ? AND status = ? AND updated_at >= ?")
            .bind(author)
            .bind(status_to_string(TaskStatus::Done))
            .bind(since)
            .fetch_one(&self.pool)
            .await
            .map_err(sqlx_error_to_gov_error)?;
        let done_count: i64 = done_row.get("c");

        if (done_count as u32) < task_threshold {
            return Ok(false);
        }

        let refl_row = sqlx::query("SELECT COUNT(*) as c FROM reflections WHERE author = ? AND created_at >= ?")
            .bind(author)
            .bind(since)
            .fetch_one(&self.pool)
            .await
            .map_err(sqlx_error_to_gov_error)?;
        let refl_count: i64 = refl_row.get("c");

        Ok(refl_count == 0)
    }
}

#[async_trait]
impl InsightRepository for SqliteGovRepository {
    async fn create(&self, insight: &Insight) -> Result<Insight> {
        let row = sqlx::query(
            r#"INSERT INTO insights
               (title, cluster_key, status, score, severity_max, priority, reflection_ids, authors,
                independent_count, evidence_refs, task_id, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               RETURNING *"#,
        )
        .bind(&insight.title)
        .bind(&insight.cluster_key)
        .bind(insight_status_to_string(insight.status))
        .bind(insight.score)
        .bind(severity_to_string(insight.severity_max))
        .bind(priority_to_string(insight.priority))
        .bind(serde_json::to_string(&insight.reflection_ids).unwrap_or_default())
        .bind(serde_json::to_string(&insight.authors).unwrap_or_default())
        .bind(insight.independent_count as i64)
        .bind(serde_json::to_string(&insight.evidence_refs).unwrap_or_default())
        .bind(insight.task_id)
        .bind(insight.created_at)
        .bind(insight.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_gov_error)?;

        row_to_insight(&row)
    }

    async fn get_by_id(&self, id: i64) -> Result<Insight> {
        let row = sqlx::query("SELECT * FROM insights WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_error_to_gov_error)?
            .ok_or_else(|| GovError::not_found(format!("insight {id} not found")))?;
        row_to_insight(&row)
    }

    async fn get_by_cluster_key(&self, cluster_key: &str) -> Result<Option<Insight>> {
        let row = sqlx::query("SELECT * FROM insights WHERE cluster_key = ?")
            .bind(cluster_key)
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_error_to_gov_error)?;
        row.as_ref().map(row_to_insight).transpose()
    }

    async fn update(&self, insight: &Insight) -> Result<Insight> {
        let row = sqlx::query(
            r#"UPDATE insights SET title = ?, status = ?, score = ?, severity_max = ?, priority = ?,
               reflection_ids = ?, authors = ?, independent_count = ?, evidence_refs = ?, task_id = ?,
               updated_at = ?
               WHERE id = ?
               RETURNING *"#,
        )
        .bind(&insight.title)
        .bind(insight_status_to_string(insight.status))
        .bind(insight.score)
        .bind(severity_to_string(insight.severity_max))
        .bind(priority_to_string(insight.priority))
        .bind(serde_json::to_string(&insight.reflection_ids).unwrap_or_default())
        .bind(serde_json::to_string(&insight.authors).unwrap_or_default())
        .bind(insight.independent_count as i64)
        .bind(serde_json::to_string(&insight.evidence_refs).unwrap_or_default())
        .bind(insight.task_id)
        .bind(now())
        .bind(insight.id)
        .fetch_optional(&self.pool)
        .await
        .map_err(sqlx_error_to_gov_error)?
        .ok_or_else(|| GovError::not_found(format!("insight {} not found", insight.id)))?;

        row_to_insight(&row)
    }

    async fn list(&self, status: Option<InsightStatus>) -> Result<Vec<Insight>> {
        let rows = match status {
            Some(s) => sqlx::query("SELECT * FROM insights WHERE status = ? ORDER BY updated_at DESC")
                .bind(insight_status_to_string(s))
                .fetch_all(&self.pool)
                .await,
            None => sqlx::query("SELECT * FROM insights ORDER BY updated_at DESC").fetch_all(&self.pool).await,
        }
        .map_err(sqlx_error_to_gov_error)?;
        rows.iter().map(row_to_insight).collect()
    }

    async fn list_orphans(&self, live_task_ids: &[i64]) -> Result<Vec<Insight>> {
        let rows = sqlx::query(
            "SELECT * FROM insights WHERE task_id IS NOT NULL AND status != ?",
        )
        .bind(insight_status_to_string(InsightStatus::Closed))
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_error_to_gov_error)?;

        rows.iter()
            .map(row_to_insight)
            .collect::<Result<Vec<_>>>()
            .map(|insights| {
                insights
                    .into_iter()
                    .filter(|i| i.task_id.is_some_and(|id| !live_task_ids.contains(&id)))
                    .collect()
            })
    }
}

#[async_trait]
impl TriageRepository for SqliteGovRepository {
    async fn record(&self, decision: &TriageDecision) -> Result<TriageDecision> {
        let row = sqlx::query(
            r#"INSERT INTO triage_decisions (insight_id, decision, decided_by, reason, decided_at)
               VALUES (?, ?, ?, ?, ?)
               RETURNING *"#,
        )
        .bind(decision.insight_id)
        .bind(triage_outcome_to_string(decision.decision))
        .bind(&decision.decided_by)
        .bind(&decision.reason)
        .bind(decision.decided_at)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_gov_error)?;
        row_to_triage_decision(&row)
    }

    async fn list_for_insight(&self, insight_id: i64) -> Result<Vec<TriageDecision>> {
        let rows = sqlx::query("SELECT * FROM triage_decisions WHERE insight_id = ? ORDER BY decided_at DESC")
            .bind(insight_id)
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_gov_error)?;
        rows.iter().map(row_to_triage_decision).collect()
    }
}

#[async_trait]
impl WebhookRepository for SqliteGovRepository {
    async fn enqueue(&self, event: &WebhookEvent) -> Result<WebhookEvent> {
        if let Some(existing) = self.get_by_idempotency_key(&event.idempotency_key).await? {
            return Ok(existing);
        }

        let row = sqlx::query(
            r#"INSERT INTO webhook_events
               (idempotency_key, provider, event_type, payload, target_url, status, attempts,
                max_attempts, next_retry_at, last_attempt_at, last_error, last_status_code,
                delivered_at, created_at, expires_at, metadata)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               RETURNING *"#,
        )
        .bind(&event.idempotency_key)
        .bind(&event.provider)
        .bind(&event.event_type)
        .bind(event.payload.to_string())
        .bind(&event.target_url)
        .bind(webhook_status_to_string(event.status))
        .bind(event.attempts as i64)
        .bind(event.max_attempts as i64)
        .bind(event.next_retry_at)
        .bind(event.last_attempt_at)
        .bind(&event.last_error)
        .bind(event.last_status_code.map(|c| c as i64))
        .bind(event.delivered_at)
        .bind(event.created_at)
        .bind(event.expires_at)
        .bind(event.metadata.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_gov_error)?;

        row_to_webhook_event(&row)
    }

    async fn get_by_id(&self, id: i64) -> Result<WebhookEvent> {
        let row = sqlx::query("SELECT * FROM webhook_events WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_error_to_gov_error)?
            .ok_or_else(|| GovError::not_found(format!("webhook event {id} not found")))?;
        row_to_webhook_event(&row)
    }

    async fn get_by_idempotency_key(&self, key: &str) -> Result<Option<WebhookEvent>> {
        let row = sqlx::query("SELECT * FROM webhook_events WHERE idempotency_key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_error_to_gov_error)?;
        row.as_ref().map(row_to_webhook_event).transpose()
    }

    async fn update(&self, event: &WebhookEvent) -> Result<WebhookEvent> {
        let row = sqlx::query(
            r#"UPDATE webhook_events SET status = ?, attempts = ?, next_retry_at = ?,
               last_attempt_at = ?, last_error = ?, last_status_code = ?, delivered_at = ?
               WHERE id = ?
               RETURNING *"#,
        )
        .bind(webhook_status_to_string(event.status))
        .bind(event.attempts as i64)
        .bind(event.next_retry_at)
        .bind(event.last_attempt_at)
        .bind(&event.last_error)
        .bind(event.last_status_code.map(|c| c as i64))
        .bind(event.delivered_at)
        .bind(event.id)
        .fetch_optional(&self.pool)
        .await
        .map_err(sqlx_error_to_gov_error)?
        .ok_or_else(|| GovError::not_found(format!("webhook event {} not found", event.id)))?;

        row_to_webhook_event(&row)
    }

    async fn list_retryable(&self, now: DateTime<Utc>, limit: u32) -> Result<Vec<WebhookEvent>> {
        let rows = sqlx::query(
            "SELECT * FROM webhook_events WHERE status IN (?, ?) AND (next_retry_at IS NULL OR next_retry_at <= ?) \
             ORDER BY created_at ASC LIMIT ?",
        )
        .bind(webhook_status_to_string(WebhookStatus::Pending))
        .bind(webhook_status_to_string(WebhookStatus::Retrying))
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_error_to_gov_error)?;
        rows.iter().map(row_to_webhook_event).collect()
    }

    async fn list_dead_letters(&self) -> Result<Vec<WebhookEvent>> {
        let rows = sqlx::query("SELECT * FROM webhook_events WHERE status = ? ORDER BY created_at DESC")
            .bind(webhook_status_to_string(WebhookStatus::DeadLetter))
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_gov_error)?;
        rows.iter().map(row_to_webhook_event).collect()
    }

    async fn purge_expired_delivered(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM webhook_events WHERE status = ? AND expires_at IS NOT NULL AND expires_at <= ?")
            .bind(webhook_status_to_string(WebhookStatus::Delivered))
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_gov_error)?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl AuditRepository for SqliteGovRepository {
    async fn append(&self, entry: &AuditEntry) -> Result<AuditEntry> {
        let row = sqlx::query(
            r#"INSERT INTO audit_ledger (task_id, actor, context, field_path, before, after, timestamp)
               VALUES (?, ?, ?, ?, ?, ?, ?)
               RETURNING *"#,
        )
        .bind(entry.task_id)
        .bind(&entry.actor)
        .bind(&entry.context)
        .bind(&entry.field_path)
        .bind(entry.before.to_string())
        .bind(entry.after.to_string())
        .bind(entry.timestamp)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_gov_error)?;
        row_to_audit_entry(&row)
    }

    async fn list_for_task(&self, task_id: i64) -> Result<Vec<AuditEntry>> {
        let rows = sqlx::query("SELECT * FROM audit_ledger WHERE task_id = ? ORDER BY timestamp ASC")
            .bind(task_id)
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_gov_error)?;
        rows.iter().map(row_to_audit_entry).collect()
    }
}

#[async_trait]
impl PauseRepository for SqliteGovRepository {
    async fn pause(&self, entry: &PauseEntry) -> Result<PauseEntry> {
        let row = sqlx::query(
            r#"INSERT INTO pause_controls (scope, reason, paused_by, paused_at, resumed_at)
               VALUES (?, ?, ?, ?, ?)
               RETURNING *"#,
        )
        .bind(&entry.scope)
        .bind(&entry.reason)
        .bind(&entry.paused_by)
        .bind(entry.paused_at)
        .bind(entry.resumed_at)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_gov_error)?;
        row_to_pause_entry(&row)
    }

    async fn resume(&self, scope: &str, now: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE pause_controls SET resumed_at = ? WHERE scope = ? AND resumed_at IS NULL")
            .bind(now)
            .bind(scope)
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_gov_error)?;
        Ok(())
    }

    async fn active_pause(&self, scope: &str) -> Result<Option<PauseEntry>> {
        let row = sqlx::query("SELECT * FROM pause_controls WHERE scope = ? AND resumed_at IS NULL ORDER BY paused_at DESC LIMIT 1")
            .bind(scope)
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_error_to_gov_error)?;
        row.as_ref().map(row_to_pause_entry).transpose()
    }
}

#[async_trait]
impl PresenceRepository for SqliteGovRepository {
    async fn upsert(&self, row_in: &PresenceRow) -> Result<PresenceRow> {
        let row = sqlx::query(
            r#"INSERT INTO presence (agent_name, last_activity_at, last_message_at, last_status_change_at, focus_window_until)
               VALUES (?, ?, ?, ?, ?)
               ON CONFLICT(agent_name) DO UPDATE SET
                 last_activity_at = excluded.last_activity_at,
                 last_message_at = excluded.last_message_at,
                 last_status_change_at = excluded.last_status_change_at,
                 focus_window_until = excluded.focus_window_until
               RETURNING *"#,
        )
        .bind(&row_in.agent_name)
        .bind(row_in.last_activity_at)
        .bind(row_in.last_message_at)
        .bind(row_in.last_status_change_at)
        .bind(row_in.focus_window_until)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_gov_error)?;
        row_to_presence_row(&row)
    }

    async fn get(&self, agent_name: &str) -> Result<Option<PresenceRow>> {
        let row = sqlx::query("SELECT * FROM presence WHERE agent_name = ?")
            .bind(agent_name)
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_error_to_gov_error)?;
        row.as_ref().map(row_to_presence_row).transpose()
    }

    async fn list_idle_since(&self, threshold: DateTime<Utc>) -> Result<Vec<PresenceRow>> {
        let rows = sqlx::query("SELECT * FROM presence WHERE last_activity_at <= ?")
            .bind(threshold)
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_gov_error)?;
        rows.iter().map(row_to_presence_row).collect()
    }
}

#[async_trait]
impl SubscriptionRepository for SqliteGovRepository {
    async fn subscribe(&self, sub: &InboxSubscription) -> Result<InboxSubscription> {
        let row = sqlx::query(
            r#"INSERT INTO inbox_subscriptions (agent_name, channel, created_at)
               VALUES (?, ?, ?)
               ON CONFLICT(agent_name, channel) DO UPDATE SET created_at = inbox_subscriptions.created_at
               RETURNING *"#,
        )
        .bind(&sub.agent_name)
        .bind(&sub.channel)
        .bind(sub.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_gov_error)?;
        row_to_subscription(&row)
    }

    async fn unsubscribe(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM inbox_subscriptions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_gov_error)?;
        Ok(())
    }

    async fn list_for_channel(&self, channel: &str) -> Result<Vec<InboxSubscription>> {
        let rows = sqlx::query("SELECT * FROM inbox_subscriptions WHERE channel = ?")
            .bind(channel)
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_gov_error)?;
        rows.iter().map(row_to_subscription).collect()
    }
}

#[async_trait]
impl ChatRepository for SqliteGovRepository {
    async fn append(&self, message: &ChatMessage) -> Result<ChatMessage> {
        let row = sqlx::query(
            r#"INSERT INTO chat_messages (channel, author_agent_name, content, mentions, task_id, created_at)
               VALUES (?, ?, ?, ?, ?, ?)
               RETURNING *"#,
        )
        .bind(&message.channel)
        .bind(&message.author_agent_name)
        .bind(&message.content)
        .bind(serde_json::to_string(&message.mentions).unwrap_or_default())
        .bind(message.task_id)
        .bind(message.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_gov_error)?;
        row_to_chat_message(&row)
    }

    async fn list_for_channel(&self, channel: &str, since: Option<DateTime<Utc>>) -> Result<Vec<ChatMessage>> {
        let rows = match since {
            Some(since) => sqlx::query("SELECT * FROM chat_messages WHERE channel = ? AND created_at >= ? ORDER BY created_at ASC")
                .bind(channel)
                .bind(since)
                .fetch_all(&self.pool)
                .await,
            None => sqlx::query("SELECT * FROM chat_messages WHERE channel = ? ORDER BY created_at ASC")
                .bind(channel)
                .fetch_all(&self.pool)
                .await,
        }
        .map_err(sqlx_error_to_gov_error)?;
        rows.iter().map(row_to_chat_message).collect()
    }

    async fn list_pending_mentions(&self, agent_name: &str, since: DateTime<Utc>) -> Result<Vec<ChatMessage>> {
        let rows = sqlx::query("SELECT * FROM chat_messages WHERE mentions LIKE ? AND created_at >= ? ORDER BY created_at ASC")
            .bind(format!("%\"{agent_name}\"%"))
            .bind(since)
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_gov_error)?;
        rows.iter().map(row_to_chat_message).collect()
    }
}

#[async_trait]
impl EscalationRepository for SqliteGovRepository {
    async fn create(&self, escalation: &Escalation) -> Result<Escalation> {
        let row = sqlx::query(
            r#"INSERT INTO escalations (agent_name, reason, channel, created_at, acknowledged_at)
               VALUES (?, ?, ?, ?, ?)
               RETURNING *"#,
        )
        .bind(&escalation.agent_name)
        .bind(&escalation.reason)
        .bind(&escalation.channel)
        .bind(escalation.created_at)
        .bind(escalation.acknowledged_at)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_gov_error)?;
        row_to_escalation(&row)
    }

    async fn acknowledge(&self, id: i64, now: DateTime<Utc>) -> Result<Escalation> {
        let row = sqlx::query("UPDATE escalations SET acknowledged_at = ? WHERE id = ? RETURNING *")
            .bind(now)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_error_to_gov_error)?
            .ok_or_else(|| GovError::not_found(format!("escalation {id} not found")))?;
        row_to_escalation(&row)
    }

    async fn list_unacknowledged(&self) -> Result<Vec<Escalation>> {
        let rows = sqlx::query("SELECT * FROM escalations WHERE acknowledged_at IS NULL ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_gov_error)?;
        rows.iter().map(row_to_escalation).collect()
    }
}

#[async_trait]
impl SchedulingRepository for SqliteGovRepository {
    async fn list_active_recurring(&self, _now: DateTime<Utc>) -> Result<Vec<RecurringTaskDef>> {
        let rows = sqlx::query("SELECT * FROM recurring_tasks WHERE active = 1")
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_gov_error)?;
        rows.iter().map(row_to_recurring_task_def).collect()
    }

    async fn mark_fired(&self, id: i64, now: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE recurring_tasks SET last_fired_at = ? WHERE id = ?")
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_gov_error)?;
        Ok(())
    }

    async fn list_calendar_blocks(&self, agent_name: &str, window_start: DateTime<Utc>, window_end: DateTime<Utc>) -> Result<Vec<CalendarBlock>> {
        let rows = sqlx::query("SELECT * FROM calendar_blocks WHERE agent_name = ? AND starts_at < ? AND ends_at > ?")
            .bind(agent_name)
            .bind(window_end)
            .bind(window_start)
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_gov_error)?;
        rows.iter().map(row_to_calendar_block).collect()
    }

    async fn create_calendar_event(&self, event: &CalendarEvent) -> Result<CalendarEvent> {
        let row = sqlx::query(
            r#"INSERT INTO calendar_events (agent_name, channel, message, fire_at, delivered_at)
               VALUES (?, ?, ?, ?, ?)
               RETURNING *"#,
        )
        .bind(&event.agent_name)
        .bind(&event.channel)
        .bind(&event.message)
        .bind(event.fire_at)
        .bind(event.delivered_at)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_gov_error)?;
        row_to_calendar_event(&row)
    }

    async fn list_due_reminders(&self, now: DateTime<Utc>) -> Result<Vec<CalendarEvent>> {
        let rows = sqlx::query("SELECT * FROM calendar_events WHERE fire_at <= ? AND delivered_at IS NULL ORDER BY fire_at ASC")
            .bind(now)
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_gov_error)?;
        rows.iter().map(row_to_calendar_event).collect()
    }

    async fn mark_delivered(&self, id: i64, now: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE calendar_events SET delivered_at = ? WHERE id = ?")
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_gov_error)?;
        Ok(())
    }
}

#[async_trait]
impl NoiseBudgetRepository for SqliteGovRepository {
    async fn snapshot(&self, channel: &str, now: DateTime<Utc>) -> Result<NoiseBudgetSnapshot> {
        let window_start = now - chrono::Duration::minutes(10);
        let row = sqlx::query("SELECT COUNT(*) as c FROM noise_budget_log WHERE channel = ? AND sent_at >= ?")
            .bind(channel)
            .bind(window_start)
            .fetch_one(&self.pool)
            .await
            .map_err(sqlx_error_to_gov_error)?;
        let message_count: i64 = row.get("c");
        let budget = 20u32;
        Ok(NoiseBudgetSnapshot {
            channel: channel.to_string(),
            window_start,
            message_count: message_count as u32,
            budget,
            over_budget: (message_count as u32) > budget,
            enforced: false,
        })
    }

    async fn record_message(&self, channel: &str, now: DateTime<Utc>) -> Result<()> {
        sqlx::query("INSERT INTO noise_budget_log (channel, sent_at) VALUES (?, ?)")
            .bind(channel)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_gov_error)?;
        Ok(())
    }

    async fn record_suppression(&self, entry: &SuppressionLedgerEntry) -> Result<SuppressionLedgerEntry> {
        let row = sqlx::query(
            r#"INSERT INTO suppression_ledger (alert_key, channel, reason, normalized_content, suppressed_at, expires_at)
               VALUES (?, ?, ?, ?, ?, ?)
               RETURNING *"#,
        )
        .bind(&entry.alert_key)
        .bind(&entry.channel)
        .bind(&entry.reason)
        .bind(&entry.normalized_content)
        .bind(entry.suppressed_at)
        .bind(entry.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_gov_error)?;
        row_to_suppression_entry(&row)
    }

    async fn list_suppressions_since(&self, since: DateTime<Utc>) -> Result<Vec<SuppressionLedgerEntry>> {
        let rows = sqlx::query("SELECT * FROM suppression_ledger WHERE suppressed_at >= ? ORDER BY suppressed_at DESC")
            .bind(since)
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_gov_error)?;
        rows.iter().map(row_to_suppression_entry).collect()
    }
}

#[async_trait]
impl ContinuityRepository for SqliteGovRepository {
    async fn record(&self, action: &ContinuityAction) -> Result<ContinuityAction> {
        let row = sqlx::query(
            r#"INSERT INTO continuity_actions (worker, action_kind, payload, created_at)
               VALUES (?, ?, ?, ?)
               RETURNING *"#,
        )
        .bind(&action.worker)
        .bind(&action.action_kind)
        .bind(action.payload.to_string())
        .bind(action.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_gov_error)?;
        row_to_continuity_action(&row)
    }

    async fn already_acted(&self, worker: &str, action_kind: &str, payload_key: &str, since: DateTime<Utc>) -> Result<bool> {
        let row = sqlx::query(
            "SELECT COUNT(*) as c FROM continuity_actions WHERE worker = ? AND action_kind = ? AND payload LIKE ? AND created_at >= ?",
        )
        .bind(worker)
        .bind(action_kind)
        .bind(format!("%{payload_key}%"))
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_gov_error)?;
        let c: i64 = row.get("c");
        Ok(c > 0)
    }
}

#[async_trait]
impl RoutingRepository for SqliteGovRepository {
    async fn create_override(&self, o: &RoutingOverride) -> Result<RoutingOverride> {
        let row = sqlx::query(
            r#"INSERT INTO routing_overrides (target, work_class, created_by, starts_at, expires_at)
               VALUES (?, ?, ?, ?, ?)
               RETURNING *"#,
        )
        .bind(&o.target)
        .bind(&o.work_class)
        .bind(&o.created_by)
        .bind(o.starts_at)
        .bind(o.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_gov_error)?;
        row_to_routing_override(&row)
    }

    async fn list_active(&self, now: DateTime<Utc>) -> Result<Vec<RoutingOverride>> {
        let rows = sqlx::query("SELECT * FROM routing_overrides WHERE starts_at <= ? AND expires_at > ?")
            .bind(now)
            .bind(now)
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_gov_error)?;
        rows.iter().map(row_to_routing_override).collect()
    }

    async fn retire(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM routing_overrides WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_gov_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_repo() -> SqliteGovRepository {
        let repo = SqliteGovRepository::new(":memory:").await.expect("connect");
        repo.migrate().await.expect("migrate");
        repo
    }

    fn sample_new_task() -> NewTask {
        NewTask {
            title: "Fix login SSO state handling".into(),
            description: "SSO callback drops state param on redirect".into(),
            task_type: TaskType::Bug,
            priority: Priority::P1,
            reviewer: "kai".into(),
            assignee: Some("priya".into()),
            done_criteria: vec!["Regression test added".into()],
            created_by: "sys".into(),
            blocked_by: vec![],
            tags: vec!["auth".into()],
            team_id: None,
            metadata: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn create_and_fetch_task() {
        let repo = test_repo().await;
        let created = repo.create(&sample_new_task()).await.unwrap();
        assert_eq!(created.status, TaskStatus::Todo);

        let fetched = TaskRepository::get_by_id(&repo, created.id).await.unwrap();
        assert_eq!(fetched.title, created.title);

        let by_code = repo.get_by_code(&created.code).await.unwrap();
        assert_eq!(by_code.id, created.id);
    }

    #[tokio::test]
    async fn duplicate_webhook_idempotency_key_returns_existing() {
        let repo = test_repo().await;
        let event = WebhookEvent {
            id: 0,
            idempotency_key: "evt-1".into(),
            provider: "github".into(),
            event_type: "task.created".into(),
            payload: serde_json::json!({}),
            target_url: "https://example.com/hook".into(),
            status: WebhookStatus::Pending,
            attempts: 0,
            max_attempts: 5,
            next_retry_at: None,
            last_attempt_at: None,
            last_error: None,
            last_status_code: None,
            delivered_at: None,
            created_at: now(),
            expires_at: None,
            metadata: serde_json::json!({}),
        };
        let first = repo.enqueue(&event).await.unwrap();
        let second = repo.enqueue(&event).await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn audit_entries_list_in_order() {
        let repo = test_repo().await;
        let task = repo.create(&sample_new_task()).await.unwrap();
        for i in 0..3 {
            let entry = AuditEntry {
                id: 0,
                task_id: task.id,
                actor: "kai".into(),
                context: "gate_chain".into(),
                field_path: format!("status.{i}"),
                before: serde_json::json!("todo"),
                after: serde_json::json!("doing"),
                timestamp: now(),
            };
            AuditRepository::append(&repo, &entry).await.unwrap();
        }
        let entries = AuditRepository::list_for_task(&repo, task.id).await.unwrap();
        assert_eq!(entries.len(), 3);
    }

    #[tokio::test]
    async fn resolve_prefix_ambiguous_errors() {
        let repo = test_repo().await;
        repo.create(&sample_new_task()).await.unwrap();
        let task2 = NewTask { title: "Fix login redirect loop".into(), ..sample_new_task() };
        repo.create(&task2).await.unwrap();
        let result = repo.resolve_prefix("FIX").await;
        assert!(result.is_err());
    }
}
