use chrono::{DateTime, Utc};
use gov_core::error::GovError;
use gov_core::models::{
    AuditEntry, CalendarBlock, CalendarEvent, ChatMessage, ContinuityAction, Escalation,
    InboxSubscription, Insight, InsightStatus, NoiseBudgetSnapshot, PauseEntry, PresenceRow,
    Priority, RecurringTaskDef, Reflection, RoutingOverride, Severity, SuppressionLedgerEntry,
    Task, TaskFilter, TaskStatus, TaskType, TriageDecision, TriageOutcome, WebhookEvent,
    WebhookStatus,
};
use sqlx::{sqlite::SqliteRow, Row};

pub fn status_to_string(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Todo => "todo",
        TaskStatus::Doing => "doing",
        TaskStatus::Blocked => "blocked",
        TaskStatus::Validating => "validating",
        TaskStatus::Done => "done",
    }
}

pub fn string_to_status(s: &str) -> gov_core::error::Result<TaskStatus> {
    match s {
        "todo" => Ok(TaskStatus::Todo),
        "doing" => Ok(TaskStatus::Doing),
        "blocked" => Ok(TaskStatus::Blocked),
        "validating" => Ok(TaskStatus::Validating),
        "done" => Ok(TaskStatus::Done),
        other => Err(GovError::storage(format!("invalid task status in database: {other}"))),
    }
}

pub fn task_type_to_string(t: TaskType) -> &'static str {
    match t {
        TaskType::Bug => "bug",
        TaskType::Feature => "feature",
        TaskType::Process => "process",
        TaskType::Docs => "docs",
        TaskType::Chore => "chore",
    }
}

pub fn string_to_task_type(s: &str) -> gov_core::error::Result<TaskType> {
    match s {
        "bug" => Ok(TaskType::Bug),
        "feature" => Ok(TaskType::Feature),
        "process" => Ok(TaskType::Process),
        "docs" => Ok(TaskType::Docs),
        "chore" => Ok(TaskType::Chore),
        other => Err(GovError::storage(format!("invalid task type in database: {other}"))),
    }
}

pub fn priority_to_string(p: Priority) -> &'static str {
    match p {
        Priority::P0 => "P0",
        Priority::P1 => "P1",
        Priority::P2 => "P2",
        Priority::P3 => "P3",
    }
}

pub fn string_to_priority(s: &str) -> gov_core::error::Result<Priority> {
    match s {
        "P0" => Ok(Priority::P0),
        "P1" => Ok(Priority::P1),
        "P2" => Ok(Priority::P2),
        "P3" => Ok(Priority::P3),
        other => Err(GovError::storage(format!("invalid priority in database: {other}"))),
    }
}

pub fn severity_to_string(s: Severity) -> &'static str {
    match s {
        Severity::Low => "low",
        Severity::Medium => "medium",
        Severity::High => "high",
        Severity::Critical => "critical",
    }
}

pub fn string_to_severity(s: &str) -> gov_core::error::Result<Severity> {
    match s {
        "low" => Ok(Severity::Low),
        "medium" => Ok(Severity::Medium),
        "high" => Ok(Severity::High),
        "critical" => Ok(Severity::Critical),
        other => Err(GovError::storage(format!("invalid severity in database: {other}"))),
    }
}

pub fn insight_status_to_string(s: InsightStatus) -> &'static str {
    match s {
        InsightStatus::Open => "open",
        InsightStatus::PendingTriage => "pending_triage",
        InsightStatus::TaskCreated => "task_created",
        InsightStatus::Closed => "closed",
    }
}

pub fn string_to_insight_status(s: &str) -> gov_core::error::Result<InsightStatus> {
    match s {
        "open" => Ok(InsightStatus::Open),
        "pending_triage" => Ok(InsightStatus::PendingTriage),
        "task_created" => Ok(InsightStatus::TaskCreated),
        "closed" => Ok(InsightStatus::Closed),
        other => Err(GovError::storage(format!("invalid insight status in database: {other}"))),
    }
}

pub fn webhook_status_to_string(s: WebhookStatus) -> &'static str {
    match s {
        WebhookStatus::Pending => "pending",
        WebhookStatus::Delivering => "delivering",
        WebhookStatus::Delivered => "delivered",
        WebhookStatus::Retrying => "retrying",
        WebhookStatus::DeadLetter => "dead_letter",
    }
}

pub fn string_to_webhook_status(s: &str) -> gov_core::error::Result<WebhookStatus> {
    match s {
        "pending" => Ok(WebhookStatus::Pending),
        "delivering" => Ok(WebhookStatus::Delivering),
        "delivered" => Ok(WebhookStatus::Delivered),
        "retrying" => Ok(WebhookStatus::Retrying),
        "dead_letter" => Ok(WebhookStatus::DeadLetter),
        other => Err(GovError::storage(format!("invalid webhook status in database: {other}"))),
    }
}

pub fn triage_outcome_to_string(o: TriageOutcome) -> &'static str {
    match o {
        TriageOutcome::Approve => "approve",
        TriageOutcome::Dismiss => "dismiss",
    }
}

pub fn string_to_triage_outcome(s: &str) -> gov_core::error::Result<TriageOutcome> {
    match s {
        "approve" => Ok(TriageOutcome::Approve),
        "dismiss" => Ok(TriageOutcome::Dismiss),
        other => Err(GovError::storage(format!("invalid triage outcome in database: {other}"))),
    }
}

fn json_vec(s: &str) -> Vec<String> {
    serde_json::from_str(s).unwrap_or_default()
}

fn json_ids(s: &str) -> Vec<i64> {
    serde_json::from_str(s).unwrap_or_default()
}

pub fn row_to_task(row: &SqliteRow) -> gov_core::error::Result<Task> {
    let status_str: String = row.get("status");
    let task_type_str: String = row.get("task_type");
    let priority_str: String = row.get("priority");
    let done_criteria: String = row.get("done_criteria");
    let blocked_by: String = row.get("blocked_by");
    let tags: String = row.get("tags");
    let metadata: String = row.get("metadata");

    Ok(Task {
        id: row.get("id"),
        code: row.get("code"),
        title: row.get("title"),
        description: row.get("description"),
        task_type: string_to_task_type(&task_type_str)?,
        status: string_to_status(&status_str)?,
        priority: string_to_priority(&priority_str)?,
        assignee: row.get("assignee"),
        reviewer: row.get("reviewer"),
        done_criteria: json_vec(&done_criteria),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        blocked_by: json_ids(&blocked_by),
        tags: json_vec(&tags),
        team_id: row.get("team_id"),
        metadata: serde_json::from_str(&metadata).unwrap_or(serde_json::json!({})),
    })
}

pub fn row_to_reflection(row: &SqliteRow) -> gov_core::error::Result<Reflection> {
    let severity_str: String = row.get("severity");
    let evidence: String = row.get("evidence");
    let tags: String = row.get("tags");
    let confidence: i64 = row.get("confidence");

    Ok(Reflection {
        id: row.get("id"),
        pain: row.get("pain"),
        impact: row.get("impact"),
        evidence: json_vec(&evidence),
        went_well: row.get("went_well"),
        suspected_why: row.get("suspected_why"),
        proposed_fix: row.get("proposed_fix"),
        confidence: confidence as u8,
        role_type: row.get("role_type"),
        severity: string_to_severity(&severity_str)?,
        author: row.get("author"),
        tags: json_vec(&tags),
        task_id: row.get("task_id"),
        team_id: row.get("team_id"),
        created_at: row.get("created_at"),
    })
}

pub fn row_to_insight(row: &SqliteRow) -> gov_core::error::Result<Insight> {
    let status_str: String = row.get("status");
    let severity_str: String = row.get("severity_max");
    let priority_str: String = row.get("priority");
    let reflection_ids: String = row.get("reflection_ids");
    let authors: String = row.get("authors");
    let evidence_refs: String = row.get("evidence_refs");
    let independent_count: i64 = row.get("independent_count");

    Ok(Insight {
        id: row.get("id"),
        title: row.get("title"),
        cluster_key: row.get("cluster_key"),
        status: string_to_insight_status(&status_str)?,
        score: row.get("score"),
        severity_max: string_to_severity(&severity_str)?,
        priority: string_to_priority(&priority_str)?,
        reflection_ids: json_ids(&reflection_ids),
        authors: json_vec(&authors),
        independent_count: independent_count as u32,
        evidence_refs: json_vec(&evidence_refs),
        task_id: row.get("task_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

pub fn row_to_triage_decision(row: &SqliteRow) -> gov_core::error::Result<TriageDecision> {
    let decision_str: String = row.get("decision");
    Ok(TriageDecision {
        id: row.get("id"),
        insight_id: row.get("insight_id"),
        decision: string_to_triage_outcome(&decision_str)?,
        decided_by: row.get("decided_by"),
        reason: row.get("reason"),
        decided_at: row.get("decided_at"),
    })
}

pub fn row_to_webhook_event(row: &SqliteRow) -> gov_core::error::Result<WebhookEvent> {
    let status_str: String = row.get("status");
    let payload: String = row.get("payload");
    let metadata: String = row.get("metadata");
    let attempts: i64 = row.get("attempts");
    let max_attempts: i64 = row.get("max_attempts");
    let last_status_code: Option<i64> = row.get("last_status_code");

    Ok(WebhookEvent {
        id: row.get("id"),
        idempotency_key: row.get("idempotency_key"),
        provider: row.get("provider"),
        event_type: row.get("event_type"),
        payload: serde_json::from_str(&payload).unwrap_or(serde_json::json!({})),
        target_url: row.get("target_url"),
        status: string_to_webhook_status(&status_str)?,
        attempts: attempts as u32,
        max_attempts: max_attempts as u32,
        next_retry_at: row.get("next_retry_at"),
        last_attempt_at: row.get("last_attempt_at"),
        last_error: row.get("last_error"),
        last_status_code: last_status_code.map(|c| c as u16),
        delivered_at: row.get("delivered_at"),
        created_at: row.get("created_at"),
        expires_at: row.get("expires_at"),
        metadata: serde_json::from_str(&metadata).unwrap_or(serde_json::json!({})),
    })
}

pub fn row_to_audit_entry(row: &SqliteRow) -> gov_core::error::Result<AuditEntry> {
    let before: String = row.get("before");
    let after: String = row.get("after");
    Ok(AuditEntry {
        id: row.get("id"),
        task_id: row.get("task_id"),
        actor: row.get("actor"),
        context: row.get("context"),
        field_path: row.get("field_path"),
        before: serde_json::from_str(&before).unwrap_or(serde_json::Value::Null),
        after: serde_json::from_str(&after).unwrap_or(serde_json::Value::Null),
        timestamp: row.get("timestamp"),
    })
}

pub fn row_to_pause_entry(row: &SqliteRow) -> gov_core::error::Result<PauseEntry> {
    Ok(PauseEntry {
        id: row.get("id"),
        scope: row.get("scope"),
        reason: row.get("reason"),
        paused_by: row.get("paused_by"),
        paused_at: row.get("paused_at"),
        resumed_at: row.get("resumed_at"),
    })
}

pub fn row_to_presence_row(row: &SqliteRow) -> gov_core::error::Result<PresenceRow> {
    Ok(PresenceRow {
        agent_name: row.get("agent_name"),
        last_activity_at: row.get("last_activity_at"),
        last_message_at: row.get("last_message_at"),
        last_status_change_at: row.get("last_status_change_at"),
        focus_window_until: row.get("focus_window_until"),
    })
}

pub fn row_to_subscription(row: &SqliteRow) -> gov_core::error::Result<InboxSubscription> {
    Ok(InboxSubscription {
        id: row.get("id"),
        agent_name: row.get("agent_name"),
        channel: row.get("channel"),
        created_at: row.get("created_at"),
    })
}

pub fn row_to_chat_message(row: &SqliteRow) -> gov_core::error::Result<ChatMessage> {
    let mentions: String = row.get("mentions");
    Ok(ChatMessage {
        id: row.get("id"),
        channel: row.get("channel"),
        author_agent_name: row.get("author_agent_name"),
        content: row.get("content"),
        mentions: json_vec(&mentions),
        task_id: row.get("task_id"),
        created_at: row.get("created_at"),
    })
}

pub fn row_to_escalation(row: &SqliteRow) -> gov_core::error::Result<Escalation> {
    Ok(Escalation {
        id: row.get("id"),
        agent_name: row.get("agent_name"),
        reason: row.get("reason"),
        channel: row.get("channel"),
        created_at: row.get("created_at"),
        acknowledged_at: row.get("acknowledged_at"),
    })
}

pub fn row_to_recurring_task_def(row: &SqliteRow) -> gov_core::error::Result<RecurringTaskDef> {
    let task_type_str: String = row.get("task_type");
    let priority_str: String = row.get("priority");
    let active: i64 = row.get("active");
    Ok(RecurringTaskDef {
        id: row.get("id"),
        title_template: row.get("title_template"),
        task_type: string_to_task_type(&task_type_str)?,
        priority: string_to_priority(&priority_str)?,
        cron_expr: row.get("cron_expr"),
        assignee: row.get("assignee"),
        active: active != 0,
        last_fired_at: row.get("last_fired_at"),
    })
}

pub fn row_to_calendar_block(row: &SqliteRow) -> gov_core::error::Result<CalendarBlock> {
    Ok(CalendarBlock {
        id: row.get("id"),
        agent_name: row.get("agent_name"),
        starts_at: row.get("starts_at"),
        ends_at: row.get("ends_at"),
        label: row.get("label"),
    })
}

pub fn row_to_calendar_event(row: &SqliteRow) -> gov_core::error::Result<CalendarEvent> {
    Ok(CalendarEvent {
        id: row.get("id"),
        agent_name: row.get("agent_name"),
        channel: row.get("channel"),
        message: row.get("message"),
        fire_at: row.get("fire_at"),
        delivered_at: row.get("delivered_at"),
    })
}

pub fn row_to_suppression_entry(row: &SqliteRow) -> gov_core::error::Result<SuppressionLedgerEntry> {
    Ok(SuppressionLedgerEntry {
        id: row.get("id"),
        alert_key: row.get("alert_key"),
        channel: row.get("channel"),
        reason: row.get("reason"),
        normalized_content: row.get("normalized_content"),
        suppressed_at: row.get("suppressed_at"),
        expires_at: row.get("expires_at"),
    })
}

pub fn row_to_continuity_action(row: &SqliteRow) -> gov_core::error::Result<ContinuityAction> {
    let payload: String = row.get("payload");
    Ok(ContinuityAction {
        id: row.get("id"),
        worker: row.get("worker"),
        action_kind: row.get("action_kind"),
        payload: serde_json::from_str(&payload).unwrap_or(serde_json::Value::Null),
        created_at: row.get("created_at"),
    })
}

pub fn row_to_routing_override(row: &SqliteRow) -> gov_core::error::Result<RoutingOverride> {
    Ok(RoutingOverride {
        id: row.get("id"),
        target: row.get("target"),
        work_class: row.get("work_class"),
        created_by: row.get("created_by"),
        starts_at: row.get("starts_at"),
        expires_at: row.get("expires_at"),
    })
}

/// Map a sqlx error onto the governance error taxonomy, recognizing
/// unique-constraint violations on `tasks.code` / `webhook_events.idempotency_key`.
pub fn sqlx_error_to_gov_error(err: sqlx::Error) -> GovError {
    match &err {
        sqlx::Error::Database(db_err) => {
            let message = db_err.message();
            if message.contains("UNIQUE constraint failed") {
                GovError::storage(format!("unique constraint violated: {message}"))
            } else {
                GovError::storage(format!("database constraint error: {message}"))
            }
        }
        sqlx::Error::RowNotFound => GovError::not_found("row not found"),
        sqlx::Error::PoolTimedOut => GovError::transient("connection pool timeout"),
        sqlx::Error::Io(io_err) => GovError::storage(format!("database i/o error: {io_err}")),
        _ => GovError::storage(format!("database operation failed: {err}")),
    }
}

/// Build the dynamic `WHERE` clause for `TaskFilter`, mirroring the
/// teacher's `QueryBuilder`-based approach for proper type binding over
/// string concatenation.
pub fn build_task_filter_query(filter: &TaskFilter) -> sqlx::QueryBuilder<'_, sqlx::Sqlite> {
    let mut qb: sqlx::QueryBuilder<sqlx::Sqlite> = sqlx::QueryBuilder::new(
        "SELECT id, code, title, description, task_type, status, priority, assignee, reviewer, \
         done_criteria, created_by, created_at, updated_at, blocked_by, tags, team_id, metadata \
         FROM tasks",
    );

    let mut has_conditions = false;
    macro_rules! clause {
        ($sql:expr) => {
            if has_conditions {
                qb.push(" AND ");
            } else {
                qb.push(" WHERE ");
                has_conditions = true;
            }
            qb.push($sql);
        };
    }

    if let Some(ref assignee) = filter.assignee {
        clause!("assignee = ");
        qb.push_bind(assignee.clone());
    }
    if let Some(ref reviewer) = filter.reviewer {
        clause!("reviewer = ");
        qb.push_bind(reviewer.clone());
    }
    if let Some(status) = filter.status {
        clause!("status = ");
        qb.push_bind(status_to_string(status));
    }
    if let Some(task_type) = filter.task_type {
        clause!("task_type = ");
        qb.push_bind(task_type_to_string(task_type));
    }
    if let Some(priority) = filter.priority {
        clause!("priority = ");
        qb.push_bind(priority_to_string(priority));
    }
    if let Some(ref team_id) = filter.team_id {
        clause!("team_id = ");
        qb.push_bind(team_id.clone());
    }
    if let Some(ref tag) = filter.tag {
        clause!("tags LIKE ");
        qb.push_bind(format!("%\"{tag}\"%"));
    }
    if let Some(created_after) = filter.created_after {
        clause!("created_at >= ");
        qb.push_bind(created_after);
    }
    if let Some(created_before) = filter.created_before {
        clause!("created_at <= ");
        qb.push_bind(created_before);
    }

    qb.push(" ORDER BY created_at DESC");

    if let Some(limit) = filter.limit {
        qb.push(" LIMIT ");
        qb.push_bind(limit);
    }
    if let Some(offset) = filter.offset {
        qb.push(" OFFSET ");
        qb.push_bind(offset);
    }

    qb
}

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips() {
        for s in [TaskStatus::Todo, TaskStatus::Doing, TaskStatus::Blocked, TaskStatus::Validating, TaskStatus::Done] {
            assert_eq!(string_to_status(status_to_string(s)).unwrap(), s);
        }
    }

    #[test]
    fn priority_round_trips() {
        for p in [Priority::P0, Priority::P1, Priority::P2, Priority::P3] {
            assert_eq!(string_to_priority(priority_to_string(p)).unwrap(), p);
        }
    }

    #[test]
    fn filter_query_builds_where_clause() {
        let filter = TaskFilter { assignee: Some("kai".into()), status: Some(TaskStatus::Doing), ..Default::default() };
        let mut qb = build_task_filter_query(&filter);
        let sql = qb.build().sql().to_string();
        assert!(sql.contains("WHERE assignee = "));
        assert!(sql.contains("AND status = "));
    }

    #[test]
    fn invalid_status_string_errors() {
        assert!(string_to_status("bogus").is_err());
    }
}
