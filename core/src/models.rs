use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Category of work a task represents.
///
/// # Examples
///
/// ```rust
/// use gov_core::models::TaskType;
///
/// assert_eq!(TaskType::Bug.to_string(), "bug");
/// ```
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Bug,
    Feature,
    Process,
    Docs,
    Chore,
}

impl TaskType {
    /// True for lanes the close gate treats as non-code: artifacts alone
    /// satisfy the review-packet requirement and a follow-on link is
    /// mandatory at close.
    pub fn is_non_code_lane(&self) -> bool {
        matches!(self, TaskType::Process | TaskType::Docs)
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskType::Bug => "bug",
            TaskType::Feature => "feature",
            TaskType::Process => "process",
            TaskType::Docs => "docs",
            TaskType::Chore => "chore",
        };
        write!(f, "{s}")
    }
}

/// Task lifecycle states.
///
/// The whitelist enforced by the gate chain is: `Todo -> Doing`,
/// `Doing -> {Blocked, Validating}`, `Blocked -> {Doing, Todo}`,
/// `Validating -> {Done, Doing}`. `Done` is terminal except through an
/// explicit `reopen` patch.
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    Doing,
    Blocked,
    Validating,
    Done,
}

impl TaskStatus {
    /// Whitelist check per gate chain step 2. Does not account for the
    /// `reopen` escape hatch; callers needing that check `GateChain`.
    pub fn whitelisted_transition(&self, to: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (*self, to),
            (Todo, Doing)
                | (Doing, Blocked)
                | (Doing, Validating)
                | (Blocked, Doing)
                | (Blocked, Todo)
                | (Validating, Done)
                | (Validating, Doing)
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Todo => "todo",
            TaskStatus::Doing => "doing",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Validating => "validating",
            TaskStatus::Done => "done",
        };
        write!(f, "{s}")
    }
}

/// Task priority, P0 highest.
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    P0,
    P1,
    P2,
    P3,
}

/// Core task representation governed by the lifecycle engine.
///
/// `id` is immutable once assigned; `code` is a human-readable,
/// prefix-resolvable identifier (e.g. `"LOGIN-SSO-4"`). `metadata` carries
/// the gate evidence (`qa_bundle`, `review_handoff`, `pr_integrity`, ...)
/// as a free-form JSON object; use [`crate::metadata::TaskMetadata`] to
/// parse a typed view of it at gate-chain ingress.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: i64,
    pub code: String,
    pub title: String,
    pub description: String,
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub priority: Priority,
    pub assignee: Option<String>,
    pub reviewer: Option<String>,
    /// Ordered, non-empty (>=2 for `Feature`) list of verifiable completion
    /// statements.
    pub done_criteria: Vec<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub blocked_by: Vec<i64>,
    pub tags: Vec<String>,
    pub team_id: Option<String>,
    pub metadata: serde_json::Value,
}

impl Task {
    /// Read a metadata key, returning `None` if the key is absent or the
    /// value is `null`.
    pub fn metadata_get(&self, key: &str) -> Option<&serde_json::Value> {
        self.metadata.get(key).filter(|v| !v.is_null())
    }

    pub fn metadata_bool(&self, key: &str) -> bool {
        self.metadata_get(key).and_then(|v| v.as_bool()).unwrap_or(false)
    }

    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata_get(key).and_then(|v| v.as_str())
    }

    /// Count of `done_criteria` required for the task's type (>=2 for
    /// features, >=1 otherwise), per §3's data model invariant.
    pub fn min_done_criteria(&self) -> usize {
        if self.task_type == TaskType::Feature {
            2
        } else {
            1
        }
    }
}

/// Creation request for a new task, validated before `id`/timestamps are
/// assigned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub task_type: TaskType,
    pub priority: Priority,
    pub reviewer: String,
    pub assignee: Option<String>,
    pub done_criteria: Vec<String>,
    pub created_by: String,
    #[serde(default)]
    pub blocked_by: Vec<i64>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub team_id: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Patch applied to an existing task. Every field is `Option`; `None`
/// means "leave unchanged". `metadata` is merged key-by-key, never
/// replaced wholesale — see `gate_chain::merge_metadata`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub assignee: Option<String>,
    pub reviewer: Option<String>,
    pub done_criteria: Option<Vec<String>>,
    pub blocked_by: Option<Vec<i64>>,
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// Actor performing the patch, required for reviewer-identity checks.
    pub actor: Option<String>,
}

/// Query filter for listing tasks. All fields combine with AND.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskFilter {
    pub assignee: Option<String>,
    pub reviewer: Option<String>,
    pub status: Option<TaskStatus>,
    pub task_type: Option<TaskType>,
    pub priority: Option<Priority>,
    pub team_id: Option<String>,
    pub tag: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Reflection severity, independent of task priority.
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// A structured post-mortem authored by an agent after work or at
/// cadence. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reflection {
    pub id: i64,
    pub pain: String,
    pub impact: String,
    /// At least one supporting reference (log line, PR, message id).
    pub evidence: Vec<String>,
    pub went_well: Option<String>,
    pub suspected_why: Option<String>,
    pub proposed_fix: Option<String>,
    /// 0..=10.
    pub confidence: u8,
    pub role_type: String,
    pub severity: Severity,
    pub author: String,
    pub tags: Vec<String>,
    pub task_id: Option<i64>,
    pub team_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Status of an insight cluster through the pipeline.
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InsightStatus {
    Open,
    PendingTriage,
    TaskCreated,
    Closed,
}

/// An aggregate signal derived from one or more reflections sharing a
/// `cluster_key` (see `pipeline::derive_cluster_key`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Insight {
    pub id: i64,
    pub title: String,
    pub cluster_key: String,
    pub status: InsightStatus,
    /// EMA over reflection `confidence x severity`, 0.0..=10.0.
    pub score: f64,
    pub severity_max: Severity,
    pub priority: Priority,
    pub reflection_ids: Vec<i64>,
    pub authors: Vec<String>,
    pub independent_count: u32,
    pub evidence_refs: Vec<String>,
    pub task_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Delivery status of a webhook event.
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WebhookStatus {
    Pending,
    Delivering,
    Delivered,
    Retrying,
    DeadLetter,
}

/// A queued outbound webhook delivery. `idempotency_key` is unique;
/// colliding enqueues must return the existing row rather than create a
/// duplicate (§3 invariant).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebhookEvent {
    pub id: i64,
    pub idempotency_key: String,
    pub provider: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub target_url: String,
    pub status: WebhookStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_status_code: Option<u16>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Append-only record of a review-sensitive field mutation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEntry {
    pub id: i64,
    pub task_id: i64,
    pub actor: String,
    pub context: String,
    pub field_path: String,
    pub before: serde_json::Value,
    pub after: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// A manual pause of a watchdog or the scheduler as a whole.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PauseEntry {
    pub id: i64,
    pub scope: String,
    pub reason: String,
    pub paused_by: String,
    pub paused_at: DateTime<Utc>,
    pub resumed_at: Option<DateTime<Utc>>,
}

/// Per-agent activity snapshot, rebuildable from chat/task history on
/// restart (§5 shared-resource policy).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PresenceRow {
    pub agent_name: String,
    pub last_activity_at: DateTime<Utc>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub last_status_change_at: Option<DateTime<Utc>>,
    pub focus_window_until: Option<DateTime<Utc>>,
}

/// A subscription used by mention-rescue/idle-nudge to know who to
/// notify for a channel or task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InboxSubscription {
    pub id: i64,
    pub agent_name: String,
    pub channel: String,
    pub created_at: DateTime<Utc>,
}

/// Chat message in the append-only log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub id: i64,
    pub channel: String,
    pub author_agent_name: String,
    pub content: String,
    /// Agent names extracted from `@mentions` in `content`.
    pub mentions: Vec<String>,
    pub task_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// An approve/reject decision on a `pending_triage` insight.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TriageDecision {
    pub id: i64,
    pub insight_id: i64,
    pub decision: TriageOutcome,
    pub decided_by: String,
    pub reason: Option<String>,
    pub decided_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TriageOutcome {
    Approve,
    Dismiss,
}

/// A watchdog escalation raised when a nudge goes unanswered past
/// `escalateMin`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Escalation {
    pub id: i64,
    pub agent_name: String,
    pub reason: String,
    pub channel: String,
    pub created_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
}

/// A recurring task template expanded by the reminder engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecurringTaskDef {
    pub id: i64,
    pub title_template: String,
    pub task_type: TaskType,
    pub priority: Priority,
    pub cron_expr: String,
    pub assignee: Option<String>,
    pub active: bool,
    pub last_fired_at: Option<DateTime<Utc>>,
}

/// A free/busy window on an agent's calendar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalendarBlock {
    pub id: i64,
    pub agent_name: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub label: String,
}

/// A scheduled reminder delivered by the reminder engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalendarEvent {
    pub id: i64,
    pub agent_name: Option<String>,
    pub channel: String,
    pub message: String,
    pub fire_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}

/// Point-in-time snapshot of a channel's noise budget, persisted for the
/// `/policy` and stats endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NoiseBudgetSnapshot {
    pub channel: String,
    pub window_start: DateTime<Utc>,
    pub message_count: u32,
    pub budget: u32,
    pub over_budget: bool,
    pub enforced: bool,
}

/// A persisted record that an automated message was withheld.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SuppressionLedgerEntry {
    pub id: i64,
    pub alert_key: String,
    pub channel: String,
    pub reason: String,
    pub normalized_content: String,
    pub suppressed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// A side effect persisted by a worker tick so a crash mid-tick does not
/// duplicate it on restart (§5 cancellation & timeouts).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContinuityAction {
    pub id: i64,
    pub worker: String,
    pub action_kind: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// A time-bounded override redirecting a class of work to a target
/// agent or role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoutingOverride {
    pub id: i64,
    pub target: String,
    pub work_class: String,
    pub created_by: String,
    pub starts_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Aggregate repository statistics for monitoring.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RepositoryStats {
    pub total_tasks: u64,
    pub tasks_by_status: HashMap<TaskStatus, u64>,
    pub tasks_by_assignee: HashMap<String, u64>,
    pub latest_created: Option<DateTime<Utc>>,
    pub latest_done: Option<DateTime<Utc>>,
}
