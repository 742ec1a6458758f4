//! Storage traits for every persisted entity (§3, §6).
//!
//! Each trait is a thin async boundary; the `database` crate supplies
//! the sqlite-backed implementation. Traits return [`crate::error::GovError`]
//! directly so callers can match on `is_not_found()`/`is_transient()`
//! without unwrapping a nested storage error type.

use crate::error::Result;
use crate::models::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// CRUD + lifecycle storage for tasks. Mutation goes through
/// [`crate::gate_chain::evaluate_transition`] first; `update` persists
/// an already-gated [`Task`], it does not re-run the gate chain.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn create(&self, task: &NewTask) -> Result<Task>;
    async fn get_by_id(&self, id: i64) -> Result<Task>;
    async fn get_by_code(&self, code: &str) -> Result<Task>;
    /// Resolve a short prefix against all task codes; exact match wins,
    /// otherwise the prefix must be unique (gate 1, §4.1).
    async fn resolve_prefix(&self, prefix: &str) -> Result<Task>;
    async fn update(&self, task: &Task) -> Result<Task>;
    async fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>>;
    /// Tasks currently `Doing` owned by `assignee`, for WIP-cap lookups.
    async fn count_doing_for_assignee(&self, assignee: &str) -> Result<u32>;
    /// Tasks currently `Validating` with `reviewer` assigned, for
    /// reviewer-load scoring.
    async fn count_validating_for_reviewer(&self, reviewer: &str) -> Result<u32>;
    async fn stats(&self) -> Result<RepositoryStats>;
    async fn health_check(&self) -> Result<()>;
}

/// Append-only reflection log.
#[async_trait]
pub trait ReflectionRepository: Send + Sync {
    async fn create(&self, reflection: &Reflection) -> Result<Reflection>;
    async fn get_by_id(&self, id: i64) -> Result<Reflection>;
    async fn list_by_cluster_candidates(&self, tags: &[String]) -> Result<Vec<Reflection>>;
    async fn list_recent(&self, since: DateTime<Utc>) -> Result<Vec<Reflection>>;
    /// Whether `author` owes a reflection per the debt rule (§4.2).
    async fn debt_owed(&self, author: &str, task_threshold: u32, hours: i64, now: DateTime<Utc>) -> Result<bool>;
}

/// Insight clusters and their pipeline transitions.
#[async_trait]
pub trait InsightRepository: Send + Sync {
    async fn create(&self, insight: &Insight) -> Result<Insight>;
    async fn get_by_id(&self, id: i64) -> Result<Insight>;
    async fn get_by_cluster_key(&self, cluster_key: &str) -> Result<Option<Insight>>;
    async fn update(&self, insight: &Insight) -> Result<Insight>;
    async fn list(&self, status: Option<InsightStatus>) -> Result<Vec<Insight>>;
    /// Insights not `closed`/`task_created` whose `task_id` no longer
    /// resolves to a live task (orphan reconciliation, §4.2).
    async fn list_orphans(&self, live_task_ids: &[i64]) -> Result<Vec<Insight>>;
}

/// Triage decisions on `pending_triage` insights.
#[async_trait]
pub trait TriageRepository: Send + Sync {
    async fn record(&self, decision: &TriageDecision) -> Result<TriageDecision>;
    async fn list_for_insight(&self, insight_id: i64) -> Result<Vec<TriageDecision>>;
}

/// Outbound webhook delivery queue.
#[async_trait]
pub trait WebhookRepository: Send + Sync {
    /// Enqueue a new event; an existing row with the same
    /// `idempotency_key` is returned unchanged rather than duplicated
    /// (§3 invariant).
    async fn enqueue(&self, event: &WebhookEvent) -> Result<WebhookEvent>;
    async fn get_by_id(&self, id: i64) -> Result<WebhookEvent>;
    async fn get_by_idempotency_key(&self, key: &str) -> Result<Option<WebhookEvent>>;
    async fn update(&self, event: &WebhookEvent) -> Result<WebhookEvent>;
    async fn list_retryable(&self, now: DateTime<Utc>, limit: u32) -> Result<Vec<WebhookEvent>>;
    async fn list_dead_letters(&self) -> Result<Vec<WebhookEvent>>;
    async fn purge_expired_delivered(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// Append-only audit ledger.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn append(&self, entry: &AuditEntry) -> Result<AuditEntry>;
    async fn list_for_task(&self, task_id: i64) -> Result<Vec<AuditEntry>>;
}

/// Manual pause/resume of a watchdog worker or the scheduler.
#[async_trait]
pub trait PauseRepository: Send + Sync {
    async fn pause(&self, entry: &PauseEntry) -> Result<PauseEntry>;
    async fn resume(&self, scope: &str, now: DateTime<Utc>) -> Result<()>;
    async fn active_pause(&self, scope: &str) -> Result<Option<PauseEntry>>;
}

/// Agent presence, rebuildable from chat/task history on restart.
#[async_trait]
pub trait PresenceRepository: Send + Sync {
    async fn upsert(&self, row: &PresenceRow) -> Result<PresenceRow>;
    async fn get(&self, agent_name: &str) -> Result<Option<PresenceRow>>;
    async fn list_idle_since(&self, threshold: DateTime<Utc>) -> Result<Vec<PresenceRow>>;
}

/// Channel/task mention subscriptions.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    async fn subscribe(&self, sub: &InboxSubscription) -> Result<InboxSubscription>;
    async fn unsubscribe(&self, id: i64) -> Result<()>;
    async fn list_for_channel(&self, channel: &str) -> Result<Vec<InboxSubscription>>;
}

/// Append-only chat log.
#[async_trait]
pub trait ChatRepository: Send + Sync {
    async fn append(&self, message: &ChatMessage) -> Result<ChatMessage>;
    async fn list_for_channel(&self, channel: &str, since: Option<DateTime<Utc>>) -> Result<Vec<ChatMessage>>;
    async fn list_pending_mentions(&self, agent_name: &str, since: DateTime<Utc>) -> Result<Vec<ChatMessage>>;
}

/// Watchdog escalations.
#[async_trait]
pub trait EscalationRepository: Send + Sync {
    async fn create(&self, escalation: &Escalation) -> Result<Escalation>;
    async fn acknowledge(&self, id: i64, now: DateTime<Utc>) -> Result<Escalation>;
    async fn list_unacknowledged(&self) -> Result<Vec<Escalation>>;
}

/// Recurring task templates and the calendar/reminder engine.
#[async_trait]
pub trait SchedulingRepository: Send + Sync {
    async fn list_active_recurring(&self, now: DateTime<Utc>) -> Result<Vec<RecurringTaskDef>>;
    async fn mark_fired(&self, id: i64, now: DateTime<Utc>) -> Result<()>;
    async fn list_calendar_blocks(&self, agent_name: &str, window_start: DateTime<Utc>, window_end: DateTime<Utc>) -> Result<Vec<CalendarBlock>>;
    async fn create_calendar_event(&self, event: &CalendarEvent) -> Result<CalendarEvent>;
    async fn list_due_reminders(&self, now: DateTime<Utc>) -> Result<Vec<CalendarEvent>>;
    async fn mark_delivered(&self, id: i64, now: DateTime<Utc>) -> Result<()>;
}

/// Noise budget, alert-integrity and suppression ledger (§4.6).
#[async_trait]
pub trait NoiseBudgetRepository: Send + Sync {
    async fn snapshot(&self, channel: &str, now: DateTime<Utc>) -> Result<NoiseBudgetSnapshot>;
    async fn record_message(&self, channel: &str, now: DateTime<Utc>) -> Result<()>;
    async fn record_suppression(&self, entry: &SuppressionLedgerEntry) -> Result<SuppressionLedgerEntry>;
    async fn list_suppressions_since(&self, since: DateTime<Utc>) -> Result<Vec<SuppressionLedgerEntry>>;
}

/// Crash-safe side-effect log for watchdog ticks (§5 cancellation &
/// timeouts): a worker records a continuity action before acting so a
/// restart mid-tick does not repeat the effect.
#[async_trait]
pub trait ContinuityRepository: Send + Sync {
    async fn record(&self, action: &ContinuityAction) -> Result<ContinuityAction>;
    async fn already_acted(&self, worker: &str, action_kind: &str, payload_key: &str, since: DateTime<Utc>) -> Result<bool>;
}

/// Routing overrides for assignment suggestion (§4.5).
#[async_trait]
pub trait RoutingRepository: Send + Sync {
    async fn create_override(&self, o: &RoutingOverride) -> Result<RoutingOverride>;
    async fn list_active(&self, now: DateTime<Utc>) -> Result<Vec<RoutingOverride>>;
    async fn retire(&self, id: i64) -> Result<()>;
}
