//! Request/response DTOs and the top-level handler trait for the HTTP
//! surface (§6). The `protocol`/`server` crates adapt these to axum
//! extractors and JSON bodies; this crate only defines the shapes and
//! the operation contract.

use crate::error::Result;
use crate::gate_chain::GatePolicy;
use crate::models::*;
use crate::watchdog::TickOpts;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTaskParams {
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

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PatchTaskParams {
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
    pub actor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ListTasksParams {
    #[serde(flatten)]
    pub filter: TaskFilter,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewDecisionParams {
    pub actor: String,
    pub decision: ReviewDecision,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    RequestChanges,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimTaskParams {
    pub agent_name: String,
}

/// `GET /tasks/next` response: the best candidate for an agent to pick
/// up, scored via `routing::score_for_assignment`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextTaskResponse {
    pub task: Option<Task>,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitReflectionParams {
    pub pain: String,
    pub impact: String,
    pub evidence: Vec<String>,
    pub went_well: Option<String>,
    pub suspected_why: Option<String>,
    pub proposed_fix: Option<String>,
    pub confidence: u8,
    pub role_type: String,
    pub severity: Severity,
    pub author: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub task_id: Option<i64>,
    pub team_id: Option<String>,
}

/// Outcome of `POST /reflections`: the ingest result plus whatever the
/// auto-task bridge decided, for a caller that wants to surface both
/// in one response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectionIngestResponse {
    pub reflection: Reflection,
    pub insight: Insight,
    pub bridged_task_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageParams {
    pub decision: TriageOutcome,
    pub decided_by: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileParams {
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilePlan {
    pub orphans_found: usize,
    pub recreated_task_ids: Vec<i64>,
    pub recorded_anomalies: usize,
    pub dry_run: bool,
}

/// Body accepted by every `/health/*/tick` watchdog admin endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WatchdogTickParams {
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub force: bool,
    /// Override "now" for deterministic replay/testing.
    pub now_ms: Option<i64>,
}

impl From<&WatchdogTickParams> for TickOpts {
    fn from(p: &WatchdogTickParams) -> Self {
        TickOpts { dry_run: p.dry_run, force: p.force }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliverWebhookParams {
    pub idempotency_key: String,
    pub provider: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub target_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookStats {
    pub pending: u64,
    pub delivering: u64,
    pub delivered: u64,
    pub retrying: u64,
    pub dead_letter: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyUpdateParams {
    pub gate_policy: Option<GatePolicy>,
}

/// Top-level governance operations, independent of transport. The
/// `protocol`/`server` crates implement this against the repository
/// traits + the pure decision functions in `gate_chain`/`pipeline`/
/// `watchdog`/`webhook`/`routing`.
#[async_trait]
pub trait GovHandler: Send + Sync {
    async fn create_task(&self, params: CreateTaskParams) -> Result<Task>;
    async fn patch_task(&self, id_or_prefix: &str, params: PatchTaskParams) -> Result<Task>;
    async fn get_task(&self, id_or_prefix: &str) -> Result<Task>;
    async fn list_tasks(&self, params: ListTasksParams) -> Result<Vec<Task>>;
    async fn next_task(&self, agent_name: &str) -> Result<NextTaskResponse>;
    async fn claim_task(&self, id_or_prefix: &str, params: ClaimTaskParams) -> Result<Task>;
    async fn review_task(&self, id_or_prefix: &str, params: ReviewDecisionParams) -> Result<Task>;

    async fn submit_reflection(&self, params: SubmitReflectionParams) -> Result<ReflectionIngestResponse>;
    async fn list_insight_orphans(&self) -> Result<Vec<Insight>>;
    async fn reconcile_insights(&self, params: ReconcileParams) -> Result<ReconcilePlan>;
    async fn triage_insight(&self, insight_id: i64, params: TriageParams) -> Result<Insight>;

    async fn tick_idle_nudge(&self, params: WatchdogTickParams) -> Result<serde_json::Value>;
    async fn tick_cadence_watchdog(&self, params: WatchdogTickParams) -> Result<serde_json::Value>;
    async fn tick_mention_rescue(&self, params: WatchdogTickParams) -> Result<serde_json::Value>;
    async fn tick_board_health(&self, params: WatchdogTickParams) -> Result<serde_json::Value>;
    async fn tick_execution_sweeper(&self, params: WatchdogTickParams) -> Result<serde_json::Value>;

    async fn deliver_webhook(&self, params: DeliverWebhookParams) -> Result<WebhookEvent>;
    async fn replay_webhook(&self, id: i64) -> Result<WebhookEvent>;
    async fn webhook_stats(&self) -> Result<WebhookStats>;

    async fn list_audit_for_task(&self, task_id: i64) -> Result<Vec<AuditEntry>>;

    async fn get_policy(&self) -> Result<GatePolicy>;
    async fn update_policy(&self, params: PolicyUpdateParams) -> Result<GatePolicy>;

    async fn health_check(&self) -> Result<()>;
}
