//! REST surface for the governance core.
//!
//! One axum route per `GovHandler` operation. Every handler function is
//! a thin adapter: pull params out of the request, call the trait
//! method, wrap the result in `Json`. All policy lives behind the
//! trait; nothing here inspects a `Task` or a `GovError` beyond
//! converting it to a response.

use std::sync::Arc;

use axum::extract::{Path, Query, Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use gov_core::gate_chain::GatePolicy;
use gov_core::models::*;
use gov_core::protocol::*;
use serde::Deserialize;
use tracing::info;

use crate::auth::GovAuth;
use crate::error::ApiError;
use crate::request_logger::gov_request_logging_middleware;

/// Owns the `GovHandler` implementation and assembles the router.
pub struct GovServer<H> {
    handler: Arc<H>,
}

impl<H: GovHandler + 'static> GovServer<H> {
    pub fn new(handler: Arc<H>) -> Self {
        Self { handler }
    }

    pub async fn serve(self, addr: &str) -> anyhow::Result<()> {
        let app = self.create_router();
        info!(%addr, "starting governance HTTP server");
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;
        Ok(())
    }

    /// Router with request logging but no auth gate. Used for local
    /// development and by `serve` unless the caller layers auth on top
    /// via `with_auth`.
    pub fn create_router(self) -> Router {
        self.router_without_logging().layer(middleware::from_fn(gov_request_logging_middleware))
    }

    /// Same router, with a bearer-token gate in front of every route
    /// except `/health`. Per-operation scope checks live in
    /// `GovAuth::check_scope`; wiring them per-route is left to the
    /// caller composing this with its own route table if finer-grained
    /// enforcement than "valid token required" is needed.
    pub fn create_router_with_auth(self, auth: Arc<GovAuth>) -> Router {
        self.router_without_logging()
            .layer(middleware::from_fn_with_state(auth, auth_gate))
            .layer(middleware::from_fn(gov_request_logging_middleware))
    }

    fn router_without_logging(self) -> Router {
        Router::new()
            .route("/tasks", post(create_task_handler::<H>).get(list_tasks_handler::<H>))
            .route("/tasks/next", get(next_task_handler::<H>))
            .route("/tasks/:id", get(get_task_handler::<H>).patch(patch_task_handler::<H>))
            .route("/tasks/:id/claim", post(claim_task_handler::<H>))
            .route("/tasks/:id/review", post(review_task_handler::<H>))
            .route("/reflections", post(submit_reflection_handler::<H>))
            .route("/insights/orphans", get(list_insight_orphans_handler::<H>))
            .route("/insights/reconcile", post(reconcile_insights_handler::<H>))
            .route("/insights/:id/triage", post(triage_insight_handler::<H>))
            .route("/health/idle-nudge/tick", post(tick_idle_nudge_handler::<H>))
            .route("/health/cadence-watchdog/tick", post(tick_cadence_watchdog_handler::<H>))
            .route("/health/mention-rescue/tick", post(tick_mention_rescue_handler::<H>))
            .route("/health/board-health/tick", post(tick_board_health_handler::<H>))
            .route("/health/execution-sweeper/tick", post(tick_execution_sweeper_handler::<H>))
            .route("/webhooks/deliver", post(deliver_webhook_handler::<H>))
            .route("/webhooks/events/:id/replay", post(replay_webhook_handler::<H>))
            .route("/webhooks/stats", get(webhook_stats_handler::<H>))
            .route("/audit/tasks/:id", get(list_audit_for_task_handler::<H>))
            .route("/policy", get(get_policy_handler::<H>).patch(update_policy_handler::<H>))
            .route("/health", get(health_check_handler::<H>))
            .with_state(self.handler)
    }
}

#[derive(Deserialize)]
struct NextTaskQuery {
    agent_name: String,
}

/// Rejects requests without a valid bearer token. `/health` is mounted
/// outside this layer's concern in spirit but, since the layer wraps
/// the whole router, it still requires a token; deployments that want
/// an unauthenticated liveness probe should front this with their own
/// load balancer health check instead.
async fn auth_gate(State(auth): State<Arc<GovAuth>>, request: Request, next: Next) -> Response {
    use axum::response::IntoResponse;

    let validation = auth.validate_token(request.headers()).await;
    if !validation.is_valid {
        return GovAuth::auth_error("missing or invalid bearer token").into_response();
    }
    next.run(request).await
}

async fn create_task_handler<H: GovHandler>(
    State(handler): State<Arc<H>>,
    Json(params): Json<CreateTaskParams>,
) -> Result<Json<Task>, ApiError> {
    Ok(Json(handler.create_task(params).await?))
}

async fn list_tasks_handler<H: GovHandler>(
    State(handler): State<Arc<H>>,
    Query(params): Query<ListTasksParams>,
) -> Result<Json<Vec<Task>>, ApiError> {
    Ok(Json(handler.list_tasks(params).await?))
}

async fn next_task_handler<H: GovHandler>(
    State(handler): State<Arc<H>>,
    Query(query): Query<NextTaskQuery>,
) -> Result<Json<NextTaskResponse>, ApiError> {
    Ok(Json(handler.next_task(&query.agent_name).await?))
}

async fn get_task_handler<H: GovHandler>(
    State(handler): State<Arc<H>>,
    Path(id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    Ok(Json(handler.get_task(&id).await?))
}

async fn patch_task_handler<H: GovHandler>(
    State(handler): State<Arc<H>>,
    Path(id): Path<String>,
    Json(params): Json<PatchTaskParams>,
) -> Result<Json<Task>, ApiError> {
    Ok(Json(handler.patch_task(&id, params).await?))
}

async fn claim_task_handler<H: GovHandler>(
    State(handler): State<Arc<H>>,
    Path(id): Path<String>,
    Json(params): Json<ClaimTaskParams>,
) -> Result<Json<Task>, ApiError> {
    Ok(Json(handler.claim_task(&id, params).await?))
}

async fn review_task_handler<H: GovHandler>(
    State(handler): State<Arc<H>>,
    Path(id): Path<String>,
    Json(params): Json<ReviewDecisionParams>,
) -> Result<Json<Task>, ApiError> {
    Ok(Json(handler.review_task(&id, params).await?))
}

async fn submit_reflection_handler<H: GovHandler>(
    State(handler): State<Arc<H>>,
    Json(params): Json<SubmitReflectionParams>,
) -> Result<Json<ReflectionIngestResponse>, ApiError> {
    Ok(Json(handler.submit_reflection(params).await?))
}

async fn list_insight_orphans_handler<H: GovHandler>(
    State(handler): State<Arc<H>>,
) -> Result<Json<Vec<Insight>>, ApiError> {
    Ok(Json(handler.list_insight_orphans().await?))
}

async fn reconcile_insights_handler<H: GovHandler>(
    State(handler): State<Arc<H>>,
    Json(params): Json<ReconcileParams>,
) -> Result<Json<ReconcilePlan>, ApiError> {
    Ok(Json(handler.reconcile_insights(params).await?))
}

async fn triage_insight_handler<H: GovHandler>(
    State(handler): State<Arc<H>>,
    Path(insight_id): Path<i64>,
    Json(params): Json<TriageParams>,
) -> Result<Json<Insight>, ApiError> {
    Ok(Json(handler.triage_insight(insight_id, params).await?))
}

async fn tick_idle_nudge_handler<H: GovHandler>(
    State(handler): State<Arc<H>>,
    Json(params): Json<WatchdogTickParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    Ok(Json(handler.tick_idle_nudge(params).await?))
}

async fn tick_cadence_watchdog_handler<H: GovHandler>(
    State(handler): State<Arc<H>>,
    Json(params): Json<WatchdogTickParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    Ok(Json(handler.tick_cadence_watchdog(params).await?))
}

async fn tick_mention_rescue_handler<H: GovHandler>(
    State(handler): State<Arc<H>>,
    Json(params): Json<WatchdogTickParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    Ok(Json(handler.tick_mention_rescue(params).await?))
}

async fn tick_board_health_handler<H: GovHandler>(
    State(handler): State<Arc<H>>,
    Json(params): Json<WatchdogTickParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    Ok(Json(handler.tick_board_health(params).await?))
}

async fn tick_execution_sweeper_handler<H: GovHandler>(
    State(handler): State<Arc<H>>,
    Json(params): Json<WatchdogTickParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    Ok(Json(handler.tick_execution_sweeper(params).await?))
}

async fn deliver_webhook_handler<H: GovHandler>(
    State(handler): State<Arc<H>>,
    Json(params): Json<DeliverWebhookParams>,
) -> Result<Json<WebhookEvent>, ApiError> {
    Ok(Json(handler.deliver_webhook(params).await?))
}

async fn replay_webhook_handler<H: GovHandler>(
    State(handler): State<Arc<H>>,
    Path(id): Path<i64>,
) -> Result<Json<WebhookEvent>, ApiError> {
    Ok(Json(handler.replay_webhook(id).await?))
}

async fn webhook_stats_handler<H: GovHandler>(
    State(handler): State<Arc<H>>,
) -> Result<Json<WebhookStats>, ApiError> {
    Ok(Json(handler.webhook_stats().await?))
}

async fn list_audit_for_task_handler<H: GovHandler>(
    State(handler): State<Arc<H>>,
    Path(task_id): Path<i64>,
) -> Result<Json<Vec<AuditEntry>>, ApiError> {
    Ok(Json(handler.list_audit_for_task(task_id).await?))
}

async fn get_policy_handler<H: GovHandler>(
    State(handler): State<Arc<H>>,
) -> Result<Json<GatePolicy>, ApiError> {
    Ok(Json(handler.get_policy().await?))
}

async fn update_policy_handler<H: GovHandler>(
    State(handler): State<Arc<H>>,
    Json(params): Json<PolicyUpdateParams>,
) -> Result<Json<GatePolicy>, ApiError> {
    Ok(Json(handler.update_policy(params).await?))
}

async fn health_check_handler<H: GovHandler>(
    State(handler): State<Arc<H>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    handler.health_check().await?;
    Ok(Json(serde_json::json!({ "status": "ok" })))
}
