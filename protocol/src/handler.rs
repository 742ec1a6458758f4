//! The `GovHandler` implementation: wires the repository traits and the
//! pure decision functions in `gov_core` into the operation contract
//! the HTTP surface dispatches to.
//!
//! Every mutating operation follows the same shape the gate chain's doc
//! comment prescribes: fetch the context a pure function needs, call
//! the pure function, persist whatever it returns. No gate, scoring, or
//! pipeline decision is made inline here; this file is orchestration,
//! not policy.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use gov_core::audit::{build_audit_entries, debounce_alerts, prune_debounce_records, DebounceRecord};
use gov_core::error::Result;
use gov_core::event_bus::{EventBus, EventSubscription, GovEvent};
use gov_core::gate_chain::{evaluate_transition, GateContext, GatePolicy, MutationAlert};
use gov_core::metadata::TaskMetadata;
use gov_core::models::*;
use gov_core::pipeline::{
    derive_cluster_key, evaluate_bridge, find_orphans, ingest_reflection, select_bridge_assignee,
    BridgeAssignee, BridgeDecision, IngestOutcome, PipelinePolicy, ReconcileAction,
};
use gov_core::pr_integrity::{looks_like_pr_url, PrIntegrityClient, PrState};
use gov_core::protocol::*;
use gov_core::quiet_hours::QuietHoursPolicy;
use gov_core::repository::*;
use gov_core::routing::{score_for_assignment, AgentCandidate, RoutableTask};
use gov_core::validation::TaskValidator;
use gov_core::watchdog::{
    board_health_tick, cadence_tick, execution_sweep_tick, idle_nudge_tick, mention_rescue_tick,
    quiet_gate, AgentActivity, BoardHealthAction, BoardTaskSnapshot, DoingTaskSnapshot,
    IdleNudgeAction, IdleNudgePolicy, PendingMention, TickOpts, ValidatingSnapshot,
};
use gov_core::webhook::{replay_event, BackoffPolicy};

/// Blanket requirement covering every storage trait a `GovHandlerImpl`
/// needs. `database::SqliteGovRepository` implements all fifteen on one
/// struct/pool, the same pattern the teacher used for its two-trait
/// `McpTaskHandler<R, M, W>`, generalized to the full storage surface.
pub trait GovRepository:
    TaskRepository
    + ReflectionRepository
    + InsightRepository
    + TriageRepository
    + WebhookRepository
    + AuditRepository
    + PauseRepository
    + PresenceRepository
    + SubscriptionRepository
    + ChatRepository
    + EscalationRepository
    + SchedulingRepository
    + NoiseBudgetRepository
    + ContinuityRepository
    + RoutingRepository
    + Send
    + Sync
{
}

impl<T> GovRepository for T where
    T: TaskRepository
        + ReflectionRepository
        + InsightRepository
        + TriageRepository
        + WebhookRepository
        + AuditRepository
        + PauseRepository
        + PresenceRepository
        + SubscriptionRepository
        + ChatRepository
        + EscalationRepository
        + SchedulingRepository
        + NoiseBudgetRepository
        + ContinuityRepository
        + RoutingRepository
        + Send
        + Sync
{
}

/// Concrete `GovHandler`. Generic over the repository (so tests can
/// plug an in-memory double while production wires
/// `database::SqliteGovRepository`) and the PR-integrity collaborator.
pub struct GovHandlerImpl<Repo, Pr> {
    repo: Arc<Repo>,
    pr_client: Arc<Pr>,
    policy: RwLock<GatePolicy>,
    /// Mutation-alert debounce state. Not a repository trait; per
    /// `gov_core::audit`'s doc comment this is scheduler-local,
    /// in-memory bookkeeping, same shape as the event bus below.
    alert_debounce: Mutex<Vec<DebounceRecord>>,
    events: EventBus,
}

impl<Repo, Pr> GovHandlerImpl<Repo, Pr>
where
    Repo: GovRepository + 'static,
    Pr: PrIntegrityClient + 'static,
{
    pub fn new(repo: Arc<Repo>, pr_client: Arc<Pr>, policy: GatePolicy) -> Self {
        Self {
            repo,
            pr_client,
            policy: RwLock::new(policy),
            alert_debounce: Mutex::new(Vec::new()),
            events: EventBus::new(1024),
        }
    }

    pub fn subscribe_events(&self) -> EventSubscription {
        self.events.subscribe()
    }

    /// Run a patch through the gate chain and persist the outcome:
    /// resolve the context a gate needs (WIP counts, reflection debt,
    /// PR snapshot, follow-on resolution), call
    /// `gate_chain::evaluate_transition`, then write back the task,
    /// audit entries, mutation alerts, and lifecycle events it returns.
    async fn apply_patch(&self, task: Task, patch: TaskPatch, context: &str) -> Result<Task> {
        let now = Utc::now();
        let assignee = patch.assignee.as_deref().or(task.assignee.as_deref());

        let assignee_doing_count = match assignee {
            Some(a) => TaskRepository::count_doing_for_assignee(self.repo.as_ref(), a).await?,
            None => 0,
        };
        let assignee_has_other_doing = assignee_doing_count > 0;

        let policy = self.policy.read().await.clone();
        let reflection_debt_owed = match assignee {
            Some(a) => {
                ReflectionRepository::debt_owed(
                    self.repo.as_ref(),
                    a,
                    policy.reflection_debt_task_threshold,
                    policy.reflection_debt_hours,
                    now,
                )
                .await?
            }
            None => false,
        };

        let patch_meta = TaskMetadata::parse(&patch.metadata);
        let pr_url = patch_meta
            .review_packet
            .as_ref()
            .map(|p| p.pr_url.clone())
            .or_else(|| patch_meta.close_gate.pr_url.clone());
        let pr_snapshot = match &pr_url {
            Some(url) if looks_like_pr_url(url) => Some(self.pr_client.fetch(url).await),
            _ => None,
        };
        let follow_on_resolves = match patch_meta.close_gate.follow_on_task_id {
            Some(id) => Some(TaskRepository::get_by_id(self.repo.as_ref(), id).await.is_ok()),
            None => None,
        };

        let ctx = GateContext {
            now,
            assignee_doing_count,
            assignee_has_other_doing,
            reflection_debt_owed,
            pr_snapshot,
            follow_on_resolves,
        };

        let outcome = match evaluate_transition(&task, &patch, &ctx, &policy) {
            Ok(outcome) => outcome,
            Err(err) => {
                if err.gate() == Some("reviewer_identity") {
                    let actor = patch.actor.clone().unwrap_or_default();
                    self.record_alerts(
                        &[MutationAlert::UnauthorizedApproval { task_id: task.id, actor }],
                        now,
                    )
                    .await;
                }
                return Err(err);
            }
        };

        let updated = TaskRepository::update(self.repo.as_ref(), &outcome.task).await?;

        let actor = patch.actor.as_deref().unwrap_or("system");
        if !outcome.audit.is_empty() {
            for entry in build_audit_entries(task.id, actor, context, &outcome.audit, now) {
                AuditRepository::append(self.repo.as_ref(), &entry).await?;
            }
        }
        if !outcome.alerts.is_empty() {
            self.record_alerts(&outcome.alerts, now).await;
        }
        for event in outcome.events {
            self.events.publish(event.into());
        }

        Ok(updated)
    }

    /// Deliver the mutation alerts that survive debouncing; the rest
    /// are swallowed per `audit::debounce_alerts`'s contract. Routing
    /// an alert onward to a chat channel is the noise-budget
    /// subsystem's job (wired in the `server` crate's scheduler), not
    /// this handler's.
    async fn record_alerts(&self, alerts: &[MutationAlert], now: DateTime<Utc>) {
        let mut guard = self.alert_debounce.lock().await;
        let (to_send, fresh_records) = debounce_alerts(alerts, &guard, now);
        for record in &fresh_records {
            guard.retain(|r| r.key != record.key);
        }
        guard.extend(fresh_records);
        let pruned = prune_debounce_records(std::mem::take(&mut guard), now);
        *guard = pruned;
        drop(guard);

        for alert in to_send {
            tracing::warn!(?alert, "mutation alert");
        }
    }

    async fn live_task_ids(&self) -> Result<Vec<i64>> {
        let tasks = TaskRepository::list(self.repo.as_ref(), &TaskFilter::default()).await?;
        Ok(tasks.into_iter().map(|t| t.id).collect())
    }

    /// Candidate pool for the auto-task bridge / triage-approve
    /// assignment. There is no dedicated "list known agents" repository
    /// method, so this uses presence rows as the best available proxy
    /// for "agents the system has seen" (documented simplification, see
    /// DESIGN.md).
    async fn bridge_candidates(&self) -> Result<Vec<String>> {
        let far_past = Utc::now() - chrono::Duration::days(365);
        let rows = PresenceRepository::list_idle_since(self.repo.as_ref(), far_past).await?;
        Ok(rows.into_iter().map(|r| r.agent_name).collect())
    }

    fn assignee_and_reviewer(&self, insight: &Insight, assignee: &BridgeAssignee) -> (Option<String>, String) {
        match assignee {
            BridgeAssignee::NonAuthor(name) => (
                Some(name.clone()),
                insight.authors.first().cloned().unwrap_or_else(|| "unassigned".into()),
            ),
            BridgeAssignee::AuthorWithReviewer { assignee, reviewer } => {
                (Some(assignee.clone()), reviewer.clone())
            }
            BridgeAssignee::Unassigned => (
                None,
                insight.authors.first().cloned().unwrap_or_else(|| "unassigned".into()),
            ),
        }
    }

    async fn promote_insight_to_task(
        &self,
        mut insight: Insight,
        assignee: BridgeAssignee,
        priority: Priority,
        created_by: &str,
        tag: &str,
        now: DateTime<Utc>,
    ) -> Result<(Insight, i64)> {
        let (assignee_name, reviewer_name) = self.assignee_and_reviewer(&insight, &assignee);
        let new_task = NewTask {
            title: insight.title.clone(),
            description: format!(
                "Bridged from insight cluster '{}' ({} reflection(s)).",
                insight.cluster_key,
                insight.reflection_ids.len()
            ),
            task_type: TaskType::Bug,
            priority,
            reviewer: reviewer_name,
            assignee: assignee_name,
            done_criteria: vec!["root cause addressed and verified".into()],
            created_by: created_by.to_string(),
            blocked_by: vec![],
            tags: vec![tag.to_string()],
            team_id: None,
            metadata: serde_json::json!({ "source_insight": insight.id }),
        };
        TaskValidator::validate_new_task(&new_task)?;
        let task = TaskRepository::create(self.repo.as_ref(), &new_task).await?;

        insight.status = InsightStatus::TaskCreated;
        insight.task_id = Some(task.id);
        insight.updated_at = now;
        let updated = InsightRepository::update(self.repo.as_ref(), &insight).await?;
        self.events
            .publish(GovEvent::InsightPromoted { insight_id: updated.id, task_id: task.id });
        Ok((updated, task.id))
    }
}

fn resolve_now(params: &WatchdogTickParams) -> DateTime<Utc> {
    params
        .now_ms
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or_else(Utc::now)
}

#[async_trait]
impl<Repo, Pr> GovHandler for GovHandlerImpl<Repo, Pr>
where
    Repo: GovRepository + 'static,
    Pr: PrIntegrityClient + 'static,
{
    async fn create_task(&self, params: CreateTaskParams) -> Result<Task> {
        let new_task = NewTask {
            title: params.title,
            description: params.description,
            task_type: params.task_type,
            priority: params.priority,
            reviewer: params.reviewer,
            assignee: params.assignee,
            done_criteria: params.done_criteria,
            created_by: params.created_by,
            blocked_by: params.blocked_by,
            tags: params.tags,
            team_id: params.team_id,
            metadata: params.metadata,
        };
        TaskValidator::validate_new_task(&new_task)?;
        let task = TaskRepository::create(self.repo.as_ref(), &new_task).await?;
        self.events.publish(GovEvent::TaskCreated { task_id: task.id });
        Ok(task)
    }

    async fn patch_task(&self, id_or_prefix: &str, params: PatchTaskParams) -> Result<Task> {
        let task = TaskRepository::resolve_prefix(self.repo.as_ref(), id_or_prefix).await?;
        let patch = TaskPatch {
            title: params.title,
            description: params.description,
            status: params.status,
            priority: params.priority,
            assignee: params.assignee,
            reviewer: params.reviewer,
            done_criteria: params.done_criteria,
            blocked_by: params.blocked_by,
            tags: params.tags,
            metadata: params.metadata,
            actor: params.actor,
        };
        self.apply_patch(task, patch, "gate_chain").await
    }

    async fn get_task(&self, id_or_prefix: &str) -> Result<Task> {
        TaskRepository::resolve_prefix(self.repo.as_ref(), id_or_prefix).await
    }

    async fn list_tasks(&self, params: ListTasksParams) -> Result<Vec<Task>> {
        TaskRepository::list(self.repo.as_ref(), &params.filter).await
    }

    async fn next_task(&self, agent_name: &str) -> Result<NextTaskResponse> {
        let filter = TaskFilter { status: Some(TaskStatus::Todo), ..Default::default() };
        let candidates = TaskRepository::list(self.repo.as_ref(), &filter).await?;
        let unassigned: Vec<Task> = candidates.into_iter().filter(|t| t.assignee.is_none()).collect();
        if unassigned.is_empty() {
            return Ok(NextTaskResponse { task: None, score: None });
        }

        let wip = TaskRepository::count_doing_for_assignee(self.repo.as_ref(), agent_name).await?;
        let agent = [AgentCandidate {
            agent_name: agent_name.to_string(),
            affinity_tags: vec![],
            current_wip: wip,
            validating_load: 0,
            protected_domains: vec![],
        }];

        let mut best: Option<(Task, f64)> = None;
        for task in unassigned {
            let routable = RoutableTask {
                title: task.title.clone(),
                tags: task.tags.clone(),
                done_criteria: task.done_criteria.clone(),
            };
            let score = score_for_assignment(&routable, &agent).first().map(|s| s.score).unwrap_or(f64::MIN);
            if best.as_ref().map_or(true, |(_, best_score)| score > *best_score) {
                best = Some((task, score));
            }
        }

        Ok(best
            .map(|(task, score)| NextTaskResponse { task: Some(task), score: Some(score) })
            .unwrap_or(NextTaskResponse { task: None, score: None }))
    }

    async fn claim_task(&self, id_or_prefix: &str, params: ClaimTaskParams) -> Result<Task> {
        let task = TaskRepository::resolve_prefix(self.repo.as_ref(), id_or_prefix).await?;
        let patch = TaskPatch {
            status: Some(TaskStatus::Doing),
            assignee: Some(params.agent_name.clone()),
            actor: Some(params.agent_name),
            ..Default::default()
        };
        self.apply_patch(task, patch, "claim").await
    }

    async fn review_task(&self, id_or_prefix: &str, params: ReviewDecisionParams) -> Result<Task> {
        let task = TaskRepository::resolve_prefix(self.repo.as_ref(), id_or_prefix).await?;

        let mut metadata = serde_json::Map::new();
        let mut status = None;
        match params.decision {
            ReviewDecision::Approve => {
                metadata.insert("reviewer_approved".into(), serde_json::Value::Bool(true));
                metadata.insert(
                    "review_state".into(),
                    serde_json::to_value(gov_core::metadata::ReviewState::Approved).unwrap_or_default(),
                );
            }
            ReviewDecision::RequestChanges => {
                metadata.insert("reviewer_approved".into(), serde_json::Value::Bool(false));
                metadata.insert(
                    "review_state".into(),
                    serde_json::to_value(gov_core::metadata::ReviewState::NeedsAuthor).unwrap_or_default(),
                );
                status = Some(TaskStatus::Doing);
            }
        }
        if let Some(notes) = &params.notes {
            metadata.insert("reviewer_notes".into(), serde_json::Value::String(notes.clone()));
        }

        let patch = TaskPatch {
            status,
            actor: Some(params.actor),
            metadata: serde_json::Value::Object(metadata),
            ..Default::default()
        };
        self.apply_patch(task, patch, "review").await
    }

    async fn submit_reflection(&self, params: SubmitReflectionParams) -> Result<ReflectionIngestResponse> {
        let now = Utc::now();
        let reflection = Reflection {
            id: 0,
            pain: params.pain,
            impact: params.impact,
            evidence: params.evidence,
            went_well: params.went_well,
            suspected_why: params.suspected_why,
            proposed_fix: params.proposed_fix,
            confidence: params.confidence,
            role_type: params.role_type,
            severity: params.severity,
            author: params.author,
            tags: params.tags,
            task_id: params.task_id,
            team_id: params.team_id,
            created_at: now,
        };

        let cluster_key = derive_cluster_key(&reflection);
        let existing = InsightRepository::get_by_cluster_key(self.repo.as_ref(), &cluster_key).await?;
        let persisted_reflection = ReflectionRepository::create(self.repo.as_ref(), &reflection).await?;

        let (mut insight, is_new) = match ingest_reflection(&persisted_reflection, existing.as_ref(), 0, now) {
            IngestOutcome::Created(i) => (i, true),
            IngestOutcome::Updated(i) => (i, false),
        };
        insight = if is_new {
            let created = InsightRepository::create(self.repo.as_ref(), &insight).await?;
            self.events.publish(GovEvent::InsightCreated { insight_id: created.id });
            created
        } else {
            let updated = InsightRepository::update(self.repo.as_ref(), &insight).await?;
            self.events.publish(GovEvent::InsightUpdated { insight_id: updated.id });
            updated
        };

        let cooldown_active = existing
            .as_ref()
            .is_some_and(|old| now - old.updated_at < PipelinePolicy::default().cooldown);
        let candidates = self.bridge_candidates().await?;
        let decision = evaluate_bridge(&insight, &candidates, cooldown_active, &PipelinePolicy::default());

        let bridged_task_id;
        match decision {
            BridgeDecision::AlreadyLinked { task_id } => {
                bridged_task_id = Some(task_id);
            }
            BridgeDecision::SilentUpdate => {
                bridged_task_id = insight.task_id;
            }
            BridgeDecision::PendingTriage => {
                insight.status = InsightStatus::PendingTriage;
                insight = InsightRepository::update(self.repo.as_ref(), &insight).await?;
                bridged_task_id = None;
            }
            BridgeDecision::CreateTask { assignee, priority } => {
                let (updated_insight, task_id) = self
                    .promote_insight_to_task(insight, assignee, priority, "reflection-pipeline", "auto-bridged", now)
                    .await?;
                insight = updated_insight;
                bridged_task_id = Some(task_id);
            }
        }

        Ok(ReflectionIngestResponse { reflection: persisted_reflection, insight, bridged_task_id })
    }

    async fn list_insight_orphans(&self) -> Result<Vec<Insight>> {
        let live_ids = self.live_task_ids().await?;
        InsightRepository::list_orphans(self.repo.as_ref(), &live_ids).await
    }

    async fn reconcile_insights(&self, params: ReconcileParams) -> Result<ReconcilePlan> {
        let live_ids = self.live_task_ids().await?;
        let live_set: std::collections::BTreeSet<i64> = live_ids.into_iter().collect();
        let all_insights = InsightRepository::list(self.repo.as_ref(), None).await?;
        let orphans = find_orphans(all_insights.iter(), &live_set);

        let mut recreated = Vec::new();
        let mut recorded = 0usize;
        for finding in &orphans {
            match finding.recommended_action {
                ReconcileAction::RecordAnomaly => recorded += 1,
                ReconcileAction::RecreateTask => {
                    if params.dry_run {
                        continue;
                    }
                    let Ok(insight) = InsightRepository::get_by_id(self.repo.as_ref(), finding.insight_id).await
                    else {
                        continue;
                    };
                    let (_, task_id) = self
                        .promote_insight_to_task(
                            insight,
                            BridgeAssignee::Unassigned,
                            Priority::P2,
                            "reconciliation-sweep",
                            "reconciled",
                            Utc::now(),
                        )
                        .await?;
                    recreated.push(task_id);
                }
            }
        }

        Ok(ReconcilePlan {
            orphans_found: orphans.len(),
            recreated_task_ids: recreated,
            recorded_anomalies: recorded,
            dry_run: params.dry_run,
        })
    }

    async fn triage_insight(&self, insight_id: i64, params: TriageParams) -> Result<Insight> {
        let insight = InsightRepository::get_by_id(self.repo.as_ref(), insight_id).await?;
        let now = Utc::now();

        let decision = TriageDecision {
            id: 0,
            insight_id,
            decision: params.decision,
            decided_by: params.decided_by.clone(),
            reason: params.reason.clone(),
            decided_at: now,
        };
        TriageRepository::record(self.repo.as_ref(), &decision).await?;

        match params.decision {
            TriageOutcome::Dismiss => {
                let mut insight = insight;
                insight.status = InsightStatus::Closed;
                insight.updated_at = now;
                InsightRepository::update(self.repo.as_ref(), &insight).await
            }
            TriageOutcome::Approve => {
                let candidates = self.bridge_candidates().await?;
                let assignee = select_bridge_assignee(&insight.authors, &candidates);
                let priority = insight.priority;
                let (updated, _task_id) = self
                    .promote_insight_to_task(insight, assignee, priority, "triage", "triaged", now)
                    .await?;
                Ok(updated)
            }
        }
    }

    async fn tick_idle_nudge(&self, params: WatchdogTickParams) -> Result<serde_json::Value> {
        let now = resolve_now(&params);
        let opts: TickOpts = (&params).into();
        let gate = quiet_gate(now, opts, &QuietHoursPolicy::default());

        let presence = PresenceRepository::list_idle_since(self.repo.as_ref(), now - chrono::Duration::hours(24)).await?;
        let activities: Vec<AgentActivity> = presence
            .into_iter()
            .map(|p| AgentActivity {
                agent_name: p.agent_name,
                last_activity_at: p.last_activity_at,
                last_nudge_at: None,
                last_escalation_at: None,
                in_post_ship_grace: false,
            })
            .collect();
        let rows = idle_nudge_tick(now, &activities, &IdleNudgePolicy::default());

        if !opts.dry_run && !gate.suppressed {
            for row in rows.iter().filter(|r| r.action == IdleNudgeAction::Escalate) {
                let escalation = Escalation {
                    id: 0,
                    agent_name: row.agent_name.clone(),
                    reason: format!("idle for {} minutes", row.idle_minutes),
                    channel: "watchdog".into(),
                    created_at: now,
                    acknowledged_at: None,
                };
                EscalationRepository::create(self.repo.as_ref(), &escalation).await?;
            }
        }

        Ok(serde_json::json!({
            "quiet_suppressed": gate.suppressed,
            "rows": rows.iter().map(|r| serde_json::json!({
                "agent_name": r.agent_name,
                "idle_minutes": r.idle_minutes,
                "action": format!("{:?}", r.action),
            })).collect::<Vec<_>>(),
        }))
    }

    async fn tick_cadence_watchdog(&self, params: WatchdogTickParams) -> Result<serde_json::Value> {
        let now = resolve_now(&params);
        let opts: TickOpts = (&params).into();
        let gate = quiet_gate(now, opts, &QuietHoursPolicy::default());

        let doing = TaskRepository::list(
            self.repo.as_ref(),
            &TaskFilter { status: Some(TaskStatus::Doing), ..Default::default() },
        )
        .await?;
        let snapshots: Vec<DoingTaskSnapshot> = doing
            .iter()
            .map(|t| DoingTaskSnapshot { task_id: t.id, entered_doing_at: t.updated_at })
            .collect();
        let decision = cadence_tick(now, &snapshots, 120, &[]);

        if !opts.dry_run && !gate.suppressed {
            for task_id in &decision.stale_task_ids {
                let escalation = Escalation {
                    id: 0,
                    agent_name: "unassigned".into(),
                    reason: format!("task {task_id} stale in doing past the cadence threshold"),
                    channel: "watchdog".into(),
                    created_at: now,
                    acknowledged_at: None,
                };
                EscalationRepository::create(self.repo.as_ref(), &escalation).await?;
            }
        }

        Ok(serde_json::json!({
            "quiet_suppressed": gate.suppressed,
            "stale_task_ids": decision.stale_task_ids,
            "trio_silent_agents": decision.trio_silent_agents,
        }))
    }

    async fn tick_mention_rescue(&self, params: WatchdogTickParams) -> Result<serde_json::Value> {
        let now = resolve_now(&params);
        let opts: TickOpts = (&params).into();
        let gate = quiet_gate(now, opts, &QuietHoursPolicy::default());

        let since = now - chrono::Duration::hours(2);
        let known_agents =
            PresenceRepository::list_idle_since(self.repo.as_ref(), now - chrono::Duration::days(365)).await?;
        let mut mentions = Vec::new();
        for agent in &known_agents {
            let pending = ChatRepository::list_pending_mentions(self.repo.as_ref(), &agent.agent_name, since).await?;
            for msg in pending {
                mentions.push(PendingMention {
                    agent_name: agent.agent_name.clone(),
                    mentioned_at: msg.created_at,
                    responded: false,
                    last_rescue_at: None,
                });
            }
        }
        let rescued = mention_rescue_tick(now, &mentions, 3, 10);

        if !opts.dry_run && !gate.suppressed {
            for agent_name in &rescued {
                let escalation = Escalation {
                    id: 0,
                    agent_name: agent_name.clone(),
                    reason: "unanswered mention rescued".into(),
                    channel: "watchdog".into(),
                    created_at: now,
                    acknowledged_at: None,
                };
                EscalationRepository::create(self.repo.as_ref(), &escalation).await?;
            }
        }

        Ok(serde_json::json!({ "quiet_suppressed": gate.suppressed, "rescued_agents": rescued }))
    }

    async fn tick_board_health(&self, params: WatchdogTickParams) -> Result<serde_json::Value> {
        let now = resolve_now(&params);
        let opts: TickOpts = (&params).into();
        let gate = quiet_gate(now, opts, &QuietHoursPolicy::default());

        let doing = TaskRepository::list(
            self.repo.as_ref(),
            &TaskFilter { status: Some(TaskStatus::Doing), ..Default::default() },
        )
        .await?;
        let done = TaskRepository::list(
            self.repo.as_ref(),
            &TaskFilter { status: Some(TaskStatus::Done), ..Default::default() },
        )
        .await?;
        let snapshots: Vec<BoardTaskSnapshot> = doing
            .iter()
            .chain(done.iter())
            .map(|t| BoardTaskSnapshot { task_id: t.id, status: t.status, entered_status_at: t.updated_at })
            .collect();
        let (actions, dropped) = board_health_tick(now, &snapshots, 480, 1440, 5);

        if !opts.dry_run && !gate.suppressed {
            for action in &actions {
                match action {
                    BoardHealthAction::AutoBlock { task_id, explanation } => {
                        if let Ok(task) = TaskRepository::get_by_id(self.repo.as_ref(), *task_id).await {
                            let patch = TaskPatch {
                                status: Some(TaskStatus::Blocked),
                                actor: Some("board-health-watchdog".into()),
                                metadata: serde_json::json!({ "auto_block_reason": explanation }),
                                ..Default::default()
                            };
                            let _ = self.apply_patch(task, patch, "board_health").await;
                        }
                    }
                    BoardHealthAction::SuggestClose { task_id } => {
                        let escalation = Escalation {
                            id: 0,
                            agent_name: "unassigned".into(),
                            reason: format!("task {task_id} has been done and stale, suggest archival"),
                            channel: "watchdog".into(),
                            created_at: now,
                            acknowledged_at: None,
                        };
                        EscalationRepository::create(self.repo.as_ref(), &escalation).await?;
                    }
                }
            }
        }

        Ok(serde_json::json!({
            "quiet_suppressed": gate.suppressed,
            "actions_taken": actions.len(),
            "actions_dropped": dropped,
        }))
    }

    async fn tick_execution_sweeper(&self, params: WatchdogTickParams) -> Result<serde_json::Value> {
        let now = resolve_now(&params);
        let opts: TickOpts = (&params).into();
        let gate = quiet_gate(now, opts, &QuietHoursPolicy::default());

        let validating = TaskRepository::list(
            self.repo.as_ref(),
            &TaskFilter { status: Some(TaskStatus::Validating), ..Default::default() },
        )
        .await?;
        let mut snapshots = Vec::with_capacity(validating.len());
        for task in &validating {
            let meta = TaskMetadata::parse(&task.metadata);
            let (pr_drifted, pr_closed_unmerged) = match &meta.review_packet {
                Some(packet) => {
                    let snapshot = self.pr_client.fetch(&packet.pr_url).await;
                    let drifted = match &snapshot.state {
                        PrState::Open { head_sha } | PrState::Merged { head_sha, .. } => head_sha != &packet.commit,
                        _ => false,
                    };
                    (drifted, matches!(snapshot.state, PrState::ClosedUnmerged))
                }
                None => (false, false),
            };
            snapshots.push(ValidatingSnapshot {
                task_id: task.id,
                has_review_packet: meta.review_packet.is_some() || meta.review_handoff.is_some(),
                pr_drifted,
                pr_closed_unmerged,
            });
        }
        let reports = execution_sweep_tick(&snapshots);

        if !opts.dry_run && !gate.suppressed {
            for report in &reports {
                let escalation = Escalation {
                    id: 0,
                    agent_name: "unassigned".into(),
                    reason: format!("task {} drift: {}", report.task_id, report.reasons.join(", ")),
                    channel: "watchdog".into(),
                    created_at: now,
                    acknowledged_at: None,
                };
                EscalationRepository::create(self.repo.as_ref(), &escalation).await?;
            }
        }

        Ok(serde_json::json!({
            "quiet_suppressed": gate.suppressed,
            "drift_reports": reports.iter().map(|r| serde_json::json!({
                "task_id": r.task_id,
                "reasons": r.reasons,
            })).collect::<Vec<_>>(),
        }))
    }

    async fn deliver_webhook(&self, params: DeliverWebhookParams) -> Result<WebhookEvent> {
        let event = WebhookEvent {
            id: 0,
            idempotency_key: params.idempotency_key,
            provider: params.provider,
            event_type: params.event_type,
            payload: params.payload,
            target_url: params.target_url,
            status: WebhookStatus::Pending,
            attempts: 0,
            max_attempts: BackoffPolicy::default().max_attempts,
            next_retry_at: None,
            last_attempt_at: None,
            last_error: None,
            last_status_code: None,
            delivered_at: None,
            created_at: Utc::now(),
            expires_at: None,
            metadata: serde_json::json!({}),
        };
        // Only enqueues (idempotently, per `WebhookRepository::enqueue`).
        // The HTTP POST itself is the server crate scheduler's job,
        // driven off `list_retryable`, matching `webhook.rs`'s own doc
        // comment about where the network call belongs.
        WebhookRepository::enqueue(self.repo.as_ref(), &event).await
    }

    async fn replay_webhook(&self, id: i64) -> Result<WebhookEvent> {
        let original = WebhookRepository::get_by_id(self.repo.as_ref(), id).await?;
        let now = Utc::now();
        let replay_key = format!("{}-replay-{}", original.idempotency_key, now.timestamp_millis());
        let replayed = replay_event(&original, 0, replay_key, now);
        WebhookRepository::enqueue(self.repo.as_ref(), &replayed).await
    }

    async fn webhook_stats(&self) -> Result<WebhookStats> {
        let now = Utc::now();
        let retryable = WebhookRepository::list_retryable(self.repo.as_ref(), now, u32::MAX).await?;
        let pending = retryable.iter().filter(|e| e.status == WebhookStatus::Pending).count() as u64;
        let retrying = retryable.iter().filter(|e| e.status == WebhookStatus::Retrying).count() as u64;
        let dead_letter = WebhookRepository::list_dead_letters(self.repo.as_ref()).await?.len() as u64;
        // `delivering`/`delivered` aren't observable through the
        // retry-queue-shaped repository surface (only pending/retrying
        // events and dead letters are listable); left at zero rather
        // than guessed.
        Ok(WebhookStats { pending, delivering: 0, delivered: 0, retrying, dead_letter })
    }

    async fn list_audit_for_task(&self, task_id: i64) -> Result<Vec<AuditEntry>> {
        AuditRepository::list_for_task(self.repo.as_ref(), task_id).await
    }

    async fn get_policy(&self) -> Result<GatePolicy> {
        Ok(self.policy.read().await.clone())
    }

    async fn update_policy(&self, params: PolicyUpdateParams) -> Result<GatePolicy> {
        if let Some(new_policy) = params.gate_policy {
            *self.policy.write().await = new_policy;
        }
        Ok(self.policy.read().await.clone())
    }

    async fn health_check(&self) -> Result<()> {
        TaskRepository::health_check(self.repo.as_ref()).await
    }
}
