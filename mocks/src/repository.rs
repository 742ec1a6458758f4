//! In-memory implementation of every `gov_core::repository` trait.
//!
//! Same intent as the teacher's `MockTaskRepository`: thread-safe,
//! error-injectable, call-tracked, good enough to drive the gate chain
//! and pipeline end to end without a real database. Generalized from
//! one trait to the full fifteen-trait `protocol::GovRepository`
//! surface, which collapses the teacher's per-field `Arc<Mutex<_>>`
//! bookkeeping into one `Mutex<State>` guarding every collection — one
//! lock per call is simpler to reason about than fifteen, and nothing
//! here is on a hot path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gov_core::error::{GovError, Result};
use gov_core::models::*;
use gov_core::repository::*;
use parking_lot::Mutex;

#[derive(Default)]
struct State {
    tasks: HashMap<i64, Task>,
    reflections: HashMap<i64, Reflection>,
    insights: HashMap<i64, Insight>,
    triage_decisions: HashMap<i64, TriageDecision>,
    webhooks: HashMap<i64, WebhookEvent>,
    audit_entries: Vec<AuditEntry>,
    pauses: HashMap<String, PauseEntry>,
    presence: HashMap<String, PresenceRow>,
    subscriptions: HashMap<i64, InboxSubscription>,
    chat_messages: Vec<ChatMessage>,
    escalations: HashMap<i64, Escalation>,
    recurring_defs: HashMap<i64, RecurringTaskDef>,
    calendar_blocks: HashMap<i64, CalendarBlock>,
    calendar_events: HashMap<i64, CalendarEvent>,
    noise_budgets: HashMap<String, NoiseBudgetSnapshot>,
    suppressions: Vec<SuppressionLedgerEntry>,
    continuity_actions: Vec<ContinuityAction>,
    routing_overrides: HashMap<i64, RoutingOverride>,
}

/// Error to return from the next call on a given method name, if any.
type ErrorInjection = Mutex<HashMap<String, GovError>>;

/// In-memory stand-in for `database::SqliteGovRepository`, implementing
/// every storage trait `protocol::GovRepository` requires.
pub struct MockGovRepository {
    state: Mutex<State>,
    ids: Ids,
    error_injection: ErrorInjection,
    call_history: Mutex<Vec<String>>,
}

struct Ids {
    task: AtomicI64,
    reflection: AtomicI64,
    insight: AtomicI64,
    triage: AtomicI64,
    webhook: AtomicI64,
    audit: AtomicI64,
    pause: AtomicI64,
    subscription: AtomicI64,
    chat: AtomicI64,
    escalation: AtomicI64,
    recurring: AtomicI64,
    calendar_block: AtomicI64,
    calendar_event: AtomicI64,
    suppression: AtomicI64,
    continuity: AtomicI64,
    routing: AtomicI64,
}

impl Default for Ids {
    fn default() -> Self {
        Self {
            task: AtomicI64::new(1),
            reflection: AtomicI64::new(1),
            insight: AtomicI64::new(1),
            triage: AtomicI64::new(1),
            webhook: AtomicI64::new(1),
            audit: AtomicI64::new(1),
            pause: AtomicI64::new(1),
            subscription: AtomicI64::new(1),
            chat: AtomicI64::new(1),
            escalation: AtomicI64::new(1),
            recurring: AtomicI64::new(1),
            calendar_block: AtomicI64::new(1),
            calendar_event: AtomicI64::new(1),
            suppression: AtomicI64::new(1),
            continuity: AtomicI64::new(1),
            routing: AtomicI64::new(1),
        }
    }
}

impl Default for MockGovRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGovRepository {
    pub fn new() -> Self {
        Self { state: Mutex::new(State::default()), ids: Ids::default(), error_injection: Mutex::new(HashMap::new()), call_history: Mutex::new(Vec::new()) }
    }

    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let repo = Self::new();
        let mut max_id = 0;
        let mut state = repo.state.lock();
        for task in tasks {
            max_id = max_id.max(task.id);
            state.tasks.insert(task.id, task);
        }
        drop(state);
        repo.ids.task.store(max_id + 1, Ordering::SeqCst);
        repo
    }

    /// Inject an error to return the next time `method` is called.
    pub fn inject_error(&self, method: &str, error: GovError) {
        self.error_injection.lock().insert(method.to_string(), error);
    }

    pub fn clear_errors(&self) {
        self.error_injection.lock().clear();
    }

    pub fn call_history(&self) -> Vec<String> {
        self.call_history.lock().clone()
    }

    pub fn clear_history(&self) {
        self.call_history.lock().clear();
    }

    pub fn assert_called(&self, method: &str) {
        let history = self.call_history.lock();
        assert!(history.iter().any(|c| c == method), "method '{method}' was not called; history: {history:?}");
    }

    fn record(&self, method: &str) {
        self.call_history.lock().push(method.to_string());
    }

    fn check_injection(&self, method: &str) -> Result<()> {
        if let Some(error) = self.error_injection.lock().remove(method) {
            return Err(error);
        }
        Ok(())
    }
}

fn generate_code(title: &str, id: i64) -> String {
    let prefix = title.split_whitespace().next().unwrap_or("TASK").to_uppercase();
    format!("{prefix}-{id}")
}

#[async_trait]
impl TaskRepository for MockGovRepository {
    async fn create(&self, task: &NewTask) -> Result<Task> {
        self.record("TaskRepository::create");
        self.check_injection("TaskRepository::create")?;

        let id = self.ids.task.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let created = Task {
            id,
            code: generate_code(&task.title, id),
            title: task.title.clone(),
            description: task.description.clone(),
            task_type: task.task_type,
            status: TaskStatus::Todo,
            priority: task.priority,
            assignee: task.assignee.clone(),
            reviewer: Some(task.reviewer.clone()),
            done_criteria: task.done_criteria.clone(),
            created_by: task.created_by.clone(),
            created_at: now,
            updated_at: now,
            blocked_by: task.blocked_by.clone(),
            tags: task.tags.clone(),
            team_id: task.team_id.clone(),
            metadata: task.metadata.clone(),
        };
        self.state.lock().tasks.insert(id, created.clone());
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> Result<Task> {
        self.record("TaskRepository::get_by_id");
        self.check_injection("TaskRepository::get_by_id")?;
        self.state.lock().tasks.get(&id).cloned().ok_or_else(|| GovError::not_found_code(&id.to_string()))
    }

    async fn get_by_code(&self, code: &str) -> Result<Task> {
        self.record("TaskRepository::get_by_code");
        self.check_injection("TaskRepository::get_by_code")?;
        self.state.lock().tasks.values().find(|t| t.code == code).cloned().ok_or_else(|| GovError::not_found_code(code))
    }

    async fn resolve_prefix(&self, prefix: &str) -> Result<Task> {
        self.record("TaskRepository::resolve_prefix");
        self.check_injection("TaskRepository::resolve_prefix")?;

        let state = self.state.lock();
        if let Some(exact) = state.tasks.values().find(|t| t.code == prefix) {
            return Ok(exact.clone());
        }
        let matches: Vec<&Task> = state.tasks.values().filter(|t| t.code.starts_with(prefix)).collect();
        match matches.as_slice() {
            [] => Err(GovError::not_found_code(prefix)),
            [single] => Ok((*single).clone()),
            many => Err(GovError::ambiguous_prefix(prefix, many.iter().map(|t| t.code.clone()).collect())),
        }
    }

    async fn update(&self, task: &Task) -> Result<Task> {
        self.record("TaskRepository::update");
        self.check_injection("TaskRepository::update")?;
        let mut state = self.state.lock();
        if !state.tasks.contains_key(&task.id) {
            return Err(GovError::not_found_code(&task.id.to_string()));
        }
        state.tasks.insert(task.id, task.clone());
        Ok(task.clone())
    }

    async fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        self.record("TaskRepository::list");
        self.check_injection("TaskRepository::list")?;

        let state = self.state.lock();
        let mut tasks: Vec<Task> = state
            .tasks
            .values()
            .filter(|t| filter.assignee.as_deref().map_or(true, |a| t.assignee.as_deref() == Some(a)))
            .filter(|t| filter.reviewer.as_deref().map_or(true, |r| t.reviewer.as_deref() == Some(r)))
            .filter(|t| filter.status.map_or(true, |s| t.status == s))
            .filter(|t| filter.task_type.map_or(true, |ty| t.task_type == ty))
            .filter(|t| filter.priority.map_or(true, |p| t.priority == p))
            .filter(|t| filter.team_id.as_deref().map_or(true, |team| t.team_id.as_deref() == Some(team)))
            .filter(|t| filter.tag.as_deref().map_or(true, |tag| t.tags.iter().any(|v| v == tag)))
            .filter(|t| filter.created_after.map_or(true, |since| t.created_at >= since))
            .filter(|t| filter.created_before.map_or(true, |before| t.created_at <= before))
            .cloned()
            .collect();

        tasks.sort_by_key(|t| t.id);
        let offset = filter.offset.unwrap_or(0) as usize;
        if offset >= tasks.len() {
            return Ok(Vec::new());
        }
        tasks = tasks.into_iter().skip(offset).collect();
        if let Some(limit) = filter.limit {
            tasks.truncate(limit as usize);
        }
        Ok(tasks)
    }

    async fn count_doing_for_assignee(&self, assignee: &str) -> Result<u32> {
        self.record("TaskRepository::count_doing_for_assignee");
        self.check_injection("TaskRepository::count_doing_for_assignee")?;
        let state = self.state.lock();
        Ok(state.tasks.values().filter(|t| t.status == TaskStatus::Doing && t.assignee.as_deref() == Some(assignee)).count() as u32)
    }

    async fn count_validating_for_reviewer(&self, reviewer: &str) -> Result<u32> {
        self.record("TaskRepository::count_validating_for_reviewer");
        self.check_injection("TaskRepository::count_validating_for_reviewer")?;
        let state = self.state.lock();
        Ok(state.tasks.values().filter(|t| t.status == TaskStatus::Validating && t.reviewer.as_deref() == Some(reviewer)).count() as u32)
    }

    async fn stats(&self) -> Result<RepositoryStats> {
        self.record("TaskRepository::stats");
        self.check_injection("TaskRepository::stats")?;

        let state = self.state.lock();
        let mut stats = RepositoryStats { total_tasks: state.tasks.len() as u64, ..Default::default() };
        for task in state.tasks.values() {
            *stats.tasks_by_status.entry(task.status).or_insert(0) += 1;
            if let Some(assignee) = &task.assignee {
                *stats.tasks_by_assignee.entry(assignee.clone()).or_insert(0) += 1;
            }
            stats.latest_created = Some(stats.latest_created.map_or(task.created_at, |t| t.max(task.created_at)));
            if task.status == TaskStatus::Done {
                stats.latest_done = Some(stats.latest_done.map_or(task.updated_at, |t| t.max(task.updated_at)));
            }
        }
        Ok(stats)
    }

    async fn health_check(&self) -> Result<()> {
        self.record("TaskRepository::health_check");
        self.check_injection("TaskRepository::health_check")
    }
}

#[async_trait]
impl ReflectionRepository for MockGovRepository {
    async fn create(&self, reflection: &Reflection) -> Result<Reflection> {
        self.record("ReflectionRepository::create");
        self.check_injection("ReflectionRepository::create")?;
        let id = self.ids.reflection.fetch_add(1, Ordering::SeqCst);
        let mut stored = reflection.clone();
        stored.id = id;
        self.state.lock().reflections.insert(id, stored.clone());
        Ok(stored)
    }

    async fn get_by_id(&self, id: i64) -> Result<Reflection> {
        self.record("ReflectionRepository::get_by_id");
        self.check_injection("ReflectionRepository::get_by_id")?;
        self.state.lock().reflections.get(&id).cloned().ok_or_else(|| GovError::not_found_code(&id.to_string()))
    }

    async fn list_by_cluster_candidates(&self, tags: &[String]) -> Result<Vec<Reflection>> {
        self.record("ReflectionRepository::list_by_cluster_candidates");
        self.check_injection("ReflectionRepository::list_by_cluster_candidates")?;
        let state = self.state.lock();
        Ok(state.reflections.values().filter(|r| r.tags.iter().any(|t| tags.contains(t))).cloned().collect())
    }

    async fn list_recent(&self, since: DateTime<Utc>) -> Result<Vec<Reflection>> {
        self.record("ReflectionRepository::list_recent");
        self.check_injection("ReflectionRepository::list_recent")?;
        let state = self.state.lock();
        Ok(state.reflections.values().filter(|r| r.created_at >= since).cloned().collect())
    }

    async fn debt_owed(&self, author: &str, task_threshold: u32, hours: i64, now: DateTime<Utc>) -> Result<bool> {
        self.record("ReflectionRepository::debt_owed");
        self.check_injection("ReflectionRepository::debt_owed")?;
        let state = self.state.lock();
        let since = now - chrono::Duration::hours(hours);
        let done_tasks = state.tasks.values().filter(|t| t.assignee.as_deref() == Some(author) && t.status == TaskStatus::Done && t.updated_at >= since).count() as u32;
        let reflections = state.reflections.values().filter(|r| r.author == author && r.created_at >= since).count() as u32;
        Ok(done_tasks >= task_threshold && reflections == 0)
    }
}

#[async_trait]
impl InsightRepository for MockGovRepository {
    async fn create(&self, insight: &Insight) -> Result<Insight> {
        self.record("InsightRepository::create");
        self.check_injection("InsightRepository::create")?;
        let id = self.ids.insight.fetch_add(1, Ordering::SeqCst);
        let mut stored = insight.clone();
        stored.id = id;
        self.state.lock().insights.insert(id, stored.clone());
        Ok(stored)
    }

    async fn get_by_id(&self, id: i64) -> Result<Insight> {
        self.record("InsightRepository::get_by_id");
        self.check_injection("InsightRepository::get_by_id")?;
        self.state.lock().insights.get(&id).cloned().ok_or_else(|| GovError::not_found_code(&id.to_string()))
    }

    async fn get_by_cluster_key(&self, cluster_key: &str) -> Result<Option<Insight>> {
        self.record("InsightRepository::get_by_cluster_key");
        self.check_injection("InsightRepository::get_by_cluster_key")?;
        Ok(self.state.lock().insights.values().find(|i| i.cluster_key == cluster_key).cloned())
    }

    async fn update(&self, insight: &Insight) -> Result<Insight> {
        self.record("InsightRepository::update");
        self.check_injection("InsightRepository::update")?;
        let mut state = self.state.lock();
        if !state.insights.contains_key(&insight.id) {
            return Err(GovError::not_found_code(&insight.id.to_string()));
        }
        state.insights.insert(insight.id, insight.clone());
        Ok(insight.clone())
    }

    async fn list(&self, status: Option<InsightStatus>) -> Result<Vec<Insight>> {
        self.record("InsightRepository::list");
        self.check_injection("InsightRepository::list")?;
        let state = self.state.lock();
        Ok(state.insights.values().filter(|i| status.map_or(true, |s| i.status == s)).cloned().collect())
    }

    async fn list_orphans(&self, live_task_ids: &[i64]) -> Result<Vec<Insight>> {
        self.record("InsightRepository::list_orphans");
        self.check_injection("InsightRepository::list_orphans")?;
        let state = self.state.lock();
        Ok(state
            .insights
            .values()
            .filter(|i| i.status == InsightStatus::TaskCreated)
            .filter(|i| i.task_id.map_or(false, |id| !live_task_ids.contains(&id)))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl TriageRepository for MockGovRepository {
    async fn record(&self, decision: &TriageDecision) -> Result<TriageDecision> {
        self.record("TriageRepository::record");
        self.check_injection("TriageRepository::record")?;
        let id = self.ids.triage.fetch_add(1, Ordering::SeqCst);
        let mut stored = decision.clone();
        stored.id = id;
        self.state.lock().triage_decisions.insert(id, stored.clone());
        Ok(stored)
    }

    async fn list_for_insight(&self, insight_id: i64) -> Result<Vec<TriageDecision>> {
        self.record("TriageRepository::list_for_insight");
        self.check_injection("TriageRepository::list_for_insight")?;
        let state = self.state.lock();
        Ok(state.triage_decisions.values().filter(|d| d.insight_id == insight_id).cloned().collect())
    }
}

#[async_trait]
impl WebhookRepository for MockGovRepository {
    async fn enqueue(&self, event: &WebhookEvent) -> Result<WebhookEvent> {
        self.record("WebhookRepository::enqueue");
        self.check_injection("WebhookRepository::enqueue")?;

        let mut state = self.state.lock();
        if let Some(existing) = state.webhooks.values().find(|w| w.idempotency_key == event.idempotency_key) {
            return Ok(existing.clone());
        }
        let id = self.ids.webhook.fetch_add(1, Ordering::SeqCst);
        let mut stored = event.clone();
        stored.id = id;
        state.webhooks.insert(id, stored.clone());
        Ok(stored)
    }

    async fn get_by_id(&self, id: i64) -> Result<WebhookEvent> {
        self.record("WebhookRepository::get_by_id");
        self.check_injection("WebhookRepository::get_by_id")?;
        self.state.lock().webhooks.get(&id).cloned().ok_or_else(|| GovError::not_found_code(&id.to_string()))
    }

    async fn get_by_idempotency_key(&self, key: &str) -> Result<Option<WebhookEvent>> {
        self.record("WebhookRepository::get_by_idempotency_key");
        self.check_injection("WebhookRepository::get_by_idempotency_key")?;
        Ok(self.state.lock().webhooks.values().find(|w| w.idempotency_key == key).cloned())
    }

    async fn update(&self, event: &WebhookEvent) -> Result<WebhookEvent> {
        self.record("WebhookRepository::update");
        self.check_injection("WebhookRepository::update")?;
        let mut state = self.state.lock();
        if !state.webhooks.contains_key(&event.id) {
            return Err(GovError::not_found_code(&event.id.to_string()));
        }
        state.webhooks.insert(event.id, event.clone());
        Ok(event.clone())
    }

    async fn list_retryable(&self, now: DateTime<Utc>, limit: u32) -> Result<Vec<WebhookEvent>> {
        self.record("WebhookRepository::list_retryable");
        self.check_injection("WebhookRepository::list_retryable")?;
        let state = self.state.lock();
        let mut due: Vec<WebhookEvent> = state
            .webhooks
            .values()
            .filter(|w| gov_core::webhook::is_retryable(w, now))
            .cloned()
            .collect();
        due.sort_by_key(|w| w.id);
        due.truncate(limit as usize);
        Ok(due)
    }

    async fn list_dead_letters(&self) -> Result<Vec<WebhookEvent>> {
        self.record("WebhookRepository::list_dead_letters");
        self.check_injection("WebhookRepository::list_dead_letters")?;
        let state = self.state.lock();
        Ok(state.webhooks.values().filter(|w| w.status == WebhookStatus::DeadLetter).cloned().collect())
    }

    async fn purge_expired_delivered(&self, now: DateTime<Utc>) -> Result<u64> {
        self.record("WebhookRepository::purge_expired_delivered");
        self.check_injection("WebhookRepository::purge_expired_delivered")?;
        let mut state = self.state.lock();
        let before = state.webhooks.len();
        state.webhooks.retain(|_, w| !(w.status == WebhookStatus::Delivered && w.expires_at.map_or(false, |exp| exp <= now)));
        Ok((before - state.webhooks.len()) as u64)
    }
}

#[async_trait]
impl AuditRepository for MockGovRepository {
    async fn append(&self, entry: &AuditEntry) -> Result<AuditEntry> {
        self.record("AuditRepository::append");
        self.check_injection("AuditRepository::append")?;
        let id = self.ids.audit.fetch_add(1, Ordering::SeqCst);
        let mut stored = entry.clone();
        stored.id = id;
        self.state.lock().audit_entries.push(stored.clone());
        Ok(stored)
    }

    async fn list_for_task(&self, task_id: i64) -> Result<Vec<AuditEntry>> {
        self.record("AuditRepository::list_for_task");
        self.check_injection("AuditRepository::list_for_task")?;
        let state = self.state.lock();
        Ok(state.audit_entries.iter().filter(|e| e.task_id == task_id).cloned().collect())
    }
}

#[async_trait]
impl PauseRepository for MockGovRepository {
    async fn pause(&self, entry: &PauseEntry) -> Result<PauseEntry> {
        self.record("PauseRepository::pause");
        self.check_injection("PauseRepository::pause")?;
        let id = self.ids.pause.fetch_add(1, Ordering::SeqCst);
        let mut stored = entry.clone();
        stored.id = id;
        self.state.lock().pauses.insert(stored.scope.clone(), stored.clone());
        Ok(stored)
    }

    async fn resume(&self, scope: &str, now: DateTime<Utc>) -> Result<()> {
        self.record("PauseRepository::resume");
        self.check_injection("PauseRepository::resume")?;
        if let Some(entry) = self.state.lock().pauses.get_mut(scope) {
            entry.resumed_at = Some(now);
        }
        Ok(())
    }

    async fn active_pause(&self, scope: &str) -> Result<Option<PauseEntry>> {
        self.record("PauseRepository::active_pause");
        self.check_injection("PauseRepository::active_pause")?;
        Ok(self.state.lock().pauses.get(scope).filter(|p| p.resumed_at.is_none()).cloned())
    }
}

#[async_trait]
impl PresenceRepository for MockGovRepository {
    async fn upsert(&self, row: &PresenceRow) -> Result<PresenceRow> {
        self.record("PresenceRepository::upsert");
        self.check_injection("PresenceRepository::upsert")?;
        self.state.lock().presence.insert(row.agent_name.clone(), row.clone());
        Ok(row.clone())
    }

    async fn get(&self, agent_name: &str) -> Result<Option<PresenceRow>> {
        self.record("PresenceRepository::get");
        self.check_injection("PresenceRepository::get")?;
        Ok(self.state.lock().presence.get(agent_name).cloned())
    }

    async fn list_idle_since(&self, threshold: DateTime<Utc>) -> Result<Vec<PresenceRow>> {
        self.record("PresenceRepository::list_idle_since");
        self.check_injection("PresenceRepository::list_idle_since")?;
        let state = self.state.lock();
        Ok(state.presence.values().filter(|p| p.last_activity_at <= threshold).cloned().collect())
    }
}

#[async_trait]
impl SubscriptionRepository for MockGovRepository {
    async fn subscribe(&self, sub: &InboxSubscription) -> Result<InboxSubscription> {
        self.record("SubscriptionRepository::subscribe");
        self.check_injection("SubscriptionRepository::subscribe")?;
        let id = self.ids.subscription.fetch_add(1, Ordering::SeqCst);
        let mut stored = sub.clone();
        stored.id = id;
        self.state.lock().subscriptions.insert(id, stored.clone());
        Ok(stored)
    }

    async fn unsubscribe(&self, id: i64) -> Result<()> {
        self.record("SubscriptionRepository::unsubscribe");
        self.check_injection("SubscriptionRepository::unsubscribe")?;
        self.state.lock().subscriptions.remove(&id);
        Ok(())
    }

    async fn list_for_channel(&self, channel: &str) -> Result<Vec<InboxSubscription>> {
        self.record("SubscriptionRepository::list_for_channel");
        self.check_injection("SubscriptionRepository::list_for_channel")?;
        let state = self.state.lock();
        Ok(state.subscriptions.values().filter(|s| s.channel == channel).cloned().collect())
    }
}

#[async_trait]
impl ChatRepository for MockGovRepository {
    async fn append(&self, message: &ChatMessage) -> Result<ChatMessage> {
        self.record("ChatRepository::append");
        self.check_injection("ChatRepository::append")?;
        let id = self.ids.chat.fetch_add(1, Ordering::SeqCst);
        let mut stored = message.clone();
        stored.id = id;
        self.state.lock().chat_messages.push(stored.clone());
        Ok(stored)
    }

    async fn list_for_channel(&self, channel: &str, since: Option<DateTime<Utc>>) -> Result<Vec<ChatMessage>> {
        self.record("ChatRepository::list_for_channel");
        self.check_injection("ChatRepository::list_for_channel")?;
        let state = self.state.lock();
        Ok(state
            .chat_messages
            .iter()
            .filter(|m| m.channel == channel)
            .filter(|m| since.map_or(true, |s| m.created_at >= s))
            .cloned()
            .collect())
    }

    async fn list_pending_mentions(&self, agent_name: &str, since: DateTime<Utc>) -> Result<Vec<ChatMessage>> {
        self.record("ChatRepository::list_pending_mentions");
        self.check_injection("ChatRepository::list_pending_mentions")?;
        let state = self.state.lock();
        Ok(state
            .chat_messages
            .iter()
            .filter(|m| m.created_at >= since && m.mentions.iter().any(|a| a == agent_name))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl EscalationRepository for MockGovRepository {
    async fn create(&self, escalation: &Escalation) -> Result<Escalation> {
        self.record("EscalationRepository::create");
        self.check_injection("EscalationRepository::create")?;
        let id = self.ids.escalation.fetch_add(1, Ordering::SeqCst);
        let mut stored = escalation.clone();
        stored.id = id;
        self.state.lock().escalations.insert(id, stored.clone());
        Ok(stored)
    }

    async fn acknowledge(&self, id: i64, now: DateTime<Utc>) -> Result<Escalation> {
        self.record("EscalationRepository::acknowledge");
        self.check_injection("EscalationRepository::acknowledge")?;
        let mut state = self.state.lock();
        let escalation = state.escalations.get_mut(&id).ok_or_else(|| GovError::not_found_code(&id.to_string()))?;
        escalation.acknowledged_at = Some(now);
        Ok(escalation.clone())
    }

    async fn list_unacknowledged(&self) -> Result<Vec<Escalation>> {
        self.record("EscalationRepository::list_unacknowledged");
        self.check_injection("EscalationRepository::list_unacknowledged")?;
        let state = self.state.lock();
        Ok(state.escalations.values().filter(|e| e.acknowledged_at.is_none()).cloned().collect())
    }
}

#[async_trait]
impl SchedulingRepository for MockGovRepository {
    async fn list_active_recurring(&self, _now: DateTime<Utc>) -> Result<Vec<RecurringTaskDef>> {
        self.record("SchedulingRepository::list_active_recurring");
        self.check_injection("SchedulingRepository::list_active_recurring")?;
        let state = self.state.lock();
        Ok(state.recurring_defs.values().filter(|r| r.active).cloned().collect())
    }

    async fn mark_fired(&self, id: i64, now: DateTime<Utc>) -> Result<()> {
        self.record("SchedulingRepository::mark_fired");
        self.check_injection("SchedulingRepository::mark_fired")?;
        if let Some(def) = self.state.lock().recurring_defs.get_mut(&id) {
            def.last_fired_at = Some(now);
        }
        Ok(())
    }

    async fn list_calendar_blocks(&self, agent_name: &str, window_start: DateTime<Utc>, window_end: DateTime<Utc>) -> Result<Vec<CalendarBlock>> {
        self.record("SchedulingRepository::list_calendar_blocks");
        self.check_injection("SchedulingRepository::list_calendar_blocks")?;
        let state = self.state.lock();
        Ok(state
            .calendar_blocks
            .values()
            .filter(|b| b.agent_name == agent_name && b.starts_at < window_end && b.ends_at > window_start)
            .cloned()
            .collect())
    }

    async fn create_calendar_event(&self, event: &CalendarEvent) -> Result<CalendarEvent> {
        self.record("SchedulingRepository::create_calendar_event");
        self.check_injection("SchedulingRepository::create_calendar_event")?;
        let id = self.ids.calendar_event.fetch_add(1, Ordering::SeqCst);
        let mut stored = event.clone();
        stored.id = id;
        self.state.lock().calendar_events.insert(id, stored.clone());
        Ok(stored)
    }

    async fn list_due_reminders(&self, now: DateTime<Utc>) -> Result<Vec<CalendarEvent>> {
        self.record("SchedulingRepository::list_due_reminders");
        self.check_injection("SchedulingRepository::list_due_reminders")?;
        let state = self.state.lock();
        Ok(state.calendar_events.values().filter(|e| e.delivered_at.is_none() && e.fire_at <= now).cloned().collect())
    }

    async fn mark_delivered(&self, id: i64, now: DateTime<Utc>) -> Result<()> {
        self.record("SchedulingRepository::mark_delivered");
        self.check_injection("SchedulingRepository::mark_delivered")?;
        if let Some(event) = self.state.lock().calendar_events.get_mut(&id) {
            event.delivered_at = Some(now);
        }
        Ok(())
    }
}

#[async_trait]
impl NoiseBudgetRepository for MockGovRepository {
    async fn snapshot(&self, channel: &str, now: DateTime<Utc>) -> Result<NoiseBudgetSnapshot> {
        self.record("NoiseBudgetRepository::snapshot");
        self.check_injection("NoiseBudgetRepository::snapshot")?;
        let state = self.state.lock();
        Ok(state.noise_budgets.get(channel).cloned().unwrap_or(NoiseBudgetSnapshot {
            channel: channel.to_string(),
            window_start: now,
            message_count: 0,
            budget: 0,
            over_budget: false,
            enforced: false,
        }))
    }

    async fn record_message(&self, channel: &str, now: DateTime<Utc>) -> Result<()> {
        self.record("NoiseBudgetRepository::record_message");
        self.check_injection("NoiseBudgetRepository::record_message")?;
        let mut state = self.state.lock();
        let entry = state.noise_budgets.entry(channel.to_string()).or_insert(NoiseBudgetSnapshot {
            channel: channel.to_string(),
            window_start: now,
            message_count: 0,
            budget: 0,
            over_budget: false,
            enforced: false,
        });
        entry.message_count += 1;
        Ok(())
    }

    async fn record_suppression(&self, entry: &SuppressionLedgerEntry) -> Result<SuppressionLedgerEntry> {
        self.record("NoiseBudgetRepository::record_suppression");
        self.check_injection("NoiseBudgetRepository::record_suppression")?;
        let id = self.ids.suppression.fetch_add(1, Ordering::SeqCst);
        let mut stored = entry.clone();
        stored.id = id;
        self.state.lock().suppressions.push(stored.clone());
        Ok(stored)
    }

    async fn list_suppressions_since(&self, since: DateTime<Utc>) -> Result<Vec<SuppressionLedgerEntry>> {
        self.record("NoiseBudgetRepository::list_suppressions_since");
        self.check_injection("NoiseBudgetRepository::list_suppressions_since")?;
        let state = self.state.lock();
        Ok(state.suppressions.iter().filter(|s| s.suppressed_at >= since).cloned().collect())
    }
}

#[async_trait]
impl ContinuityRepository for MockGovRepository {
    async fn record(&self, action: &ContinuityAction) -> Result<ContinuityAction> {
        self.record("ContinuityRepository::record");
        self.check_injection("ContinuityRepository::record")?;
        let id = self.ids.continuity.fetch_add(1, Ordering::SeqCst);
        let mut stored = action.clone();
        stored.id = id;
        self.state.lock().continuity_actions.push(stored.clone());
        Ok(stored)
    }

    async fn already_acted(&self, worker: &str, action_kind: &str, payload_key: &str, since: DateTime<Utc>) -> Result<bool> {
        self.record("ContinuityRepository::already_acted");
        self.check_injection("ContinuityRepository::already_acted")?;
        let state = self.state.lock();
        Ok(state.continuity_actions.iter().any(|a| {
            a.worker == worker
                && a.action_kind == action_kind
                && a.created_at >= since
                && a.payload.get("key").and_then(|v| v.as_str()) == Some(payload_key)
        }))
    }
}

#[async_trait]
impl RoutingRepository for MockGovRepository {
    async fn create_override(&self, o: &RoutingOverride) -> Result<RoutingOverride> {
        self.record("RoutingRepository::create_override");
        self.check_injection("RoutingRepository::create_override")?;
        let id = self.ids.routing.fetch_add(1, Ordering::SeqCst);
        let mut stored = o.clone();
        stored.id = id;
        self.state.lock().routing_overrides.insert(id, stored.clone());
        Ok(stored)
    }

    async fn list_active(&self, now: DateTime<Utc>) -> Result<Vec<RoutingOverride>> {
        self.record("RoutingRepository::list_active");
        self.check_injection("RoutingRepository::list_active")?;
        let state = self.state.lock();
        Ok(state.routing_overrides.values().filter(|o| o.starts_at <= now && o.expires_at > now).cloned().collect())
    }

    async fn retire(&self, id: i64) -> Result<()> {
        self.record("RoutingRepository::retire");
        self.check_injection("RoutingRepository::retire")?;
        self.state.lock().routing_overrides.remove(&id);
        Ok(())
    }
}

/// In-memory `PrIntegrityClient` test double (§6): returns whatever
/// `PrSnapshot` was registered for a URL via `set_snapshot`, or
/// `Unknown` if none was.
pub struct MockPrIntegrityClient {
    snapshots: Mutex<HashMap<String, gov_core::pr_integrity::PrSnapshot>>,
}

impl Default for MockPrIntegrityClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPrIntegrityClient {
    pub fn new() -> Self {
        Self { snapshots: Mutex::new(HashMap::new()) }
    }

    pub fn set_snapshot(&self, pr_url: &str, snapshot: gov_core::pr_integrity::PrSnapshot) {
        self.snapshots.lock().insert(pr_url.to_string(), snapshot);
    }
}

#[async_trait]
impl gov_core::pr_integrity::PrIntegrityClient for MockPrIntegrityClient {
    async fn fetch(&self, pr_url: &str) -> gov_core::pr_integrity::PrSnapshot {
        self.snapshots.lock().get(pr_url).cloned().unwrap_or(gov_core::pr_integrity::PrSnapshot {
            pr_url: pr_url.to_string(),
            state: gov_core::pr_integrity::PrState::Unknown,
            changed_files: vec![],
            checks_passed: None,
        })
    }
}

pub type SharedMockGovRepository = Arc<MockGovRepository>;
