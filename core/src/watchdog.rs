//! Watchdog & background worker tick functions (§4.3).
//!
//! Per §9's "timer-driven workers" note, each watchdog is a pure
//! `(now, opts) -> TickDecision` function; the scheduler calls it on a
//! `tokio::time::interval` and the HTTP admin endpoints call the exact
//! same function, so a tick's behavior under a cron and under
//! `POST .../tick` is identical by construction.

use crate::models::{Priority, TaskStatus, TaskType};
use crate::quiet_hours::QuietHoursPolicy;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Options accepted by every tick endpoint (§6: `dryRun`/`force`/`nowMs`).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TickOpts {
    pub dry_run: bool,
    pub force: bool,
}

/// Whether quiet hours suppressed a worker's external messaging this
/// tick (§4.3, §8 quiet-hours-containment property).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietGate {
    pub suppressed: bool,
    pub reason: Option<&'static str>,
}

/// Evaluate whether a worker's external side effects are suppressed
/// this tick. Internal state changes still happen; only messaging
/// is gated (§4.3).
pub fn quiet_gate(now: DateTime<Utc>, opts: TickOpts, policy: &QuietHoursPolicy) -> QuietGate {
    if opts.force {
        return QuietGate { suppressed: false, reason: None };
    }
    if policy.is_quiet(now) {
        QuietGate { suppressed: true, reason: Some("quiet-hours") }
    } else {
        QuietGate { suppressed: false, reason: None }
    }
}

/// One agent's activity snapshot as seen by idle-nudge/cadence.
#[derive(Debug, Clone)]
pub struct AgentActivity {
    pub agent_name: String,
    pub last_activity_at: DateTime<Utc>,
    pub last_nudge_at: Option<DateTime<Utc>>,
    pub last_escalation_at: Option<DateTime<Utc>>,
    pub in_post_ship_grace: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct IdleNudgePolicy {
    pub warn_min: i64,
    pub escalate_min: i64,
    pub cooldown_min: i64,
}

impl Default for IdleNudgePolicy {
    fn default() -> Self {
        Self { warn_min: 15, escalate_min: 45, cooldown_min: 15 }
    }
}

/// Per-agent decision from one idle-nudge tick.
#[derive(Debug, Clone, PartialEq)]
pub enum IdleNudgeAction {
    None,
    Nudge,
    Escalate,
}

/// One row of the idle-nudge decision matrix (§4.3: `dryRun` returns
/// the matrix without messaging).
#[derive(Debug, Clone)]
pub struct IdleNudgeRow {
    pub agent_name: String,
    pub idle_minutes: i64,
    pub action: IdleNudgeAction,
}

/// Idle-nudge tick (cadence: 1 min).
pub fn idle_nudge_tick(
    now: DateTime<Utc>,
    agents: &[AgentActivity],
    policy: &IdleNudgePolicy,
) -> Vec<IdleNudgeRow> {
    agents
        .iter()
        .map(|agent| {
            let idle_minutes = (now - agent.last_activity_at).num_minutes();
            let action = decide_idle_action(agent, idle_minutes, now, policy);
            IdleNudgeRow { agent_name: agent.agent_name.clone(), idle_minutes, action }
        })
        .collect()
}

fn decide_idle_action(
    agent: &AgentActivity,
    idle_minutes: i64,
    now: DateTime<Utc>,
    policy: &IdleNudgePolicy,
) -> IdleNudgeAction {
    if agent.in_post_ship_grace {
        return IdleNudgeAction::None;
    }
    if let Some(last) = agent.last_nudge_at {
        if (now - last).num_minutes() < policy.cooldown_min {
            return IdleNudgeAction::None;
        }
    }
    if idle_minutes >= policy.escalate_min {
        IdleNudgeAction::Escalate
    } else if idle_minutes >= policy.warn_min {
        IdleNudgeAction::Nudge
    } else {
        IdleNudgeAction::None
    }
}

/// A `doing` task's staleness snapshot for the cadence watchdog.
#[derive(Debug, Clone)]
pub struct DoingTaskSnapshot {
    pub task_id: i64,
    pub entered_doing_at: DateTime<Utc>,
}

/// Cadence-watchdog decision: trio silence and stale `doing` tasks
/// (§4.3). Deterministic given identical `(tasks, messages, now)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CadenceDecision {
    pub stale_task_ids: Vec<i64>,
    pub trio_silent_agents: Vec<String>,
}

pub fn cadence_tick(
    now: DateTime<Utc>,
    doing_tasks: &[DoingTaskSnapshot],
    working_stale_min: i64,
    silent_agents: &[String],
) -> CadenceDecision {
    let stale_task_ids = doing_tasks
        .iter()
        .filter(|t| (now - t.entered_doing_at).num_minutes() >= working_stale_min)
        .map(|t| t.task_id)
        .collect();
    CadenceDecision { stale_task_ids, trio_silent_agents: silent_agents.to_vec() }
}

/// An unanswered human mention, tracked by the inbox/chat subsystem.
#[derive(Debug, Clone)]
pub struct PendingMention {
    pub agent_name: String,
    pub mentioned_at: DateTime<Utc>,
    pub responded: bool,
    pub last_rescue_at: Option<DateTime<Utc>>,
}

/// Mention-rescue tick (cadence: 30s). `delayMin` is hard-floored at 3
/// minutes per §4.3.
pub fn mention_rescue_tick(
    now: DateTime<Utc>,
    mentions: &[PendingMention],
    delay_min: i64,
    cooldown_min: i64,
) -> Vec<String> {
    let delay_min = delay_min.max(3);
    mentions
        .iter()
        .filter(|m| !m.responded)
        .filter(|m| (now - m.mentioned_at).num_minutes() >= delay_min)
        .filter(|m| m.last_rescue_at.map_or(true, |t| (now - t).num_minutes() >= cooldown_min))
        .map(|m| m.agent_name.clone())
        .collect()
}

/// A `doing`/`done` task candidate the board-health worker inspects.
#[derive(Debug, Clone)]
pub struct BoardTaskSnapshot {
    pub task_id: i64,
    pub status: TaskStatus,
    pub entered_status_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoardHealthAction {
    AutoBlock { task_id: i64, explanation: String },
    SuggestClose { task_id: i64 },
}

/// Board-health tick (cadence: >=5 min). `max_actions` bounds the
/// number of actions taken in one tick to prevent cascades; actions
/// beyond the limit are dropped and the drop is surfaced via the
/// returned count, not silently.
pub fn board_health_tick(
    now: DateTime<Utc>,
    tasks: &[BoardTaskSnapshot],
    stale_doing_min: i64,
    stale_done_min: i64,
    max_actions: usize,
) -> (Vec<BoardHealthAction>, usize) {
    let mut actions = Vec::new();
    for t in tasks {
        let age_min = (now - t.entered_status_at).num_minutes();
        match t.status {
            TaskStatus::Doing if age_min >= stale_doing_min => actions.push(BoardHealthAction::AutoBlock {
                task_id: t.task_id,
                explanation: format!("doing for {age_min} minutes with no activity"),
            }),
            TaskStatus::Done if age_min >= stale_done_min => {
                actions.push(BoardHealthAction::SuggestClose { task_id: t.task_id })
            }
            _ => {}
        }
    }
    let dropped = actions.len().saturating_sub(max_actions);
    actions.truncate(max_actions);
    (actions, dropped)
}

/// A rollback record for a board-health action, so an auto-block or
/// suggest-close can be undone within `rollback_window`.
#[derive(Debug, Clone)]
pub struct RollbackRecord {
    pub task_id: i64,
    pub before_status: TaskStatus,
    pub action_at: DateTime<Utc>,
}

pub fn can_rollback(record: &RollbackRecord, now: DateTime<Utc>, rollback_window: Duration) -> bool {
    now - record.action_at <= rollback_window
}

/// A `validating` task's contract snapshot for the execution sweeper.
#[derive(Debug, Clone)]
pub struct ValidatingSnapshot {
    pub task_id: i64,
    pub has_review_packet: bool,
    pub pr_drifted: bool,
    pub pr_closed_unmerged: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DriftReport {
    pub task_id: i64,
    pub reasons: Vec<&'static str>,
}

/// Execution-sweeper tick (cadence: >=5 min): scan `validating` for
/// contract violations.
pub fn execution_sweep_tick(tasks: &[ValidatingSnapshot]) -> Vec<DriftReport> {
    tasks
        .iter()
        .filter_map(|t| {
            let mut reasons = Vec::new();
            if !t.has_review_packet {
                reasons.push("missing review packet");
            }
            if t.pr_drifted {
                reasons.push("PR drifted from review packet");
            }
            if t.pr_closed_unmerged {
                reasons.push("PR closed without merging");
            }
            if reasons.is_empty() {
                None
            } else {
                Some(DriftReport { task_id: t.task_id, reasons })
            }
        })
        .collect()
}

/// A due reminder from the calendar/recurring-task store.
#[derive(Debug, Clone)]
pub struct DueReminder {
    pub event_id: i64,
    pub channel: String,
    pub message: String,
}

/// Reminder-engine tick (cadence: >=30 s): all calendar events whose
/// `fire_at <= now` and that have not yet been delivered.
pub fn reminder_tick(now: DateTime<Utc>, events: &[crate::models::CalendarEvent]) -> Vec<DueReminder> {
    events
        .iter()
        .filter(|e| e.delivered_at.is_none() && e.fire_at <= now)
        .map(|e| DueReminder { event_id: e.id, channel: e.channel.clone(), message: e.message.clone() })
        .collect()
}

/// Default priority assigned when the reminder engine expands a
/// recurring task definition.
pub fn recurring_task_priority(def_priority: Priority, overdue_cycles: u32) -> Priority {
    if overdue_cycles >= 2 {
        match def_priority {
            Priority::P3 => Priority::P2,
            Priority::P2 => Priority::P1,
            other => other,
        }
    } else {
        def_priority
    }
}

/// Reference used by the board-health worker when deciding whether a
/// task's type participates in the stale-doing auto-block sweep —
/// every type does, there is no exemption, kept here so the decision
/// is explicit rather than implicit in `board_health_tick`'s filter.
pub fn participates_in_board_health(_task_type: TaskType) -> bool {
    true
}
