//! Reflection -> insight -> task pipeline (§4.2).
//!
//! Ingest is a pure function over `(insight_lookup, reflection)`;
//! callers supply the currently-open insight for a cluster key (if
//! any) and persist whatever this module returns. The auto-task bridge
//! and reconciliation sweep follow the same shape: compute a decision,
//! let the caller perform the I/O.

use crate::models::{Insight, InsightStatus, Priority, Reflection, Severity, TriageOutcome};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// Tunable pipeline policy (§9 open question 4: defaults kept, exposed
/// as policy fields).
#[derive(Debug, Clone)]
pub struct PipelinePolicy {
    pub auto_create_severities: Vec<Severity>,
    pub cooldown: chrono::Duration,
    pub broken_window: chrono::Duration,
    pub broken_cooldown: chrono::Duration,
}

impl Default for PipelinePolicy {
    fn default() -> Self {
        Self {
            auto_create_severities: vec![Severity::Critical, Severity::High],
            cooldown: chrono::Duration::minutes(30),
            broken_window: chrono::Duration::minutes(10),
            broken_cooldown: chrono::Duration::minutes(30),
        }
    }
}

/// Deterministically derive the `cluster_key` a reflection maps to
/// (§9 open question 1, resolved in SPEC_FULL.md): lowercase+sorted
/// tag set joined with `|`, plus a normalized-whitespace alphanumeric
/// fold of the first 120 chars of `pain`. Two reflections with equal
/// tags and near-equal pain text collide deterministically; unrelated
/// reflections essentially never do (§8 cluster-stability property).
pub fn derive_cluster_key(reflection: &Reflection) -> String {
    let mut tags: Vec<String> = reflection.tags.iter().map(|t| t.to_lowercase()).collect();
    tags.sort();
    let tag_part = tags.join("|");

    let pain_fold: String = reflection
        .pain
        .to_lowercase()
        .chars()
        .take(120)
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    format!("{tag_part}::{pain_fold}")
}

/// Result of ingesting one reflection: either a brand-new insight or an
/// update to an existing one, plus whether the bridge's cooldown still
/// applies.
pub enum IngestOutcome {
    Created(Insight),
    Updated(Insight),
}

/// Ingest a validated reflection against the currently-open insight for
/// its cluster key, if any (§4.2 Ingest).
pub fn ingest_reflection(
    reflection: &Reflection,
    existing: Option<&Insight>,
    next_insight_id: i64,
    now: DateTime<Utc>,
) -> IngestOutcome {
    match existing {
        Some(insight) => IngestOutcome::Updated(fold_reflection_into(insight, reflection, now)),
        None => IngestOutcome::Created(new_insight_from(reflection, next_insight_id, now)),
    }
}

fn new_insight_from(reflection: &Reflection, id: i64, now: DateTime<Utc>) -> Insight {
    Insight {
        id,
        title: reflection.pain.chars().take(80).collect(),
        cluster_key: derive_cluster_key(reflection),
        status: InsightStatus::Open,
        score: ema_score(None, reflection),
        severity_max: reflection.severity,
        priority: priority_for_severity(reflection.severity),
        reflection_ids: vec![reflection.id],
        authors: vec![reflection.author.clone()],
        independent_count: 1,
        evidence_refs: reflection.evidence.clone(),
        task_id: None,
        created_at: now,
        updated_at: now,
    }
}

fn fold_reflection_into(insight: &Insight, reflection: &Reflection, now: DateTime<Utc>) -> Insight {
    let mut next = insight.clone();
    next.reflection_ids.push(reflection.id);
    next.score = ema_score(Some(insight.score), reflection);
    next.severity_max = next.severity_max.max(reflection.severity);
    next.priority = priority_for_severity(next.severity_max);
    if !next.authors.contains(&reflection.author) {
        next.authors.push(reflection.author.clone());
    }
    // Independent author = name-based (§9 open question 2, resolved):
    // distinct author strings count independently even when they share
    // a role, preserving the corroborating-signal semantics
    // `independent_count` exists for.
    next.independent_count = next.authors.iter().collect::<BTreeSet<_>>().len() as u32;
    for ev in &reflection.evidence {
        if !next.evidence_refs.contains(ev) {
            next.evidence_refs.push(ev.clone());
        }
    }
    next.updated_at = now;
    next
}

/// EMA (alpha=0.3) over `confidence (0..10) x severity-weight (0..1)`,
/// scaled back to 0..=10.
fn ema_score(previous: Option<f64>, reflection: &Reflection) -> f64 {
    const ALPHA: f64 = 0.3;
    let severity_weight = match reflection.severity {
        Severity::Low => 0.25,
        Severity::Medium => 0.5,
        Severity::High => 0.75,
        Severity::Critical => 1.0,
    };
    let sample = (reflection.confidence as f64) * severity_weight;
    match previous {
        Some(prev) => ALPHA * sample + (1.0 - ALPHA) * prev,
        None => sample,
    }
}

fn priority_for_severity(severity: Severity) -> Priority {
    match severity {
        Severity::Critical => Priority::P0,
        Severity::High => Priority::P1,
        Severity::Medium => Priority::P2,
        Severity::Low => Priority::P3,
    }
}

/// Decision returned by the auto-task bridge on every insight
/// create/update (§4.2 Auto-task bridge).
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeDecision {
    /// The insight already has a task; no action (idempotency).
    AlreadyLinked { task_id: i64 },
    /// Severity warrants immediate task creation.
    CreateTask { assignee: BridgeAssignee, priority: Priority },
    /// Severity does not auto-create; route to human triage.
    PendingTriage,
    /// Within the post-promotion cooldown; update silently.
    SilentUpdate,
}

/// The assignee the bridge selected per the ownership guardrail: prefer
/// a non-author; if the only candidate is an author, require a
/// non-author reviewer; fall back to unassigned.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeAssignee {
    NonAuthor(String),
    AuthorWithReviewer { assignee: String, reviewer: String },
    Unassigned,
}

/// Select an assignee per the ownership guardrail, given the insight's
/// authors and a pool of candidate (non-author-biased) agents.
pub fn select_bridge_assignee(authors: &[String], candidates: &[String]) -> BridgeAssignee {
    if let Some(non_author) = candidates.iter().find(|c| !authors.contains(c)) {
        return BridgeAssignee::NonAuthor(non_author.clone());
    }
    if let Some(assignee) = candidates.first() {
        if let Some(reviewer) = candidates.iter().find(|c| !authors.contains(c)) {
            return BridgeAssignee::AuthorWithReviewer {
                assignee: assignee.clone(),
                reviewer: reviewer.clone(),
            };
        }
    }
    BridgeAssignee::Unassigned
}

/// Evaluate the bridge for an insight that was just created or updated.
/// `cooldown_active` reflects whether the cluster already fired a
/// promotion within `PipelinePolicy::cooldown`.
pub fn evaluate_bridge(
    insight: &Insight,
    candidates: &[String],
    cooldown_active: bool,
    policy: &PipelinePolicy,
) -> BridgeDecision {
    if let Some(task_id) = insight.task_id {
        return BridgeDecision::AlreadyLinked { task_id };
    }
    if cooldown_active {
        return BridgeDecision::SilentUpdate;
    }
    if policy.auto_create_severities.contains(&insight.severity_max) {
        let assignee = select_bridge_assignee(&insight.authors, candidates);
        return BridgeDecision::CreateTask { assignee, priority: insight.priority };
    }
    BridgeDecision::PendingTriage
}

/// A single reconciliation finding: an insight flagged `task_created`
/// (or similarly promoted) with no corresponding live task.
#[derive(Debug, Clone, PartialEq)]
pub struct OrphanFinding {
    pub insight_id: i64,
    pub recorded_task_id: Option<i64>,
    pub recommended_action: ReconcileAction,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileAction {
    RecreateTask,
    RecordAnomaly,
}

/// Find insights whose `task_id` does not resolve to a live task.
/// Dry-run callers use the returned plan without mutating anything;
/// only a caller that actually applies `RecreateTask` should persist a
/// `reconciled` metadata flag on the new task.
pub fn find_orphans<'a>(
    insights: impl Iterator<Item = &'a Insight>,
    live_task_ids: &BTreeSet<i64>,
) -> Vec<OrphanFinding> {
    insights
        .filter(|i| i.status == InsightStatus::TaskCreated)
        .filter(|i| i.task_id.map_or(true, |id| !live_task_ids.contains(&id)))
        .map(|i| OrphanFinding {
            insight_id: i.id,
            recorded_task_id: i.task_id,
            recommended_action: if i.task_id.is_none() {
                ReconcileAction::RecreateTask
            } else {
                ReconcileAction::RecordAnomaly
            },
        })
        .collect()
}

/// Rolling-window pipeline health signal (§4.2 Pipeline health).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineHealth {
    Healthy,
    Broken,
}

/// Compute pipeline health: reflections flowing in with zero insight
/// activity past `policy.broken_window` indicates the bridge or
/// ingest path is stuck.
pub fn evaluate_pipeline_health(
    reflections_in: u32,
    insight_activity: u32,
    window_elapsed: chrono::Duration,
    policy: &PipelinePolicy,
) -> PipelineHealth {
    if reflections_in > 0 && insight_activity == 0 && window_elapsed >= policy.broken_window {
        PipelineHealth::Broken
    } else {
        PipelineHealth::Healthy
    }
}

/// A pending triage decision record, appended by the caller to the
/// triage audit table on approve/dismiss.
#[derive(Debug, Clone, PartialEq)]
pub struct TriageAuditDraft {
    pub insight_id: i64,
    pub outcome: TriageOutcome,
    pub decided_by: String,
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reflection(author: &str, severity: Severity, tags: &[&str], pain: &str) -> Reflection {
        Reflection {
            id: 1,
            pain: pain.into(),
            impact: "impact".into(),
            evidence: vec!["log:1".into()],
            went_well: None,
            suspected_why: None,
            proposed_fix: None,
            confidence: 8,
            role_type: "engineer".into(),
            severity,
            author: author.into(),
            tags: tags.iter().map(|s| s.to_string()).collect(),
            task_id: None,
            team_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn cluster_stability() {
        let a = reflection("sage", Severity::High, &["auth", "login"], "SSO callback missing state param entirely");
        let b = reflection("kai", Severity::High, &["login", "auth"], "SSO callback missing state param entirely");
        assert_eq!(derive_cluster_key(&a), derive_cluster_key(&b));
    }

    #[test]
    fn independent_count_is_name_based() {
        let r1 = reflection("sage", Severity::Critical, &["x"], "pain one");
        let insight = new_insight_from(&r1, 1, Utc::now());
        let r2 = reflection("sage", Severity::Critical, &["x"], "pain one");
        let same_author = fold_reflection_into(&insight, &r2, Utc::now());
        assert_eq!(same_author.independent_count, 1);

        let r3 = reflection("kai", Severity::Critical, &["x"], "pain one");
        let two_authors = fold_reflection_into(&insight, &r3, Utc::now());
        assert_eq!(two_authors.independent_count, 2);
    }

    #[test]
    fn bridge_auto_creates_for_critical() {
        let r = reflection("sage", Severity::Critical, &["x"], "pain");
        let insight = new_insight_from(&r, 1, Utc::now());
        let decision = evaluate_bridge(&insight, &["linh".into()], false, &PipelinePolicy::default());
        assert_eq!(decision, BridgeDecision::CreateTask { assignee: BridgeAssignee::NonAuthor("linh".into()), priority: Priority::P0 });
    }

    #[test]
    fn bridge_pending_triage_for_medium() {
        let r = reflection("sage", Severity::Medium, &["x"], "pain");
        let insight = new_insight_from(&r, 1, Utc::now());
        let decision = evaluate_bridge(&insight, &["linh".into()], false, &PipelinePolicy::default());
        assert_eq!(decision, BridgeDecision::PendingTriage);
    }

    #[test]
    fn bridge_idempotent_when_already_linked() {
        let r = reflection("sage", Severity::Critical, &["x"], "pain");
        let mut insight = new_insight_from(&r, 1, Utc::now());
        insight.task_id = Some(42);
        let decision = evaluate_bridge(&insight, &["linh".into()], false, &PipelinePolicy::default());
        assert_eq!(decision, BridgeDecision::AlreadyLinked { task_id: 42 });
    }

    #[test]
    fn orphan_detection() {
        let r = reflection("sage", Severity::Critical, &["x"], "pain");
        let mut insight = new_insight_from(&r, 1, Utc::now());
        insight.status = InsightStatus::TaskCreated;
        insight.task_id = Some(99);
        let live: BTreeSet<i64> = BTreeSet::new();
        let orphans = find_orphans(std::iter::once(&insight), &live);
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].recommended_action, ReconcileAction::RecordAnomaly);
    }

    #[test]
    fn pipeline_broken_detection() {
        let policy = PipelinePolicy::default();
        let health = evaluate_pipeline_health(5, 0, chrono::Duration::minutes(11), &policy);
        assert_eq!(health, PipelineHealth::Broken);
        let health = evaluate_pipeline_health(5, 2, chrono::Duration::minutes(11), &policy);
        assert_eq!(health, PipelineHealth::Healthy);
    }
}
