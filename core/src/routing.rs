//! Routing, approvals & overrides (§4.5).

use crate::models::RoutingOverride;
use chrono::{DateTime, Utc};

/// A candidate agent's scoring inputs for assignment/reviewer
/// suggestion (§4.5 Assignment scoring).
#[derive(Debug, Clone)]
pub struct AgentCandidate {
    pub agent_name: String,
    pub affinity_tags: Vec<String>,
    pub current_wip: u32,
    pub validating_load: u32,
    pub protected_domains: Vec<String>,
}

/// A task's scoring inputs.
#[derive(Debug, Clone)]
pub struct RoutableTask {
    pub title: String,
    pub tags: Vec<String>,
    pub done_criteria: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentScore {
    pub agent_name: String,
    pub score: f64,
}

/// Score every candidate for assignment: role-match affinity weighted
/// highest, current WIP penalized, protected-domain tag overlap
/// penalized (guards against routing sensitive work to generalists).
pub fn score_for_assignment(task: &RoutableTask, candidates: &[AgentCandidate]) -> Vec<AgentScore> {
    candidates
        .iter()
        .map(|c| {
            let affinity = overlap_count(&task.tags, &c.affinity_tags) as f64 * 3.0;
            let wip_penalty = c.current_wip as f64 * 1.0;
            let protected_penalty = overlap_count(&task.tags, &c.protected_domains) as f64 * 5.0;
            AgentScore { agent_name: c.agent_name.clone(), score: affinity - wip_penalty - protected_penalty }
        })
        .collect()
}

/// Score candidates for reviewer suggestion: same as assignment but
/// excludes the assignee and weighs `validating_load` instead of WIP.
pub fn score_for_reviewer(task: &RoutableTask, candidates: &[AgentCandidate], assignee: &str) -> Vec<AgentScore> {
    candidates
        .iter()
        .filter(|c| c.agent_name != assignee)
        .map(|c| {
            let affinity = overlap_count(&task.tags, &c.affinity_tags) as f64 * 3.0;
            let load_penalty = c.validating_load as f64 * 1.0;
            AgentScore { agent_name: c.agent_name.clone(), score: affinity - load_penalty }
        })
        .collect()
}

fn overlap_count(a: &[String], b: &[String]) -> usize {
    a.iter().filter(|t| b.contains(t)).count()
}

/// Pick the top scorer; ties broken by lowest `current_wip` among the
/// tied candidates (§4.5).
pub fn suggest_assignee<'a>(scores: &'a [AgentScore], candidates: &'a [AgentCandidate]) -> Option<&'a str> {
    let max_score = scores.iter().map(|s| s.score).fold(f64::MIN, f64::max);
    scores
        .iter()
        .filter(|s| (s.score - max_score).abs() < f64::EPSILON)
        .min_by_key(|s| candidates.iter().find(|c| c.agent_name == s.agent_name).map(|c| c.current_wip).unwrap_or(u32::MAX))
        .map(|s| s.agent_name.as_str())
}

/// Decision on a queued routing-approval task (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingApprovalDecision {
    Approve,
    Reject,
}

/// Applying a reject means the task is suppressed from re-suggestion;
/// callers persist this as a metadata flag (`routing_suppressed`).
pub fn apply_routing_decision(decision: RoutingApprovalDecision) -> bool {
    matches!(decision, RoutingApprovalDecision::Reject)
}

/// Sweep routing overrides, returning the ids of those that have
/// expired as of `now` and should be retired.
pub fn sweep_expired_overrides(overrides: &[RoutingOverride], now: DateTime<Utc>) -> Vec<i64> {
    overrides.iter().filter(|o| o.expires_at <= now).map(|o| o.id).collect()
}

/// Whether an override is currently in effect for `now`.
pub fn override_active(o: &RoutingOverride, now: DateTime<Utc>) -> bool {
    o.starts_at <= now && now < o.expires_at
}
