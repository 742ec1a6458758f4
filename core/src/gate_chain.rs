//! The task lifecycle engine's gate chain (§4.1).
//!
//! [`evaluate_transition`] is the single entry point for task mutation:
//! a pure function of `(task, patch, context, policy)` that returns
//! either the new task state plus side-effect records, or the first
//! gate failure encountered. Per §9's redesign note this replaces the
//! source's exception-driven handler control flow — no gate here does
//! I/O; callers resolve PR state and WIP/reflection-debt counts ahead
//! of time into [`GateContext`].

use crate::error::{GovError, Result};
use crate::metadata::{ArtifactNormalization, ReviewState, TaskMetadata};
use crate::models::{Task, TaskPatch, TaskStatus, TaskType};
use crate::pr_integrity::{looks_like_commit, looks_like_pr_url, PrSnapshot, PrState};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Tunable policy knobs for the gate chain. Defaults follow the values
/// named in §4.1/§4.3; every field is overridable via `/policy`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GatePolicy {
    pub known_models: Vec<String>,
    pub default_model: String,
    pub wip_cap_default: u32,
    pub reflection_debt_task_threshold: u32,
    pub reflection_debt_hours: i64,
    pub focus_window_minutes: i64,
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            known_models: vec!["sonnet".into(), "opus".into(), "haiku".into()],
            default_model: "sonnet".into(),
            wip_cap_default: 1,
            reflection_debt_task_threshold: 2,
            reflection_debt_hours: 4,
            focus_window_minutes: 45,
        }
    }
}

/// Context the caller resolves before invoking the gate chain: counts
/// and external lookups the gates need but must not fetch themselves.
#[derive(Debug, Clone, Default)]
pub struct GateContext {
    pub now: DateTime<Utc>,
    /// Number of tasks currently `Doing` owned by the patch's target
    /// assignee, excluding this task.
    pub assignee_doing_count: u32,
    /// Whether the assignee already owns a different `Doing` task
    /// (used for the branch-stamping warning).
    pub assignee_has_other_doing: bool,
    /// Whether the assignee owes a reflection per gate 8's rule.
    pub reflection_debt_owed: bool,
    /// Pre-fetched PR snapshot for `metadata.qa_bundle.review_packet.pr_url`
    /// or the close-gate `pr_url`, if either gate needs one.
    pub pr_snapshot: Option<PrSnapshot>,
    /// Whether `follow_on_task_id` (if present) resolves to a real task.
    pub follow_on_resolves: Option<bool>,
}

/// A diffed change to a review-sensitive field, to be appended to the
/// audit ledger by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditDraft {
    pub field_path: String,
    pub before: Value,
    pub after: Value,
}

/// A mutation alert raised by the gate chain, to be debounced and
/// routed by the audit/mutation-alert subsystem.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationAlert {
    UnauthorizedApproval { task_id: i64, actor: String },
    ApprovalFlip { task_id: i64, new_value: bool },
}

/// Lifecycle events emitted on a successful transition (§4.1). No
/// events are emitted on failure.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    TaskCreated { task_id: i64 },
    TaskUpdated { task_id: i64 },
    StatusChanged { task_id: i64, from: TaskStatus, to: TaskStatus },
}

/// Successful result of the gate chain: the new task state plus the
/// side effects the caller must persist/emit.
#[derive(Debug, Clone)]
pub struct GateOutcome {
    pub task: Task,
    pub audit: Vec<AuditDraft>,
    pub alerts: Vec<MutationAlert>,
    pub events: Vec<LifecycleEvent>,
}

const REVIEW_SENSITIVE_FIELDS: &[&str] =
    &["reviewer_approved", "reviewer", "review_state", "reviewer_notes"];

/// Evaluate a patch against a task's current state through the full
/// gate chain, in order, short-circuiting on first failure (§4.1).
pub fn evaluate_transition(
    task: &Task,
    patch: &TaskPatch,
    ctx: &GateContext,
    policy: &GatePolicy,
) -> Result<GateOutcome> {
    let mut next = task.clone();
    let mut audit = Vec::new();
    let mut alerts = Vec::new();
    let meta = TaskMetadata::parse(&patch.metadata);
    let existing_meta = TaskMetadata::parse(&task.metadata);

    // Gate 2: state-transition whitelist.
    if let Some(new_status) = patch.status {
        gate_whitelist(task.status, new_status, &meta)?;
    }

    // Gate 3: reviewer identity.
    if meta.reviewer_approved && !existing_meta.reviewer_approved {
        gate_reviewer_identity(task, patch, &mut alerts)?;
    }

    // Gate 4: model validation at `*->doing`.
    let mut effective_model = existing_meta.model.clone();
    if patch.status == Some(TaskStatus::Doing) {
        effective_model = Some(gate_model_validation(&meta, policy));
    }

    // Gate 5 + 6: QA bundle / review handoff / re-review delta at validating.
    if patch.status == Some(TaskStatus::Validating) {
        gate_validating_entry(task, &meta, ctx)?;
        if task.status == TaskStatus::Validating {
            gate_rereview_delta(&meta)?;
        }
    }

    // Gate 7: WIP cap.
    if patch.status == Some(TaskStatus::Doing) {
        gate_wip_cap(task, patch, &meta, ctx, policy)?;
    }

    // Gate 8: reflection debt.
    if patch.status == Some(TaskStatus::Doing) && ctx.reflection_debt_owed {
        return Err(GovError::gate_failure_with_hint(
            "reflection_debt",
            "assignee owes a reflection before starting new work",
            "submit a reflection via POST /reflections",
        ));
    }

    // Gate 9: close gate at `done`.
    if patch.status == Some(TaskStatus::Done) {
        let reviewer_approved = existing_meta.reviewer_approved || meta.reviewer_approved;
        gate_close(task, &meta, reviewer_approved, ctx)?;
    }

    // Apply the patch now that every gate has passed.
    apply_scalar_fields(&mut next, patch);
    let merged_metadata = merge_metadata(&task.metadata, &patch.metadata, policy, ctx, task.status, patch.status);
    next.metadata = merged_metadata;
    if let Some(model) = effective_model {
        set_meta(&mut next.metadata, "model", Value::String(model));
    }

    let status_changed = patch.status.is_some_and(|s| s != task.status);
    if status_changed {
        next.status = patch.status.unwrap();
    }

    // Gate 10: branch stamping on `*->doing`.
    if patch.status == Some(TaskStatus::Doing) {
        gate_branch_stamp(&mut next, ctx);
    }

    // Gate 11: focus window on `*->doing`.
    if patch.status == Some(TaskStatus::Doing) {
        let until = ctx.now + chrono::Duration::minutes(policy.focus_window_minutes);
        set_meta(&mut next.metadata, "focus_window_until", Value::String(until.to_rfc3339()));
    }

    // Reopen stamping.
    if meta.reopen && status_changed {
        set_meta(&mut next.metadata, "reopened_at", Value::String(ctx.now.to_rfc3339()));
        set_meta(
            &mut next.metadata,
            "reopened_from",
            serde_json::to_value(task.status).unwrap_or(Value::Null),
        );
    }

    audit.extend(diff_review_sensitive_fields(task, &next, ctx.now));
    if meta.reviewer_approved != existing_meta.reviewer_approved {
        alerts.push(MutationAlert::ApprovalFlip { task_id: task.id, new_value: meta.reviewer_approved });
    }

    next.updated_at = ctx.now;

    let mut events = vec![LifecycleEvent::TaskUpdated { task_id: task.id }];
    if status_changed {
        events.push(LifecycleEvent::StatusChanged { task_id: task.id, from: task.status, to: next.status });
    }

    Ok(GateOutcome { task: next, audit, alerts, events })
}

fn gate_whitelist(from: TaskStatus, to: TaskStatus, meta: &TaskMetadata) -> Result<()> {
    if from.whitelisted_transition(to) || from == to {
        return Ok(());
    }
    if meta.reopen {
        if meta.reopen_reason.as_deref().unwrap_or("").trim().is_empty() {
            return Err(GovError::gate_failure(
                "reopen",
                "reopen=true requires a non-empty reopen_reason",
            ));
        }
        return Ok(());
    }
    Err(GovError::gate_failure_with_hint(
        "state_whitelist",
        format!("transition {from} -> {to} is not in the whitelist"),
        "set metadata.reopen=true with a reopen_reason to override",
    ))
}

fn gate_reviewer_identity(task: &Task, patch: &TaskPatch, alerts: &mut Vec<MutationAlert>) -> Result<()> {
    let actor = patch.actor.as_deref();
    let reviewer = task.reviewer.as_deref();
    let matches = match (actor, reviewer) {
        (Some(a), Some(r)) => a.eq_ignore_ascii_case(r),
        _ => false,
    };
    if matches {
        return Ok(());
    }
    if let Some(actor) = actor {
        alerts.push(MutationAlert::UnauthorizedApproval { task_id: task.id, actor: actor.to_string() });
    }
    Err(GovError::unauthorized_gate(
        "reviewer_identity",
        "actor is not the assigned reviewer for this task",
    ))
}

fn gate_model_validation(meta: &TaskMetadata, policy: &GatePolicy) -> String {
    match &meta.requested_model {
        Some(m) if policy.known_models.contains(m) => m.clone(),
        Some(_unknown) => policy.default_model.clone(),
        None => policy.default_model.clone(),
    }
}

fn gate_validating_entry(task: &Task, meta: &TaskMetadata, ctx: &GateContext) -> Result<()> {
    if meta.is_non_code_lane(task.task_type) {
        if meta.review_handoff.is_none() {
            return Err(GovError::gate_failure(
                "review_handoff",
                "non-code lane tasks require metadata.review_handoff",
            ));
        }
        return Ok(());
    }

    let Some(packet) = &meta.review_packet else {
        return Err(GovError::gate_failure(
            "qa_bundle",
            "code-lane tasks require metadata.qa_bundle.review_packet",
        ));
    };
    if packet.task_id != task.id {
        return Err(GovError::gate_failure("qa_bundle", "review_packet.task_id does not match"));
    }
    if !looks_like_pr_url(&packet.pr_url) {
        return Err(GovError::gate_failure("qa_bundle", "review_packet.pr_url is not a PR URL"));
    }
    if !looks_like_commit(&packet.commit) {
        return Err(GovError::gate_failure("qa_bundle", "review_packet.commit must be >=7 hex chars"));
    }
    if packet.changed_files.is_empty() {
        return Err(GovError::gate_failure("qa_bundle", "review_packet.changed_files must be non-empty"));
    }
    if !packet.artifact_path.starts_with("process/") {
        return Err(GovError::gate_failure("qa_bundle", "review_packet.artifact_path must start with 'process/'"));
    }
    if packet.caveats.trim().is_empty() {
        return Err(GovError::gate_failure("qa_bundle", "review_packet.caveats must be non-empty"));
    }

    if meta.pr_integrity_override {
        return Ok(());
    }
    if let Some(snapshot) = &ctx.pr_snapshot {
        if let PrState::Open { head_sha } | PrState::Merged { head_sha, .. } = &snapshot.state {
            if head_sha != &packet.commit {
                return Err(GovError::gate_failure_with_hint(
                    "pr_integrity",
                    "PR head SHA drifted from review_packet.commit",
                    "set metadata.pr_integrity_override=true to bypass (audited)",
                ));
            }
        }
        let mut sorted_packet = packet.changed_files.clone();
        sorted_packet.sort();
        let mut sorted_pr = snapshot.changed_files.clone();
        sorted_pr.sort();
        if sorted_packet != sorted_pr {
            return Err(GovError::gate_failure_with_hint(
                "pr_integrity",
                "PR changed-file list drifted from review_packet.changed_files",
                "set metadata.pr_integrity_override=true to bypass (audited)",
            ));
        }
    }
    Ok(())
}

fn gate_rereview_delta(meta: &TaskMetadata) -> Result<()> {
    match &meta.review_delta_note {
        Some(note) if !note.trim().is_empty() => Ok(()),
        _ => Err(GovError::gate_failure(
            "review_delta",
            "validating -> validating requires a non-empty review_delta_note",
        )),
    }
}

fn gate_wip_cap(task: &Task, patch: &TaskPatch, meta: &TaskMetadata, ctx: &GateContext, policy: &GatePolicy) -> Result<()> {
    let assignee = patch.assignee.as_deref().or(task.assignee.as_deref());
    if assignee.is_none() {
        return Ok(());
    }
    if ctx.assignee_doing_count < policy.wip_cap_default {
        return Ok(());
    }
    if meta.wip_override {
        if meta.wip_override_reason.as_deref().unwrap_or("").trim().is_empty() {
            return Err(GovError::gate_failure("wip_cap", "wip_override=true requires a reason"));
        }
        return Ok(());
    }
    Err(GovError::gate_failure_with_hint(
        "wip_cap",
        "assignee is at their WIP cap",
        "set metadata.wip_override=true with a reason to override",
    ))
}

fn gate_close(task: &Task, meta: &TaskMetadata, reviewer_approved: bool, ctx: &GateContext) -> Result<()> {
    if meta.close_gate.artifacts.is_empty() {
        return Err(GovError::gate_failure("artifacts", "close requires a non-empty artifacts list"));
    }

    if !task.task_type.is_non_code_lane() {
        let Some(pr_url) = &meta.close_gate.pr_url else {
            return Err(GovError::gate_failure("pr_required", "code-lane tasks require a pr_url to close"));
        };
        if !looks_like_pr_url(pr_url) {
            return Err(GovError::gate_failure("pr_required", "pr_url is not a PR URL"));
        }
        match ctx.pr_snapshot.as_ref().map(|s| &s.state) {
            Some(PrState::Merged { .. }) => {}
            Some(PrState::ClosedUnmerged) => {
                return Err(GovError::gate_failure(
                    "pr_closed_unmerged",
                    "PR was closed without merging",
                ))
            }
            Some(PrState::Open { .. }) | Some(PrState::Unknown) | None => {
                return Err(GovError::gate_failure("pr_not_merged", "PR is not yet merged"))
            }
        }
    }

    if task.reviewer.is_some() && !reviewer_approved {
        return Err(GovError::gate_failure("reviewer_approval", "reviewer has not approved"));
    }

    if matches!(task.task_type, TaskType::Feature | TaskType::Process | TaskType::Docs) {
        let linked = meta.close_gate.follow_on_task_id.is_some() && ctx.follow_on_resolves.unwrap_or(false);
        let na = meta.close_gate.follow_on_na
            && !meta.close_gate.follow_on_na_reason.as_deref().unwrap_or("").trim().is_empty();
        if !linked && !na {
            return Err(GovError::gate_failure_with_hint(
                "follow_on",
                "spec/design/research tasks require a resolvable follow_on_task_id or follow_on_na with a reason",
                "link a follow-on task or set follow_on_na=true with a reason",
            ));
        }
    }

    Ok(())
}

fn gate_branch_stamp(task: &mut Task, ctx: &GateContext) {
    if task.metadata_get("branch").is_some() {
        return;
    }
    let assignee = task.assignee.clone().unwrap_or_else(|| "unassigned".to_string());
    let short_id = task.id;
    let branch = format!("{assignee}/task-{short_id}");
    set_meta(&mut task.metadata, "branch", Value::String(branch));
    if ctx.assignee_has_other_doing {
        set_meta(&mut task.metadata, "branch_warning", Value::String("assignee already has another doing task".into()));
    }
}

fn apply_scalar_fields(task: &mut Task, patch: &TaskPatch) {
    if let Some(v) = &patch.title {
        task.title = v.clone();
    }
    if let Some(v) = &patch.description {
        task.description = v.clone();
    }
    if let Some(v) = patch.priority {
        task.priority = v;
    }
    if let Some(v) = &patch.assignee {
        task.assignee = Some(v.clone());
    }
    if let Some(v) = &patch.reviewer {
        task.reviewer = Some(v.clone());
    }
    if let Some(v) = &patch.done_criteria {
        task.done_criteria = v.clone();
    }
    if let Some(v) = &patch.blocked_by {
        task.blocked_by = v.clone();
    }
    if let Some(v) = &patch.tags {
        task.tags = v.clone();
    }
}

/// Merge an incoming metadata patch over the task's existing metadata:
/// preserve everything not named in the patch, overlay the patch,
/// then apply auto-defaults (artifact path normalization) and
/// review-state progression.
fn merge_metadata(
    existing: &Value,
    patch: &Value,
    _policy: &GatePolicy,
    ctx: &GateContext,
    from_status: TaskStatus,
    to_status: Option<TaskStatus>,
) -> Value {
    let mut merged = existing.as_object().cloned().unwrap_or_default();
    if let Some(patch_obj) = patch.as_object() {
        for (k, v) in patch_obj {
            merged.insert(k.clone(), v.clone());
        }
    }

    if let Some(Value::String(path)) = merged.get("artifact_path").cloned() {
        match normalize_artifact_path(&path) {
            ArtifactNormalization::Rewritten { normalized, .. } => {
                merged.insert("artifact_path".to_string(), Value::String(normalized));
            }
            ArtifactNormalization::RejectedTraversal(_) => {
                merged.insert("artifact_path_rejected".to_string(), Value::Bool(true));
                merged.remove("artifact_path");
            }
            ArtifactNormalization::Unchanged(_) => {}
        }
    }

    if to_status == Some(TaskStatus::Validating) && from_status != TaskStatus::Validating {
        merged.insert("entered_validating_at".to_string(), Value::String(ctx.now.to_rfc3339()));
        merged.insert(
            "review_state".to_string(),
            serde_json::to_value(ReviewState::Queued).unwrap_or(Value::Null),
        );
        merged.insert("review_last_activity_at".to_string(), Value::String(ctx.now.to_rfc3339()));
    } else if to_status.is_some() && merged.contains_key("review_state") {
        merged.insert("review_last_activity_at".to_string(), Value::String(ctx.now.to_rfc3339()));
    }

    Value::Object(merged)
}

/// Gate-6's auto-default: workspace-absolute paths are rewritten
/// repo-relative; `..` traversal attempts are rejected and logged by
/// the caller via the `RejectedTraversal` variant.
pub fn normalize_artifact_path(path: &str) -> ArtifactNormalization {
    if path.split('/').any(|seg| seg == "..") {
        return ArtifactNormalization::RejectedTraversal(path.to_string());
    }
    if let Some(rest) = path.strip_prefix("/workspace/") {
        return ArtifactNormalization::Rewritten { original: path.to_string(), normalized: rest.to_string() };
    }
    ArtifactNormalization::Unchanged(path.to_string())
}

fn diff_review_sensitive_fields(before: &Task, after: &Task, now: DateTime<Utc>) -> Vec<AuditDraft> {
    let mut drafts = Vec::new();
    for field in REVIEW_SENSITIVE_FIELDS {
        let before_v = field_value(before, field);
        let after_v = field_value(after, field);
        if before_v != after_v {
            drafts.push(AuditDraft { field_path: (*field).to_string(), before: before_v, after: after_v });
        }
    }
    let _ = now;
    drafts
}

fn field_value(task: &Task, field: &str) -> Value {
    match field {
        "reviewer" => task.reviewer.clone().map(Value::String).unwrap_or(Value::Null),
        "reviewer_approved" => Value::Bool(task.metadata_bool("reviewer_approved")),
        "review_state" => task.metadata_get("review_state").cloned().unwrap_or(Value::Null),
        "reviewer_notes" => task.metadata_get("reviewer_notes").cloned().unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn set_meta(metadata: &mut Value, key: &str, value: Value) {
    if !metadata.is_object() {
        *metadata = Value::Object(Default::default());
    }
    metadata.as_object_mut().unwrap().insert(key.to_string(), value);
}

/// Resolve a short prefix against a candidate code list (gate 1).
/// Exact matches win outright; otherwise a unique prefix match wins;
/// zero or multiple prefix matches are reported.
pub fn resolve_prefix<'a>(codes: impl Iterator<Item = &'a str>, prefix: &str) -> Result<&'a str> {
    let mut exact = None;
    let mut prefix_matches = Vec::new();
    for code in codes {
        if code == prefix {
            exact = Some(code);
        } else if code.starts_with(prefix) {
            prefix_matches.push(code);
        }
    }
    if let Some(code) = exact {
        return Ok(code);
    }
    match prefix_matches.len() {
        0 => Err(GovError::not_found(format!("no task matches prefix '{prefix}'"))),
        1 => Ok(prefix_matches[0]),
        _ => Err(GovError::ambiguous_prefix(
            prefix,
            prefix_matches.into_iter().map(str::to_string).collect(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Priority, Task, TaskStatus, TaskType};
    use chrono::Utc;

    fn base_task() -> Task {
        Task {
            id: 1,
            code: "LOGIN-1".into(),
            title: "Fix login SSO state handling".into(),
            description: "desc".into(),
            task_type: TaskType::Bug,
            status: TaskStatus::Todo,
            priority: Priority::P1,
            assignee: None,
            reviewer: Some("kai".into()),
            done_criteria: vec!["a".into()],
            created_by: "sys".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            blocked_by: vec![],
            tags: vec![],
            team_id: None,
            metadata: serde_json::json!({}),
        }
    }

    fn ctx() -> GateContext {
        GateContext { now: Utc::now(), ..Default::default() }
    }

    #[test]
    fn happy_path_doing() {
        let task = base_task();
        let mut patch = TaskPatch::default();
        patch.status = Some(TaskStatus::Doing);
        patch.assignee = Some("linh".into());
        let outcome = evaluate_transition(&task, &patch, &ctx(), &GatePolicy::default()).unwrap();
        assert_eq!(outcome.task.status, TaskStatus::Doing);
        assert_eq!(outcome.task.metadata_str("branch"), Some("linh/task-1"));
    }

    #[test]
    fn unauthorized_approval_rejected() {
        let task = base_task();
        let mut patch = TaskPatch::default();
        patch.actor = Some("sage".into());
        patch.metadata = serde_json::json!({"reviewer_approved": true});
        let err = evaluate_transition(&task, &patch, &ctx(), &GatePolicy::default()).unwrap_err();
        assert_eq!(err.gate(), Some("reviewer_identity"));
        assert_eq!(err.status_code(), 403);
    }

    #[test]
    fn close_gate_requires_artifacts() {
        let mut task = base_task();
        task.status = TaskStatus::Validating;
        let mut patch = TaskPatch::default();
        patch.status = Some(TaskStatus::Done);
        let err = evaluate_transition(&task, &patch, &ctx(), &GatePolicy::default()).unwrap_err();
        assert_eq!(err.gate(), Some("artifacts"));
    }

    #[test]
    fn close_gate_pr_not_merged() {
        let mut task = base_task();
        task.status = TaskStatus::Validating;
        task.metadata = serde_json::json!({"reviewer_approved": true});
        let mut patch = TaskPatch::default();
        patch.status = Some(TaskStatus::Done);
        patch.metadata = serde_json::json!({"artifacts": ["pr"], "pr_url": "https://github.com/a/b/pull/7"});
        let c = GateContext {
            pr_snapshot: Some(PrSnapshot {
                pr_url: "https://github.com/a/b/pull/7".into(),
                state: PrState::Open { head_sha: "abc1234".into() },
                changed_files: vec![],
                checks_passed: None,
            }),
            ..ctx()
        };
        let err = evaluate_transition(&task, &patch, &c, &GatePolicy::default()).unwrap_err();
        assert_eq!(err.gate(), Some("pr_not_merged"));
    }

    #[test]
    fn whitelist_rejects_arbitrary_jump() {
        let task = base_task();
        let mut patch = TaskPatch::default();
        patch.status = Some(TaskStatus::Done);
        let err = evaluate_transition(&task, &patch, &ctx(), &GatePolicy::default()).unwrap_err();
        assert_eq!(err.gate(), Some("state_whitelist"));
    }

    #[test]
    fn reopen_escape_hatch() {
        let mut task = base_task();
        task.status = TaskStatus::Done;
        let mut patch = TaskPatch::default();
        patch.status = Some(TaskStatus::Todo);
        patch.metadata = serde_json::json!({"reopen": true, "reopen_reason": "found a regression"});
        let outcome = evaluate_transition(&task, &patch, &ctx(), &GatePolicy::default()).unwrap();
        assert_eq!(outcome.task.status, TaskStatus::Todo);
        assert!(outcome.task.metadata_get("reopened_at").is_some());
    }

    #[test]
    fn prefix_resolution() {
        let codes = vec!["LOGIN-1", "LOGIN-2", "DB-9"];
        assert_eq!(resolve_prefix(codes.iter().copied(), "DB-9").unwrap(), "DB-9");
        assert!(resolve_prefix(codes.iter().copied(), "LOGIN").is_err());
        assert!(resolve_prefix(codes.iter().copied(), "ZZZ").is_err());
    }

    #[test]
    fn artifact_path_normalization() {
        assert_eq!(
            normalize_artifact_path("/workspace/process/qa.md"),
            ArtifactNormalization::Rewritten {
                original: "/workspace/process/qa.md".into(),
                normalized: "process/qa.md".into()
            }
        );
        assert!(matches!(normalize_artifact_path("process/../secret"), ArtifactNormalization::RejectedTraversal(_)));
        assert_eq!(normalize_artifact_path("process/qa.md"), ArtifactNormalization::Unchanged("process/qa.md".into()));
    }
}
