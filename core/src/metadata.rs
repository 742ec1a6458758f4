//! Typed views over `Task::metadata`.
//!
//! The source system stores gate evidence inside a free-form map; per
//! §9's redesign note we parse that map into tagged structs at
//! gate-chain ingress and never re-parse mid-gate. `TaskMetadata::parse`
//! is the single entry point; unknown keys are preserved in `extra` so
//! round-tripping through `merge` does not lose caller data.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The `review_packet` evidence required at `validating` for code-lane
/// tasks (gate 5).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReviewPacket {
    pub task_id: i64,
    pub pr_url: String,
    pub commit: String,
    pub changed_files: Vec<String>,
    pub artifact_path: String,
    pub caveats: String,
}

/// Evidence satisfying gate 5 for design/docs/non-code lanes in lieu of
/// a `ReviewPacket`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReviewHandoff {
    pub summary: String,
    pub reviewer_notes: Option<String>,
}

/// Close-gate evidence bundle (gate 9): artifacts, optional PR
/// reference, and follow-on linkage for spec/design/research tasks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CloseGateEvidence {
    pub artifacts: Vec<String>,
    pub pr_url: Option<String>,
    pub follow_on_task_id: Option<i64>,
    pub follow_on_na: bool,
    pub follow_on_na_reason: Option<String>,
}

/// Result of normalizing an `artifact_path` supplied in a patch: either
/// accepted as-is, rewritten from a workspace-absolute path to a
/// repo-relative one, or rejected as a traversal attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ArtifactNormalization {
    Unchanged(String),
    Rewritten { original: String, normalized: String },
    RejectedTraversal(String),
}

/// Evidence carried on a `reopen=true` patch (gate 2 escape hatch).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReopenInfo {
    pub reason: String,
    pub reopened_from: super::models::TaskStatus,
}

/// Review-state progression tracked on `metadata.review_state`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReviewState {
    Queued,
    InProgress,
    Approved,
    NeedsAuthor,
}

/// Typed view over a task's `metadata` object, parsed once at gate-chain
/// ingress. Fields absent from the source JSON are `None`; `extra` holds
/// every key this struct doesn't model so `into_value` round-trips
/// losslessly.
#[derive(Debug, Clone, Default)]
pub struct TaskMetadata {
    pub review_packet: Option<ReviewPacket>,
    pub review_handoff: Option<ReviewHandoff>,
    pub review_state: Option<ReviewState>,
    pub reviewer_approved: bool,
    pub close_gate: CloseGateEvidence,
    pub pr_integrity_override: bool,
    pub non_code: bool,
    pub config_only: bool,
    pub reopen: bool,
    pub reopen_reason: Option<String>,
    pub reopened_at: Option<chrono::DateTime<chrono::Utc>>,
    pub reopened_from: Option<super::models::TaskStatus>,
    pub wip_override: bool,
    pub wip_override_reason: Option<String>,
    pub review_delta_note: Option<String>,
    pub model: Option<String>,
    pub requested_model: Option<String>,
    pub source_reflection: Option<i64>,
    pub source_insight: Option<i64>,
    pub is_test: bool,
    pub branch: Option<String>,
    pub routing_approval: bool,
    pub extra: serde_json::Map<String, Value>,
}

impl TaskMetadata {
    /// Parse a task's `metadata` JSON object into the typed view.
    /// Malformed sub-objects are dropped rather than erroring — gates
    /// treat an unparseable `review_packet` the same as an absent one.
    pub fn parse(value: &Value) -> Self {
        let mut extra = value.as_object().cloned().unwrap_or_default();

        let take = |extra: &mut serde_json::Map<String, Value>, key: &str| extra.remove(key);

        let review_packet = take(&mut extra, "qa_bundle")
            .and_then(|v| v.get("review_packet").cloned())
            .and_then(|v| serde_json::from_value(v).ok());
        let review_handoff = take(&mut extra, "review_handoff")
            .and_then(|v| serde_json::from_value(v).ok());
        let review_state = take(&mut extra, "review_state")
            .and_then(|v| serde_json::from_value(v).ok());
        let reviewer_approved = take(&mut extra, "reviewer_approved")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let artifacts = take(&mut extra, "artifacts")
            .and_then(|v| serde_json::from_value::<Vec<String>>(v).ok())
            .unwrap_or_default();
        let pr_url = take(&mut extra, "pr_url").and_then(|v| v.as_str().map(str::to_string));
        let follow_on_task_id = take(&mut extra, "follow_on_task_id").and_then(|v| v.as_i64());
        let follow_on_na = take(&mut extra, "follow_on_na").and_then(|v| v.as_bool()).unwrap_or(false);
        let follow_on_na_reason =
            take(&mut extra, "follow_on_na_reason").and_then(|v| v.as_str().map(str::to_string));
        let pr_integrity_override = take(&mut extra, "pr_integrity_override")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let non_code = take(&mut extra, "non_code").and_then(|v| v.as_bool()).unwrap_or(false);
        let config_only = take(&mut extra, "config_only").and_then(|v| v.as_bool()).unwrap_or(false);
        let reopen = take(&mut extra, "reopen").and_then(|v| v.as_bool()).unwrap_or(false);
        let reopen_reason = take(&mut extra, "reopen_reason").and_then(|v| v.as_str().map(str::to_string));
        let reopened_at = take(&mut extra, "reopened_at")
            .and_then(|v| v.as_str().map(str::to_string))
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&chrono::Utc));
        let reopened_from = take(&mut extra, "reopened_from")
            .and_then(|v| serde_json::from_value(v).ok());
        let wip_override = take(&mut extra, "wip_override").and_then(|v| v.as_bool()).unwrap_or(false);
        let wip_override_reason =
            take(&mut extra, "wip_override_reason").and_then(|v| v.as_str().map(str::to_string));
        let review_delta_note =
            take(&mut extra, "review_delta_note").and_then(|v| v.as_str().map(str::to_string));
        let model = take(&mut extra, "model").and_then(|v| v.as_str().map(str::to_string));
        let requested_model =
            take(&mut extra, "requested_model").and_then(|v| v.as_str().map(str::to_string));
        let source_reflection = take(&mut extra, "source_reflection").and_then(|v| v.as_i64());
        let source_insight = take(&mut extra, "source_insight").and_then(|v| v.as_i64());
        let is_test = take(&mut extra, "is_test").and_then(|v| v.as_bool()).unwrap_or(false);
        let branch = take(&mut extra, "branch").and_then(|v| v.as_str().map(str::to_string));
        let routing_approval =
            take(&mut extra, "routing_approval").and_then(|v| v.as_bool()).unwrap_or(false);

        Self {
            review_packet,
            review_handoff,
            review_state,
            reviewer_approved,
            close_gate: CloseGateEvidence {
                artifacts,
                pr_url,
                follow_on_task_id,
                follow_on_na,
                follow_on_na_reason,
            },
            pr_integrity_override,
            non_code,
            config_only,
            reopen,
            reopen_reason,
            reopened_at,
            reopened_from,
            wip_override,
            wip_override_reason,
            review_delta_note,
            model,
            requested_model,
            source_reflection,
            source_insight,
            is_test,
            branch,
            routing_approval,
            extra,
        }
    }

    /// True when the gate chain should accept `review_handoff` alone
    /// rather than demand a `review_packet` (gate 5).
    pub fn is_non_code_lane(&self, task_type: super::models::TaskType) -> bool {
        self.non_code || self.config_only || task_type.is_non_code_lane()
    }
}
