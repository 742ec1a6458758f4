//! Validation utilities for task intake (§4.1).
//!
//! These checks run at creation time, before a task ever reaches the
//! gate chain — malformed input should fail fast with a field-level
//! error rather than surface as a confusing gate failure later.

use crate::{
    error::{FieldError, GovError, Result},
    models::{NewTask, Priority, Task, TaskStatus, TaskType},
};

/// Validation utilities for task management operations.
pub struct TaskValidator;

impl TaskValidator {
    /// Task titles must be 1-200 non-whitespace-only characters.
    pub fn validate_title(title: &str) -> Result<()> {
        let trimmed = title.trim();
        if trimmed.is_empty() {
            return Err(GovError::empty_field("title"));
        }
        if trimmed.len() > 200 {
            return Err(GovError::validation("title must be at most 200 characters long"));
        }
        Ok(())
    }

    /// Task descriptions must be non-empty and at most 2000 characters.
    pub fn validate_description(description: &str) -> Result<()> {
        let trimmed = description.trim();
        if trimmed.is_empty() {
            return Err(GovError::empty_field("description"));
        }
        if trimmed.len() > 2000 {
            return Err(GovError::validation("description must be at most 2000 characters long"));
        }
        Ok(())
    }

    /// Agent names (assignee/reviewer/created_by) must be 1-50 chars,
    /// alphanumeric with `-`/`_`, not bracketed by a hyphen.
    pub fn validate_agent_name(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(GovError::empty_field("agent_name"));
        }
        if name.len() > 50 {
            return Err(GovError::validation("agent name must be at most 50 characters long"));
        }
        let first = name.chars().next().unwrap();
        let last = name.chars().last().unwrap();
        if !first.is_alphanumeric() || !last.is_alphanumeric() {
            return Err(GovError::validation("agent name must start and end with a letter or number"));
        }
        if !name.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_') {
            return Err(GovError::validation("agent name can only contain letters, numbers, hyphens, and underscores"));
        }
        Ok(())
    }

    /// `done_criteria` must be non-empty, and at least 2 entries for
    /// `feature` tasks (§3 Task invariants).
    pub fn validate_done_criteria(task_type: TaskType, done_criteria: &[String]) -> Result<()> {
        let min = if task_type == TaskType::Feature { 2 } else { 1 };
        if done_criteria.len() < min {
            return Err(GovError::validation(format!(
                "{task_type} tasks require at least {min} done_criteria entr{}",
                if min == 1 { "y" } else { "ies" }
            )));
        }
        if done_criteria.iter().any(|c| c.trim().is_empty()) {
            return Err(GovError::validation("done_criteria entries must not be blank"));
        }
        Ok(())
    }

    /// A complete `NewTask`: priority and reviewer are required from
    /// creation (§3 Task invariants).
    pub fn validate_new_task(task: &NewTask) -> Result<()> {
        let mut fields = Vec::new();

        if let Err(e) = Self::validate_title(&task.title) {
            fields.push(FieldError { field: "title".into(), message: e.to_string() });
        }
        if let Err(e) = Self::validate_description(&task.description) {
            fields.push(FieldError { field: "description".into(), message: e.to_string() });
        }
        if let Err(e) = Self::validate_agent_name(&task.reviewer) {
            fields.push(FieldError { field: "reviewer".into(), message: e.to_string() });
        }
        if let Some(assignee) = &task.assignee {
            if let Err(e) = Self::validate_agent_name(assignee) {
                fields.push(FieldError { field: "assignee".into(), message: e.to_string() });
            }
        }
        if let Err(e) = Self::validate_done_criteria(task.task_type, &task.done_criteria) {
            fields.push(FieldError { field: "done_criteria".into(), message: e.to_string() });
        }
        if !matches!(task.priority, Priority::P0 | Priority::P1 | Priority::P2 | Priority::P3) {
            fields.push(FieldError { field: "priority".into(), message: "priority is required".into() });
        }

        if fields.is_empty() {
            Ok(())
        } else {
            Err(GovError::FieldValidation { message: "task creation failed validation".into(), fields })
        }
    }

    /// Whether `new_status` is reachable from the task's current status
    /// by the bare whitelist, ignoring the reopen escape hatch that
    /// `gate_chain::gate_whitelist` additionally honors.
    pub fn validate_state_transition(task: &Task, new_status: TaskStatus) -> Result<()> {
        if task.status.whitelisted_transition(new_status) {
            Ok(())
        } else {
            Err(GovError::gate_failure(
                "state_transition",
                format!("{} -> {} is not a whitelisted transition", task.status, new_status),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_task() -> Task {
        Task {
            id: 1,
            code: "a1b2c3".into(),
            title: "Fix login SSO state handling".into(),
            description: "desc".into(),
            task_type: TaskType::Bug,
            status: TaskStatus::Todo,
            priority: Priority::P1,
            assignee: Some("kai".into()),
            reviewer: Some("nyx".into()),
            done_criteria: vec!["works".into()],
            created_by: "kai".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            blocked_by: vec![],
            tags: vec![],
            team_id: None,
            metadata: serde_json::json!({}),
        }
    }

    #[test]
    fn valid_titles() {
        assert!(TaskValidator::validate_title("Fix login SSO state handling").is_ok());
        assert!(TaskValidator::validate_title("   ").is_err());
        assert!(TaskValidator::validate_title(&"a".repeat(201)).is_err());
    }

    #[test]
    fn feature_requires_two_done_criteria() {
        assert!(TaskValidator::validate_done_criteria(TaskType::Feature, &["one".into()]).is_err());
        assert!(TaskValidator::validate_done_criteria(TaskType::Feature, &["one".into(), "two".into()]).is_ok());
        assert!(TaskValidator::validate_done_criteria(TaskType::Bug, &["one".into()]).is_ok());
    }

    #[test]
    fn agent_names_reject_bad_edges() {
        assert!(TaskValidator::validate_agent_name("kai").is_ok());
        assert!(TaskValidator::validate_agent_name("-kai").is_err());
        assert!(TaskValidator::validate_agent_name("kai-").is_err());
        assert!(TaskValidator::validate_agent_name("").is_err());
    }

    #[test]
    fn new_task_collects_all_field_errors() {
        let bad = NewTask {
            title: "".into(),
            description: "desc".into(),
            task_type: TaskType::Feature,
            priority: Priority::P2,
            reviewer: "nyx".into(),
            assignee: None,
            done_criteria: vec!["only one".into()],
            created_by: "kai".into(),
            blocked_by: vec![],
            tags: vec![],
            team_id: None,
            metadata: serde_json::json!({}),
        };
        match TaskValidator::validate_new_task(&bad) {
            Err(GovError::FieldValidation { fields, .. }) => {
                assert!(fields.iter().any(|f| f.field == "title"));
                assert!(fields.iter().any(|f| f.field == "done_criteria"));
            }
            other => panic!("expected FieldValidation, got {other:?}"),
        }
    }

    #[test]
    fn state_transition_whitelist() {
        let task = sample_task();
        assert!(TaskValidator::validate_state_transition(&task, TaskStatus::Doing).is_ok());
        assert!(TaskValidator::validate_state_transition(&task, TaskStatus::Done).is_err());
    }
}
