//! Custom assertion helpers for governance-core test data.

use gov_core::models::{Priority, Task, TaskStatus};

/// Assert tasks are equal ignoring timestamps.
pub fn assert_task_equals(actual: &Task, expected: &Task) {
    assert_eq!(actual.id, expected.id, "Task IDs don't match");
    assert_eq!(actual.code, expected.code, "Task codes don't match");
    assert_eq!(actual.title, expected.title, "Task titles don't match");
    assert_eq!(actual.description, expected.description, "Task descriptions don't match");
    assert_eq!(actual.assignee, expected.assignee, "Task assignees don't match");
    assert_eq!(actual.status, expected.status, "Task statuses don't match");
}

/// Assert tasks are equal including exact timestamps.
pub fn assert_task_equals_exact(actual: &Task, expected: &Task) {
    assert_eq!(actual, expected, "Tasks are not exactly equal");
}

/// Assert task matches partial criteria.
pub fn assert_task_matches(task: &Task, matcher: &TaskMatcher) {
    if let Some(expected_id) = matcher.id {
        assert_eq!(task.id, expected_id, "Task ID doesn't match expected");
    }
    if let Some(ref expected_code) = matcher.code {
        assert_eq!(&task.code, expected_code, "Task code doesn't match expected");
    }
    if let Some(ref expected_title) = matcher.title {
        assert_eq!(&task.title, expected_title, "Task title doesn't match expected");
    }
    if let Some(ref expected_assignee) = matcher.assignee {
        assert_eq!(task.assignee.as_ref(), Some(expected_assignee), "Task assignee doesn't match expected");
    }
    if let Some(expected_status) = matcher.status {
        assert_eq!(task.status, expected_status, "Task status doesn't match expected");
    }
    if let Some(expected_priority) = matcher.priority {
        assert_eq!(task.priority, expected_priority, "Task priority doesn't match expected");
    }
}

/// Assert a whitelisted lifecycle transition is valid per §2.1.
pub fn assert_status_transition_valid(from: TaskStatus, to: TaskStatus) {
    assert!(from.whitelisted_transition(to), "Expected transition from {from:?} to {to:?} to be valid, but it's not");
}

/// Assert a lifecycle transition is invalid per §2.1.
pub fn assert_status_transition_invalid(from: TaskStatus, to: TaskStatus) {
    assert!(!from.whitelisted_transition(to), "Expected transition from {from:?} to {to:?} to be invalid, but it's valid");
}

/// Assert task list contains a task with a specific code.
pub fn assert_contains_task_with_code(tasks: &[Task], code: &str) {
    assert!(
        tasks.iter().any(|t| t.code == code),
        "Expected to find task with code '{}' in task list, but it wasn't found. Available codes: {:?}",
        code,
        tasks.iter().map(|t| &t.code).collect::<Vec<_>>()
    );
}

/// Assert tasks are sorted by creation date, most recent first.
pub fn assert_tasks_sorted_by_created_at_desc(tasks: &[Task]) {
    for window in tasks.windows(2) {
        assert!(
            window[0].created_at >= window[1].created_at,
            "Tasks are not sorted by creation date (most recent first). Task '{}' ({}) comes before '{}' ({})",
            window[0].code,
            window[0].created_at,
            window[1].code,
            window[1].created_at
        );
    }
}

/// Flexible task matcher for partial assertions.
#[derive(Debug, Default)]
pub struct TaskMatcher {
    pub id: Option<i64>,
    pub code: Option<String>,
    pub title: Option<String>,
    pub assignee: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
}

impl TaskMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee = Some(assignee.into());
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }
}
