//! Fluent builders for constructing test data.
//!
//! Generalized from the teacher's flat `Task`/`NewTask`/`TaskFilter`
//! builders to the metadata-bearing entity shapes in `gov_core::models`.

use chrono::Utc;
use gov_core::models::{NewTask, Priority, Task, TaskFilter, TaskPatch, TaskStatus, TaskType};

/// Builder for constructing `Task` instances in tests.
pub struct TaskBuilder {
    task: Task,
}

impl Default for TaskBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskBuilder {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            task: Task {
                id: 1,
                code: "TEST-1".to_string(),
                title: "Test Task".to_string(),
                description: "A test task".to_string(),
                task_type: TaskType::Chore,
                status: TaskStatus::Todo,
                priority: Priority::P2,
                assignee: None,
                reviewer: Some("test-reviewer".to_string()),
                done_criteria: vec!["it works".to_string()],
                created_by: "test-agent".to_string(),
                created_at: now,
                updated_at: now,
                blocked_by: vec![],
                tags: vec![],
                team_id: None,
                metadata: serde_json::json!({}),
            },
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.task.id = id;
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.task.code = code.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.task.title = title.into();
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.task.status = status;
        self.task.updated_at = Utc::now();
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.task.priority = priority;
        self
    }

    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.task.assignee = Some(assignee.into());
        self
    }

    pub fn with_reviewer(mut self, reviewer: impl Into<String>) -> Self {
        self.task.reviewer = Some(reviewer.into());
        self
    }

    pub fn with_created_at(mut self, created_at: chrono::DateTime<Utc>) -> Self {
        self.task.created_at = created_at;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.task.metadata = metadata;
        self
    }

    pub fn build(self) -> Task {
        self.task
    }
}

/// Builder for constructing `NewTask` instances in tests.
pub struct NewTaskBuilder {
    new_task: NewTask,
}

impl Default for NewTaskBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NewTaskBuilder {
    pub fn new() -> Self {
        Self {
            new_task: NewTask {
                title: "New Test Task".to_string(),
                description: "A new test task".to_string(),
                task_type: TaskType::Chore,
                priority: Priority::P2,
                reviewer: "test-reviewer".to_string(),
                assignee: None,
                done_criteria: vec!["it works".to_string()],
                created_by: "test-agent".to_string(),
                blocked_by: vec![],
                tags: vec![],
                team_id: None,
                metadata: serde_json::json!({}),
            },
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.new_task.title = title.into();
        self
    }

    pub fn with_task_type(mut self, task_type: TaskType) -> Self {
        self.new_task.task_type = task_type;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.new_task.priority = priority;
        self
    }

    pub fn with_reviewer(mut self, reviewer: impl Into<String>) -> Self {
        self.new_task.reviewer = reviewer.into();
        self
    }

    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.new_task.assignee = Some(assignee.into());
        self
    }

    pub fn with_done_criteria(mut self, done_criteria: Vec<String>) -> Self {
        self.new_task.done_criteria = done_criteria;
        self
    }

    pub fn build(self) -> NewTask {
        self.new_task
    }
}

/// Builder for constructing `TaskPatch` instances in tests.
pub struct TaskPatchBuilder {
    patch: TaskPatch,
}

impl Default for TaskPatchBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskPatchBuilder {
    pub fn new() -> Self {
        Self { patch: TaskPatch::default() }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.patch.title = Some(title.into());
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.patch.status = Some(status);
        self
    }

    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.patch.assignee = Some(assignee.into());
        self
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.patch.actor = Some(actor.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.patch.metadata = metadata;
        self
    }

    pub fn build(self) -> TaskPatch {
        self.patch
    }
}

/// Builder for constructing `TaskFilter` instances in tests.
pub struct TaskFilterBuilder {
    filter: TaskFilter,
}

impl Default for TaskFilterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskFilterBuilder {
    pub fn new() -> Self {
        Self { filter: TaskFilter::default() }
    }

    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.filter.assignee = Some(assignee.into());
        self
    }

    pub fn with_reviewer(mut self, reviewer: impl Into<String>) -> Self {
        self.filter.reviewer = Some(reviewer.into());
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.filter.status = Some(status);
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.filter.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: u32) -> Self {
        self.filter.offset = Some(offset);
        self
    }

    pub fn build(self) -> TaskFilter {
        self.filter
    }
}
