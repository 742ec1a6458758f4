//! Random test data generators using `fake` and `proptest`.
//!
//! Generalized from the teacher's flat task-code/owner generators to
//! the governance task shape, keeping the same code-generation
//! convention `database::SqliteGovRepository` uses in production:
//! `{TITLE_FIRST_WORD}-{sequence}`.

use chrono::Utc;
use fake::faker::lorem::en::{Paragraph, Sentence};
use fake::Fake;
use gov_core::models::{Priority, Task, TaskFilter, TaskStatus, TaskType};
use proptest::prelude::*;
use rand::Rng;

/// Generate a realistic task code (e.g. "BUG-123", "FEAT-456").
pub fn generate_task_code() -> String {
    let prefixes = ["PROJ", "BUG", "FEAT", "DOCS", "TEST", "REFAC"];
    let prefix = prefixes[rand::thread_rng().gen_range(0..prefixes.len())];
    let number: u32 = (1..9999).fake();
    format!("{prefix}-{number}")
}

/// Generate a realistic agent name.
pub fn generate_agent_name() -> String {
    let agents = [
        "rust-architect",
        "database-engineer",
        "protocol-specialist",
        "integration-lead",
        "testing-expert",
        "documentation-specialist",
        "security-auditor",
        "performance-optimizer",
    ];
    agents[rand::thread_rng().gen_range(0..agents.len())].to_string()
}

/// Generate a realistic task title.
pub fn generate_task_title() -> String {
    Sentence(3..8).fake()
}

/// Generate a realistic task description.
pub fn generate_task_description() -> String {
    Paragraph(2..5).fake()
}

/// Generate a random task status.
pub fn generate_random_task_status() -> TaskStatus {
    let statuses = [TaskStatus::Todo, TaskStatus::Doing, TaskStatus::Blocked, TaskStatus::Validating, TaskStatus::Done];
    statuses[rand::thread_rng().gen_range(0..statuses.len())]
}

/// Generate a random task priority.
pub fn generate_random_priority() -> Priority {
    let priorities = [Priority::P0, Priority::P1, Priority::P2, Priority::P3];
    priorities[rand::thread_rng().gen_range(0..priorities.len())]
}

/// Generate a random task with realistic data.
pub fn generate_random_task() -> Task {
    let id: i64 = (1..99999).fake();
    let now = Utc::now();
    Task {
        id,
        code: generate_task_code(),
        title: generate_task_title(),
        description: generate_task_description(),
        task_type: TaskType::Chore,
        status: generate_random_task_status(),
        priority: generate_random_priority(),
        assignee: Some(generate_agent_name()),
        reviewer: Some(generate_agent_name()),
        done_criteria: vec!["it works".to_string()],
        created_by: generate_agent_name(),
        created_at: now,
        updated_at: now,
        blocked_by: vec![],
        tags: vec![],
        team_id: None,
        metadata: serde_json::json!({}),
    }
}

/// Configurable task generator for scenarios needing a consistent
/// prefix or a fixed pool of agents.
pub struct TaskGenerator {
    pub code_prefix: String,
    pub agent_pool: Vec<String>,
}

impl Default for TaskGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskGenerator {
    pub fn new() -> Self {
        Self { code_prefix: "TEST".to_string(), agent_pool: vec!["agent-1".to_string(), "agent-2".to_string(), "agent-3".to_string()] }
    }

    pub fn generate(&self) -> Task {
        let id: i64 = (1..99999).fake();
        let number: u32 = (1..9999).fake();
        let agent = &self.agent_pool[rand::thread_rng().gen_range(0..self.agent_pool.len())];
        let now = Utc::now();
        Task {
            id,
            code: format!("{}-{number}", self.code_prefix),
            title: generate_task_title(),
            description: generate_task_description(),
            task_type: TaskType::Chore,
            status: generate_random_task_status(),
            priority: generate_random_priority(),
            assignee: Some(agent.clone()),
            reviewer: Some(agent.clone()),
            done_criteria: vec!["it works".to_string()],
            created_by: agent.clone(),
            created_at: now,
            updated_at: now,
            blocked_by: vec![],
            tags: vec![],
            team_id: None,
            metadata: serde_json::json!({}),
        }
    }
}

/// Proptest strategy for generating valid task codes.
pub fn task_code_strategy() -> impl Strategy<Value = String> {
    "[A-Z]{3,8}-[0-9]{1,4}"
}

/// Proptest strategy for generating valid task statuses.
pub fn task_status_strategy() -> impl Strategy<Value = TaskStatus> {
    prop_oneof![
        Just(TaskStatus::Todo),
        Just(TaskStatus::Doing),
        Just(TaskStatus::Blocked),
        Just(TaskStatus::Validating),
        Just(TaskStatus::Done),
    ]
}

/// Proptest strategy for generating valid priorities.
pub fn priority_strategy() -> impl Strategy<Value = Priority> {
    prop_oneof![Just(Priority::P0), Just(Priority::P1), Just(Priority::P2), Just(Priority::P3)]
}

/// Proptest strategy for generating complete tasks.
pub fn task_strategy() -> impl Strategy<Value = Task> {
    (1i64..99999, task_code_strategy(), "[A-Za-z ]{5,50}", "[A-Za-z0-9 .,!?]{10,200}", "[a-z-]{5,20}", task_status_strategy(), priority_strategy())
        .prop_map(|(id, code, title, description, assignee, status, priority)| {
            let now = Utc::now();
            Task {
                id,
                code,
                title,
                description,
                task_type: TaskType::Chore,
                status,
                priority,
                assignee: Some(assignee),
                reviewer: Some("reviewer".to_string()),
                done_criteria: vec!["it works".to_string()],
                created_by: "author".to_string(),
                created_at: now,
                updated_at: now,
                blocked_by: vec![],
                tags: vec![],
                team_id: None,
                metadata: serde_json::json!({}),
            }
        })
}

/// Proptest strategy for generating task filters.
pub fn task_filter_strategy() -> impl Strategy<Value = TaskFilter> {
    (proptest::option::of("[a-z-]{5,20}"), proptest::option::of(task_status_strategy())).prop_map(|(assignee, status)| TaskFilter {
        assignee,
        status,
        ..Default::default()
    })
}
