//! Execution-governance core.
//!
//! Pure domain logic and trait interfaces for a multi-agent engineering
//! platform's governance layer: the task lifecycle engine and its gate
//! chain, the reflection→insight→task pipeline, watchdog/scheduler tick
//! functions, webhook delivery, routing/approvals, the audit ledger,
//! and the noise-budget/alert-integrity/suppression filter. All other
//! crates (`database`, `protocol`, `server`, `mocks`) depend on the
//! types and traits defined here; nothing in this crate performs I/O.
//!
//! # Architecture
//!
//! - [`models`] — domain entities (`Task`, `Reflection`, `Insight`, `WebhookEvent`, ...)
//! - [`error`] — `GovError` taxonomy mirrored onto the HTTP failure envelope
//! - [`metadata`] — typed views over a task's free-form `metadata` JSON
//! - [`validation`] — intake-time field validation
//! - [`gate_chain`] — the task lifecycle engine's pure gate-chain evaluator
//! - [`pipeline`] — reflection ingest, clustering, auto-task bridge, reconciliation
//! - [`watchdog`] — timer-driven tick functions for every background worker
//! - [`webhook`] — durable delivery state machine and backoff math
//! - [`routing`] — assignment/reviewer scoring and routing overrides
//! - [`audit`] — audit-ledger entries and mutation-alert debounce
//! - [`noise_budget`] — per-channel budget, alert normalization/dedup, suppression
//! - [`quiet_hours`] — timezone-aware quiet-hours window evaluation
//! - [`pr_integrity`] — the PR-integrity collaborator's contract
//! - [`event_bus`] — typed broadcast event fan-out
//! - [`repository`] — storage traits implemented by the `database` crate
//! - [`protocol`] — transport-independent request/response DTOs and handler trait

pub mod audit;
pub mod error;
pub mod event_bus;
pub mod gate_chain;
pub mod metadata;
pub mod models;
pub mod noise_budget;
pub mod pipeline;
pub mod pr_integrity;
pub mod protocol;
pub mod quiet_hours;
pub mod repository;
pub mod routing;
pub mod validation;
pub mod watchdog;
pub mod webhook;

pub use error::{GovError, Result};
pub use gate_chain::{evaluate_transition, GateContext, GateOutcome, GatePolicy};
pub use models::{NewTask, Task, TaskFilter, TaskPatch, TaskStatus, TaskType};
pub use protocol::GovHandler;
pub use repository::TaskRepository;
pub use validation::TaskValidator;

/// Current version of the core crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Current crate name.
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
