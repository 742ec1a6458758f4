//! SQLite-backed storage for the execution-governance core.
//!
//! This crate implements every storage trait in `gov_core::repository`
//! against a single `SqlitePool`, with WAL mode for concurrency and
//! `sqlx::migrate!` for schema management.
//!
//! # Usage
//!
//! ```rust,no_run
//! use database::{SqliteGovRepository, TaskRepository};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let repo = SqliteGovRepository::new(":memory:").await?;
//!     repo.migrate().await?;
//!     repo.health_check().await?;
//!     Ok(())
//! }
//! ```

mod common;
mod sqlite;

pub use sqlite::SqliteGovRepository;

pub use gov_core::{
    error::{GovError, Result},
    models::*,
    repository::*,
};
