//! Governance server library.
//!
//! Configuration, repository/handler assembly, the scheduler driving
//! watchdog ticks and webhook retries, and telemetry setup for the
//! `gov-server` binary.

pub mod config;
pub mod pr_client;
pub mod scheduler;
pub mod setup;
pub mod telemetry;

pub use config::Config;
pub use pr_client::ReqwestPrClient;
pub use setup::{create_handler, create_pr_client, create_repository, ensure_database_directory, initialize_app, AppHandler};
pub use telemetry::init_telemetry;
