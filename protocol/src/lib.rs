//! Governance HTTP surface.
//!
//! This crate is the bridge between the pure decision core (`gov-core`)
//! and the outside world: an axum router, request auth, request
//! logging, and the uniform error envelope. It provides:
//!
//! - A REST implementation of every `gov_core::protocol::GovHandler`
//!   operation, generalized over any repository/PR-integrity pair.
//! - Bearer-token auth with per-operation scopes.
//! - Structured request logging with sensitive-field redaction.
//! - Error mapping from `GovError` to the `{success, error, code,
//!   status, hint?, gate?, fields?, details?}` envelope.
//!
//! # Usage
//!
//! ```no_run
//! use protocol::{GovHandlerImpl, GovServer};
//! use std::sync::Arc;
//!
//! # use gov_core::error::Result;
//! # use gov_core::pr_integrity::{PrIntegrityClient, PrSnapshot, PrState};
//! # use async_trait::async_trait;
//! # struct StubPrClient;
//! # #[async_trait]
//! # impl PrIntegrityClient for StubPrClient {
//! #     async fn fetch(&self, _pr_url: &str) -> PrSnapshot {
//! #         PrSnapshot { pr_url: String::new(), state: PrState::Unknown, changed_files: vec![], checks_passed: None }
//! #     }
//! # }
//! async fn start_server() -> anyhow::Result<()> {
//!     // In real usage: database::SqliteGovRepository::new("gov.db").await?
//!     # let repo: Arc<database::SqliteGovRepository> = unimplemented!();
//!     let pr_client = Arc::new(StubPrClient);
//!     let handler = Arc::new(GovHandlerImpl::new(repo, pr_client, Default::default()));
//!     let server = GovServer::new(handler);
//!     server.serve("127.0.0.1:3000").await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod error;
pub mod handler;
pub mod request_logger;
pub mod server;

pub use auth::{GovAuth, GovScope, TokenValidation};
pub use error::ApiError;
pub use handler::{GovHandlerImpl, GovRepository};
pub use server::GovServer;

pub use gov_core::error::{GovError, Result};
pub use gov_core::protocol::*;
