//! Mock implementations and test utilities for the governance-core
//! platform.
//!
//! This crate provides comprehensive testing infrastructure including:
//! - An in-memory implementation of every `gov_core::repository` trait
//! - An in-memory `PrIntegrityClient` test double
//! - Realistic test data generators
//! - Custom assertion helpers
//! - Property-based testing strategies
//! - Contract test helpers

pub mod assertions;
pub mod builders;
pub mod contracts;
pub mod fixtures;
pub mod generators;
pub mod repository;

pub use assertions::*;
pub use builders::*;
pub use contracts::*;
pub use fixtures::*;
pub use generators::*;
pub use repository::{MockGovRepository, MockPrIntegrityClient, SharedMockGovRepository};
