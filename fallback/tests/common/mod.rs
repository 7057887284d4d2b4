//! Common test utilities and infrastructure
//!
//! Shared fixtures and helpers used across all fallback engine test suites.

#![allow(dead_code)]

pub mod fixtures;
pub mod helpers;

// Re-export commonly used items for convenience
pub use fixtures::TestFixtures;
pub use helpers::{EngineBuilder, Harness, TestHelpers};
