//! Shared types for the provider fallback system
//!
//! Contains the request/result contract every caller of the orchestrator
//! sees, plus the durable metrics record format and logging helpers.
//! Provider-specific payload shapes never appear here.

pub mod errors;
pub mod logging;
pub mod types;

pub use errors::*;
pub use types::*;
