//! Provider fallback orchestrator
//!
//! Turns one text-generation request into exactly one answer by walking an
//! ordered chain of remote LLM providers. Per-provider circuit breakers keep
//! failing providers out of the chain for a while, successful responses are
//! cached by request content, and every execution leaves one metrics record.

pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod registry;
pub mod services;
pub mod traits;
pub mod types;

// Re-export main types
pub use config::FallbackConfig;
pub use engine::FallbackEngine;
pub use error::{FallbackError, FallbackResult, ProviderFailure};
pub use registry::ProviderRegistry;
pub use traits::*;
pub use types::*;
