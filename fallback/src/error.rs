//! Orchestrator error types
//!
//! Provider-call failures are not errors at this level: they are carried as
//! `ProviderFailure` values and end up inside an `ExecutionResult`.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type for orchestrator plumbing (config, registry, cache, metrics)
pub type FallbackResult<T> = Result<T, FallbackError>;

#[derive(Error, Debug)]
pub enum FallbackError {
    #[error("Configuration error: {field} = {value}")]
    Config { field: String, value: String },

    #[error("Duplicate provider id in registry: {id}")]
    DuplicateProvider { id: String },

    #[error("Failed to load providers from {path}: {message}")]
    ProviderFile { path: PathBuf, message: String },

    #[error("Cache operation failed: {message}")]
    Cache { message: String },

    #[error("Metrics sink error: {message}")]
    Metrics { message: String },

    #[error("Invalid metrics period: {period}")]
    InvalidPeriod { period: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why a single provider call did not yield text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderFailure {
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("timed out after {}s", .0.as_secs_f32())]
    Timeout(Duration),

    #[error("unextractable response: {0}")]
    Extraction(String),

    #[error("cancelled")]
    Cancelled,
}

impl ProviderFailure {
    /// Longest response body kept as error detail
    pub const MAX_BODY_CHARS: usize = 200;

    /// Build an HTTP failure, truncating the body to `MAX_BODY_CHARS`
    pub fn http(status: u16, body: &str) -> Self {
        let mut truncated: String = body.chars().take(Self::MAX_BODY_CHARS).collect();
        if body.chars().count() > Self::MAX_BODY_CHARS {
            truncated.push('…');
        }
        ProviderFailure::Http { status, body: truncated }
    }
}
