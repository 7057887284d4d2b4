//! Core types crossing the orchestrator boundary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::errors::{SharedError, SharedResult};

/// Provider id reported when no provider produced the result
pub const NO_PROVIDER: &str = "none";

/// A single logical "generate text" request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub task_type: String,
    pub system_message: String,
    pub user_prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub use_cache: bool,
}

impl ExecutionRequest {
    pub fn new(
        task_type: impl Into<String>,
        system_message: impl Into<String>,
        user_prompt: impl Into<String>,
    ) -> Self {
        Self {
            task_type: task_type.into(),
            system_message: system_message.into(),
            user_prompt: user_prompt.into(),
            max_tokens: 1000,
            temperature: 0.7,
            use_cache: true,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    /// Check the request against the inbound contract
    pub fn validate(&self) -> SharedResult<()> {
        if self.user_prompt.trim().is_empty() {
            return Err(SharedError::InvalidRequest {
                field: "user_prompt".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.max_tokens == 0 {
            return Err(SharedError::InvalidRequest {
                field: "max_tokens".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(SharedError::InvalidRequest {
                field: "temperature".to_string(),
                reason: format!("{} is outside [0, 1]", self.temperature),
            });
        }
        Ok(())
    }
}

/// Immutable record of one provider being tried (all of its retries included)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    pub provider_id: String,
    pub succeeded: bool,
    pub duration_ms: u64,
    /// Present iff the attempt failed
    pub error_detail: Option<String>,
    /// Number of calls made against the provider, retries included
    pub tries: u32,
}

impl Attempt {
    pub fn success(provider_id: impl Into<String>, duration: Duration, tries: u32) -> Self {
        Self {
            provider_id: provider_id.into(),
            succeeded: true,
            duration_ms: duration.as_millis() as u64,
            error_detail: None,
            tries,
        }
    }

    pub fn failure(
        provider_id: impl Into<String>,
        duration: Duration,
        tries: u32,
        error_detail: impl Into<String>,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            succeeded: false,
            duration_ms: duration.as_millis() as u64,
            error_detail: Some(error_detail.into()),
            tries,
        }
    }
}

/// Terminal output of one `execute` call, handed to the caller by value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub succeeded: bool,
    pub provider_id: String,
    /// Generated text on success, diagnostic message on failure
    pub response_text: String,
    pub total_duration_ms: u64,
    /// Distinct providers actually tried
    pub fallback_count: u32,
    pub served_from_cache: bool,
    pub attempts: Vec<Attempt>,
}

impl ExecutionResult {
    pub fn from_cache(provider_id: impl Into<String>, response_text: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            succeeded: true,
            provider_id: provider_id.into(),
            response_text: response_text.into(),
            total_duration_ms: elapsed.as_millis() as u64,
            fallback_count: 0,
            served_from_cache: true,
            attempts: Vec::new(),
        }
    }

    pub fn success(
        provider_id: impl Into<String>,
        response_text: impl Into<String>,
        elapsed: Duration,
        attempts: Vec<Attempt>,
    ) -> Self {
        Self {
            succeeded: true,
            provider_id: provider_id.into(),
            response_text: response_text.into(),
            total_duration_ms: elapsed.as_millis() as u64,
            fallback_count: attempts.len() as u32,
            served_from_cache: false,
            attempts,
        }
    }

    pub fn failure(diagnostic: impl Into<String>, elapsed: Duration, attempts: Vec<Attempt>) -> Self {
        Self {
            succeeded: false,
            provider_id: NO_PROVIDER.to_string(),
            response_text: diagnostic.into(),
            total_duration_ms: elapsed.as_millis() as u64,
            fallback_count: attempts.len() as u32,
            served_from_cache: false,
            attempts,
        }
    }
}

/// One durable metrics line, written once per execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub execution_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub task_type: String,
    pub provider_id: String,
    pub succeeded: bool,
    pub duration_ms: u64,
    pub fallback_count: u32,
    pub served_from_cache: bool,
    pub attempts: Vec<Attempt>,
}

impl MetricsRecord {
    pub fn from_result(execution_id: Uuid, task_type: &str, result: &ExecutionResult, timestamp: DateTime<Utc>) -> Self {
        Self {
            execution_id,
            timestamp,
            task_type: task_type.to_string(),
            provider_id: result.provider_id.clone(),
            succeeded: result.succeeded,
            duration_ms: result.total_duration_ms,
            fallback_count: result.fallback_count,
            served_from_cache: result.served_from_cache,
            attempts: result.attempts.clone(),
        }
    }
}
