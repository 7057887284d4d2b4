//! Orchestrator-internal data types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Wire shape a provider speaks; selects request shaping and response extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// `choices[0].message.content` family (OpenAI, Groq, Mistral, OpenRouter, ...)
    OpenAiCompatible,
    Anthropic,
    Gemini,
    Cohere,
}

/// Immutable provider descriptor, created once at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSpec {
    pub id: String,
    pub kind: ProviderKind,
    pub endpoint: String,
    /// Name of the secret to resolve at call time (an environment variable for `EnvCredentialSource`)
    pub credential_ref: String,
    pub model: String,
    #[serde(rename = "timeout_secs", with = "timeout_secs", default = "default_timeout")]
    pub timeout: Duration,
    /// Lower is tried first; ties keep registration order
    #[serde(default = "default_priority")]
    pub priority: i32,
}

fn default_timeout() -> Duration {
    ProviderSpec::DEFAULT_TIMEOUT
}

fn default_priority() -> i32 {
    ProviderSpec::DEFAULT_PRIORITY
}

impl ProviderSpec {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
    pub const DEFAULT_PRIORITY: i32 = 100;

    pub fn new(
        id: impl Into<String>,
        kind: ProviderKind,
        endpoint: impl Into<String>,
        credential_ref: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            endpoint: endpoint.into(),
            credential_ref: credential_ref.into(),
            model: model.into(),
            timeout: Self::DEFAULT_TIMEOUT,
            priority: Self::DEFAULT_PRIORITY,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

mod timeout_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        if !secs.is_finite() || secs <= 0.0 {
            return Err(serde::de::Error::custom(format!("timeout_secs must be positive, got {secs}")));
        }
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

/// Circuit breaker state for one provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakerState {
    /// Eligible for routing
    Closed,
    /// Ineligible until the recovery window elapses
    Open,
}

/// Per-provider health, owned by the health monitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRecord {
    pub consecutive_failures: u32,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub state: BreakerState,
}

impl Default for HealthRecord {
    fn default() -> Self {
        Self {
            consecutive_failures: 0,
            last_failure_at: None,
            state: BreakerState::Closed,
        }
    }
}

/// Cached successful response, keyed by the normalized request hash
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub provider_id: String,
    pub response_text: String,
    pub written_at: DateTime<Utc>,
}

/// Fully shaped outbound call for one provider
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRequest {
    pub provider_id: String,
    pub endpoint: String,
    pub headers: Vec<(String, String)>,
    pub body: serde_json::Value,
    pub timeout: Duration,
}

/// Raw response as seen by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self { status, body: body.into() }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
