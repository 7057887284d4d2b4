//! Trait definitions for dependency injection
//!
//! Every external collaborator of the engine sits behind one of these traits
//! so tests can swap in mocks or in-memory doubles.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::MetricsRecord;

use crate::error::{FallbackResult, ProviderFailure};
use crate::types::{CacheEntry, ProviderRequest, TransportResponse};

/// Outbound HTTP transport used for every provider call
#[mockall::automock]
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// POST the shaped JSON body and return status plus raw body.
    ///
    /// Non-2xx statuses are returned as `Ok`; only transport-level problems
    /// (connection, DNS, timeout) are `Err`.
    async fn post_json(&self, request: &ProviderRequest) -> Result<TransportResponse, ProviderFailure>;
}

/// Resolves a provider's credential reference to a secret at call time
#[mockall::automock]
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// `None` means "not configured", which is a normal skip condition
    async fn resolve(&self, credential_ref: &str) -> Option<String>;
}

/// Content-addressed store of successful responses
#[mockall::automock]
#[async_trait]
pub trait ResultCache: Send + Sync {
    /// Return the entry only if it is still fresh
    async fn get(&self, key: &str) -> FallbackResult<Option<CacheEntry>>;

    /// Unconditional overwrite stamped with the current time
    async fn put(&self, key: &str, provider_id: &str, response_text: &str) -> FallbackResult<()>;
}

/// Append-only sink for per-execution records
#[mockall::automock]
#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn append(&self, record: MetricsRecord) -> FallbackResult<()>;
}

/// Wall-clock source for breaker recovery and cache freshness
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
