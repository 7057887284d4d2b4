//! Pure orchestration logic: backoff, cache keys, payload shaping,
//! circuit breaking and metrics aggregation

pub mod backoff;
pub mod cache_key;
pub mod health;
pub mod shaping;
pub mod summary;

pub use backoff::BackoffPolicy;
pub use cache_key::cache_key;
pub use health::HealthMonitor;
pub use shaping::build_provider_request;
pub use summary::{MetricsSummary, ProviderTally, summarize};
