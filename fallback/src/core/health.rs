//! Per-provider circuit breaker
//!
//! Records are created lazily on first failure and live as long as the
//! monitor. Recovery is evaluated lazily in `is_eligible`, never by a timer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::traits::Clock;
use crate::types::{BreakerState, HealthRecord};

/// Circuit breaker state machine keyed by provider id
pub struct HealthMonitor {
    records: RwLock<HashMap<String, HealthRecord>>,
    failure_threshold: u32,
    recovery_timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl HealthMonitor {
    pub fn new(failure_threshold: u32, recovery_timeout: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            failure_threshold,
            recovery_timeout,
            clock,
        }
    }

    /// Count one exhausted provider attempt against the breaker
    pub async fn record_failure(&self, provider_id: &str) {
        let now = self.clock.now();
        let mut records = self.records.write().await;
        let record = records.entry(provider_id.to_string()).or_default();

        record.consecutive_failures += 1;
        record.last_failure_at = Some(now);

        if record.consecutive_failures >= self.failure_threshold {
            if record.state == BreakerState::Closed {
                warn!(
                    provider = provider_id,
                    failures = record.consecutive_failures,
                    "Circuit opened for provider {} after {} consecutive failures",
                    provider_id,
                    record.consecutive_failures
                );
            }
            record.state = BreakerState::Open;
        } else {
            debug!(
                provider = provider_id,
                failures = record.consecutive_failures,
                "Recorded failure for provider {}",
                provider_id
            );
        }
    }

    /// Close the breaker and clear the failure streak
    pub async fn record_success(&self, provider_id: &str) {
        let mut records = self.records.write().await;
        if let Some(record) = records.get_mut(provider_id) {
            if record.state == BreakerState::Open {
                info!(provider = provider_id, "Circuit closed for provider {}", provider_id);
            }
            record.consecutive_failures = 0;
            record.state = BreakerState::Closed;
        }
    }

    /// Whether the provider may be routed to right now.
    ///
    /// An open breaker whose recovery window has elapsed is reset to closed
    /// with a zero failure count before returning `true`.
    pub async fn is_eligible(&self, provider_id: &str) -> bool {
        {
            let records = self.records.read().await;
            match records.get(provider_id) {
                None => return true,
                Some(record) if record.state == BreakerState::Closed => return true,
                Some(_) => {}
            }
        }

        let now = self.clock.now();
        let mut records = self.records.write().await;
        let Some(record) = records.get_mut(provider_id) else {
            return true;
        };
        // Another caller may have reset it between the two locks
        if record.state == BreakerState::Closed {
            return true;
        }

        let elapsed = record
            .last_failure_at
            .and_then(|at| (now - at).to_std().ok())
            .unwrap_or(Duration::ZERO);

        if elapsed >= self.recovery_timeout {
            info!(
                provider = provider_id,
                elapsed_secs = elapsed.as_secs(),
                "Recovery window elapsed for provider {}, closing circuit",
                provider_id
            );
            record.consecutive_failures = 0;
            record.state = BreakerState::Closed;
            true
        } else {
            false
        }
    }

    /// Copy of the record for one provider, if any
    pub async fn record(&self, provider_id: &str) -> Option<HealthRecord> {
        self.records.read().await.get(provider_id).cloned()
    }

    /// Copy of every record
    pub async fn snapshot(&self) -> HashMap<String, HealthRecord> {
        self.records.read().await.clone()
    }

    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    pub fn recovery_timeout(&self) -> Duration {
        self.recovery_timeout
    }
}
