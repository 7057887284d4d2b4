//! Pure backoff policy between retries of the same provider

use std::time::Duration;

/// Exponential backoff: `min(base * 2^retry, cap)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub cap: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            cap: Duration::from_secs(8),
        }
    }
}

impl BackoffPolicy {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self { base, cap }
    }

    /// No sleeping at all; useful for tests and batch tooling
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Delay to wait after the failed try number `retry` (0-based)
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.cap)
    }

    /// Total sleep induced when a provider fails every one of `max_retries + 1` tries
    pub fn total_delay(&self, max_retries: u32) -> Duration {
        (0..max_retries).map(|retry| self.delay(retry)).sum()
    }
}
