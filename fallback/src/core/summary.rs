//! Aggregation over persisted metrics records

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use shared::MetricsRecord;

/// Per-provider attempt counts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderTally {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub total_duration_ms: u64,
}

impl ProviderTally {
    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.successes as f64 / self.attempts as f64
        }
    }

    pub fn avg_duration_ms(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.total_duration_ms as f64 / self.attempts as f64
        }
    }
}

/// Aggregate view of a metrics period
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub executions: u64,
    pub succeeded: u64,
    pub cache_hits: u64,
    pub total_duration_ms: u64,
    pub total_fallbacks: u64,
    pub by_provider: BTreeMap<String, ProviderTally>,
}

impl MetricsSummary {
    pub fn success_rate(&self) -> f64 {
        ratio(self.succeeded, self.executions)
    }

    pub fn cache_hit_rate(&self) -> f64 {
        ratio(self.cache_hits, self.executions)
    }

    pub fn avg_duration_ms(&self) -> f64 {
        if self.executions == 0 {
            0.0
        } else {
            self.total_duration_ms as f64 / self.executions as f64
        }
    }

    /// Average providers tried per execution that went past the cache
    pub fn avg_fallback_count(&self) -> f64 {
        let uncached = self.executions - self.cache_hits;
        if uncached == 0 {
            0.0
        } else {
            self.total_fallbacks as f64 / uncached as f64
        }
    }
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 { 0.0 } else { part as f64 / whole as f64 }
}

/// Fold records into a summary
pub fn summarize<'a, I>(records: I) -> MetricsSummary
where
    I: IntoIterator<Item = &'a MetricsRecord>,
{
    let mut summary = MetricsSummary::default();

    for record in records {
        summary.executions += 1;
        summary.total_duration_ms += record.duration_ms;
        if record.succeeded {
            summary.succeeded += 1;
        }
        if record.served_from_cache {
            summary.cache_hits += 1;
        } else {
            summary.total_fallbacks += u64::from(record.fallback_count);
        }

        for attempt in &record.attempts {
            let tally = summary.by_provider.entry(attempt.provider_id.clone()).or_default();
            tally.attempts += 1;
            tally.total_duration_ms += attempt.duration_ms;
            if attempt.succeeded {
                tally.successes += 1;
            } else {
                tally.failures += 1;
            }
        }
    }

    summary
}
