//! Orchestrator configuration
//!
//! Environment variables (all optional):
//! - `FALLBACK_FAILURE_THRESHOLD`: consecutive failures that open a breaker (default 3)
//! - `FALLBACK_RECOVERY_TIMEOUT_SECS`: breaker blackout window (default 300)
//! - `FALLBACK_CACHE_TTL_SECS`: cache freshness window (default 86400)
//! - `FALLBACK_MAX_RETRIES`: retries per provider after the first try (default 2)
//! - `FALLBACK_BACKOFF_BASE_MS` / `FALLBACK_BACKOFF_CAP_MS`: backoff policy (default 1000 / 8000)
//! - `FALLBACK_CACHE_DIR`, `FALLBACK_METRICS_DIR`: persistence locations
//! - `FALLBACK_PROVIDERS_FILE`: JSON provider catalog replacing the built-in one

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::core::backoff::BackoffPolicy;
use crate::error::{FallbackError, FallbackResult};

#[derive(Debug, Clone, PartialEq)]
pub struct FallbackConfig {
    pub failure_threshold: u32,
    pub recovery_timeout: Duration,
    pub cache_freshness: Duration,
    pub max_retries: u32,
    pub backoff: BackoffPolicy,
    pub cache_dir: PathBuf,
    pub metrics_dir: PathBuf,
    pub providers_file: Option<PathBuf>,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(300),
            cache_freshness: Duration::from_secs(24 * 60 * 60),
            max_retries: 2,
            backoff: BackoffPolicy::default(),
            cache_dir: PathBuf::from(".cache/fallback"),
            metrics_dir: PathBuf::from(".metrics/fallback"),
            providers_file: None,
        }
    }
}

impl FallbackConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> FallbackResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> FallbackResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let failure_threshold = parse_or(&lookup, "FALLBACK_FAILURE_THRESHOLD", defaults.failure_threshold)?;
        if failure_threshold == 0 {
            return Err(FallbackError::Config {
                field: "FALLBACK_FAILURE_THRESHOLD".to_string(),
                value: "0".to_string(),
            });
        }

        let recovery_timeout = Duration::from_secs(parse_or(
            &lookup,
            "FALLBACK_RECOVERY_TIMEOUT_SECS",
            defaults.recovery_timeout.as_secs(),
        )?);
        let cache_freshness = Duration::from_secs(parse_or(
            &lookup,
            "FALLBACK_CACHE_TTL_SECS",
            defaults.cache_freshness.as_secs(),
        )?);
        let max_retries = parse_or(&lookup, "FALLBACK_MAX_RETRIES", defaults.max_retries)?;

        let base_ms = parse_or(
            &lookup,
            "FALLBACK_BACKOFF_BASE_MS",
            defaults.backoff.base.as_millis() as u64,
        )?;
        let cap_ms = parse_or(&lookup, "FALLBACK_BACKOFF_CAP_MS", defaults.backoff.cap.as_millis() as u64)?;
        let backoff = BackoffPolicy::new(Duration::from_millis(base_ms), Duration::from_millis(cap_ms));

        let cache_dir = lookup("FALLBACK_CACHE_DIR").map(PathBuf::from).unwrap_or(defaults.cache_dir);
        let metrics_dir = lookup("FALLBACK_METRICS_DIR").map(PathBuf::from).unwrap_or(defaults.metrics_dir);
        let providers_file = lookup("FALLBACK_PROVIDERS_FILE")
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            failure_threshold,
            recovery_timeout,
            cache_freshness,
            max_retries,
            backoff,
            cache_dir,
            metrics_dir,
            providers_file,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> FallbackResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| FallbackError::Config {
            field: key.to_string(),
            value: raw,
        }),
        None => Ok(default),
    }
}
