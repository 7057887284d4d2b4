//! Test helpers and builder patterns for fallback engine tests
//!
//! The builder wires a mockall transport, static credentials, an in-memory
//! cache and an in-memory metrics sink around one shared manual clock.

use std::sync::Arc;
use std::time::Duration;

use fallback::core::{BackoffPolicy, HealthMonitor};
use fallback::services::{InMemoryResultCache, ManualClock, MemoryMetricsSink, StaticCredentialSource};
use fallback::{FallbackConfig, FallbackEngine, MockHttpTransport, ProviderRegistry, ProviderSpec, TransportResponse};

use super::fixtures::TestFixtures;

pub type TestEngine = FallbackEngine<MockHttpTransport, StaticCredentialSource, InMemoryResultCache, MemoryMetricsSink>;

/// Engine plus the clock that drives its breakers and cache
pub struct Harness {
    pub engine: TestEngine,
    pub clock: Arc<ManualClock>,
}

/// Builder pattern for creating test engines with sensible defaults
pub struct EngineBuilder {
    specs: Vec<ProviderSpec>,
    credentials: StaticCredentialSource,
    transport: MockHttpTransport,
    config: FallbackConfig,
    cache_freshness: Duration,
}

impl EngineBuilder {
    /// No providers, no retries, no backoff
    pub fn new() -> Self {
        Self {
            specs: Vec::new(),
            credentials: StaticCredentialSource::new(),
            transport: MockHttpTransport::new(),
            config: FallbackConfig {
                failure_threshold: TestFixtures::FAILURE_THRESHOLD,
                recovery_timeout: Duration::from_secs(TestFixtures::RECOVERY_SECS),
                max_retries: 0,
                backoff: BackoffPolicy::none(),
                ..FallbackConfig::default()
            },
            cache_freshness: Duration::from_secs(24 * 60 * 60),
        }
    }

    /// Register a provider with a usable credential
    pub fn with_provider(mut self, id: &str, priority: i32) -> Self {
        self.credentials = self.credentials.with(TestFixtures::credential_ref(id), TestFixtures::SECRET);
        self.specs.push(TestFixtures::provider(id, priority));
        self
    }

    /// Register a provider whose credential never resolves
    pub fn with_unconfigured_provider(mut self, id: &str, priority: i32) -> Self {
        self.specs.push(TestFixtures::provider(id, priority));
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.config.backoff = backoff;
        self
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    /// Configure the transport mock with a setup function
    pub fn with_transport<F>(mut self, setup: F) -> Self
    where
        F: FnOnce(&mut MockHttpTransport),
    {
        setup(&mut self.transport);
        self
    }

    pub fn build(self) -> Harness {
        let clock = Arc::new(ManualClock::default());
        let health = HealthMonitor::new(
            self.config.failure_threshold,
            self.config.recovery_timeout,
            clock.clone(),
        );
        let cache = InMemoryResultCache::new(self.cache_freshness, clock.clone());
        let registry = ProviderRegistry::new(self.specs).expect("test providers must be unique");

        let engine = FallbackEngine::new(
            &self.config,
            registry,
            self.transport,
            self.credentials,
            cache,
            MemoryMetricsSink::new(),
        )
        .with_health_monitor(Arc::new(health));

        Harness { engine, clock }
    }
}

/// Common transport expectations
pub struct TestHelpers;

impl TestHelpers {
    /// `provider_id` answers every call with `status` and `body`, exactly `times` times
    pub fn expect_reply(
        transport: &mut MockHttpTransport,
        provider_id: &'static str,
        status: u16,
        body: String,
        times: usize,
    ) {
        transport
            .expect_post_json()
            .withf(move |request| request.provider_id == provider_id)
            .times(times)
            .returning(move |_| Ok(TransportResponse::new(status, body.clone())));
    }

    pub fn expect_success(transport: &mut MockHttpTransport, provider_id: &'static str, text: &str, times: usize) {
        Self::expect_reply(transport, provider_id, 200, TestFixtures::openai_body(text), times);
    }

    pub fn expect_server_error(transport: &mut MockHttpTransport, provider_id: &'static str, times: usize) {
        Self::expect_reply(transport, provider_id, 500, "internal error".to_string(), times);
    }

    /// Fails `failures` times, then succeeds with `text` on every later call
    pub fn expect_flaky(
        transport: &mut MockHttpTransport,
        provider_id: &'static str,
        failures: usize,
        text: &str,
        times: usize,
    ) {
        let body = TestFixtures::openai_body(text);
        let mut calls = 0usize;
        transport
            .expect_post_json()
            .withf(move |request| request.provider_id == provider_id)
            .times(times)
            .returning(move |_| {
                calls += 1;
                if calls <= failures {
                    Ok(TransportResponse::new(503, "overloaded"))
                } else {
                    Ok(TransportResponse::new(200, body.clone()))
                }
            });
    }
}
