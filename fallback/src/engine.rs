//! Execution engine: the provider fallback loop
//!
//! Providers are tried strictly one at a time in priority order until one
//! yields text. Each provider gets `max_retries + 1` tries with exponential
//! backoff in between, and then counts once against its circuit breaker.
//! Total failure is a normal outcome and comes back as a failed
//! `ExecutionResult`, never as an error.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use shared::{Attempt, ExecutionRequest, ExecutionResult, MetricsRecord};
use shared::logging::log_error;
use shared::{exec_debug, exec_error, exec_info, exec_warn};
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::FallbackConfig;
use crate::core::backoff::BackoffPolicy;
use crate::core::cache_key::cache_key;
use crate::core::health::HealthMonitor;
use crate::core::shaping::build_provider_request;
use crate::error::ProviderFailure;
use crate::registry::ProviderRegistry;
use crate::services::clock::SystemClock;
use crate::traits::{CredentialSource, HttpTransport, MetricsSink, ResultCache};
use crate::types::{ProviderRequest, ProviderSpec};

/// How many provider errors the failure diagnostic quotes
const DIAGNOSTIC_ERRORS: usize = 3;

/// Outcome of trying one provider (all of its retries included)
enum ProviderOutcome {
    Succeeded { text: String, attempt: Attempt },
    Failed { attempt: Attempt },
    Cancelled { attempt: Attempt },
}

/// Provider fallback orchestrator.
///
/// Cheap to clone; clones share the registry, health monitor, cache and
/// metrics sink, so concurrent executions see one set of breakers.
pub struct FallbackEngine<T, C, R, M>
where
    T: HttpTransport + 'static,
    C: CredentialSource + 'static,
    R: ResultCache + 'static,
    M: MetricsSink + 'static,
{
    registry: Arc<ProviderRegistry>,
    health: Arc<HealthMonitor>,
    transport: Arc<T>,
    credentials: Arc<C>,
    cache: Arc<R>,
    metrics: Arc<M>,
    max_retries: u32,
    backoff: BackoffPolicy,
}

impl<T, C, R, M> Clone for FallbackEngine<T, C, R, M>
where
    T: HttpTransport + 'static,
    C: CredentialSource + 'static,
    R: ResultCache + 'static,
    M: MetricsSink + 'static,
{
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            health: self.health.clone(),
            transport: self.transport.clone(),
            credentials: self.credentials.clone(),
            cache: self.cache.clone(),
            metrics: self.metrics.clone(),
            max_retries: self.max_retries,
            backoff: self.backoff,
        }
    }
}

impl<T, C, R, M> FallbackEngine<T, C, R, M>
where
    T: HttpTransport + 'static,
    C: CredentialSource + 'static,
    R: ResultCache + 'static,
    M: MetricsSink + 'static,
{
    /// Create an engine with a wall-clock health monitor
    pub fn new(
        config: &FallbackConfig,
        registry: ProviderRegistry,
        transport: T,
        credentials: C,
        cache: R,
        metrics: M,
    ) -> Self {
        let health = HealthMonitor::new(
            config.failure_threshold,
            config.recovery_timeout,
            Arc::new(SystemClock),
        );

        Self {
            registry: Arc::new(registry),
            health: Arc::new(health),
            transport: Arc::new(transport),
            credentials: Arc::new(credentials),
            cache: Arc::new(cache),
            metrics: Arc::new(metrics),
            max_retries: config.max_retries,
            backoff: config.backoff,
        }
    }

    /// Replace the health monitor, e.g. to share one across engines
    pub fn with_health_monitor(mut self, health: Arc<HealthMonitor>) -> Self {
        self.health = health;
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn health(&self) -> &HealthMonitor {
        &self.health
    }

    pub fn cache(&self) -> &R {
        &self.cache
    }

    pub fn credentials(&self) -> &C {
        &self.credentials
    }

    pub fn metrics_sink(&self) -> &M {
        &self.metrics
    }

    /// Inbound contract in its flat form
    pub async fn execute_text(
        &self,
        task_type: &str,
        system_message: &str,
        user_prompt: &str,
        max_tokens: u32,
        temperature: f32,
        use_cache: bool,
    ) -> ExecutionResult {
        let request = ExecutionRequest::new(task_type, system_message, user_prompt)
            .with_max_tokens(max_tokens)
            .with_temperature(temperature)
            .with_cache(use_cache);
        self.execute(&request).await
    }

    /// Run one request through cache and fallback chain
    pub async fn execute(&self, request: &ExecutionRequest) -> ExecutionResult {
        self.execute_with_cancel(request, std::future::pending()).await
    }

    /// Like `execute`, abandoning the in-flight call once `deadline` has passed
    pub async fn execute_with_deadline(&self, request: &ExecutionRequest, deadline: Duration) -> ExecutionResult {
        self.execute_with_cancel(request, tokio::time::sleep(deadline)).await
    }

    /// Like `execute`, abandoning the in-flight call as soon as `cancel` completes
    pub async fn execute_with_cancel<F>(&self, request: &ExecutionRequest, cancel: F) -> ExecutionResult
    where
        F: Future<Output = ()>,
    {
        let execution_id = Uuid::new_v4();
        let started = Instant::now();
        tokio::pin!(cancel);

        exec_debug!(
            execution_id,
            task_type = %request.task_type,
            "Executing request (max_tokens={}, temperature={}, use_cache={})",
            request.max_tokens,
            request.temperature,
            request.use_cache
        );

        if let Err(e) = request.validate() {
            exec_warn!(execution_id, "Rejected request: {}", e);
            let result = ExecutionResult::failure(format!("Rejected request: {e}"), started.elapsed(), Vec::new());
            self.record_metrics(execution_id, request, &result).await;
            return result;
        }

        let key = request.use_cache.then(|| cache_key(request));
        if let Some(key) = &key {
            match self.cache.get(key).await {
                Ok(Some(entry)) => {
                    exec_info!(execution_id, provider = %entry.provider_id, "🎯 Served from cache");
                    let result = ExecutionResult::from_cache(entry.provider_id, entry.response_text, started.elapsed());
                    self.record_metrics(execution_id, request, &result).await;
                    return result;
                }
                Ok(None) => exec_debug!(execution_id, "Cache miss"),
                Err(e) => exec_warn!(execution_id, "Cache lookup failed, continuing without it: {}", e),
            }
        }

        let mut attempts: Vec<Attempt> = Vec::new();
        let mut errors: Vec<String> = Vec::new();
        let mut not_configured = 0usize;
        let mut circuit_open = 0usize;

        for spec in self.registry.list() {
            let Some(secret) = self.credentials.resolve(&spec.credential_ref).await else {
                exec_debug!(execution_id, provider = %spec.id, "Skipping provider without credentials");
                not_configured += 1;
                continue;
            };

            if !self.health.is_eligible(&spec.id).await {
                exec_debug!(execution_id, provider = %spec.id, "Skipping provider with open circuit");
                circuit_open += 1;
                continue;
            }

            match self.try_provider(execution_id, spec, request, &secret, &mut cancel).await {
                ProviderOutcome::Succeeded { text, attempt } => {
                    attempts.push(attempt);
                    self.health.record_success(&spec.id).await;

                    if let Some(key) = &key {
                        if let Err(e) = self.cache.put(key, &spec.id, &text).await {
                            exec_warn!(execution_id, "Failed to cache response: {}", e);
                        }
                    }

                    let result = ExecutionResult::success(spec.id.clone(), text, started.elapsed(), attempts);
                    exec_info!(
                        execution_id,
                        provider = %spec.id,
                        fallback_count = result.fallback_count,
                        "✅ Provider {} succeeded after trying {} provider(s)",
                        spec.id,
                        result.fallback_count
                    );
                    self.record_metrics(execution_id, request, &result).await;
                    return result;
                }
                ProviderOutcome::Failed { attempt } => {
                    let detail = attempt.error_detail.clone().unwrap_or_default();
                    exec_warn!(execution_id, provider = %spec.id, "❌ Provider {} exhausted: {}", spec.id, detail);
                    errors.push(format!("{}: {}", spec.id, detail));
                    attempts.push(attempt);
                    self.health.record_failure(&spec.id).await;
                }
                ProviderOutcome::Cancelled { attempt } => {
                    exec_warn!(execution_id, provider = %spec.id, "🛑 Execution cancelled while calling {}", spec.id);
                    attempts.push(attempt);
                    let result = ExecutionResult::failure(
                        format!("Execution cancelled while calling {}", spec.id),
                        started.elapsed(),
                        attempts,
                    );
                    self.record_metrics(execution_id, request, &result).await;
                    return result;
                }
            }
        }

        let diagnostic = if attempts.is_empty() {
            format!(
                "No providers available: {} registered, {} not configured, {} with open circuit",
                self.registry.len(),
                not_configured,
                circuit_open
            )
        } else {
            let quoted: Vec<&str> = errors.iter().take(DIAGNOSTIC_ERRORS).map(String::as_str).collect();
            format!("All {} providers failed. Errors: {}", attempts.len(), quoted.join("; "))
        };

        let result = ExecutionResult::failure(diagnostic, started.elapsed(), attempts);
        exec_error!(execution_id, fallback_count = result.fallback_count, "{}", result.response_text);
        self.record_metrics(execution_id, request, &result).await;
        result
    }

    /// Try one provider with bounded retries and backoff
    async fn try_provider<F>(
        &self,
        execution_id: Uuid,
        spec: &ProviderSpec,
        request: &ExecutionRequest,
        secret: &str,
        cancel: &mut Pin<&mut F>,
    ) -> ProviderOutcome
    where
        F: Future<Output = ()>,
    {
        let started = Instant::now();
        let outbound = build_provider_request(spec, request, secret);
        let max_tries = self.max_retries + 1;
        let mut last_failure = None;

        for retry in 0..max_tries {
            let tries = retry + 1;

            let outcome = tokio::select! {
                biased;
                _ = cancel.as_mut() => None,
                outcome = self.call_once(spec, &outbound) => Some(outcome),
            };

            match outcome {
                None => {
                    return ProviderOutcome::Cancelled {
                        attempt: Attempt::failure(&spec.id, started.elapsed(), tries, ProviderFailure::Cancelled.to_string()),
                    };
                }
                Some(Ok(text)) => {
                    return ProviderOutcome::Succeeded {
                        text,
                        attempt: Attempt::success(&spec.id, started.elapsed(), tries),
                    };
                }
                Some(Err(failure)) => {
                    exec_debug!(
                        execution_id,
                        provider = %spec.id,
                        "Try {}/{} against {} failed: {}",
                        tries,
                        max_tries,
                        spec.id,
                        failure
                    );
                    last_failure = Some(failure);

                    if tries < max_tries {
                        let delay = self.backoff.delay(retry);
                        if !delay.is_zero() {
                            tokio::select! {
                                biased;
                                _ = cancel.as_mut() => {
                                    return ProviderOutcome::Cancelled {
                                        attempt: Attempt::failure(
                                            &spec.id,
                                            started.elapsed(),
                                            tries,
                                            ProviderFailure::Cancelled.to_string(),
                                        ),
                                    };
                                }
                                _ = tokio::time::sleep(delay) => {}
                            }
                        }
                    }
                }
            }
        }

        let detail = last_failure.map(|failure| failure.to_string()).unwrap_or_default();
        ProviderOutcome::Failed {
            attempt: Attempt::failure(&spec.id, started.elapsed(), max_tries, detail),
        }
    }

    /// One bounded call: transport, status check, extraction
    async fn call_once(&self, spec: &ProviderSpec, outbound: &ProviderRequest) -> Result<String, ProviderFailure> {
        let response = match tokio::time::timeout(spec.timeout, self.transport.post_json(outbound)).await {
            Ok(response) => response?,
            Err(_) => return Err(ProviderFailure::Timeout(spec.timeout)),
        };

        if !response.is_success() {
            return Err(ProviderFailure::http(response.status, &response.body));
        }

        spec.kind.extract_text(&response.body)
    }

    /// Best effort: a failing sink is logged and otherwise ignored
    async fn record_metrics(&self, execution_id: Uuid, request: &ExecutionRequest, result: &ExecutionResult) {
        let record = MetricsRecord::from_result(execution_id, &request.task_type, result, Utc::now());
        if let Err(e) = self.metrics.append(record).await {
            log_error(&execution_id, "Metrics append", &e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::error::FallbackError;
    use crate::services::{InMemoryResultCache, ManualClock, MemoryMetricsSink, StaticCredentialSource};
    use crate::traits::{MockMetricsSink, MockResultCache};
    use crate::types::{ProviderKind, TransportResponse};

    #[derive(Clone)]
    enum Behavior {
        Reply(u16, String),
        Hang,
    }

    /// Transport answering by provider id and logging every call
    struct ScriptedTransport {
        behaviors: HashMap<String, Behavior>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn new(behaviors: Vec<(&str, Behavior)>) -> Self {
            Self {
                behaviors: behaviors.into_iter().map(|(id, b)| (id.to_string(), b)).collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn post_json(&self, request: &ProviderRequest) -> Result<TransportResponse, ProviderFailure> {
            self.calls.lock().unwrap().push(request.provider_id.clone());
            match self.behaviors.get(&request.provider_id).cloned() {
                Some(Behavior::Reply(status, body)) => Ok(TransportResponse::new(status, body)),
                Some(Behavior::Hang) => std::future::pending().await,
                None => Err(ProviderFailure::Transport("unknown provider".to_string())),
            }
        }
    }

    fn ok_body(text: &str) -> String {
        serde_json::json!({"choices": [{"message": {"content": text}}]}).to_string()
    }

    fn spec(id: &str, priority: i32) -> ProviderSpec {
        ProviderSpec::new(id, ProviderKind::OpenAiCompatible, format!("http://{id}.test"), format!("{id}_KEY"), "m")
            .with_priority(priority)
    }

    fn credentials(ids: &[&str]) -> StaticCredentialSource {
        ids.iter().map(|id| (format!("{id}_KEY"), "secret".to_string())).collect()
    }

    fn config(max_retries: u32, backoff: BackoffPolicy) -> FallbackConfig {
        FallbackConfig {
            max_retries,
            backoff,
            ..FallbackConfig::default()
        }
    }

    fn memory_cache() -> InMemoryResultCache {
        InMemoryResultCache::new(Duration::from_secs(3600), Arc::new(ManualClock::default()))
    }

    fn request() -> ExecutionRequest {
        ExecutionRequest::new("test", "be brief", "say hi").with_cache(false)
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_between_retries_is_exponential() {
        let transport = ScriptedTransport::new(vec![("a", Behavior::Reply(500, "boom".to_string()))]);
        let engine = FallbackEngine::new(
            &config(3, BackoffPolicy::new(Duration::from_secs(1), Duration::from_secs(8))),
            ProviderRegistry::new(vec![spec("a", 1)]).unwrap(),
            transport,
            credentials(&["a"]),
            memory_cache(),
            MemoryMetricsSink::new(),
        );

        let started = Instant::now();
        let result = engine.execute(&request()).await;
        let elapsed = started.elapsed();

        assert!(!result.succeeded);
        assert_eq!(result.attempts.len(), 1);
        assert_eq!(result.attempts[0].tries, 4);
        assert!(elapsed >= Duration::from_secs(7), "slept {elapsed:?}");
        assert!(elapsed < Duration::from_secs(8), "slept {elapsed:?}");
        assert_eq!(engine.transport.calls.lock().unwrap().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_provider_is_abandoned_at_its_timeout() {
        let transport = ScriptedTransport::new(vec![("slow", Behavior::Hang), ("b", Behavior::Reply(200, ok_body("B")))]);
        let engine = FallbackEngine::new(
            &config(0, BackoffPolicy::none()),
            ProviderRegistry::new(vec![spec("slow", 1).with_timeout(Duration::from_secs(5)), spec("b", 2)]).unwrap(),
            transport,
            credentials(&["slow", "b"]),
            memory_cache(),
            MemoryMetricsSink::new(),
        );

        let started = Instant::now();
        let result = engine.execute(&request()).await;

        assert!(result.succeeded);
        assert_eq!(result.response_text, "B");
        assert_eq!(result.fallback_count, 2);
        let detail = result.attempts[0].error_detail.as_deref().unwrap();
        assert!(detail.contains("timed out"), "{detail}");
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert!(started.elapsed() < Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_cancels_in_flight_call() {
        let transport = ScriptedTransport::new(vec![("a", Behavior::Hang), ("b", Behavior::Reply(200, ok_body("B")))]);
        let engine = FallbackEngine::new(
            &config(2, BackoffPolicy::default()),
            ProviderRegistry::new(vec![spec("a", 1).with_timeout(Duration::from_secs(60)), spec("b", 2)]).unwrap(),
            transport,
            credentials(&["a", "b"]),
            memory_cache(),
            MemoryMetricsSink::new(),
        );

        let result = engine.execute_with_deadline(&request(), Duration::from_secs(2)).await;

        assert!(!result.succeeded);
        assert_eq!(result.fallback_count, 1);
        assert_eq!(result.attempts[0].error_detail.as_deref(), Some("cancelled"));
        assert_eq!(*engine.transport.calls.lock().unwrap(), vec!["a".to_string()]);
        // Cancellation is not the provider's fault
        assert!(engine.health().record("a").await.is_none());
        assert_eq!(engine.metrics_sink().records().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff_sleep() {
        let transport = ScriptedTransport::new(vec![("a", Behavior::Reply(503, "busy".to_string()))]);
        let engine = FallbackEngine::new(
            &config(2, BackoffPolicy::new(Duration::from_secs(10), Duration::from_secs(10))),
            ProviderRegistry::new(vec![spec("a", 1)]).unwrap(),
            transport,
            credentials(&["a"]),
            memory_cache(),
            MemoryMetricsSink::new(),
        );

        let started = Instant::now();
        let result = engine.execute_with_deadline(&request(), Duration::from_secs(3)).await;

        assert!(!result.succeeded);
        assert_eq!(result.attempts[0].tries, 1);
        assert_eq!(result.attempts[0].error_detail.as_deref(), Some("cancelled"));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_failing_metrics_sink_does_not_fail_execution() {
        let mut metrics = MockMetricsSink::new();
        metrics.expect_append().times(1).returning(|_| {
            Err(FallbackError::Metrics {
                message: "disk full".to_string(),
            })
        });

        let engine = FallbackEngine::new(
            &config(0, BackoffPolicy::none()),
            ProviderRegistry::new(vec![spec("a", 1)]).unwrap(),
            ScriptedTransport::new(vec![("a", Behavior::Reply(200, ok_body("fine")))]),
            credentials(&["a"]),
            memory_cache(),
            metrics,
        );

        let result = engine.execute(&request()).await;
        assert!(result.succeeded);
        assert_eq!(result.response_text, "fine");
    }

    #[tokio::test]
    async fn test_broken_cache_is_treated_as_miss() {
        let mut cache = MockResultCache::new();
        cache.expect_get().times(1).returning(|_| {
            Err(FallbackError::Cache {
                message: "unreadable".to_string(),
            })
        });
        cache.expect_put().times(1).returning(|_, _, _| {
            Err(FallbackError::Cache {
                message: "read-only".to_string(),
            })
        });

        let engine = FallbackEngine::new(
            &config(0, BackoffPolicy::none()),
            ProviderRegistry::new(vec![spec("a", 1)]).unwrap(),
            ScriptedTransport::new(vec![("a", Behavior::Reply(200, ok_body("fresh")))]),
            credentials(&["a"]),
            cache,
            MemoryMetricsSink::new(),
        );

        let result = engine.execute(&request().with_cache(true)).await;
        assert!(result.succeeded);
        assert!(!result.served_from_cache);
        assert_eq!(result.response_text, "fresh");
    }

    #[tokio::test]
    async fn test_invalid_request_makes_no_calls() {
        let engine = FallbackEngine::new(
            &config(0, BackoffPolicy::none()),
            ProviderRegistry::new(vec![spec("a", 1)]).unwrap(),
            ScriptedTransport::new(vec![("a", Behavior::Reply(200, ok_body("x")))]),
            credentials(&["a"]),
            memory_cache(),
            MemoryMetricsSink::new(),
        );

        let result = engine.execute(&ExecutionRequest::new("test", "", "   ")).await;

        assert!(!result.succeeded);
        assert_eq!(result.fallback_count, 0);
        assert!(result.response_text.starts_with("Rejected request"));
        assert!(engine.transport.calls.lock().unwrap().is_empty());
        assert_eq!(engine.metrics_sink().records().await.len(), 1);
    }

    #[tokio::test]
    async fn test_execute_text_matches_execute() {
        let engine = FallbackEngine::new(
            &config(0, BackoffPolicy::none()),
            ProviderRegistry::new(vec![spec("a", 1)]).unwrap(),
            ScriptedTransport::new(vec![("a", Behavior::Reply(200, ok_body("flat")))]),
            credentials(&["a"]),
            memory_cache(),
            MemoryMetricsSink::new(),
        );

        let result = engine.execute_text("test", "sys", "prompt", 64, 0.2, true).await;
        assert!(result.succeeded);
        assert_eq!(result.provider_id, "a");

        let again = engine.execute_text("test", "sys", "prompt", 64, 0.2, true).await;
        assert!(again.served_from_cache);
        assert_eq!(engine.transport.calls.lock().unwrap().len(), 1);
    }
}
