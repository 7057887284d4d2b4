//! Integration tests for per-execution metrics records

mod common;
use common::{EngineBuilder, TestFixtures, TestHelpers};

use fallback::core::summarize;

/// Every execution leaves exactly one record, whatever its outcome
#[tokio::test]
async fn test_one_record_per_execution() {
    let harness = EngineBuilder::new()
        .with_provider("a", 1)
        .with_provider("b", 2)
        .with_transport(|t| {
            TestHelpers::expect_server_error(t, "a", 2);
            TestHelpers::expect_flaky(t, "b", 1, "B", 2);
        })
        .build();
    let request = TestFixtures::request();

    let failed = harness.engine.execute(&request).await;
    let succeeded = harness.engine.execute(&request).await;
    let cached = harness.engine.execute(&request).await;

    assert!(!failed.succeeded);
    assert!(succeeded.succeeded);
    assert!(cached.served_from_cache);

    let records = harness.engine.metrics_sink().records().await;
    assert_eq!(records.len(), 3);

    assert!(!records[0].succeeded);
    assert_eq!(records[0].provider_id, shared::NO_PROVIDER);
    assert_eq!(records[0].fallback_count, 2);

    assert_eq!(records[1].provider_id, "b");
    assert_eq!(records[1].attempts.len(), 2);

    assert!(records[2].served_from_cache);
    assert_eq!(records[2].fallback_count, 0);
    assert!(records.iter().all(|r| r.task_type == TestFixtures::TASK_TYPE));

    let ids: std::collections::HashSet<_> = records.iter().map(|r| r.execution_id).collect();
    assert_eq!(ids.len(), 3);
}

#[tokio::test]
async fn test_summary_over_recorded_executions() {
    let harness = EngineBuilder::new()
        .with_provider("a", 1)
        .with_provider("b", 2)
        .with_transport(|t| {
            TestHelpers::expect_server_error(t, "a", 2);
            TestHelpers::expect_success(t, "b", "B", 2);
        })
        .build();

    for _ in 0..2 {
        harness.engine.execute(&TestFixtures::uncached_request()).await;
    }

    let records = harness.engine.metrics_sink().records().await;
    let summary = summarize(&records);

    assert_eq!(summary.executions, 2);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.cache_hits, 0);
    assert!((summary.avg_fallback_count() - 2.0).abs() < f64::EPSILON);
    assert_eq!(summary.by_provider["a"].failures, 2);
    assert_eq!(summary.by_provider["b"].successes, 2);
}
