//! Integration tests for the resilience layer
//!
//! Drives the runner, executor, connection manager and monitor together the
//! way the catalog repositories do.

#![cfg(feature = "runtime")]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use catalog_common::resilience::{
    classify_database_error, is_non_retryable_error, MockClock, ResilienceContext, RunOptions,
};
use catalog_common::{ErrorCode, ResilienceConfig, StorageError, StorageResult};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

fn locked() -> StorageError {
    StorageError::Query("database is locked".to_string())
}

fn quick_config() -> ResilienceConfig {
    ResilienceConfig { base_backoff_ms: 1, max_jitter_ms: 0, ..ResilienceConfig::default() }
}

/// Constraint failures are conflicts and are never retried; lock contention
/// falls through to a retryable database error.
#[test]
fn test_classification_properties() {
    let unique = "UNIQUE constraint failed: books.isbn";
    assert_eq!(classify_database_error(unique), ErrorCode::Conflict);
    assert!(is_non_retryable_error(unique));

    let locked = "database is locked";
    assert_eq!(classify_database_error(locked), ErrorCode::DatabaseError);
    assert!(!is_non_retryable_error(locked));
}

/// Two retryable failures followed by success: three calls and at least the
/// 100 ms + 200 ms backoff.
#[tokio::test]
async fn test_retry_waits_exponential_backoff() {
    let ctx = ResilienceContext::default();
    let calls = AtomicU32::new(0);

    let start = Instant::now();
    let title = ctx
        .runner()
        .execute_with_retry("find_by_id", "books", RunOptions::new().request_id("req-42"), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(locked())
                } else {
                    Ok("Dune".to_string())
                }
            }
        })
        .await
        .unwrap();

    assert_eq!(title, "Dune");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(start.elapsed() >= Duration::from_millis(300));

    let metrics = ctx.metrics();
    assert_eq!(metrics.query_count, 3);
    assert!((metrics.error_rate - 66.67).abs() < 1e-9);
    assert_eq!(ctx.connections().active_count(), 0);
}

#[test]
fn test_exhausted_retries_keep_original_message() {
    let ctx = ResilienceContext::new(quick_config());

    let err = ctx
        .runner()
        .execute_with_retry_blocking("delete", "tags", RunOptions::new().retries(4), || -> StorageResult<()> {
            Err(StorageError::Connection("connection refused".into()))
        })
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::DatabaseError);
    assert_eq!(err.attempts(), Some(5));
    assert_eq!(err.message(), "Database connection error: connection refused");
    assert!(matches!(err.source_as::<StorageError>(), Some(StorageError::Connection(_))));
    assert_eq!(ctx.metrics().query_count, 5);
}

/// Saturated callers still run; they are only delayed.
#[tokio::test]
async fn test_backpressure_does_not_drop_work() {
    let ctx = ResilienceContext::new(ResilienceConfig { max_concurrency: 2, ..quick_config() });
    let held: Vec<Uuid> = (0..2).map(|_| Uuid::new_v4()).collect();
    for id in &held {
        ctx.connections().track_query(*id);
    }
    assert!(ctx.connections().is_overloaded());
    assert!(ctx.metrics().connection_stats.overloaded);

    let start = Instant::now();
    let value = ctx
        .runner()
        .execute_with_retry("count", "books", RunOptions::new(), || async { Ok(3) })
        .await
        .unwrap();

    assert_eq!(value, 3);
    assert!(start.elapsed() >= Duration::from_millis(50));
    for id in &held {
        ctx.connections().release_query(*id);
    }
    assert_eq!(ctx.connections().active_count(), 0);
}

#[tokio::test]
async fn test_concurrent_callers_leave_no_residue() {
    let ctx = Arc::new(ResilienceContext::new(quick_config()));

    let tasks: Vec<_> = (0..32)
        .map(|i| {
            let ctx = Arc::clone(&ctx);
            tokio::spawn(async move {
                ctx.runner()
                    .execute_with_retry("select", "books", RunOptions::new().retries(0), || async move {
                        tokio::time::sleep(Duration::from_millis(2)).await;
                        if i % 4 == 0 {
                            Err(StorageError::Query("CHECK constraint failed: pages".into()))
                        } else {
                            Ok(i)
                        }
                    })
                    .await
            })
        })
        .collect();

    let mut failures = 0;
    for task in tasks {
        if let Err(err) = task.await.unwrap() {
            assert_eq!(err.code(), ErrorCode::ValidationError);
            failures += 1;
        }
    }

    assert_eq!(failures, 8);
    assert_eq!(ctx.connections().active_count(), 0);
    let metrics = ctx.metrics();
    assert_eq!(metrics.query_count, 32);
    assert!((metrics.error_rate - 25.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_cancellation_stops_retrying() {
    let ctx = ResilienceContext::new(ResilienceConfig { base_backoff_ms: 10_000, ..ResilienceConfig::default() });
    let token = CancellationToken::new();
    let calls = AtomicU32::new(0);

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(25)).await;
        canceller.cancel();
    });

    let err = ctx
        .runner()
        .execute_with_retry("select", "books", RunOptions::new().retries(3).cancel(token), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(locked()) }
        })
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::OperationCancelled);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(err.envelope().error, ErrorCode::OperationCancelled);
}

#[test]
fn test_metrics_window_with_mock_clock() {
    let clock = MockClock::new();
    let ctx = ResilienceContext::builder(ResilienceConfig::default()).clock(Arc::new(clock.clone())).build();

    for _ in 0..5 {
        ctx.monitor().record_query(50, true);
    }
    ctx.monitor().record_query(1500, false);

    let metrics = ctx.metrics();
    assert_eq!(metrics.query_count, 6);
    assert_eq!(metrics.slow_queries, 1);
    assert_eq!(metrics.average_query_time, 292);
    assert!((metrics.error_rate - 16.67).abs() < 1e-9);

    clock.advance(Duration::from_millis(400_000));
    assert_eq!(ctx.metrics().query_count, 0);

    ctx.monitor().clear_metrics();
    assert!(ctx.monitor().is_empty());
}
