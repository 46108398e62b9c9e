//! Multi-attempt execution with classified failures.
//!
//! Both entry points share one policy: attempt 0 runs immediately; after a
//! failure the [`ErrorClassifier`] decides. Non-retryable failures stop at
//! once. Retryable ones wait `base * 2^attempt + jitter` while attempts
//! remain. The final failure is surfaced as a single [`CatalogError`] that
//! keeps the last [`StorageError`] as its source and reports the attempts
//! made.
//!
//! rusqlite transactions are synchronous, so [`TransactionRunner::execute_transaction`]
//! blocks between attempts. [`TransactionRunner::execute_transaction_async`]
//! moves each attempt onto the blocking pool and sleeps on the tokio timer
//! instead.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use rusqlite::Transaction;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, warn};

use super::backoff::{self, Backoff};
use super::classifier::{ErrorClassification, ErrorClassifier, SubstringClassifier};
use super::config::ResilienceConfig;
use super::executor::{OperationExecutor, OperationLabel};
use crate::error::{CatalogError, CatalogResult};
use crate::storage::error::panic_message;
use crate::storage::{StorageError, StorageResult, TransactionalStore};

const TRANSACTION_LABEL: OperationLabel<'static> = OperationLabel::new("transaction", "*");

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Correlation id echoed in logs and in the returned error
    pub request_id: Option<String>,
    /// Retries after the first attempt; `None` uses the configured default
    pub retries: Option<u32>,
    /// Aborts backoff and backpressure waits
    pub cancel: Option<CancellationToken>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    #[must_use]
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    #[must_use]
    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Result of a multi-attempt run.
#[derive(Debug)]
pub struct TransactionOutcome<T> {
    pub result: CatalogResult<T>,
    /// Attempts actually made, at least one unless cancelled up front
    pub attempts: u32,
}

impl<T> TransactionOutcome<T> {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn last_error(&self) -> Option<&CatalogError> {
        self.result.as_ref().err()
    }

    pub fn into_result(self) -> CatalogResult<T> {
        self.result
    }
}

enum Step {
    Retry(Duration),
    GiveUp(ErrorClassification),
}

/// Retry orchestration over an [`OperationExecutor`].
#[derive(Debug, Clone)]
pub struct TransactionRunner {
    executor: OperationExecutor,
    classifier: Arc<dyn ErrorClassifier>,
    backoff: Backoff,
    default_retries: u32,
    default_transaction_retries: u32,
}

impl TransactionRunner {
    pub fn new(config: &ResilienceConfig, executor: OperationExecutor) -> Self {
        Self::with_classifier(config, executor, Arc::new(SubstringClassifier))
    }

    pub fn with_classifier(
        config: &ResilienceConfig,
        executor: OperationExecutor,
        classifier: Arc<dyn ErrorClassifier>,
    ) -> Self {
        Self {
            executor,
            classifier,
            backoff: Backoff::from_config(config),
            default_retries: config.default_retries,
            default_transaction_retries: config.default_transaction_retries,
        }
    }

    pub fn executor(&self) -> &OperationExecutor {
        &self.executor
    }

    pub fn classifier(&self) -> &dyn ErrorClassifier {
        self.classifier.as_ref()
    }

    /* ---------------------------------------------------------------------- */
    /* Single operations */
    /* ---------------------------------------------------------------------- */

    /// Run an async operation through the executor with retries
    /// (default 2).
    pub async fn execute_with_retry<T, F, Fut>(
        &self,
        name: &str,
        table: &str,
        options: RunOptions,
        op: F,
    ) -> CatalogResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StorageResult<T>>,
    {
        self.execute_with_retry_outcome(name, table, options, op).await.into_result()
    }

    #[instrument(skip_all, fields(operation = name, table = table, request_id = options.request_id.as_deref()))]
    pub async fn execute_with_retry_outcome<T, F, Fut>(
        &self,
        name: &str,
        table: &str,
        options: RunOptions,
        op: F,
    ) -> TransactionOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StorageResult<T>>,
    {
        let label = OperationLabel::new(name, table).with_request_id(options.request_id.as_deref());
        let retries = options.retries.unwrap_or(self.default_retries);
        let cancel = options.cancel.as_ref();

        self.run_async(&label, retries, cancel, Some(&self.executor), op).await
    }

    /// Blocking counterpart of [`Self::execute_with_retry`].
    pub fn execute_with_retry_blocking<T, F>(
        &self,
        name: &str,
        table: &str,
        options: RunOptions,
        op: F,
    ) -> CatalogResult<T>
    where
        F: FnMut() -> StorageResult<T>,
    {
        self.execute_with_retry_blocking_outcome(name, table, options, op).into_result()
    }

    #[instrument(skip_all, fields(operation = name, table = table, request_id = options.request_id.as_deref()))]
    pub fn execute_with_retry_blocking_outcome<T, F>(
        &self,
        name: &str,
        table: &str,
        options: RunOptions,
        op: F,
    ) -> TransactionOutcome<T>
    where
        F: FnMut() -> StorageResult<T>,
    {
        let label = OperationLabel::new(name, table).with_request_id(options.request_id.as_deref());
        let retries = options.retries.unwrap_or(self.default_retries);
        let cancel = options.cancel.as_ref();

        self.run_blocking(&label, retries, cancel, Some(&self.executor), op)
    }

    /* ---------------------------------------------------------------------- */
    /* Transactions */
    /* ---------------------------------------------------------------------- */

    /// Run `f` inside a store transaction with retries (default 0). The
    /// transaction commits when `f` returns `Ok` and rolls back otherwise.
    pub fn execute_transaction<S, T, F>(&self, store: &S, options: RunOptions, f: F) -> CatalogResult<T>
    where
        S: TransactionalStore,
        F: FnMut(&Transaction<'_>) -> StorageResult<T>,
    {
        self.execute_transaction_outcome(store, options, f).into_result()
    }

    #[instrument(skip_all, fields(request_id = options.request_id.as_deref()))]
    pub fn execute_transaction_outcome<S, T, F>(
        &self,
        store: &S,
        options: RunOptions,
        mut f: F,
    ) -> TransactionOutcome<T>
    where
        S: TransactionalStore,
        F: FnMut(&Transaction<'_>) -> StorageResult<T>,
    {
        let label = TRANSACTION_LABEL.with_request_id(options.request_id.as_deref());
        let retries = options.retries.unwrap_or(self.default_transaction_retries);

        self.run_blocking(&label, retries, options.cancel.as_ref(), None, || {
            std::panic::catch_unwind(AssertUnwindSafe(|| store.transaction(|tx| f(tx))))
                .unwrap_or_else(|payload| Err(StorageError::Panicked(panic_message(payload.as_ref()))))
        })
    }

    /// Suspending variant of [`Self::execute_transaction`]: every attempt
    /// runs on the blocking pool and the backoff sleeps on the tokio timer.
    pub async fn execute_transaction_async<S, T, F>(
        &self,
        store: Arc<S>,
        options: RunOptions,
        f: F,
    ) -> CatalogResult<T>
    where
        S: TransactionalStore + 'static,
        T: Send + 'static,
        F: Fn(&Transaction<'_>) -> StorageResult<T> + Send + Sync + 'static,
    {
        self.execute_transaction_async_outcome(store, options, f).await.into_result()
    }

    #[instrument(skip_all, fields(request_id = options.request_id.as_deref()))]
    pub async fn execute_transaction_async_outcome<S, T, F>(
        &self,
        store: Arc<S>,
        options: RunOptions,
        f: F,
    ) -> TransactionOutcome<T>
    where
        S: TransactionalStore + 'static,
        T: Send + 'static,
        F: Fn(&Transaction<'_>) -> StorageResult<T> + Send + Sync + 'static,
    {
        let label = TRANSACTION_LABEL.with_request_id(options.request_id.as_deref());
        let retries = options.retries.unwrap_or(self.default_transaction_retries);
        let f = Arc::new(f);

        self.run_async(&label, retries, options.cancel.as_ref(), None, || {
            let store = Arc::clone(&store);
            let f = Arc::clone(&f);
            async move {
                tokio::task::spawn_blocking(move || store.transaction(|tx| f(tx)))
                    .await
                    .unwrap_or_else(|join_err| Err(StorageError::from(join_err)))
            }
        })
        .await
    }

    /* ---------------------------------------------------------------------- */
    /* Shared retry loop */
    /* ---------------------------------------------------------------------- */

    /// Shared loop for the suspending entry points. Attempts go through
    /// `executor` when given, so they are tracked and recorded.
    async fn run_async<T, A, Fut>(
        &self,
        label: &OperationLabel<'_>,
        retries: u32,
        cancel: Option<&CancellationToken>,
        executor: Option<&OperationExecutor>,
        mut attempt_fn: A,
    ) -> TransactionOutcome<T>
    where
        A: FnMut() -> Fut,
        Fut: Future<Output = StorageResult<T>>,
    {
        let mut attempt = 0;
        let mut last_err: Option<StorageError> = None;
        loop {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                return self.cancelled(label, attempt, last_err.as_ref());
            }

            let result = match executor {
                Some(executor) => {
                    executor.execute_cancellable(label, cancel, &mut attempt_fn).await.into_result()
                }
                None => attempt_fn().await,
            };
            let err = match result {
                Ok(value) => return self.succeeded(label, value, attempt + 1),
                // Cancelled while waiting on backpressure; the operation never ran.
                Err(err) if err.is_cancelled() => {
                    return self.cancelled(label, attempt, last_err.as_ref());
                }
                Err(err) => err,
            };

            match self.next_step(label, &err, attempt, retries) {
                Step::Retry(delay) => {
                    if backoff::wait(delay, cancel).await.is_err() {
                        return self.cancelled(label, attempt + 1, Some(&err));
                    }
                    last_err = Some(err);
                    attempt += 1;
                }
                Step::GiveUp(classification) => {
                    return self.give_up(label, err, classification, attempt + 1);
                }
            }
        }
    }

    fn run_blocking<T, A>(
        &self,
        label: &OperationLabel<'_>,
        retries: u32,
        cancel: Option<&CancellationToken>,
        executor: Option<&OperationExecutor>,
        mut attempt_fn: A,
    ) -> TransactionOutcome<T>
    where
        A: FnMut() -> StorageResult<T>,
    {
        let mut attempt = 0;
        let mut last_err: Option<StorageError> = None;
        loop {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                return self.cancelled(label, attempt, last_err.as_ref());
            }

            let result = match executor {
                Some(executor) => executor.execute_blocking(label, cancel, &mut attempt_fn).into_result(),
                None => attempt_fn(),
            };
            let err = match result {
                Ok(value) => return self.succeeded(label, value, attempt + 1),
                // Cancelled while waiting on backpressure; the operation never ran.
                Err(err) if err.is_cancelled() => {
                    return self.cancelled(label, attempt, last_err.as_ref());
                }
                Err(err) => err,
            };

            match self.next_step(label, &err, attempt, retries) {
                Step::Retry(delay) => {
                    if backoff::wait_blocking(delay, cancel).is_err() {
                        return self.cancelled(label, attempt + 1, Some(&err));
                    }
                    last_err = Some(err);
                    attempt += 1;
                }
                Step::GiveUp(classification) => {
                    return self.give_up(label, err, classification, attempt + 1);
                }
            }
        }
    }

    fn next_step(&self, label: &OperationLabel<'_>, err: &StorageError, attempt: u32, retries: u32) -> Step {
        let classification = self.classifier.classify(err);

        if !classification.retryable {
            debug!(
                operation = label.name,
                request_id = label.request_id,
                code = %classification.code,
                "non-retryable failure, not retrying"
            );
            return Step::GiveUp(classification);
        }
        if attempt >= retries {
            return Step::GiveUp(classification);
        }

        let delay = self.backoff.delay(attempt);
        warn!(
            operation = label.name,
            table = label.table,
            request_id = label.request_id,
            attempt = attempt + 1,
            max_attempts = retries.saturating_add(1),
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %err,
            "retrying database operation"
        );
        Step::Retry(delay)
    }

    fn succeeded<T>(&self, label: &OperationLabel<'_>, value: T, attempts: u32) -> TransactionOutcome<T> {
        if attempts > 1 {
            debug!(operation = label.name, request_id = label.request_id, attempts, "succeeded after retry");
        }
        TransactionOutcome { result: Ok(value), attempts }
    }

    fn give_up<T>(
        &self,
        label: &OperationLabel<'_>,
        err: StorageError,
        classification: ErrorClassification,
        attempts: u32,
    ) -> TransactionOutcome<T> {
        error!(
            operation = label.name,
            table = label.table,
            request_id = label.request_id,
            attempts,
            code = %classification.code,
            error = %err,
            "database operation failed"
        );
        let error = CatalogError::from_source(classification.code, err)
            .with_request_id(label.request_id)
            .with_attempts(attempts);
        TransactionOutcome { result: Err(error), attempts }
    }

    fn cancelled<T>(
        &self,
        label: &OperationLabel<'_>,
        attempts: u32,
        last: Option<&StorageError>,
    ) -> TransactionOutcome<T> {
        warn!(operation = label.name, request_id = label.request_id, attempts, "database operation cancelled");
        let mut error = CatalogError::cancelled(label.name)
            .with_request_id(label.request_id)
            .with_attempts(attempts);
        if let Some(last) = last {
            error = error.with_details(json!({ "lastError": last.to_string() }));
        }
        TransactionOutcome { result: Err(error), attempts }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    use tempfile::TempDir;
    use uuid::Uuid;

    use super::*;
    use crate::error::ErrorCode;
    use crate::resilience::connection::ConnectionManager;
    use crate::resilience::monitor::PerformanceMonitor;
    use crate::storage::{SqlitePool, StorageConfig};

    fn runner_with(config: ResilienceConfig) -> TransactionRunner {
        let connections = Arc::new(ConnectionManager::new(config.max_concurrency));
        let monitor = Arc::new(PerformanceMonitor::new(&config, Arc::clone(&connections)));
        let executor = OperationExecutor::new(&config, connections, monitor);
        TransactionRunner::new(&config, executor)
    }

    fn fast_runner() -> TransactionRunner {
        runner_with(ResilienceConfig { base_backoff_ms: 1, max_jitter_ms: 0, ..ResilienceConfig::default() })
    }

    fn locked() -> StorageError {
        StorageError::Query("database is locked".into())
    }

    fn pool(dir: &TempDir) -> SqlitePool {
        let pool = SqlitePool::new(StorageConfig::new(dir.path().join("runner.db"))).unwrap();
        pool.with_connection(|conn| {
            conn.execute_batch("CREATE TABLE books (id INTEGER PRIMARY KEY, isbn TEXT NOT NULL UNIQUE)")?;
            Ok(())
        })
        .unwrap();
        pool
    }

    #[tokio::test]
    async fn test_retry_succeeds_on_third_attempt() {
        let runner = runner_with(ResilienceConfig::default());
        let calls = AtomicU32::new(0);

        let start = Instant::now();
        let value = runner
            .execute_with_retry("select", "books", RunOptions::new(), || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { if n < 2 { Err(locked()) } else { Ok("found") } }
            })
            .await
            .unwrap();

        assert_eq!(value, "found");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(start.elapsed() >= Duration::from_millis(300));
        assert_eq!(runner.executor().monitor().len(), 3);
    }

    #[test]
    fn test_exhausted_retries_report_attempts() {
        let runner = fast_runner();
        let calls = AtomicU32::new(0);

        let outcome = runner.execute_with_retry_blocking_outcome(
            "update",
            "books",
            RunOptions::new().request_id("req-7"),
            || -> StorageResult<()> {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(locked())
            },
        );

        assert_eq!(outcome.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let err = outcome.last_error().unwrap();
        assert_eq!(err.code(), ErrorCode::DatabaseError);
        assert_eq!(err.message(), "Database query error: database is locked");
        assert_eq!(err.attempts(), Some(3));
        assert_eq!(err.request_id(), Some("req-7"));
        assert!(err.source_as::<StorageError>().is_some());
    }

    #[test]
    fn test_non_retryable_stops_immediately() {
        let runner = fast_runner();
        let calls = AtomicU32::new(0);

        let err = runner
            .execute_with_retry_blocking("insert", "books", RunOptions::new().retries(5), || -> StorageResult<()> {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(StorageError::Query("UNIQUE constraint failed: books.isbn".into()))
            })
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(err.code(), ErrorCode::Conflict);
        assert_eq!(err.attempts(), Some(1));
    }

    #[test]
    fn test_transaction_non_retryable_runs_once() {
        let dir = TempDir::new().unwrap();
        let pool = pool(&dir);
        let runner = fast_runner();
        let mut calls = 0;

        let err = runner
            .execute_transaction(&pool, RunOptions::new().retries(5), |tx| {
                calls += 1;
                tx.execute("INSERT INTO books (isbn) VALUES ('a')", [])?;
                tx.execute("INSERT INTO books (isbn) VALUES ('a')", [])?;
                Ok(())
            })
            .unwrap_err();

        assert_eq!(calls, 1);
        assert_eq!(err.code(), ErrorCode::Conflict);
        assert!(err.message().contains("UNIQUE constraint failed"));

        let count: i64 = pool
            .with_connection(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM books", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_transaction_defaults_to_single_attempt() {
        let dir = TempDir::new().unwrap();
        let pool = pool(&dir);
        let runner = fast_runner();

        let outcome = runner.execute_transaction_outcome(&pool, RunOptions::new(), |_tx| -> StorageResult<()> {
            Err(locked())
        });

        assert_eq!(outcome.attempts, 1);
        assert!(!outcome.is_success());
    }

    #[test]
    fn test_transaction_retries_transient_failure() {
        let dir = TempDir::new().unwrap();
        let pool = pool(&dir);
        let runner = fast_runner();
        let mut calls = 0;

        let id = runner
            .execute_transaction(&pool, RunOptions::new().retries(2), |tx| {
                calls += 1;
                tx.execute("INSERT INTO books (isbn) VALUES (?1)", [format!("isbn-{calls}")])?;
                if calls == 1 {
                    return Err(locked());
                }
                Ok(tx.last_insert_rowid())
            })
            .unwrap();

        assert_eq!(calls, 2);
        let isbns: Vec<String> = pool
            .with_connection(|conn| {
                let mut stmt = conn.prepare("SELECT isbn FROM books WHERE id = ?1")?;
                let rows = stmt.query_map([id], |r| r.get(0))?.collect::<Result<_, _>>()?;
                Ok(rows)
            })
            .unwrap();
        assert_eq!(isbns, vec!["isbn-2".to_string()]);
    }

    #[tokio::test]
    async fn test_async_transaction_commits() {
        let dir = TempDir::new().unwrap();
        let pool = Arc::new(pool(&dir));
        let runner = fast_runner();

        let inserted = runner
            .execute_transaction_async(Arc::clone(&pool), RunOptions::new(), |tx| {
                tx.execute("INSERT INTO books (isbn) VALUES ('x')", [])?;
                tx.execute("INSERT INTO books (isbn) VALUES ('y')", [])?;
                Ok(2)
            })
            .await
            .unwrap();

        assert_eq!(inserted, 2);
    }

    #[tokio::test]
    async fn test_async_transaction_panic_is_internal_error() {
        let dir = TempDir::new().unwrap();
        let pool = Arc::new(pool(&dir));
        let runner = fast_runner();

        let err = runner
            .execute_transaction_async(pool, RunOptions::new().retries(3), |_tx| -> StorageResult<()> {
                panic!("bad row mapper")
            })
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::InternalError);
        assert_eq!(err.attempts(), Some(1));
        assert!(err.message().contains("bad row mapper"));
    }

    #[tokio::test]
    async fn test_cancel_during_backoff() {
        let runner = runner_with(ResilienceConfig { base_backoff_ms: 5_000, ..ResilienceConfig::default() });
        let token = CancellationToken::new();
        let trigger = token.clone();
        let calls = AtomicU32::new(0);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let outcome = runner
            .execute_with_retry_outcome("select", "tags", RunOptions::new().cancel(token), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(locked()) }
            })
            .await;

        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let err = outcome.last_error().unwrap();
        assert_eq!(err.code(), ErrorCode::OperationCancelled);
        assert_eq!(err.status(), 499);
        assert_eq!(err.details().unwrap()["lastError"], "Database query error: database is locked");
    }

    #[test]
    fn test_pre_cancelled_token_skips_work() {
        let runner = fast_runner();
        let token = CancellationToken::new();
        token.cancel();
        let mut called = false;

        let outcome = runner.execute_with_retry_blocking_outcome(
            "select",
            "tags",
            RunOptions::new().cancel(token),
            || -> StorageResult<()> {
                called = true;
                Ok(())
            },
        );

        assert!(!called);
        assert_eq!(outcome.attempts, 0);
        assert_eq!(outcome.last_error().unwrap().code(), ErrorCode::OperationCancelled);
    }

    #[test]
    fn test_unbounded_retries_log_without_overflow() {
        let runner = fast_runner();
        let calls = AtomicU32::new(0);
        let subscriber =
            tracing_subscriber::fmt().with_max_level(tracing::Level::WARN).with_test_writer().finish();

        let outcome = tracing::subscriber::with_default(subscriber, || {
            runner.execute_with_retry_blocking_outcome(
                "select",
                "books",
                RunOptions::new().retries(u32::MAX),
                || -> StorageResult<&str> {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(locked())
                    } else {
                        Ok("found")
                    }
                },
            )
        });

        assert!(outcome.is_success());
        assert_eq!(outcome.attempts, 2);
    }

    #[tokio::test]
    async fn test_cancel_during_backpressure_keeps_last_error() {
        let runner = runner_with(ResilienceConfig {
            max_concurrency: 2,
            backpressure_delay_ms: 5_000,
            base_backoff_ms: 1,
            max_jitter_ms: 0,
            ..ResilienceConfig::default()
        });
        let connections = Arc::clone(runner.executor().connections());
        let token = CancellationToken::new();
        let trigger = token.clone();
        let calls = AtomicU32::new(0);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let outcome = runner
            .execute_with_retry_outcome("select", "books", RunOptions::new().retries(3).cancel(token), || {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    // hold a slot so the retry waits on backpressure
                    connections.track_query(Uuid::new_v4());
                }
                async { Err::<(), _>(locked()) }
            })
            .await;

        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.attempts, 1);

        let err = outcome.last_error().unwrap();
        assert_eq!(err.code(), ErrorCode::OperationCancelled);
        assert_eq!(err.message(), "Operation 'select' cancelled");
        assert_eq!(err.attempts(), Some(1));
        assert_eq!(err.details().unwrap()["lastError"], "Database query error: database is locked");
        // the cancelled wait is still sampled
        assert_eq!(runner.executor().monitor().len(), 2);
    }
}
