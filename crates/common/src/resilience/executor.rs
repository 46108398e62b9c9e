//! Single-operation execution.
//!
//! [`OperationExecutor`] wraps one call to the database: it registers a
//! tracking id with the [`ConnectionManager`], applies the backpressure delay
//! when saturated, times the call, and records the outcome with the
//! [`PerformanceMonitor`]. Failures and panics are captured in the returned
//! [`ExecutionResult`]; nothing is propagated past this boundary.
//!
//! Release and metric recording happen exactly once per call. A guard owns
//! both, so they also run when an async caller drops the future mid-flight.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use super::backoff;
use super::config::ResilienceConfig;
use super::connection::ConnectionManager;
use super::monitor::PerformanceMonitor;
use crate::storage::error::panic_message;
use crate::storage::{StorageError, StorageResult};

/// Descriptive labels attached to every log line of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationLabel<'a> {
    pub name: &'a str,
    pub table: &'a str,
    pub request_id: Option<&'a str>,
}

impl<'a> OperationLabel<'a> {
    pub const fn new(name: &'a str, table: &'a str) -> Self {
        Self { name, table, request_id: None }
    }

    #[must_use]
    pub const fn with_request_id(mut self, request_id: Option<&'a str>) -> Self {
        self.request_id = request_id;
        self
    }
}

/// Outcome and wall time of one execution.
#[derive(Debug)]
pub struct ExecutionResult<T> {
    pub outcome: StorageResult<T>,
    pub duration: Duration,
}

impl<T> ExecutionResult<T> {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn data(&self) -> Option<&T> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&StorageError> {
        self.outcome.as_ref().err()
    }

    pub fn duration_ms(&self) -> u64 {
        duration_ms(self.duration)
    }

    pub fn into_result(self) -> StorageResult<T> {
        self.outcome
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Times and records one operation.
#[derive(Debug, Clone)]
pub struct OperationExecutor {
    connections: Arc<ConnectionManager>,
    monitor: Arc<PerformanceMonitor>,
    backpressure_delay: Duration,
    slow_threshold: Duration,
}

impl OperationExecutor {
    pub fn new(
        config: &ResilienceConfig,
        connections: Arc<ConnectionManager>,
        monitor: Arc<PerformanceMonitor>,
    ) -> Self {
        Self {
            connections,
            monitor,
            backpressure_delay: config.backpressure_delay(),
            slow_threshold: config.slow_query_threshold(),
        }
    }

    pub fn connections(&self) -> &Arc<ConnectionManager> {
        &self.connections
    }

    pub fn monitor(&self) -> &Arc<PerformanceMonitor> {
        &self.monitor
    }

    /// Run an async operation.
    pub async fn execute<T, F, Fut>(&self, label: &OperationLabel<'_>, op: F) -> ExecutionResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = StorageResult<T>>,
    {
        self.execute_cancellable(label, None, op).await
    }

    /// Run an async operation; a fired token aborts the backpressure wait.
    pub async fn execute_cancellable<T, F, Fut>(
        &self,
        label: &OperationLabel<'_>,
        cancel: Option<&CancellationToken>,
        op: F,
    ) -> ExecutionResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = StorageResult<T>>,
    {
        let mut guard = InFlight::register(self, label);

        if self.connections.is_overloaded() {
            debug!(
                operation = label.name,
                request_id = label.request_id,
                delay_ms = duration_ms(self.backpressure_delay),
                "connection manager saturated, applying backpressure"
            );
            if let Err(err) = backoff::wait(self.backpressure_delay, cancel).await {
                return guard.finish(Err(err));
            }
        }

        guard.start();
        let outcome = AssertUnwindSafe(async move { op().await })
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(StorageError::Panicked(panic_message(payload.as_ref()))));
        guard.finish(outcome)
    }

    /// Run a blocking operation on the current thread.
    pub fn execute_blocking<T, F>(
        &self,
        label: &OperationLabel<'_>,
        cancel: Option<&CancellationToken>,
        op: F,
    ) -> ExecutionResult<T>
    where
        F: FnOnce() -> StorageResult<T>,
    {
        let mut guard = InFlight::register(self, label);

        if self.connections.is_overloaded() {
            debug!(
                operation = label.name,
                request_id = label.request_id,
                delay_ms = duration_ms(self.backpressure_delay),
                "connection manager saturated, applying backpressure"
            );
            if let Err(err) = backoff::wait_blocking(self.backpressure_delay, cancel) {
                return guard.finish(Err(err));
            }
        }

        guard.start();
        let outcome = std::panic::catch_unwind(AssertUnwindSafe(op))
            .unwrap_or_else(|payload| Err(StorageError::Panicked(panic_message(payload.as_ref()))));
        guard.finish(outcome)
    }
}

/// Tracking id plus timer for one call; releases and records on finish or
/// drop, whichever comes first.
struct InFlight<'a> {
    executor: &'a OperationExecutor,
    label: OperationLabel<'a>,
    id: Uuid,
    started: Option<Instant>,
    done: bool,
}

impl<'a> InFlight<'a> {
    fn register(executor: &'a OperationExecutor, label: &OperationLabel<'a>) -> Self {
        let id = Uuid::new_v4();
        executor.connections.track_query(id);
        Self { executor, label: *label, id, started: None, done: false }
    }

    fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    fn elapsed(&self) -> Duration {
        self.started.map_or(Duration::ZERO, |started| started.elapsed())
    }

    fn complete(&mut self, success: bool) -> Duration {
        let duration = self.elapsed();
        self.executor.connections.release_query(self.id);
        self.executor.monitor.record_query(duration_ms(duration), success);
        self.done = true;
        duration
    }

    fn finish<T>(mut self, outcome: StorageResult<T>) -> ExecutionResult<T> {
        let duration = self.complete(outcome.is_ok());
        let label = self.label;
        let elapsed_ms = duration_ms(duration);

        if duration > self.executor.slow_threshold {
            warn!(
                operation = label.name,
                table = label.table,
                request_id = label.request_id,
                duration_ms = elapsed_ms,
                "slow database operation"
            );
        }

        match &outcome {
            Ok(_) => debug!(
                operation = label.name,
                table = label.table,
                request_id = label.request_id,
                duration_ms = elapsed_ms,
                "database operation completed"
            ),
            Err(err) => warn!(
                operation = label.name,
                table = label.table,
                request_id = label.request_id,
                duration_ms = elapsed_ms,
                error = %err,
                "database operation failed"
            ),
        }

        ExecutionResult { outcome, duration }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.done {
            warn!(operation = self.label.name, request_id = self.label.request_id, "database operation abandoned");
            self.complete(false);
        }
    }
}
