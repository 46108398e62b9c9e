//! Rolling performance metrics.
//!
//! Every completed operation attempt lands in a bounded ring buffer; the
//! snapshot aggregates only the records inside the metrics window.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::clock::{Clock, SystemClock};
use super::config::ResilienceConfig;
use super::connection::ConnectionManager;
use crate::collections::RingBuffer;

/// Outcome of a single operation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationRecord {
    pub duration_ms: u64,
    pub success: bool,
    pub timestamp: Instant,
}

/// Connection load as reported in [`MetricsSnapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionLoad {
    pub active: usize,
    pub total: usize,
    pub overloaded: bool,
}

/// Aggregate metrics over the current window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub query_count: usize,
    /// Mean duration in milliseconds, rounded to the nearest integer
    pub average_query_time: u64,
    pub slow_queries: usize,
    /// Failed share in percent, two decimals
    pub error_rate: f64,
    pub connection_stats: ConnectionLoad,
}

/// Bounded window of operation outcomes.
#[derive(Debug)]
pub struct PerformanceMonitor {
    records: Mutex<RingBuffer<OperationRecord>>,
    connections: Arc<ConnectionManager>,
    clock: Arc<dyn Clock>,
    window: Duration,
    slow_threshold_ms: u64,
    overload_ratio: f64,
}

impl PerformanceMonitor {
    pub fn new(config: &ResilienceConfig, connections: Arc<ConnectionManager>) -> Self {
        Self::with_clock(config, connections, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: &ResilienceConfig,
        connections: Arc<ConnectionManager>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            records: Mutex::new(RingBuffer::new(config.metrics_capacity)),
            connections,
            clock,
            window: config.metrics_window(),
            slow_threshold_ms: config.slow_query_threshold_ms,
            overload_ratio: config.overload_ratio,
        }
    }

    /// Append an outcome, evicting the oldest record when full.
    pub fn record_query(&self, duration_ms: u64, success: bool) {
        let record = OperationRecord { duration_ms, success, timestamp: self.clock.now() };
        if self.records.lock().push(record).is_some() {
            debug!("metrics buffer full, oldest record evicted");
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        let now = self.clock.now();
        let (count, total_ms, slow, failed) = self
            .records
            .lock()
            .iter()
            .filter(|r| now.saturating_duration_since(r.timestamp) < self.window)
            .fold((0usize, 0u64, 0usize, 0usize), |(count, total, slow, failed), r| {
                (
                    count + 1,
                    total.saturating_add(r.duration_ms),
                    slow + usize::from(r.duration_ms > self.slow_threshold_ms),
                    failed + usize::from(!r.success),
                )
            });

        let (average_query_time, error_rate) = if count == 0 {
            (0, 0.0)
        } else {
            let average = (total_ms as f64 / count as f64).round() as u64;
            let rate = (100.0 * failed as f64 / count as f64 * 100.0).round() / 100.0;
            (average, rate)
        };

        let stats = self.connections.stats();
        MetricsSnapshot {
            query_count: count,
            average_query_time,
            slow_queries: slow,
            error_rate,
            connection_stats: ConnectionLoad {
                active: stats.active_connections,
                total: stats.max_connections,
                overloaded: stats.active_connections as f64
                    >= self.overload_ratio * stats.max_connections as f64,
            },
        }
    }

    /// Drop every record.
    pub fn clear_metrics(&self) {
        self.records.lock().clear();
    }

    /// Records currently buffered, regardless of age.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Copy of the buffer, oldest first.
    pub fn records(&self) -> Vec<OperationRecord> {
        self.records.lock().iter().copied().collect()
    }
}
