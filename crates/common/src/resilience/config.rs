//! Resilience layer configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for the connection manager, executor, runner and monitor.
///
/// Durations are expressed in milliseconds/seconds so the struct maps
/// directly onto TOML and JSON config files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    /// In-flight operations at which the connection manager reports saturation
    pub max_concurrency: usize,

    /// Fixed wait applied by the executor while saturated
    pub backpressure_delay_ms: u64,

    /// Operations slower than this are logged and counted as slow
    pub slow_query_threshold_ms: u64,

    /// Age limit of records considered by the metrics snapshot
    pub metrics_window_secs: u64,

    /// Ring buffer capacity of the performance monitor
    pub metrics_capacity: usize,

    /// Fraction of `max_concurrency` at which the snapshot flags overload
    pub overload_ratio: f64,

    /// First retry delay; doubles with every attempt
    pub base_backoff_ms: u64,

    /// Upper bound (exclusive) of the random jitter added to each delay
    pub max_jitter_ms: u64,

    /// Retries for single operations when the caller does not specify any
    pub default_retries: u32,

    /// Retries for transactions when the caller does not specify any
    pub default_transaction_retries: u32,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 10,
            backpressure_delay_ms: 50,
            slow_query_threshold_ms: 1000,
            metrics_window_secs: 300,
            metrics_capacity: 1000,
            overload_ratio: 0.8,
            base_backoff_ms: 100,
            max_jitter_ms: 50,
            default_retries: 2,
            default_transaction_retries: 0,
        }
    }
}

impl ResilienceConfig {
    pub fn backpressure_delay(&self) -> Duration {
        Duration::from_millis(self.backpressure_delay_ms)
    }

    pub fn slow_query_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_query_threshold_ms)
    }

    pub fn metrics_window(&self) -> Duration {
        Duration::from_secs(self.metrics_window_secs)
    }

    pub fn base_backoff(&self) -> Duration {
        Duration::from_millis(self.base_backoff_ms)
    }

    pub fn max_jitter(&self) -> Duration {
        Duration::from_millis(self.max_jitter_ms)
    }
}
