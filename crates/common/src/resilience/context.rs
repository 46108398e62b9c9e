//! Explicit wiring of the resilience components.
//!
//! Build one [`ResilienceContext`] at startup and share it; each context owns
//! an independent connection counter and metrics buffer.

use std::sync::Arc;

use super::classifier::{ErrorClassifier, SubstringClassifier};
use super::clock::{Clock, SystemClock};
use super::config::ResilienceConfig;
use super::connection::ConnectionManager;
use super::executor::OperationExecutor;
use super::monitor::{MetricsSnapshot, PerformanceMonitor};
use super::runner::TransactionRunner;

/// Connection manager, monitor, executor and runner built in dependency
/// order.
#[derive(Debug, Clone)]
pub struct ResilienceContext {
    config: ResilienceConfig,
    connections: Arc<ConnectionManager>,
    monitor: Arc<PerformanceMonitor>,
    runner: TransactionRunner,
}

impl ResilienceContext {
    pub fn new(config: ResilienceConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: ResilienceConfig) -> ResilienceContextBuilder {
        ResilienceContextBuilder::new(config)
    }

    pub fn config(&self) -> &ResilienceConfig {
        &self.config
    }

    pub fn connections(&self) -> &Arc<ConnectionManager> {
        &self.connections
    }

    pub fn monitor(&self) -> &Arc<PerformanceMonitor> {
        &self.monitor
    }

    pub fn executor(&self) -> &OperationExecutor {
        self.runner.executor()
    }

    pub fn runner(&self) -> &TransactionRunner {
        &self.runner
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.monitor.metrics()
    }
}

impl Default for ResilienceContext {
    fn default() -> Self {
        Self::new(ResilienceConfig::default())
    }
}

/// Swaps the clock or classifier before wiring.
#[derive(Debug)]
pub struct ResilienceContextBuilder {
    config: ResilienceConfig,
    clock: Arc<dyn Clock>,
    classifier: Arc<dyn ErrorClassifier>,
}

impl ResilienceContextBuilder {
    pub fn new(config: ResilienceConfig) -> Self {
        Self { config, clock: Arc::new(SystemClock), classifier: Arc::new(SubstringClassifier) }
    }

    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn build(self) -> ResilienceContext {
        let connections = Arc::new(ConnectionManager::new(self.config.max_concurrency));
        let monitor = Arc::new(PerformanceMonitor::with_clock(
            &self.config,
            Arc::clone(&connections),
            self.clock,
        ));
        let executor = OperationExecutor::new(&self.config, Arc::clone(&connections), Arc::clone(&monitor));
        let runner = TransactionRunner::with_classifier(&self.config, executor, self.classifier);

        ResilienceContext { config: self.config, connections, monitor, runner }
    }
}
