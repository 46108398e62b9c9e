//! Database resilience layer.
//!
//! Components, leaves first:
//! - [`classifier`]: maps storage failures to an [`ErrorCode`](crate::ErrorCode)
//!   and a retry verdict
//! - [`connection`]: in-flight operation counter with a saturation ceiling
//! - [`monitor`]: bounded rolling window of operation outcomes
//! - [`executor`]: times, tracks and records a single operation
//! - [`runner`]: retry orchestration for single operations and transactions
//!
//! [`ResilienceContext`] wires them together:
//!
//! ```no_run
//! use catalog_common::resilience::{ResilienceContext, RunOptions};
//! use catalog_common::{ResilienceConfig, SqlitePool, StorageConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = SqlitePool::new(StorageConfig::new("data/catalog.db"))?;
//! let ctx = ResilienceContext::new(ResilienceConfig::default());
//!
//! let books: i64 = ctx.runner().execute_transaction(&pool, RunOptions::new().retries(2), |tx| {
//!     Ok(tx.query_row("SELECT COUNT(*) FROM books", [], |row| row.get(0))?)
//! })?;
//! # let _ = books;
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod classifier;
pub mod clock;
pub mod config;
pub mod connection;
pub mod context;
pub mod executor;
pub mod monitor;
pub mod runner;

pub use backoff::Backoff;
pub use classifier::{
    classify_database_error, is_non_retryable_error, ErrorClassification, ErrorClassifier,
    SqliteCodeClassifier, SubstringClassifier,
};
pub use clock::{Clock, MockClock, SystemClock};
pub use config::ResilienceConfig;
pub use connection::{ConnectionManager, ConnectionStats};
pub use context::{ResilienceContext, ResilienceContextBuilder};
pub use executor::{ExecutionResult, OperationExecutor, OperationLabel};
pub use monitor::{ConnectionLoad, MetricsSnapshot, OperationRecord, PerformanceMonitor};
pub use runner::{RunOptions, TransactionOutcome, TransactionRunner};
