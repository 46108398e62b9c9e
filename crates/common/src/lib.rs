//! Shared building blocks for the catalog storage crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: error taxonomy, collections
//! - `observability`: tracing bootstrap
//! - `runtime`: database resilience layer and SQLite storage primitives
//! - `test-utils`: temporary database helpers for tests

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod collections;
#[cfg(feature = "foundation")]
pub mod error;

// Observability
// -----------------------------------------------------------------
#[cfg(feature = "observability")]
pub mod observability;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod resilience;
#[cfg(feature = "runtime")]
pub mod storage;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(feature = "test-utils")]
pub mod testing;

// Re-export commonly used types
// ------------------------
#[cfg(feature = "foundation")]
pub use error::{CatalogError, CatalogResult, ErrorCode, ErrorEnvelope};
#[cfg(feature = "runtime")]
pub use resilience::{
    ConnectionManager, ErrorClassification, ErrorClassifier, ExecutionResult, MetricsSnapshot,
    OperationExecutor, PerformanceMonitor, ResilienceConfig, ResilienceContext, RunOptions,
    SubstringClassifier, TransactionOutcome, TransactionRunner,
};
#[cfg(feature = "runtime")]
pub use storage::{SqlitePool, StorageConfig, StorageError, StorageResult, TransactionalStore};
