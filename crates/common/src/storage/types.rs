//! Storage seams used by the resilience layer.

use std::fmt::Debug;

use rusqlite::Transaction;
use serde::Serialize;

use super::error::StorageResult;

/// An engine that can run a closure inside an atomic transaction.
///
/// Implementations commit when the closure returns `Ok` and roll back when it
/// returns `Err`. Atomicity and isolation are the engine's; callers add no
/// locking of their own.
pub trait TransactionalStore: Send + Sync + Debug {
    /// Run `f` inside a single transaction.
    fn transaction<T, F>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> StorageResult<T>;
}

impl<S: TransactionalStore + ?Sized> TransactionalStore for std::sync::Arc<S> {
    fn transaction<T, F>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> StorageResult<T>,
    {
        (**self).transaction(f)
    }
}

/// Health status of the storage pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    pub healthy: bool,

    /// Connections currently open (idle or checked out)
    pub open_connections: u32,

    pub idle_connections: u32,

    pub max_connections: u32,

    /// Error message if unhealthy
    pub message: Option<String>,
}

impl HealthStatus {
    pub fn healthy(open: u32, idle: u32, max: u32) -> Self {
        Self {
            healthy: true,
            open_connections: open,
            idle_connections: idle,
            max_connections: max,
            message: None,
        }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            healthy: false,
            open_connections: 0,
            idle_connections: 0,
            max_connections: 0,
            message: Some(message.into()),
        }
    }
}
