//! In-flight operation tracking.
//!
//! [`ConnectionManager`] counts the operations currently running against the
//! database and reports saturation once the count reaches the configured
//! ceiling. It holds no connections itself; the pool does.

use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashSet;
use serde::{Deserialize, Serialize};
use tracing::trace;
use uuid::Uuid;

/// Point-in-time view of the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStats {
    pub active_connections: usize,
    pub active_queries: usize,
    pub max_connections: usize,
}

/// Shared counter of in-flight operations.
#[derive(Debug)]
pub struct ConnectionManager {
    active: AtomicUsize,
    in_flight: DashSet<Uuid>,
    max_concurrency: usize,
}

impl ConnectionManager {
    pub fn new(max_concurrency: usize) -> Self {
        Self { active: AtomicUsize::new(0), in_flight: DashSet::new(), max_concurrency }
    }

    /// Register an operation id. Tracking the same id twice counts once.
    pub fn track_query(&self, id: Uuid) {
        if self.in_flight.insert(id) {
            let active = self.active.fetch_add(1, Ordering::AcqRel) + 1;
            trace!(query_id = %id, active, "query tracked");
        }
    }

    /// Release an operation id. Unknown or already released ids are ignored
    /// and the counter never drops below zero.
    pub fn release_query(&self, id: Uuid) {
        if self.in_flight.remove(&id).is_none() {
            return;
        }

        let previous = self
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| Some(n.saturating_sub(1)))
            .unwrap_or_else(|n| n);
        trace!(query_id = %id, active = previous.saturating_sub(1), "query released");
    }

    /// Saturated once the in-flight count reaches the ceiling.
    pub fn is_overloaded(&self) -> bool {
        self.active_count() >= self.max_concurrency
    }

    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            active_connections: self.active_count(),
            active_queries: self.in_flight.len(),
            max_connections: self.max_concurrency,
        }
    }
}
