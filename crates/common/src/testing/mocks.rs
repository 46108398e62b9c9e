//! Scripted operations for exercising retry paths.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::storage::{StorageError, StorageResult};

/// Fails with a freshly built error for the first `failures` calls, then
/// succeeds. Counts every call.
pub struct ScriptedOperation<E> {
    failures: u32,
    calls: AtomicU32,
    make_error: E,
}

impl<E> ScriptedOperation<E>
where
    E: Fn() -> StorageError,
{
    pub fn failing(failures: u32, make_error: E) -> Self {
        Self { failures, calls: AtomicU32::new(0), make_error }
    }

    pub fn call(&self) -> StorageResult<u32> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= self.failures {
            Err((self.make_error)())
        } else {
            Ok(n)
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<E> std::fmt::Debug for ScriptedOperation<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedOperation")
            .field("failures", &self.failures)
            .field("calls", &self.calls.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}
