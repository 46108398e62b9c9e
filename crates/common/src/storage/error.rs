//! Storage error types
//!
//! Raw driver failures as seen by the resilience layer. These are never shown
//! to callers directly: the transaction runner classifies them into a
//! [`CatalogError`](crate::error::CatalogError).

use std::any::Any;

use thiserror::Error;

/// Storage error type
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Database query error: {0}")]
    Query(String),

    #[error("Database pool exhausted")]
    PoolExhausted,

    #[error("Connection timeout after {0}s")]
    Timeout(u64),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The caller cancelled while the operation was waiting to run.
    #[error("Operation cancelled")]
    Cancelled,

    /// The operation panicked; the panic payload is captured as text.
    #[error("Operation panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Rusqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    R2d2(#[from] r2d2::Error),
}

/// Storage result type
pub type StorageResult<T> = Result<T, StorageError>;

impl StorageError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// A blocking task that panicked keeps its panic text; one that was aborted
/// counts as cancelled.
impl From<tokio::task::JoinError> for StorageError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_panic() {
            Self::Panicked(panic_message(err.into_panic().as_ref()))
        } else {
            Self::Cancelled
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

#[cfg(test)]
mod tests {
    //! Unit tests for storage::error.
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorageError::Connection("Failed to connect".to_string());
        assert_eq!(err.to_string(), "Database connection error: Failed to connect");

        let err = StorageError::Timeout(5);
        assert_eq!(err.to_string(), "Connection timeout after 5s");

        assert_eq!(StorageError::Cancelled.to_string(), "Operation cancelled");
    }

    #[test]
    fn test_rusqlite_message_is_transparent() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT UNIQUE);")
            .unwrap();
        conn.execute("INSERT INTO t (name) VALUES ('a')", []).unwrap();

        let err: StorageError =
            conn.execute("INSERT INTO t (name) VALUES ('a')", []).unwrap_err().into();

        assert_eq!(err.to_string(), "UNIQUE constraint failed: t.name");
        assert!(matches!(err, StorageError::Rusqlite(_)));
    }

    #[test]
    fn test_cancelled_flag() {
        assert!(StorageError::Cancelled.is_cancelled());
        assert!(!StorageError::PoolExhausted.is_cancelled());
    }
}
