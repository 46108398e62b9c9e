//! SQLite storage primitives
//!
//! Connection pooling (r2d2), per-connection pragmas, the driver error type
//! and the transaction seam the resilience layer runs against.

pub mod config;
pub mod error;
pub mod pool;
pub mod pragmas;
pub mod types;

// Re-export commonly used types
pub use config::{StorageConfig, StorageConfigBuilder};
pub use error::{StorageError, StorageResult};
pub use pool::SqlitePool;
pub use pragmas::apply_connection_pragmas;
pub use types::{HealthStatus, TransactionalStore};
